use std::collections::BTreeMap;

use serde::Deserialize;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::OffsetDateTime;

use crate::core::error::{Error, ErrorKind};
use crate::invoker::Invoker;
use crate::unit::Unit;

#[derive(Debug, Deserialize)]
pub struct CurrentTimeParams {}

pub fn unit() -> Unit {
    Unit::task(execute)
}

/// Get current time in multiple formats.
/// Returns timestamp, date, and ISO format.
pub async fn execute(
    _invoker: Invoker,
    _params: CurrentTimeParams,
) -> Result<BTreeMap<String, String>, Error> {
    let now = OffsetDateTime::now_utc().to_offset(crate::clock::local_offset());

    let formatted = |result: Result<String, time::error::Format>| {
        result.map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("failed to format current time")
                .with_source(err)
        })
    };
    let mut out = BTreeMap::new();
    out.insert("timestamp".to_string(), now.unix_timestamp().to_string());
    out.insert(
        "date".to_string(),
        formatted(now.format(format_description!("[year]-[month]-[day]")))?,
    );
    out.insert("iso".to_string(), formatted(now.format(&Rfc3339))?);
    out.insert(
        "time".to_string(),
        formatted(now.format(format_description!("[hour]:[minute]:[second]")))?,
    );
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::{CurrentTimeParams, execute};
    use crate::invoker::Invoker;
    use crate::unit::Unit;
    use time::OffsetDateTime;

    #[tokio::test]
    async fn reports_all_formats_for_the_same_instant() {
        let before = OffsetDateTime::now_utc().unix_timestamp();
        let out = execute(Invoker::new(Vec::<(&str, Unit)>::new()), CurrentTimeParams {})
            .await
            .expect("current time");
        let after = OffsetDateTime::now_utc().unix_timestamp();

        assert_eq!(
            out.keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["date", "iso", "time", "timestamp"]
        );
        let timestamp: i64 = out["timestamp"].parse().expect("integer timestamp");
        assert!((before..=after).contains(&timestamp));

        let date = out["date"].as_bytes();
        assert_eq!(date.len(), 10);
        assert_eq!((date[4], date[7]), (b'-', b'-'));
        assert!(out["iso"].starts_with(&out["date"]));
        assert_eq!(out["time"].len(), 8);
    }
}
