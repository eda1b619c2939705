use serde::Deserialize;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime};

use crate::core::error::{Error, ErrorKind};
use crate::unit::Unit;

// Values above this are taken to be milliseconds.
const MILLIS_THRESHOLD: f64 = 1e11;

const SUPPORTED_FORMATS: &str = "Invalid timestamp format. Supported formats:\n\
- Unix timestamp in seconds (e.g., 1625097600)\n\
- Unix timestamp in milliseconds (e.g., 1625097600000)\n\
- ISO format string (e.g., '2021-07-01T00:00:00Z')";

#[derive(Debug, Deserialize)]
pub struct TimestampParams {
    #[serde(default, deserialize_with = "crate::params::text")]
    pub timestamp: String,
}

pub fn unit() -> Unit {
    Unit::blocking(execute)
}

/// Convert a timestamp to date in YYYY-MM-DD format.
/// Supports Unix timestamps (seconds/milliseconds) and ISO format strings.
pub fn execute(params: TimestampParams) -> Result<String, Error> {
    let date = parse_date(params.timestamp.trim())
        .ok_or_else(|| Error::new(ErrorKind::Invocation).with_message(SUPPORTED_FORMATS))?;
    date.format(format_description!("[year]-[month]-[day]"))
        .map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("failed to format date")
                .with_source(err)
        })
}

fn parse_date(text: &str) -> Option<Date> {
    if let Ok(mut seconds) = text.parse::<f64>() {
        if !seconds.is_finite() {
            return None;
        }
        if seconds > MILLIS_THRESHOLD {
            seconds /= 1000.0;
        }
        let offset = crate::clock::local_offset();
        let instant = OffsetDateTime::from_unix_timestamp_nanos((seconds * 1e9) as i128).ok()?;
        return Some(instant.to_offset(offset).date());
    }
    if let Ok(instant) = OffsetDateTime::parse(text, &Rfc3339) {
        return Some(instant.date());
    }
    let naive = format_description!(
        "[year]-[month]-[day]T[hour]:[minute]:[second][optional [.[subsecond]]]"
    );
    if let Ok(instant) = PrimitiveDateTime::parse(text, naive) {
        return Some(instant.date());
    }
    Date::parse(text, format_description!("[year]-[month]-[day]")).ok()
}
