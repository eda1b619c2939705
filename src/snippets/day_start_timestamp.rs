use serde::Deserialize;
use serde_json::json;
use time::macros::format_description;
use time::Date;

use crate::core::error::{Error, ErrorKind};
use crate::invoker::Invoker;
use crate::unit::Unit;

#[derive(Debug, Deserialize)]
pub struct DayStartParams {}

#[derive(Debug, Deserialize)]
struct CurrentDate {
    date: String,
}

pub fn unit() -> Unit {
    Unit::task(execute)
}

/// Get Unix timestamp for the start of the current day (midnight).
/// Uses current_time snippet to get the current date.
pub async fn execute(invoker: Invoker, _params: DayStartParams) -> Result<i64, Error> {
    let now: CurrentDate = invoker.invoke_as("current_time", json!({})).await?;
    let date = Date::parse(&now.date, format_description!("[year]-[month]-[day]")).map_err(|err| {
        Error::new(ErrorKind::Invocation)
            .with_message(format!("unexpected date from current_time: {}", now.date))
            .with_source(err)
    })?;
    Ok(date
        .midnight()
        .assume_offset(crate::clock::local_offset())
        .unix_timestamp())
}
