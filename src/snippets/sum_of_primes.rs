use serde::Deserialize;
use serde_json::json;

use crate::core::error::{Error, ErrorKind};
use crate::invoker::Invoker;
use crate::unit::Unit;

#[derive(Debug, Deserialize)]
pub struct SumOfPrimesParams {
    /// Same shape as `find_primes`.
    #[serde(deserialize_with = "crate::params::text")]
    pub limit: String,
}

#[derive(Debug, Deserialize)]
struct PrimeList {
    primes: Vec<u64>,
}

pub fn unit() -> Unit {
    Unit::task(execute).with_dependencies(&["find_primes"])
}

/// Calculate the sum of all prime numbers up to the given limit.
/// Uses find_primes snippet to get the list of primes.
pub async fn execute(invoker: Invoker, params: SumOfPrimesParams) -> Result<u64, Error> {
    let found: PrimeList = invoker
        .invoke_as("find_primes", json!({ "limit": params.limit }))
        .await
        .map_err(|err| {
            Error::new(ErrorKind::Invocation)
                .with_message(format!("Error calculating sum of primes: {}", err.detail()))
                .with_source(err)
        })?;
    Ok(found.primes.iter().sum())
}
