use serde::{Deserialize, Serialize};

use crate::core::error::{Error, ErrorKind};
use crate::unit::Unit;

const MAX_LIMIT: usize = 10_000_000;

#[derive(Debug, Deserialize)]
pub struct PrimeParams {
    /// Decimal text or a JSON integer; parsed before sieving.
    #[serde(deserialize_with = "crate::params::text")]
    pub limit: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct PrimeResult {
    pub count: usize,
    pub primes: Vec<usize>,
}

pub fn unit() -> Unit {
    Unit::blocking(execute)
}

/// Find all prime numbers up to the given limit.
/// Returns count of primes and the prime numbers themselves.
pub fn execute(params: PrimeParams) -> Result<PrimeResult, Error> {
    let limit = parse_limit(&params.limit).map_err(|message| {
        Error::new(ErrorKind::Invocation).with_message(format!("Invalid input: {message}"))
    })?;
    let primes = sieve(limit);
    Ok(PrimeResult {
        count: primes.len(),
        primes,
    })
}

fn parse_limit(text: &str) -> Result<usize, String> {
    let limit: i64 = text
        .trim()
        .parse()
        .map_err(|_| format!("limit must be an integer, got '{text}'"))?;
    if limit < 2 {
        return Err("Limit must be at least 2".to_string());
    }
    let limit = usize::try_from(limit).map_err(|_| format!("Limit must be at most {MAX_LIMIT}"))?;
    if limit > MAX_LIMIT {
        return Err(format!("Limit must be at most {MAX_LIMIT}"));
    }
    Ok(limit)
}

// Sieve of Eratosthenes.
fn sieve(limit: usize) -> Vec<usize> {
    let mut is_prime = vec![true; limit + 1];
    is_prime[0] = false;
    is_prime[1] = false;
    let mut i = 2;
    while i * i <= limit {
        if is_prime[i] {
            for multiple in (i * i..=limit).step_by(i) {
                is_prime[multiple] = false;
            }
        }
        i += 1;
    }
    is_prime
        .iter()
        .enumerate()
        .filter_map(|(n, &prime)| prime.then_some(n))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{PrimeParams, PrimeResult, execute};
    use serde_json::json;

    fn run(limit: &str) -> Result<PrimeResult, String> {
        execute(PrimeParams {
            limit: limit.to_string(),
        })
        .map_err(|err| err.detail())
    }

    #[test]
    fn finds_primes_up_to_limit() {
        assert_eq!(
            run("10").unwrap(),
            PrimeResult {
                count: 4,
                primes: vec![2, 3, 5, 7],
            }
        );
        assert_eq!(run(" 2 ").unwrap().primes, vec![2]);
        assert_eq!(run("100").unwrap().count, 25);
    }

    #[test]
    fn rejects_small_and_malformed_limits() {
        assert_eq!(run("1").unwrap_err(), "Invalid input: Limit must be at least 2");
        assert!(run("ten").unwrap_err().starts_with("Invalid input: limit must be an integer"));
        assert!(run("99999999999").unwrap_err().contains("at most"));
    }

    #[test]
    fn integer_limits_are_accepted() {
        let params: PrimeParams = serde_json::from_value(json!({"limit": 20})).unwrap();
        assert_eq!(execute(params).unwrap().count, 8);
    }
}
