use serde::Deserialize;

use crate::core::error::Error;
use crate::unit::Unit;

#[derive(Debug, Deserialize)]
pub struct AddNumbersParams {
    #[serde(default, deserialize_with = "crate::params::number")]
    pub a: f64,
    #[serde(default, deserialize_with = "crate::params::number")]
    pub b: f64,
}

pub fn unit() -> Unit {
    Unit::blocking(execute)
}

/// Add two numbers together.
pub fn execute(params: AddNumbersParams) -> Result<f64, Error> {
    Ok(params.a + params.b)
}
