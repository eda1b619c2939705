//! Element-wise matrix addition.
use serde::Deserialize;

use crate::core::error::{Error, ErrorKind};
use crate::invoker::Invoker;
use crate::unit::Unit;

#[derive(Debug, Deserialize)]
pub struct AddMatricesParams {
    pub matrix1: Vec<Vec<f64>>,
    pub matrix2: Vec<Vec<f64>>,
}

pub fn unit() -> Unit {
    Unit::task(execute)
}

/// Add two matrices of the same dimensions.
/// Input two matrices as 2D arrays of numbers. Matrices must have the same dimensions.
pub async fn execute(_invoker: Invoker, params: AddMatricesParams) -> Result<Vec<Vec<f64>>, Error> {
    add(&params.matrix1, &params.matrix2).map_err(|message| {
        Error::new(ErrorKind::Invocation).with_message(format!("Error adding matrices: {message}"))
    })
}

fn add(left: &[Vec<f64>], right: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, String> {
    let left_shape = shape(left)?;
    let right_shape = shape(right)?;
    if left_shape != right_shape {
        return Err(format!(
            "Matrix dimensions must match. Got ({}, {}) and ({}, {})",
            left_shape.0, left_shape.1, right_shape.0, right_shape.1
        ));
    }
    Ok(left
        .iter()
        .zip(right)
        .map(|(a, b)| a.iter().zip(b).map(|(x, y)| x + y).collect())
        .collect())
}

fn shape(matrix: &[Vec<f64>]) -> Result<(usize, usize), String> {
    let cols = matrix.first().map_or(0, Vec::len);
    if matrix.iter().any(|row| row.len() != cols) {
        return Err("Matrix rows must all have the same length".to_string());
    }
    Ok((matrix.len(), cols))
}
