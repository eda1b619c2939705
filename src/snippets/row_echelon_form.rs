use serde::Deserialize;

use crate::core::error::{Error, ErrorKind};
use crate::invoker::Invoker;
use crate::unit::Unit;

const TOLERANCE: f64 = 1e-10;

#[derive(Debug, Deserialize)]
pub struct RowEchelonParams {
    pub matrix: Vec<Vec<f64>>,
    /// Compute the reduced form (RREF) instead of REF.
    pub reduce: bool,
}

pub fn unit() -> Unit {
    Unit::task(execute)
}

/// Convert a matrix to row echelon form (REF) or reduced row echelon form (RREF).
/// Input a matrix and specify whether to compute the reduced form (RREF) or not (REF).
pub async fn execute(_invoker: Invoker, params: RowEchelonParams) -> Result<Vec<Vec<f64>>, Error> {
    echelon(&params.matrix, params.reduce).map_err(|message| {
        let form = if params.reduce { "reduced " } else { "" };
        Error::new(ErrorKind::Invocation)
            .with_message(format!("Error computing {form}row echelon form: {message}"))
    })
}

fn echelon(matrix: &[Vec<f64>], reduce: bool) -> Result<Vec<Vec<f64>>, String> {
    let cols = matrix.first().map_or(0, Vec::len);
    if cols == 0 {
        return Err("Matrix cannot be empty".to_string());
    }
    if matrix.iter().any(|row| row.len() != cols) {
        return Err("Matrix rows must all have the same length".to_string());
    }

    let mut a = matrix.to_vec();
    let rows = a.len();
    let mut r = 0;
    for c in 0..cols {
        let Some(pivot_row) = (r..rows).find(|&i| a[i][c].abs() > TOLERANCE) else {
            continue;
        };
        a.swap(pivot_row, r);
        let pivot = a[r][c];
        if reduce {
            for value in a[r].iter_mut() {
                *value /= pivot;
            }
        }

        let lead = a[r].clone();
        for (i, row) in a.iter_mut().enumerate() {
            if i == r || row[c].abs() <= TOLERANCE {
                continue;
            }
            let factor = if reduce {
                row[c]
            } else if i > r {
                row[c] / pivot
            } else {
                continue;
            };
            for (value, above) in row.iter_mut().zip(&lead) {
                *value -= factor * above;
            }
        }

        r += 1;
        if r == rows {
            break;
        }
    }

    for value in a.iter_mut().flatten() {
        if value.abs() < TOLERANCE {
            *value = 0.0;
        }
    }
    Ok(a)
}
