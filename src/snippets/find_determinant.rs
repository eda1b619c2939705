use serde::Deserialize;

use crate::core::error::{Error, ErrorKind};
use crate::invoker::Invoker;
use crate::unit::Unit;

#[derive(Debug, Deserialize)]
pub struct DeterminantParams {
    pub matrix: Vec<Vec<f64>>,
}

pub fn unit() -> Unit {
    Unit::task(execute)
}

/// Calculate the determinant of a square matrix.
/// Input a square matrix as a 2D array of numbers.
pub async fn execute(_invoker: Invoker, params: DeterminantParams) -> Result<f64, Error> {
    determinant(&params.matrix).map_err(|message| {
        Error::new(ErrorKind::Invocation)
            .with_message(format!("Error calculating determinant: {message}"))
    })
}

// Gaussian elimination with partial pivoting.
fn determinant(matrix: &[Vec<f64>]) -> Result<f64, String> {
    let n = matrix.len();
    if n == 0 {
        return Err("Matrix cannot be empty".to_string());
    }
    if matrix.iter().any(|row| row.len() != n) {
        return Err("Matrix must be square".to_string());
    }

    let mut rows = matrix.to_vec();
    let mut det = 1.0;
    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&x, &y| rows[x][col].abs().total_cmp(&rows[y][col].abs()))
            .unwrap_or(col);
        if rows[pivot][col] == 0.0 {
            return Ok(0.0);
        }
        if pivot != col {
            rows.swap(pivot, col);
            det = -det;
        }
        let pivot_row = rows[col].clone();
        det *= pivot_row[col];
        for row in rows.iter_mut().skip(col + 1) {
            let factor = row[col] / pivot_row[col];
            for (value, above) in row.iter_mut().zip(&pivot_row).skip(col) {
                *value -= factor * above;
            }
        }
    }
    Ok(det)
}
