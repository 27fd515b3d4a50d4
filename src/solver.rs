//! Dense linear solver for the energy-balance system

use crate::error::ComputeError;

/// Pivots below this magnitude mark the system as singular
const PIVOT_EPSILON: f64 = 1e-14;

/// Solve `a · x = b` by Gaussian elimination with partial pivoting
pub fn solve_dense(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Result<Vec<f64>, ComputeError> {
    let n = b.len();
    if a.len() != n || a.iter().any(|row| row.len() != n) {
        return Err(ComputeError::SingularSystem(format!(
            "matrix shape does not match right-hand side of length {}",
            n
        )));
    }

    for col in 0..n {
        let (pivot_row, pivot_abs) = (col..n)
            .map(|r| (r, a[r][col].abs()))
            .fold((col, -1.0), |best, cur| if cur.1 > best.1 { cur } else { best });

        if !(pivot_abs > PIVOT_EPSILON) {
            return Err(ComputeError::SingularSystem(format!(
                "pivot {:e} at column {}",
                pivot_abs, col
            )));
        }
        if pivot_row != col {
            a.swap(pivot_row, col);
            b.swap(pivot_row, col);
        }

        let (upper, lower) = a.split_at_mut(col + 1);
        let pivot = &upper[col];
        for (offset, row) in lower.iter_mut().enumerate() {
            let factor = row[col] / pivot[col];
            if factor == 0.0 {
                continue;
            }
            row[col] = 0.0;
            for c in (col + 1)..n {
                row[c] -= factor * pivot[c];
            }
            b[col + 1 + offset] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        let tail: f64 = ((i + 1)..n).map(|j| a[i][j] * x[j]).sum();
        x[i] = (b[i] - tail) / a[i][i];
    }

    if let Some(i) = x.iter().position(|v| !v.is_finite()) {
        return Err(ComputeError::NumericalFault(format!(
            "non-finite solution component at node {}",
            i
        )));
    }
    Ok(x)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solves_small_system() {
        let a = vec![
            vec![4.0, -1.0, 0.0],
            vec![-1.0, 4.0, -1.0],
            vec![0.0, -1.0, 4.0],
        ];
        let x_true = [1.0, 2.0, 3.0];
        let b: Vec<f64> = a
            .iter()
            .map(|row| row.iter().zip(x_true.iter()).map(|(a, x)| a * x).sum())
            .collect();
        let x = solve_dense(a, b).unwrap();
        for i in 0..3 {
            assert!((x[i] - x_true[i]).abs() < 1e-12);
        }
    }

    #[test]
    fn test_needs_pivoting() {
        let a = vec![vec![0.0, 1.0], vec![1.0, 0.0]];
        let x = solve_dense(a, vec![2.0, 3.0]).unwrap();
        assert!((x[0] - 3.0).abs() < 1e-12);
        assert!((x[1] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_singular_rejected() {
        let a = vec![vec![1.0, 2.0], vec![2.0, 4.0]];
        assert!(matches!(
            solve_dense(a, vec![1.0, 2.0]),
            Err(ComputeError::SingularSystem(_))
        ));
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let a = vec![vec![1.0, 0.0]];
        assert!(solve_dense(a, vec![1.0, 2.0]).is_err());
    }
}
