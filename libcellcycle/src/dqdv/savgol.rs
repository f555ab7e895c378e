use nalgebra::{DMatrix, DVector};

use crate::error::DqdvError;

/// A Savitzky-Golay smoothing filter.
///
/// Interior points are the value at the window centre of a least-squares polynomial fit.
/// The first and last half-window points are taken from a single polynomial fitted to the
/// first (last) full window, so the output has the same length as the input.
#[derive(Debug, Clone)]
pub struct SavitzkyGolay {
    window: usize,
    // Maps the values of one window onto the polynomial coefficients (in scaled positions)
    projection: DMatrix<f64>,
    positions: Vec<f64>,
}

impl SavitzkyGolay {
    /// Check a window/order pair against the length of the data it will filter
    pub fn validate(
        stage: &'static str,
        window: usize,
        order: usize,
        len: usize,
    ) -> Result<(), DqdvError> {
        if window % 2 == 0 {
            return Err(DqdvError::EvenWindow { stage, window });
        }
        if window > len {
            return Err(DqdvError::WindowTooLarge { stage, window, len });
        }
        if order >= window {
            return Err(DqdvError::OrderTooLarge {
                stage,
                order,
                window,
            });
        }
        Ok(())
    }

    pub fn new(stage: &'static str, window: usize, order: usize) -> Result<Self, DqdvError> {
        if window % 2 == 0 {
            return Err(DqdvError::EvenWindow { stage, window });
        }
        if order >= window {
            return Err(DqdvError::OrderTooLarge {
                stage,
                order,
                window,
            });
        }
        let half = window / 2;
        // Positions scaled into [-1, 1]
        let scale = half.max(1) as f64;
        let positions: Vec<f64> = (0..window)
            .map(|j| (j as f64 - half as f64) / scale)
            .collect();
        let design = DMatrix::from_fn(window, order + 1, |row, col| {
            positions[row].powi(col as i32)
        });
        let projection = design
            .pseudo_inverse(1e-12)
            .map_err(|_| DqdvError::Singular { stage })?;

        Ok(Self {
            window,
            projection,
            positions,
        })
    }

    /// Smooth `data`. The caller guarantees `data.len() >= window`.
    pub fn apply(&self, data: &[f64]) -> Vec<f64> {
        let n = data.len();
        let half = self.window / 2;
        let mut output = vec![0.0; n];
        if n < self.window {
            output.copy_from_slice(data);
            return output;
        }

        // Interior: the constant coefficient of the fit is the centre value
        let weights: Vec<f64> = self.projection.row(0).iter().copied().collect();
        for i in half..(n - half) {
            let window = &data[(i - half)..(i + half + 1)];
            output[i] = weights.iter().zip(window).map(|(w, y)| w * y).sum();
        }

        // Edges: evaluate the polynomial fitted to the outermost windows
        let head = self.fit(&data[..self.window]);
        for (i, out) in output.iter_mut().enumerate().take(half) {
            *out = evaluate_polynomial(&head, self.positions[i]);
        }
        let tail = self.fit(&data[(n - self.window)..]);
        for j in (half + 1)..self.window {
            output[n - self.window + j] = evaluate_polynomial(&tail, self.positions[j]);
        }
        output
    }

    fn fit(&self, window: &[f64]) -> DVector<f64> {
        &self.projection * DVector::from_column_slice(window)
    }
}

fn evaluate_polynomial(coefficients: &DVector<f64>, x: f64) -> f64 {
    coefficients.iter().rev().fold(0.0, |acc, c| acc * x + c)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_validation() {
        assert!(matches!(
            SavitzkyGolay::validate("first smoothing", 10, 3, 100),
            Err(DqdvError::EvenWindow { window: 10, .. })
        ));
        assert!(matches!(
            SavitzkyGolay::validate("first smoothing", 101, 3, 50),
            Err(DqdvError::WindowTooLarge { .. })
        ));
        assert!(matches!(
            SavitzkyGolay::validate("first smoothing", 5, 5, 50),
            Err(DqdvError::OrderTooLarge { .. })
        ));
        assert!(SavitzkyGolay::validate("first smoothing", 5, 4, 5).is_ok());
    }

    #[test]
    fn test_preserves_polynomials_up_to_order() {
        let filter = SavitzkyGolay::new("test", 11, 3).unwrap();
        let data: Vec<f64> = (0..40)
            .map(|i| {
                let x = i as f64 * 0.1;
                1.0 - 2.0 * x + 0.5 * x * x - 0.1 * x * x * x
            })
            .collect();
        let smoothed = filter.apply(&data);
        assert_eq!(smoothed.len(), data.len());
        for (s, d) in smoothed.iter().zip(data.iter()) {
            assert_abs_diff_eq!(*s, *d, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_window_of_one_is_identity() {
        let filter = SavitzkyGolay::new("test", 1, 0).unwrap();
        let data = vec![3.0, -1.0, 4.0, 1.5];
        assert_eq!(filter.apply(&data), data);
    }

    #[test]
    fn test_moving_average_for_order_zero() {
        let filter = SavitzkyGolay::new("test", 3, 0).unwrap();
        let data = vec![0.0, 3.0, 0.0, 3.0, 0.0];
        let smoothed = filter.apply(&data);
        assert_abs_diff_eq!(smoothed[1], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(smoothed[2], 2.0, epsilon = 1e-12);
        // Edge points take the mean of the outer window
        assert_abs_diff_eq!(smoothed[0], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(smoothed[4], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_large_window_is_stable() {
        let filter = SavitzkyGolay::new("test", 1001, 5).unwrap();
        let data: Vec<f64> = (0..3000).map(|i| 0.25 + 1e-3 * i as f64).collect();
        let smoothed = filter.apply(&data);
        for (s, d) in smoothed.iter().zip(data.iter()) {
            assert_abs_diff_eq!(*s, *d, epsilon = 1e-7);
        }
    }
}
