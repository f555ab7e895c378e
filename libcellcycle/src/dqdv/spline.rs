use crate::error::DqdvError;

const STAGE: &str = "smoothing spline";

/// A B-spline in knot/coefficient form
#[derive(Debug, Clone, PartialEq)]
pub struct BSpline {
    knots: Vec<f64>,
    coeffs: Vec<f64>,
    degree: usize,
}

impl BSpline {
    #[cfg(test)]
    pub fn degree(&self) -> usize {
        self.degree
    }

    /// Number of interior (non-boundary) knots
    #[cfg(test)]
    pub fn interior_knots(&self) -> usize {
        self.knots.len() - 2 * (self.degree + 1)
    }

    pub fn evaluate(&self, x: f64) -> f64 {
        let span = find_span(&self.knots, self.degree, self.coeffs.len(), x);
        let basis = basis_functions(&self.knots, self.degree, span, x);
        basis
            .iter()
            .enumerate()
            .map(|(r, b)| b * self.coeffs[span - self.degree + r])
            .sum()
    }

    /// The first derivative, a spline of one degree less
    pub fn derivative(&self) -> BSpline {
        let k = self.degree;
        if k == 0 {
            return BSpline {
                knots: self.knots.clone(),
                coeffs: vec![0.0; self.coeffs.len()],
                degree: 0,
            };
        }
        let coeffs = (0..self.coeffs.len() - 1)
            .map(|i| {
                let width = self.knots[i + k + 1] - self.knots[i + 1];
                if width > 0.0 {
                    k as f64 * (self.coeffs[i + 1] - self.coeffs[i]) / width
                } else {
                    0.0
                }
            })
            .collect();
        BSpline {
            knots: self.knots[1..self.knots.len() - 1].to_vec(),
            coeffs,
            degree: k - 1,
        }
    }
}

/// Index l of the knot interval [t_l, t_l+1) containing x, clamped to the valid spans
fn find_span(knots: &[f64], degree: usize, n_coeffs: usize, x: f64) -> usize {
    let last = n_coeffs - 1;
    if x >= knots[n_coeffs] {
        return last;
    }
    if x <= knots[degree] {
        return degree;
    }
    let l = knots.partition_point(|&t| t <= x).saturating_sub(1);
    l.clamp(degree, last)
}

/// The degree + 1 non-zero basis functions at x, B_(span-degree) ..= B_span
fn basis_functions(knots: &[f64], degree: usize, span: usize, x: f64) -> Vec<f64> {
    let mut basis = vec![0.0; degree + 1];
    let mut left = vec![0.0; degree + 1];
    let mut right = vec![0.0; degree + 1];
    basis[0] = 1.0;
    for j in 1..=degree {
        left[j] = x - knots[span + 1 - j];
        right[j] = knots[span + j] - x;
        let mut saved = 0.0;
        for r in 0..j {
            let denom = right[r + 1] + left[j - r];
            let temp = if denom != 0.0 { basis[r] / denom } else { 0.0 };
            basis[r] = saved + right[r + 1] * temp;
            saved = left[j - r] * temp;
        }
        basis[j] = saved;
    }
    basis
}

/// Piecewise-linear interpolation through (xs, ys), evaluated at sorted points `at`.
///
/// `xs` must be strictly increasing with at least two points. Points outside the range are
/// extrapolated from the end segments.
pub fn linear_interpolate(xs: &[f64], ys: &[f64], at: &[f64]) -> Vec<f64> {
    let mut segment = 0;
    let last_segment = xs.len() - 2;
    at.iter()
        .map(|&x| {
            while segment < last_segment && x > xs[segment + 1] {
                segment += 1;
            }
            let (x0, x1) = (xs[segment], xs[segment + 1]);
            let (y0, y1) = (ys[segment], ys[segment + 1]);
            y0 + (y1 - y0) * (x - x0) / (x1 - x0)
        })
        .collect()
}

/// Fit a smoothing spline of the given degree to (x, y).
///
/// Starts from a single polynomial piece and inserts knots in the intervals with the largest
/// squared residuals until the residual sum is at most `smoothing`, or until no interval
/// holds enough points to be split. `x` must be strictly increasing.
pub fn fit_smoothing_spline(
    x: &[f64],
    y: &[f64],
    degree: usize,
    smoothing: f64,
) -> Result<BSpline, DqdvError> {
    let m = x.len();
    if m <= degree {
        return Err(DqdvError::BadGridSize {
            grid: m,
            order: degree,
        });
    }
    let (start, end) = (x[0], x[m - 1]);
    // Each interval keeps at least degree + 1 points strictly inside it, which keeps the
    // least-squares system non-singular
    let min_split = 2 * (degree + 1) + 1;
    let mut interior: Vec<f64> = Vec::new();
    let mut n_add = 1;

    loop {
        let mut knots = vec![start; degree + 1];
        knots.extend_from_slice(&interior);
        knots.extend(std::iter::repeat(end).take(degree + 1));
        let coeffs = least_squares(x, y, &knots, degree)?;
        let spline = BSpline {
            knots,
            coeffs,
            degree,
        };

        let residuals: Vec<f64> = x
            .iter()
            .zip(y)
            .map(|(xi, yi)| yi - spline.evaluate(*xi))
            .collect();
        let fp: f64 = residuals.iter().map(|r| r * r).sum();
        if fp <= smoothing {
            log::debug!(
                "Spline converged with {} interior knots, residual {fp:e}",
                interior.len()
            );
            return Ok(spline);
        }

        // Residual sum and strictly interior points of every knot interval
        let mut bounds = vec![start];
        bounds.extend_from_slice(&interior);
        bounds.push(end);
        let mut intervals: Vec<(f64, Vec<usize>)> = vec![(0.0, Vec::new()); bounds.len() - 1];
        let mut current = 0;
        for (i, xi) in x.iter().enumerate() {
            while current < intervals.len() - 1 && *xi >= bounds[current + 1] {
                current += 1;
            }
            intervals[current].0 += residuals[i] * residuals[i];
            if *xi > bounds[current] && *xi < bounds[current + 1] {
                intervals[current].1.push(i);
            }
        }

        let mut candidates: Vec<(f64, f64)> = intervals
            .iter()
            .filter(|(_, inside)| inside.len() >= min_split)
            .map(|(sum, inside)| (*sum, x[inside[inside.len() / 2]]))
            .collect();
        if candidates.is_empty() {
            log::debug!(
                "Spline reached the knot limit with {} interior knots, residual {fp:e}",
                interior.len()
            );
            return Ok(spline);
        }
        candidates.sort_by(|a, b| b.0.total_cmp(&a.0));
        interior.extend(candidates.iter().take(n_add).map(|(_, knot)| *knot));
        interior.sort_by(f64::total_cmp);
        n_add *= 2;
    }
}

/// Least-squares B-spline coefficients through banded normal equations
fn least_squares(x: &[f64], y: &[f64], knots: &[f64], degree: usize) -> Result<Vec<f64>, DqdvError> {
    let n = knots.len() - degree - 1;
    let width = degree + 1;
    // band[i][d] holds A(i, i + d)
    let mut band = vec![vec![0.0; width]; n];
    let mut rhs = vec![0.0; n];
    for (xi, yi) in x.iter().zip(y) {
        let span = find_span(knots, degree, n, *xi);
        let basis = basis_functions(knots, degree, span, *xi);
        let base = span - degree;
        for r in 0..width {
            rhs[base + r] += basis[r] * yi;
            for c in r..width {
                band[base + r][c - r] += basis[r] * basis[c];
            }
        }
    }
    solve_banded_cholesky(band, rhs, degree)
}

/// Solve the symmetric positive definite banded system A c = b by A = U^T U
fn solve_banded_cholesky(
    mut band: Vec<Vec<f64>>,
    rhs: Vec<f64>,
    bandwidth: usize,
) -> Result<Vec<f64>, DqdvError> {
    let n = rhs.len();
    for i in 0..n {
        let mut diag = band[i][0];
        for l in i.saturating_sub(bandwidth)..i {
            diag -= band[l][i - l] * band[l][i - l];
        }
        let scale = band[i][0].abs().max(f64::MIN_POSITIVE);
        if !(diag > 1e-13 * scale) {
            return Err(DqdvError::Singular { stage: STAGE });
        }
        let diag = diag.sqrt();
        band[i][0] = diag;
        for d in 1..=bandwidth {
            let j = i + d;
            if j >= n {
                break;
            }
            let mut value = band[i][d];
            for l in j.saturating_sub(bandwidth)..i {
                value -= band[l][i - l] * band[l][j - l];
            }
            band[i][d] = value / diag;
        }
    }

    // U^T z = b
    let mut z = vec![0.0; n];
    for i in 0..n {
        let mut value = rhs[i];
        for l in i.saturating_sub(bandwidth)..i {
            value -= band[l][i - l] * z[l];
        }
        z[i] = value / band[i][0];
    }
    // U c = z
    let mut c = vec![0.0; n];
    for i in (0..n).rev() {
        let mut value = z[i];
        for d in 1..=bandwidth {
            if i + d < n {
                value -= band[i][d] * c[i + d];
            }
        }
        c[i] = value / band[i][0];
    }
    Ok(c)
}
