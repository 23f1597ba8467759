//! Piecewise-linear one-dimensional lookup tables.

use crate::error::SimError;

/// A piecewise-linear lookup table over strictly increasing breakpoints.
///
/// Lookups inside `[x[0], x[n-1]]` interpolate linearly between the
/// bracketing points; lookups outside that domain fail.
///
/// # Examples
///
/// ```
/// use solar_savings::sim::table::Table1D;
///
/// let table = Table1D::new(vec![0.0, 1.0], vec![0.5, 1.0]).unwrap();
/// assert_eq!(table.lookup(0.5).unwrap(), 0.75);
/// assert!(table.lookup(1.5).is_err());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Table1D {
    x: Vec<f64>,
    y: Vec<f64>,
}

impl Table1D {
    /// Builds a table from breakpoints `x` and values `y`.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidTable`] if the sequences are empty, differ
    /// in length, contain non-finite values, or `x` is not strictly increasing.
    pub fn new(x: Vec<f64>, y: Vec<f64>) -> Result<Self, SimError> {
        if x.is_empty() {
            return Err(SimError::InvalidTable("table has no points".into()));
        }
        if x.len() != y.len() {
            return Err(SimError::InvalidTable(format!(
                "x has {} points but y has {}",
                x.len(),
                y.len()
            )));
        }
        if x.iter().chain(&y).any(|v| !v.is_finite()) {
            return Err(SimError::InvalidTable("non-finite point".into()));
        }
        if x.windows(2).any(|w| w[1] <= w[0]) {
            return Err(SimError::InvalidTable(
                "x must be strictly increasing".into(),
            ));
        }
        Ok(Self { x, y })
    }

    /// Lower bound of the table domain.
    pub fn x_min(&self) -> f64 {
        self.x[0]
    }

    /// Upper bound of the table domain.
    pub fn x_max(&self) -> f64 {
        self.x[self.x.len() - 1]
    }

    pub fn x(&self) -> &[f64] {
        &self.x
    }

    pub fn y(&self) -> &[f64] {
        &self.y
    }

    /// Returns `true` if `y` never decreases as `x` increases.
    pub fn is_non_decreasing(&self) -> bool {
        self.y.windows(2).all(|w| w[1] >= w[0])
    }

    /// Interpolates the table at `x_val`.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::OutOfRange`] if `x_val` lies outside the domain
    /// (NaN is always out of range).
    pub fn lookup(&self, x_val: f64) -> Result<f64, SimError> {
        let (min, max) = (self.x_min(), self.x_max());
        if !(min..=max).contains(&x_val) {
            return Err(SimError::OutOfRange {
                value: x_val,
                min,
                max,
            });
        }

        // index of the first breakpoint strictly above x_val
        let upper = self.x.partition_point(|&x| x <= x_val);
        if upper == self.x.len() {
            return Ok(self.y[upper - 1]);
        }
        let lower = upper - 1;
        let (x0, x1) = (self.x[lower], self.x[upper]);
        let (y0, y1) = (self.y[lower], self.y[upper]);
        Ok(y0 + (y1 - y0) * (x_val - x0) / (x1 - x0))
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    fn derating() -> Table1D {
        Table1D::new(vec![0.0, 0.1, 0.2, 1.0], vec![0.25, 0.5, 1.0, 1.0]).unwrap()
    }

    #[test]
    fn test_exact_breakpoints() {
        let t = derating();
        assert_eq!(t.lookup(0.0).unwrap(), 0.25);
        assert_eq!(t.lookup(0.1).unwrap(), 0.5);
        assert_eq!(t.lookup(0.2).unwrap(), 1.0);
        assert_eq!(t.lookup(1.0).unwrap(), 1.0);
    }

    #[test]
    fn test_interpolates_between_points() {
        let t = derating();
        assert_abs_diff_eq!(t.lookup(0.05).unwrap(), 0.375, epsilon = 1e-12);
        assert_abs_diff_eq!(t.lookup(0.15).unwrap(), 0.75, epsilon = 1e-12);
        assert_abs_diff_eq!(t.lookup(0.6).unwrap(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_out_of_range_fails() {
        let t = derating();
        assert!(matches!(
            t.lookup(-0.01),
            Err(SimError::OutOfRange { min, max, .. }) if min == 0.0 && max == 1.0
        ));
        assert!(t.lookup(1.01).is_err());
        assert!(t.lookup(f64::NAN).is_err());
    }

    #[test]
    fn test_continuous_at_breakpoints() {
        let t = derating();
        for &bp in &[0.1, 0.2] {
            let below = t.lookup(bp - 1e-9).unwrap();
            let at = t.lookup(bp).unwrap();
            let above = t.lookup(bp + 1e-9).unwrap();
            assert_abs_diff_eq!(below, at, epsilon = 1e-6);
            assert_abs_diff_eq!(above, at, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_monotonic_over_soc_range() {
        let t = derating();
        assert!(t.is_non_decreasing());
        let mut prev = t.lookup(0.0).unwrap();
        for i in 1..=1000 {
            let v = t.lookup(f64::from(i) / 1000.0).unwrap();
            assert!(v >= prev, "lookup decreased at soc={}", f64::from(i) / 1000.0);
            prev = v;
        }
    }

    #[test]
    fn test_single_point_table() {
        let t = Table1D::new(vec![0.5], vec![2.0]).unwrap();
        assert_eq!(t.lookup(0.5).unwrap(), 2.0);
        assert!(t.lookup(0.4).is_err());
    }

    #[test]
    fn test_invalid_tables_rejected() {
        assert!(Table1D::new(vec![], vec![]).is_err());
        assert!(Table1D::new(vec![0.0, 1.0], vec![1.0]).is_err());
        assert!(Table1D::new(vec![0.0, 0.0], vec![1.0, 1.0]).is_err());
        assert!(Table1D::new(vec![1.0, 0.0], vec![1.0, 1.0]).is_err());
        assert!(Table1D::new(vec![0.0, f64::INFINITY], vec![1.0, 1.0]).is_err());
    }
}
