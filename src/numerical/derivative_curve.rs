use crate::numerical::richardson::{
    RichardsonError, UnivariateFunction, differentiate, validate_parameters,
};
use crate::symbolic::evaluation_error::EvaluationError;
use log::info;
use rayon::prelude::*;

/// the curve spans [center - CURVE_HALF_WIDTH, center + CURVE_HALF_WIDTH]
pub const CURVE_HALF_WIDTH: f64 = 2.0;
pub const DEFAULT_CURVE_POINTS: usize = 400;

/// One sample of the function and of its derivative.
#[derive(Debug, Clone, PartialEq)]
pub struct CurvePoint {
    pub x: f64,
    pub value: Result<f64, EvaluationError>,
    pub derivative: Result<f64, RichardsonError>,
}

/// `n` equally spaced values from `start` to `end`, both included
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            (0..n)
                .map(|i| if i == n - 1 { end } else { start + step * i as f64 })
                .collect()
        }
    }
}

/// Samples `f` and its extrapolated derivative on `n_points` points around `center`.
///
/// Every point is an independent extrapolation run, so the points are computed in parallel.
/// A point where `f` or its derivative fails keeps its own error and does not stop the curve;
/// only invalid parameters fail the whole call.
///
/// # Examples
/// ```
/// use RustedRichardson::numerical::derivative_curve::derivative_curve;
/// use RustedRichardson::symbolic::symbolic_lambdify::compile;
/// let f = compile("x**2").unwrap();
/// let curve = derivative_curve(&f, 0.0, 0.01, 1e-6, 20, 5).unwrap();
/// let xs: Vec<f64> = curve.iter().map(|p| p.x).collect();
/// assert_eq!(xs, vec![-2.0, -1.0, 0.0, 1.0, 2.0]);
/// assert!((curve[4].derivative.clone().unwrap() - 4.0).abs() < 1e-6);
/// ```
pub fn derivative_curve<F>(
    f: &F,
    center: f64,
    h: f64,
    tol: f64,
    max_iter: usize,
    n_points: usize,
) -> Result<Vec<CurvePoint>, RichardsonError>
where
    F: UnivariateFunction + Sync + ?Sized,
{
    validate_parameters(center, h, tol, max_iter)?;
    if n_points == 0 {
        return Err(RichardsonError::InvalidParameter {
            name: "n_points",
            reason: "the curve needs at least one point".to_string(),
        });
    }
    let xs = linspace(center - CURVE_HALF_WIDTH, center + CURVE_HALF_WIDTH, n_points);
    let curve: Vec<CurvePoint> = xs
        .par_iter()
        .map(|&x| CurvePoint {
            x,
            value: f.evaluate(x),
            derivative: differentiate(f, x, h, tol, max_iter).map(|result| result.estimate),
        })
        .collect();

    let failed = curve.iter().filter(|p| p.derivative.is_err()).count();
    info!(
        "{}: derivative curve of {} points around {}, {} failed",
        f.name(),
        n_points,
        center,
        failed
    );
    Ok(curve)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numerical::richardson::ClosureFunction;
    use crate::symbolic::symbolic_lambdify::compile;
    use approx::assert_relative_eq;

    #[test]
    fn test_linspace() {
        assert!(linspace(0.0, 1.0, 0).is_empty());
        assert_eq!(linspace(3.0, 5.0, 1), vec![3.0]);
        let xs = linspace(-2.0, 2.0, 400);
        assert_eq!(xs.len(), 400);
        assert_eq!(xs[0], -2.0);
        assert_eq!(xs[399], 2.0);
        assert!(xs.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn test_curve_matches_analytic_derivative() {
        let f = compile("sin(x)").unwrap();
        let curve = derivative_curve(&f, 1.5, 0.01, 1e-8, 20, 41).unwrap();
        assert_eq!(curve.len(), 41);
        for point in &curve {
            assert_relative_eq!(point.value.clone().unwrap(), point.x.sin(), epsilon = 1e-15);
            assert_relative_eq!(
                point.derivative.clone().unwrap(),
                point.x.cos(),
                epsilon = 1e-7
            );
        }
    }

    #[test]
    fn test_curve_is_deterministic() {
        let f = ClosureFunction::new(|x: f64| x.exp() * x.cos(), "exp*cos");
        let first = derivative_curve(&f, 0.0, 0.1, 1e-9, 20, 33).unwrap();
        let second = derivative_curve(&f, 0.0, 0.1, 1e-9, 20, 33).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_failing_points_are_kept() {
        let f = compile("log(x)").unwrap();
        let curve = derivative_curve(&f, 0.0, 0.01, 1e-6, 20, 5).unwrap();
        // x = -2, -1, 0 are outside the domain
        assert!(curve[0].value.is_err());
        assert!(curve[2].value.is_err());
        assert!(matches!(curve[2].derivative, Err(RichardsonError::Domain(_))));
        assert_relative_eq!(curve[3].derivative.clone().unwrap(), 1.0, epsilon = 1e-6);
        assert_relative_eq!(curve[4].derivative.clone().unwrap(), 0.5, epsilon = 1e-6);
    }

    #[test]
    fn test_invalid_curve_parameters() {
        let f = compile("x").unwrap();
        assert!(derivative_curve(&f, 0.0, 0.01, 1e-6, 20, 0).is_err());
        assert!(derivative_curve(&f, 0.0, -0.01, 1e-6, 20, 10).is_err());
    }
}
