//! # Richardson extrapolation of the first derivative
//!
//! The derivative of `f` at `x` is first approximated by central differences
//! `D(s) = (f(x + s) - f(x - s)) / (2 s)` on the step sequence `s_i = h / 2^i`.
//! Since the error of `D` expands in even powers of the step, the entries
//!
//! ```text
//! R[i][0] = D(s_i)
//! R[i][k] = R[i][k-1] + (R[i][k-1] - R[i-1][k-1]) / (4^k - 1),   k = 1..=i
//! ```
//! which is `(4^k R[i][k-1] - R[i-1][k-1]) / (4^k - 1)` written so that the weight `4^k`
//! never multiplies an entry; past `k = 511` it is infinite and the correction is zero.
//! cancel one more term of the expansion with every column, `R[i][k]` being accurate to
//! `O(s_i^(2k+2))`. The refinement stops as soon as two successive diagonal entries agree to
//! within the tolerance.
//!
//! ## Main Structures and Methods
//! - [`differentiate`] - the extrapolation itself, a pure function of its arguments
//! - [`RichardsonTable`] - the lower triangular table of estimates, square `DMatrix`
//! - [`DerivativeResult`] - converged estimate with its table and the level it converged at
//! - [`RichardsonError`] - invalid parameters, domain errors, step underflow, non-convergence
//! - [`RichardsonDerivative`] - solver struct holding the parameters and the log level
//! - [`UnivariateFunction`] - anything that can be evaluated at a real point
//!
//! A non-finite value returned by `f` is not treated specially: it spreads through the table,
//! never satisfies the tolerance test, and the call ends in `NotConverged`.
use crate::Utils::logger::{init_term_logger, level_from_str};
use crate::symbolic::evaluation_error::EvaluationError;
use crate::symbolic::symbolic_lambdify::FunctionHandle;
use log::{LevelFilter, debug, info, warn};
use nalgebra::DMatrix;
use std::fmt;
use tabled::{builder::Builder, settings::Style};

pub const DEFAULT_STEP: f64 = 0.01;
pub const DEFAULT_TOLERANCE: f64 = 1e-6;
pub const DEFAULT_MAX_ITERATIONS: usize = 20;
/// upper bound for `max_iter`; the table is `max_iter x max_iter`
pub const MAX_ITERATIONS_LIMIT: usize = 1024;

//////////////////////////////////TRAITS AND IMPLEMENTATIONS/////////////////////////////////

/// Trait for a real function of one real variable
pub trait UnivariateFunction {
    /// Evaluate the function at point x
    fn evaluate(&self, x: f64) -> Result<f64, EvaluationError>;

    /// Get function name for debugging/logging
    fn name(&self) -> &str {
        "unnamed_function"
    }
}

impl UnivariateFunction for FunctionHandle {
    fn evaluate(&self, x: f64) -> Result<f64, EvaluationError> {
        self.call(x)
    }

    fn name(&self) -> &str {
        self.source()
    }
}

/// Simple function wrapper for closures
pub struct ClosureFunction<F>
where
    F: Fn(f64) -> f64,
{
    func: F,
    name: String,
}

impl<F> ClosureFunction<F>
where
    F: Fn(f64) -> f64,
{
    pub fn new(func: F, name: &str) -> Self {
        Self {
            func,
            name: name.to_string(),
        }
    }
}

impl<F> UnivariateFunction for ClosureFunction<F>
where
    F: Fn(f64) -> f64,
{
    fn evaluate(&self, x: f64) -> Result<f64, EvaluationError> {
        Ok((self.func)(x))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Lower triangular table of derivative estimates.
///
/// Row `i` holds the estimates obtained with the step `h / 2^i`, column `k` the extrapolation
/// order. Only entries with `k <= i` are estimates; the upper triangle is zero and is never
/// returned by the accessors.
#[derive(Debug, Clone, PartialEq)]
pub struct RichardsonTable {
    values: DMatrix<f64>,
    initial_step: f64,
}

impl RichardsonTable {
    fn new(values: DMatrix<f64>, levels: usize, initial_step: f64) -> Self {
        // keep only the populated square
        let values = values.resize(levels, levels, 0.0);
        RichardsonTable {
            values,
            initial_step,
        }
    }

    /// number of populated rows
    pub fn levels(&self) -> usize {
        self.values.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.levels() == 0
    }

    /// entry (i, k), `None` outside the populated lower triangle
    pub fn get(&self, i: usize, k: usize) -> Option<f64> {
        if i < self.levels() && k <= i {
            Some(self.values[(i, k)])
        } else {
            None
        }
    }

    /// the `i + 1` estimates of row `i`
    pub fn row(&self, i: usize) -> Option<Vec<f64>> {
        if i >= self.levels() {
            return None;
        }
        Some((0..=i).map(|k| self.values[(i, k)]).collect())
    }

    pub fn rows(&self) -> Vec<Vec<f64>> {
        (0..self.levels()).filter_map(|i| self.row(i)).collect()
    }

    /// best estimate of every level, R[i][i]
    pub fn diagonal(&self) -> Vec<f64> {
        (0..self.levels()).map(|i| self.values[(i, i)]).collect()
    }

    /// step size used on every level
    pub fn steps(&self) -> Vec<f64> {
        (0..self.levels())
            .map(|i| self.initial_step / 2f64.powi(i as i32))
            .collect()
    }

    pub fn initial_step(&self) -> f64 {
        self.initial_step
    }

    /// the square matrix, zeros above the diagonal
    pub fn as_matrix(&self) -> &DMatrix<f64> {
        &self.values
    }

    /// pretty table, one row per step size
    pub fn to_table_string(&self) -> String {
        let levels = self.levels();
        let mut builder = Builder::default();
        let mut header = vec!["step".to_string()];
        header.extend((0..levels).map(|k| format!("order {}", 2 * k + 2)));
        builder.push_record(header);
        for (i, step) in self.steps().into_iter().enumerate() {
            let mut record = vec![format!("{:e}", step)];
            record.extend((0..levels).map(|k| match self.get(i, k) {
                Some(value) => format!("{:.12}", value),
                None => String::new(),
            }));
            builder.push_record(record);
        }
        let mut table = builder.build();
        table.with(Style::modern_rounded());
        table.to_string()
    }
}

impl fmt::Display for RichardsonTable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_table_string())
    }
}

/// Converged derivative.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivativeResult {
    pub estimate: f64,
    pub table: RichardsonTable,
    /// level `i` at which |R[i][i] - R[i-1][i-1]| < tol held
    pub iterations: usize,
}

/// Error types for the extrapolation
#[derive(Debug, Clone, PartialEq)]
pub enum RichardsonError {
    InvalidParameter { name: &'static str, reason: String },
    /// the function is undefined at one of the points x ± step
    Domain(EvaluationError),
    /// the halved step is no longer distinguishable from zero at x
    StepUnderflow { step: f64, level: usize },
    /// the tolerance was never met, carries the last diagonal estimate and the full table;
    /// `iterations` is the last level, as in [`DerivativeResult`]
    NotConverged {
        estimate: f64,
        table: RichardsonTable,
        iterations: usize,
    },
}

impl RichardsonError {
    /// the unconverged estimate and its table, for callers that accept a degraded result
    pub fn best_effort(&self) -> Option<(f64, &RichardsonTable)> {
        match self {
            RichardsonError::NotConverged { estimate, table, .. } => Some((*estimate, table)),
            _ => None,
        }
    }
}

impl fmt::Display for RichardsonError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RichardsonError::InvalidParameter { name, reason } => {
                write!(f, "Invalid parameter '{}': {}", name, reason)
            }
            RichardsonError::Domain(err) => write!(f, "{}", err),
            RichardsonError::StepUnderflow { step, .. } => write!(
                f,
                "Step size became indistinguishable from zero ({:e}) before the tolerance was met; increase 'h' or 'tol'",
                step
            ),
            RichardsonError::NotConverged {
                estimate,
                iterations,
                ..
            } => write!(
                f,
                "Desired accuracy not achieved after {} levels (last estimate {}); increase 'tol' or 'max_iter'",
                iterations + 1,
                estimate
            ),
        }
    }
}

impl std::error::Error for RichardsonError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RichardsonError::Domain(err) => Some(err),
            _ => None,
        }
    }
}

impl From<EvaluationError> for RichardsonError {
    fn from(err: EvaluationError) -> Self {
        RichardsonError::Domain(err)
    }
}

fn invalid(name: &'static str, reason: impl Into<String>) -> RichardsonError {
    RichardsonError::InvalidParameter {
        name,
        reason: reason.into(),
    }
}

/// checks the parameters shared by every extrapolation call
pub fn validate_parameters(x: f64, h: f64, tol: f64, max_iter: usize) -> Result<(), RichardsonError> {
    if !x.is_finite() {
        return Err(invalid("x", format!("must be a finite number, got {}", x)));
    }
    if !(h.is_finite() && h > 0.0) {
        return Err(invalid("h", format!("must be a positive finite number, got {}", h)));
    }
    if !(tol.is_finite() && tol > 0.0) {
        return Err(invalid("tol", format!("must be a positive finite number, got {}", tol)));
    }
    if max_iter == 0 || max_iter > MAX_ITERATIONS_LIMIT {
        return Err(invalid(
            "max_iter",
            format!("must be between 1 and {}, got {}", MAX_ITERATIONS_LIMIT, max_iter),
        ));
    }
    Ok(())
}

/// Estimates f'(x) by Richardson extrapolation of central differences.
///
/// # Arguments
/// * `f` - function to differentiate
/// * `x` - evaluation point
/// * `h` - initial (largest) step, `h > 0`
/// * `tol` - tolerance on two successive diagonal entries, `tol > 0`
/// * `max_iter` - number of refinement levels, at most [`MAX_ITERATIONS_LIMIT`]
///
/// # Errors
/// `InvalidParameter`, `Domain` if `f` fails at some `x ± step`, `StepUnderflow` if
/// `x + step` or `x - step` rounds to `x`, and `NotConverged` with the full table if the tolerance is not met
/// within `max_iter` levels.
///
/// # Examples
/// ```
/// use RustedRichardson::numerical::richardson::{differentiate, ClosureFunction};
/// let f = ClosureFunction::new(|x: f64| x.sin(), "sin");
/// let result = differentiate(&f, 0.0, 0.1, 1e-10, 20).unwrap();
/// assert!((result.estimate - 1.0).abs() < 1e-10);
/// assert_eq!(result.table.levels(), result.iterations + 1);
/// ```
pub fn differentiate<F>(
    f: &F,
    x: f64,
    h: f64,
    tol: f64,
    max_iter: usize,
) -> Result<DerivativeResult, RichardsonError>
where
    F: UnivariateFunction + ?Sized,
{
    validate_parameters(x, h, tol, max_iter)?;
    let mut r = DMatrix::<f64>::zeros(max_iter, max_iter);

    for i in 0..max_iter {
        let step = h / 2f64.powi(i as i32);
        if step == 0.0 || x + step == x || x - step == x {
            warn!(
                "{}: step {:e} vanished at x = {} on level {}",
                f.name(),
                step,
                x,
                i
            );
            return Err(RichardsonError::StepUnderflow { step, level: i });
        }

        let forward = f.evaluate(x + step)?;
        let backward = f.evaluate(x - step)?;
        r[(i, 0)] = (forward - backward) / (2.0 * step);

        for k in 1..=i {
            let correction = (r[(i, k - 1)] - r[(i - 1, k - 1)]) / (4f64.powi(k as i32) - 1.0);
            r[(i, k)] = r[(i, k - 1)] + correction;
        }
        debug!("level {}, step {:e}, R[i][i] = {}", i, step, r[(i, i)]);

        if i > 0 {
            let change = (r[(i, i)] - r[(i - 1, i - 1)]).abs();
            if change < tol {
                info!(
                    "{}: derivative at x = {} converged on level {} to {} (change {:e})",
                    f.name(),
                    x,
                    i,
                    r[(i, i)],
                    change
                );
                return Ok(DerivativeResult {
                    estimate: r[(i, i)],
                    table: RichardsonTable::new(r, i + 1, h),
                    iterations: i,
                });
            }
        }
    }

    let estimate = r[(max_iter - 1, max_iter - 1)];
    warn!(
        "{}: desired accuracy {:e} not achieved at x = {} after {} levels, last estimate {}",
        f.name(),
        tol,
        x,
        max_iter,
        estimate
    );
    Err(RichardsonError::NotConverged {
        estimate,
        table: RichardsonTable::new(r, max_iter, h),
        iterations: max_iter - 1,
    })
}

/// Solver struct keeping the extrapolation parameters between calls.
///
/// # Examples
/// ```
/// use RustedRichardson::numerical::richardson::RichardsonDerivative;
/// use RustedRichardson::symbolic::symbolic_lambdify::compile;
/// let f = compile("x**3").unwrap();
/// let mut solver = RichardsonDerivative::new();
/// solver.set_problem(0.1, 1e-8, 20);
/// solver.set_loglevel(Some("off".to_string()));
/// let result = solver.solve(&f, 2.0).unwrap();
/// assert!((result.estimate - 12.0).abs() < 1e-8);
/// ```
#[derive(Debug, Clone)]
pub struct RichardsonDerivative {
    pub h: f64,
    pub tolerance: f64,
    pub max_iterations: usize,
    /// "debug", "info", "warn", "error", or "off"/"none"; `None` means "info"
    pub loglevel: Option<String>,
    result: Option<Result<DerivativeResult, RichardsonError>>,
}

impl Default for RichardsonDerivative {
    fn default() -> Self {
        Self::new()
    }
}

impl RichardsonDerivative {
    pub fn new() -> Self {
        RichardsonDerivative {
            h: DEFAULT_STEP,
            tolerance: DEFAULT_TOLERANCE,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            loglevel: None,
            result: None,
        }
    }

    pub fn set_problem(&mut self, h: f64, tolerance: f64, max_iterations: usize) {
        self.h = h;
        self.tolerance = tolerance;
        self.max_iterations = max_iterations;
    }

    pub fn set_loglevel(&mut self, loglevel: Option<String>) {
        self.loglevel = loglevel;
    }

    // wrapper around differentiate to implement logging
    pub fn solve<F>(&mut self, f: &F, x: f64) -> Result<DerivativeResult, RichardsonError>
    where
        F: UnivariateFunction + ?Sized,
    {
        let level = match self.loglevel.as_deref() {
            Some(level) => level_from_str(level).map_err(|reason| invalid("loglevel", reason))?,
            None => LevelFilter::Info,
        };
        if level != LevelFilter::Off {
            // a logger installed earlier stays in place
            init_term_logger(level);
        }
        let result = differentiate(f, x, self.h, self.tolerance, self.max_iterations);
        self.result = Some(result.clone());
        result
    }

    pub fn get_result(&self) -> Option<&Result<DerivativeResult, RichardsonError>> {
        self.result.as_ref()
    }
}
