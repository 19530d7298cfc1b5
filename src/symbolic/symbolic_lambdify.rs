use crate::symbolic::evaluation_error::EvaluationError;
use crate::symbolic::parse_expr::parse_expression_func;
use crate::symbolic::symbolic_engine::Expr;
use log::info;
use std::fmt;
use std::sync::Arc;

/// name of the free variable used by [`compile`]
pub const DEFAULT_VARIABLE: &str = "x";

/// Reason a compiled expression cannot be evaluated at a point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DomainFault {
    LogOfNonPositive(f64),
    DivisionByZero,
    FractionalPowerOfNegative { base: f64, exponent: f64 },
    NegativePowerOfZero(f64),
}

impl fmt::Display for DomainFault {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DomainFault::LogOfNonPositive(value) => {
                write!(f, "logarithm of non-positive value {}", value)
            }
            DomainFault::DivisionByZero => write!(f, "division by zero"),
            DomainFault::FractionalPowerOfNegative { base, exponent } => write!(
                f,
                "negative base {} raised to non-integer power {}",
                base, exponent
            ),
            DomainFault::NegativePowerOfZero(exponent) => {
                write!(f, "zero raised to negative power {}", exponent)
            }
        }
    }
}

pub type CheckedFn = Box<dyn Fn(f64) -> Result<f64, DomainFault> + Send + Sync>;

fn checked_pow(base: f64, exponent: f64) -> Result<f64, DomainFault> {
    if base < 0.0 && exponent.is_finite() && exponent.fract() != 0.0 {
        return Err(DomainFault::FractionalPowerOfNegative { base, exponent });
    }
    if base == 0.0 && exponent < 0.0 {
        return Err(DomainFault::NegativePowerOfZero(exponent));
    }
    Ok(base.powf(exponent))
}

impl Expr {
    /// LAMBDIFICATION - Converting the tree into an executable closure of one variable.
    ///
    /// The closure walks nothing at call time: every node is turned into its own small closure
    /// once, and the closures are chained the same way the nodes are. Points where the
    /// expression is mathematically undefined (logarithm of a non-positive number, division by
    /// zero, fractional power of a negative number, negative power of zero) give a
    /// [`DomainFault`]. Other non-finite values, e.g. an overflowing `exp`, are passed on as
    /// IEEE infinities.
    ///
    /// # Errors
    /// Fails if the tree contains a variable other than `var`; every such variable is named.
    ///
    /// # Examples
    /// ```rust, ignore
    /// let x = Expr::Var("x".to_string());
    /// let f = x.pow(Expr::Const(2.0)).lambdify_checked("x").unwrap();
    /// assert_eq!(f(3.0), Ok(9.0));
    /// ```
    pub fn lambdify_checked(&self, var: &str) -> Result<CheckedFn, EvaluationError> {
        let foreign: Vec<String> = self
            .all_arguments_are_variables()
            .into_iter()
            .filter(|name| name != var)
            .collect();
        if !foreign.is_empty() {
            let names = foreign.join(", ");
            return Err(EvaluationError::parse_error(
                &self.to_string(),
                0,
                &names,
                format!("unknown variable(s) {}, expected '{}'", names, var),
            ));
        }
        Ok(self.lambdify_node())
    }

    // every variable of the tree is the free one at this point
    fn lambdify_node(&self) -> CheckedFn {
        match self {
            Expr::Var(_) => Box::new(|x| Ok(x)),
            Expr::Const(val) => {
                let val = *val;
                Box::new(move |_| Ok(val))
            }
            Expr::Add(lhs, rhs) => {
                let lf = lhs.lambdify_node();
                let rf = rhs.lambdify_node();
                Box::new(move |x| Ok(lf(x)? + rf(x)?))
            }
            Expr::Sub(lhs, rhs) => {
                let lf = lhs.lambdify_node();
                let rf = rhs.lambdify_node();
                Box::new(move |x| Ok(lf(x)? - rf(x)?))
            }
            Expr::Mul(lhs, rhs) => {
                let lf = lhs.lambdify_node();
                let rf = rhs.lambdify_node();
                Box::new(move |x| Ok(lf(x)? * rf(x)?))
            }
            Expr::Div(lhs, rhs) => {
                let lf = lhs.lambdify_node();
                let rf = rhs.lambdify_node();
                Box::new(move |x| {
                    let numerator = lf(x)?;
                    let denominator = rf(x)?;
                    if denominator == 0.0 {
                        Err(DomainFault::DivisionByZero)
                    } else {
                        Ok(numerator / denominator)
                    }
                })
            }
            Expr::Pow(b, e) => {
                let bf = b.lambdify_node();
                let ef = e.lambdify_node();
                Box::new(move |x| checked_pow(bf(x)?, ef(x)?))
            }
            Expr::Exp(e) => {
                let f = e.lambdify_node();
                Box::new(move |x| Ok(f(x)?.exp()))
            }
            Expr::Ln(e) => {
                let f = e.lambdify_node();
                Box::new(move |x| {
                    let arg = f(x)?;
                    if arg <= 0.0 {
                        Err(DomainFault::LogOfNonPositive(arg))
                    } else {
                        Ok(arg.ln())
                    }
                })
            }
            Expr::sin(e) => {
                let f = e.lambdify_node();
                Box::new(move |x| Ok(f(x)?.sin()))
            }
            Expr::cos(e) => {
                let f = e.lambdify_node();
                Box::new(move |x| Ok(f(x)?.cos()))
            }
            Expr::tg(e) => {
                let f = e.lambdify_node();
                Box::new(move |x| Ok(f(x)?.tan()))
            }
        }
    }
}

/// Callable produced by [`compile`]: a pure `f64 -> f64` map over one free variable.
///
/// The handle is cheap to clone, holds no mutable state and can be shared between threads.
#[derive(Clone)]
pub struct FunctionHandle {
    source: Arc<str>,
    variable: Arc<str>,
    expression: Arc<Expr>,
    func: Arc<dyn Fn(f64) -> Result<f64, DomainFault> + Send + Sync>,
}

impl FunctionHandle {
    /// builds a handle from an already constructed tree
    pub fn from_expr(expression: Expr, variable: &str) -> Result<Self, EvaluationError> {
        let source = expression.to_string();
        Self::with_source(&source, expression, variable)
    }

    fn with_source(source: &str, expression: Expr, variable: &str) -> Result<Self, EvaluationError> {
        let func = expression.lambdify_checked(variable)?;
        Ok(FunctionHandle {
            source: Arc::from(source),
            variable: Arc::from(variable),
            expression: Arc::new(expression),
            func: Arc::from(func),
        })
    }

    /// evaluates the function, `Domain` error if it is undefined at `x`
    pub fn call(&self, x: f64) -> Result<f64, EvaluationError> {
        (self.func)(x).map_err(|fault| EvaluationError::domain_error(&self.source, x, fault.to_string()))
    }

    /// the string the handle was compiled from
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn variable(&self) -> &str {
        &self.variable
    }

    pub fn expression(&self) -> &Expr {
        &self.expression
    }
}

impl fmt::Debug for FunctionHandle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("FunctionHandle")
            .field("source", &self.source)
            .field("variable", &self.variable)
            .field("expression", &self.expression)
            .finish()
    }
}

/// Compiles a string over the free variable `x` into a [`FunctionHandle`].
///
/// # Examples
/// ```
/// use RustedRichardson::symbolic::symbolic_lambdify::compile;
/// let f = compile("np.sin(x) * x**2").unwrap();
/// assert!((f.call(1.0).unwrap() - 1.0f64.sin()).abs() < 1e-15);
/// assert!(compile("x + unknown_name").is_err());
/// ```
pub fn compile(expression: &str) -> Result<FunctionHandle, EvaluationError> {
    compile_with_variable(expression, DEFAULT_VARIABLE)
}

/// Same as [`compile`] with a caller-chosen name for the free variable.
pub fn compile_with_variable(expression: &str, variable: &str) -> Result<FunctionHandle, EvaluationError> {
    let parsed = parse_expression_func(expression, variable)?;
    let handle = FunctionHandle::with_source(expression.trim(), parsed, variable)?;
    info!("compiled '{}' as {}", handle.source(), handle.expression());
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::thread;

    #[test]
    fn test_compile_and_call() {
        let f = compile("sin(x) * cos(x) * x**2").unwrap();
        let x: f64 = 2.0;
        assert_relative_eq!(
            f.call(x).unwrap(),
            x.sin() * x.cos() * x * x,
            epsilon = 1e-14
        );
        assert_eq!(f.variable(), "x");
        assert_eq!(f.source(), "sin(x) * cos(x) * x**2");
    }

    #[test]
    fn test_all_functions_evaluate() {
        let f = compile("exp(x) + log(x) + sin(x) + cos(x) + tan(x) - x/2 + 3**x").unwrap();
        let x: f64 = 0.7;
        let expected = x.exp() + x.ln() + x.sin() + x.cos() + x.tan() - x / 2.0 + 3f64.powf(x);
        assert_relative_eq!(f.call(x).unwrap(), expected, epsilon = 1e-12);
    }

    #[test]
    fn test_custom_variable() {
        let f = compile_with_variable("t**3 - 2*t", "t").unwrap();
        assert_relative_eq!(f.call(2.0).unwrap(), 4.0, epsilon = 1e-14);
        assert!(compile_with_variable("x", "t").is_err());
    }

    #[test]
    fn test_negative_base_integer_power() {
        let f = compile("x**3").unwrap();
        assert_relative_eq!(f.call(-2.0).unwrap(), -8.0, epsilon = 1e-14);
    }

    #[test]
    fn test_domain_errors() {
        let log = compile("log(x)").unwrap();
        let err = log.call(0.0).unwrap_err();
        assert!(err.is_domain_error());
        assert!(log.call(-1.0).unwrap_err().to_string().contains("logarithm"));

        let div = compile("1/x").unwrap();
        assert_eq!(
            div.call(0.0).unwrap_err(),
            EvaluationError::domain_error("1/x", 0.0, "division by zero")
        );

        let root = compile("x**0.5").unwrap();
        assert!(root.call(-4.0).unwrap_err().is_domain_error());
        assert_relative_eq!(root.call(4.0).unwrap(), 2.0, epsilon = 1e-14);

        let inverse = compile("x**-1").unwrap();
        assert!(inverse.call(0.0).unwrap_err().is_domain_error());
    }

    #[test]
    fn test_overflow_is_not_a_domain_error() {
        let f = compile("exp(x)").unwrap();
        assert_eq!(f.call(1000.0).unwrap(), f64::INFINITY);
    }

    #[test]
    fn test_lambdify_rejects_foreign_variable() {
        let expr = Expr::Var("z".to_string()) * Expr::Var("x".to_string())
            + Expr::Var("y".to_string())
            + Expr::Var("z".to_string());
        match expr.lambdify_checked("x") {
            Err(EvaluationError::Parse { fragment, cause, .. }) => {
                assert_eq!(fragment, "y, z");
                assert_eq!(cause, "unknown variable(s) y, z, expected 'x'");
            }
            Err(other) => panic!("expected a parse error, got {:?}", other),
            Ok(_) => panic!("foreign variables were accepted"),
        }
        assert!(FunctionHandle::from_expr(expr, "x").is_err());

        let own = Expr::Var("x".to_string()) * Expr::Const(2.0);
        let f = own.lambdify_checked("x").unwrap();
        assert_eq!(f(1.5), Ok(3.0));
    }

    #[test]
    fn test_long_chains_are_rejected_before_lambdify() {
        let err = compile(&vec!["x"; 100_000].join("+")).unwrap_err();
        assert!(err.is_parse_error());
        assert!(err.to_string().contains("nodes"));

        let f = compile(&vec!["x"; 300].join(" + ")).unwrap();
        assert_relative_eq!(f.call(1.0).unwrap(), 300.0, epsilon = 1e-12);
    }

    #[test]
    fn test_handle_is_shareable_between_threads() {
        let f = compile("x**2 + 1").unwrap();
        let workers: Vec<_> = (0..4)
            .map(|i| {
                let f = f.clone();
                thread::spawn(move || f.call(i as f64).unwrap())
            })
            .collect();
        let results: Vec<f64> = workers.into_iter().map(|w| w.join().unwrap()).collect();
        assert_eq!(results, vec![1.0, 2.0, 5.0, 10.0]);
    }
}
