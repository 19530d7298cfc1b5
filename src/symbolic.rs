#![allow(non_camel_case_types)]
#![allow(non_snake_case)]
/// Error types of the expression evaluator: a rejected string or a point outside the domain
pub mod evaluation_error;
/// a module turns a String expression into a symbolic expression
///
/// Only a small closed vocabulary is accepted: numbers, the free variable, `np.pi`, `np.e`,
/// `+ - * / **`, parentheses and the functions exp, log (ln), sin, cos, tan (tg).
///# Example
/// ```
/// use RustedRichardson::symbolic::parse_expr::parse_expression_func;
/// let parsed_expression = parse_expression_func("np.sin(x) * x**2", "x").unwrap();
/// println!(" parsed_expression {}", parsed_expression);
/// assert_eq!(parsed_expression.all_arguments_are_variables(), vec!["x".to_string()]);
/// assert!(parse_expression_func("x^2", "x").is_err());
/// assert!(parse_expression_func("__import__('os')", "x").is_err());
/// ```
/// ________________________________________________________________________________________________________________________________
pub mod parse_expr;
///____________________________________________________________________________________________________________________________
/// # Symbolic engine
/// the expression tree of one free variable
/// 1) built by the parser or by operator overloading
/// 2) printed back as a string expression for printing and control results
///# Example#
/// ```
/// use RustedRichardson::symbolic::symbolic_engine::Expr;
/// let x = Expr::Var("x".to_string());
/// let f = x.clone().pow(Expr::Const(2.0)) - Expr::Exp(x.boxed());
/// assert_eq!(f.to_string(), "((x ** 2) - exp(x))");
/// assert_eq!(f.all_arguments_are_variables(), vec!["x".to_string()]);
/// ```
pub mod symbolic_engine;
/// turns a symbolic expression into a Rust function with domain checks
///# Example
/// ```
/// use RustedRichardson::symbolic::symbolic_lambdify::compile;
/// let f = compile("log(x)").unwrap();
/// assert_eq!(f.call(1.0).unwrap(), 0.0);
/// assert!(f.call(-1.0).is_err());
/// ```
pub mod symbolic_lambdify;
