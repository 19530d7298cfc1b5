//! Constrained parser turning a user-entered string into an `Expr`.
//!
//! Grammar (from the lowest to the highest precedence):
//! ```text
//!  expression := term (('+' | '-') term)*
//!  term       := unary (('*' | '/') unary)*
//!  unary      := ('-' | '+') unary | power
//!  power      := atom ('**' unary)?
//!  atom       := number | name | name '(' expression ')' | '(' expression ')'
//!  name       := [namespace '.'] identifier
//! ```
//! Only the free variable and the functions of [`ElementaryFunction`] are accepted as bare
//! names. Namespace qualifiers `np.`, `numpy.` and `math.` are stripped from function names,
//! and give access to the constants `pi` and `e` (`np.pi`, `math.e`); any other qualifier is
//! rejected. A whole expression may hold at most [`MAX_EXPRESSION_NODES`] nodes.
use crate::symbolic::evaluation_error::EvaluationError;
use crate::symbolic::symbolic_engine::Expr;
use log::debug;
use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::tag,
    character::complete::{alpha1, alphanumeric1, char, digit0, digit1, multispace0, one_of},
    combinator::{cut, not, opt, recognize},
    error::{ErrorKind, ParseError},
    multi::{many0, separated_list1},
    sequence::{delimited, pair, preceded, terminated},
};
use std::cell::Cell;
use std::str::FromStr;
use strum_macros::{Display, EnumIter, EnumString};

/// namespaces whose prefix is dropped before a name is looked up
pub const ALLOWED_NAMESPACES: [&str; 3] = ["np", "numpy", "math"];
/// nesting limit for brackets and chained unary signs
pub const MAX_NESTING_DEPTH: usize = 128;
/// size limit of the parsed tree; the tree depth never exceeds its node count
pub const MAX_EXPRESSION_NODES: usize = 1024;

/// The allow-listed unary functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display, EnumIter)]
pub enum ElementaryFunction {
    #[strum(serialize = "exp")]
    Exp,
    #[strum(to_string = "log", serialize = "ln")]
    Log,
    #[strum(serialize = "sin")]
    Sin,
    #[strum(serialize = "cos")]
    Cos,
    #[strum(to_string = "tan", serialize = "tg")]
    Tan,
}

impl ElementaryFunction {
    pub fn apply(self, argument: Expr) -> Expr {
        let argument = Box::new(argument);
        match self {
            ElementaryFunction::Exp => Expr::Exp(argument),
            ElementaryFunction::Log => Expr::Ln(argument),
            ElementaryFunction::Sin => Expr::sin(argument),
            ElementaryFunction::Cos => Expr::cos(argument),
            ElementaryFunction::Tan => Expr::tg(argument),
        }
    }
}

fn named_constant(name: &str) -> Option<f64> {
    match name {
        "pi" => Some(std::f64::consts::PI),
        "e" => Some(std::f64::consts::E),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq)]
enum SyntaxErrorKind {
    Nom(ErrorKind),
    ExpectedOperand,
    ExpectedClosingBracket,
    InvalidNumber(String),
    UnknownIdentifier(String),
    UnknownNamespace(String),
    UnknownFunction(String),
    MissingArgument(String),
    TooDeep,
    TooLarge,
}

#[derive(Debug, Clone, PartialEq)]
struct SyntaxError<'a> {
    input: &'a str,
    kind: SyntaxErrorKind,
}

impl<'a> SyntaxError<'a> {
    fn new(input: &'a str, kind: SyntaxErrorKind) -> Self {
        SyntaxError { input, kind }
    }

    fn cause(&self) -> String {
        match &self.kind {
            SyntaxErrorKind::Nom(kind) => format!("malformed expression ({:?})", kind),
            SyntaxErrorKind::ExpectedOperand => "expected a number, variable, function call or '('".to_string(),
            SyntaxErrorKind::ExpectedClosingBracket => "missing closing bracket ')'".to_string(),
            SyntaxErrorKind::InvalidNumber(text) => format!("invalid number '{}'", text),
            SyntaxErrorKind::UnknownIdentifier(name) => format!("unknown identifier '{}'", name),
            SyntaxErrorKind::UnknownNamespace(name) => format!("namespace '{}' is not allowed", name),
            SyntaxErrorKind::UnknownFunction(name) => format!("'{}' is not an allowed function", name),
            SyntaxErrorKind::MissingArgument(name) => {
                format!("function '{}' must be called with an argument", name)
            }
            SyntaxErrorKind::TooDeep => {
                format!("expression is nested deeper than {} levels", MAX_NESTING_DEPTH)
            }
            SyntaxErrorKind::TooLarge => {
                format!("expression has more than {} nodes", MAX_EXPRESSION_NODES)
            }
        }
    }

    /// the name the error is about, otherwise the first word of the remaining input
    fn fragment(&self) -> String {
        match &self.kind {
            SyntaxErrorKind::UnknownIdentifier(name)
            | SyntaxErrorKind::UnknownNamespace(name)
            | SyntaxErrorKind::UnknownFunction(name)
            | SyntaxErrorKind::MissingArgument(name)
            | SyntaxErrorKind::InvalidNumber(name) => name.clone(),
            _ => self
                .input
                .trim_start()
                .split_whitespace()
                .next()
                .unwrap_or("")
                .chars()
                .take(24)
                .collect(),
        }
    }
}

impl<'a> ParseError<&'a str> for SyntaxError<'a> {
    fn from_error_kind(input: &'a str, kind: ErrorKind) -> Self {
        SyntaxError::new(input, SyntaxErrorKind::Nom(kind))
    }

    fn append(_input: &'a str, _kind: ErrorKind, other: Self) -> Self {
        other
    }
}

type PResult<'a, O> = IResult<&'a str, O, SyntaxError<'a>>;

fn failure<'a, O>(input: &'a str, kind: SyntaxErrorKind) -> PResult<'a, O> {
    Err(nom::Err::Failure(SyntaxError::new(input, kind)))
}

fn ws<'a, O, F>(inner: F) -> impl Parser<&'a str, Output = O, Error = SyntaxError<'a>>
where
    F: Parser<&'a str, Output = O, Error = SyntaxError<'a>>,
{
    delimited(multispace0, inner, multispace0)
}

/// decimal literal with optional fraction and exponent, no sign
fn number(input: &str) -> PResult<'_, f64> {
    let recognized: PResult<'_, &str> = recognize((
        alt((
            recognize((digit1, opt((char('.'), digit0)))),
            recognize((char('.'), digit1)),
        )),
        opt((one_of("eE"), opt(one_of("+-")), digit1)),
    ))
    .parse(input);
    let (rest, text) = recognized?;
    match text.parse::<f64>() {
        Ok(value) => Ok((rest, value)),
        Err(_) => failure(input, SyntaxErrorKind::InvalidNumber(text.to_string())),
    }
}

fn identifier(input: &str) -> PResult<'_, &str> {
    recognize(pair(
        alt((alpha1, tag("_"))),
        many0(alt((alphanumeric1, tag("_")))),
    ))
    .parse(input)
}

/// -c is folded into a constant, anything else becomes (-1)*e
fn negate(expr: Expr) -> Expr {
    match expr {
        Expr::Const(value) => Expr::Const(-value),
        other => -other,
    }
}

struct ExpressionParser<'v> {
    variable: &'v str,
    depth: Cell<usize>,
    nodes: Cell<usize>,
}

impl<'v> ExpressionParser<'v> {
    fn new(variable: &'v str) -> Self {
        ExpressionParser {
            variable,
            depth: Cell::new(0),
            nodes: Cell::new(0),
        }
    }

    /// books `added` new nodes against MAX_EXPRESSION_NODES
    fn add_nodes<'a>(&self, input: &'a str, added: usize) -> Result<(), nom::Err<SyntaxError<'a>>> {
        let total = self.nodes.get() + added;
        if total > MAX_EXPRESSION_NODES {
            return Err(nom::Err::Failure(SyntaxError::new(input, SyntaxErrorKind::TooLarge)));
        }
        self.nodes.set(total);
        Ok(())
    }

    fn expression<'a>(&self, input: &'a str) -> PResult<'a, Expr> {
        let start = input;
        let (input, first) = self.term(input)?;
        let (input, rest) = many0(pair(ws(one_of("+-")), cut(|i: &'a str| self.term(i)))).parse(input)?;
        self.add_nodes(start, rest.len())?;
        let expr = rest.into_iter().fold(first, |acc, (op, rhs)| match op {
            '+' => acc + rhs,
            _ => acc - rhs,
        });
        Ok((input, expr))
    }

    fn term<'a>(&self, input: &'a str) -> PResult<'a, Expr> {
        let start = input;
        let (input, first) = self.unary(input)?;
        let operator = alt((terminated(char('*'), not(char('*'))), char('/')));
        let (input, rest) = many0(pair(ws(operator), cut(|i: &'a str| self.unary(i)))).parse(input)?;
        self.add_nodes(start, rest.len())?;
        let expr = rest.into_iter().fold(first, |acc, (op, rhs)| match op {
            '*' => acc * rhs,
            _ => acc / rhs,
        });
        Ok((input, expr))
    }

    fn unary<'a>(&self, input: &'a str) -> PResult<'a, Expr> {
        let level = self.depth.get();
        if level >= MAX_NESTING_DEPTH {
            return failure(input, SyntaxErrorKind::TooDeep);
        }
        self.depth.set(level + 1);
        let result = self.unary_inner(input);
        self.depth.set(level);
        result
    }

    fn unary_inner<'a>(&self, input: &'a str) -> PResult<'a, Expr> {
        let (input, _) = multispace0::<&'a str, SyntaxError<'a>>(input)?;
        if let Ok((rest, sign)) = one_of::<_, _, SyntaxError<'a>>("+-").parse(input) {
            let (rest, operand) = cut(|i: &'a str| self.unary(i)).parse(rest)?;
            self.add_nodes(input, 1)?;
            let expr = if sign == '-' { negate(operand) } else { operand };
            return Ok((rest, expr));
        }
        self.power(input)
    }

    // right associative: the exponent goes back through unary, so 2**-x and 2**3**2 work
    fn power<'a>(&self, input: &'a str) -> PResult<'a, Expr> {
        let start = input;
        let (input, base) = self.atom(input)?;
        let (input, exponent) =
            opt(preceded(ws(tag("**")), cut(|i: &'a str| self.unary(i)))).parse(input)?;
        match exponent {
            Some(exponent) => {
                self.add_nodes(start, 1)?;
                Ok((input, base.pow(exponent)))
            }
            None => Ok((input, base)),
        }
    }

    fn atom<'a>(&self, input: &'a str) -> PResult<'a, Expr> {
        let bracketed = preceded(
            char('('),
            cut(terminated(|i: &'a str| self.expression(i), |i: &'a str| self.closing_bracket(i))),
        );
        let parsed = ws(alt((
            |i: &'a str| number(i).map(|(rest, value)| (rest, Expr::Const(value))),
            |i: &'a str| self.name(i),
            bracketed,
        )))
        .parse(input);
        match parsed {
            Err(nom::Err::Error(_)) => Err(nom::Err::Error(SyntaxError::new(
                input,
                SyntaxErrorKind::ExpectedOperand,
            ))),
            Ok(parsed) => {
                self.add_nodes(input, 1)?;
                Ok(parsed)
            }
            other => other,
        }
    }

    fn closing_bracket<'a>(&self, input: &'a str) -> PResult<'a, char> {
        match ws(char(')')).parse(input) {
            Err(nom::Err::Error(_)) => failure(input, SyntaxErrorKind::ExpectedClosingBracket),
            other => other,
        }
    }

    /// strips allowed namespace qualifiers, np.sin -> (sin, true)
    fn strip_namespace<'a>(
        &self,
        start: &'a str,
        path: &[&'a str],
    ) -> Result<(&'a str, bool), nom::Err<SyntaxError<'a>>> {
        let (name, qualifiers) = match path.split_last() {
            Some(split) => split,
            None => return Err(nom::Err::Error(SyntaxError::new(start, SyntaxErrorKind::ExpectedOperand))),
        };
        if let Some(unknown) = qualifiers
            .iter()
            .find(|q| !ALLOWED_NAMESPACES.iter().any(|ns| ns == *q))
        {
            return Err(nom::Err::Failure(SyntaxError::new(
                start,
                SyntaxErrorKind::UnknownNamespace(unknown.to_string()),
            )));
        }
        Ok((*name, !qualifiers.is_empty()))
    }

    fn name<'a>(&self, input: &'a str) -> PResult<'a, Expr> {
        let (rest, path) = separated_list1(char('.'), identifier).parse(input)?;
        let (name, qualified) = self.strip_namespace(input, &path)?;
        let function = ElementaryFunction::from_str(name).ok();
        let opening: PResult<'a, char> = ws(char('(')).parse(rest);

        match (function, opening) {
            (Some(function), Ok((after, _))) => {
                let (after, argument) =
                    cut(terminated(|i: &'a str| self.expression(i), |i: &'a str| self.closing_bracket(i)))
                        .parse(after)?;
                Ok((after, function.apply(argument)))
            }
            (Some(_), Err(_)) => failure(input, SyntaxErrorKind::MissingArgument(name.to_string())),
            (None, Ok(_)) => failure(input, SyntaxErrorKind::UnknownFunction(name.to_string())),
            (None, Err(_)) if !qualified && name == self.variable => {
                Ok((rest, Expr::Var(name.to_string())))
            }
            (None, Err(_)) => match named_constant(name) {
                Some(value) if qualified => Ok((rest, Expr::Const(value))),
                _ => failure(input, SyntaxErrorKind::UnknownIdentifier(name.to_string())),
            },
        }
    }
}

/// Parses `input` into an expression over the single free variable `variable`.
///
/// # Examples
/// ```rust, ignore
/// let expr = parse_expression_func("np.sin(x) * x**2", "x").unwrap();
/// println!("{}", expr); // (sin(x) * (x ** 2))
/// ```
pub fn parse_expression_func(input: &str, variable: &str) -> Result<Expr, EvaluationError> {
    if input.trim().is_empty() {
        return Err(EvaluationError::parse_error(input, 0, "", "empty expression"));
    }
    if identifier(variable).map(|(rest, _)| !rest.is_empty()).unwrap_or(true)
        || ElementaryFunction::from_str(variable).is_ok()
        || named_constant(variable).is_some()
    {
        return Err(EvaluationError::parse_error(
            input,
            0,
            variable,
            format!("'{}' cannot be used as the variable name", variable),
        ));
    }

    let parser = ExpressionParser::new(variable);
    match parser.expression(input) {
        Ok((rest, expr)) if rest.trim().is_empty() => {
            debug!(
                "parsed '{}' into {} ({} nodes, depth {})",
                input,
                expr,
                expr.node_count(),
                expr.depth()
            );
            Ok(expr)
        }
        Ok((rest, _)) => {
            let position = input.len() - rest.len();
            let error = SyntaxError::new(rest, SyntaxErrorKind::Nom(ErrorKind::Eof));
            Err(EvaluationError::parse_error(
                input,
                position,
                &error.fragment(),
                "unexpected input",
            ))
        }
        Err(nom::Err::Error(error)) | Err(nom::Err::Failure(error)) => {
            let position = input.len() - error.input.len();
            Err(EvaluationError::parse_error(
                input,
                position,
                &error.fragment(),
                error.cause(),
            ))
        }
        Err(nom::Err::Incomplete(_)) => Err(EvaluationError::parse_error(
            input,
            input.len(),
            "",
            "unexpected end of input",
        )),
    }
}
