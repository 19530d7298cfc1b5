//! parse a task document with structure like
//! ```text
//! # comment
//! derivative
//! function: sin(x) * x**2
//! x: 1.5
//! h: 0.01
//! tol: 1e-6
//! max_iter: 20
//! ```
//! into a [`DerivativeTask`]. Every key is optional, missing keys keep their defaults.
//! The optional title line names the task.
use crate::Utils::logger::level_from_str;
use crate::numerical::derivative_curve::DEFAULT_CURVE_POINTS;
use crate::numerical::richardson::{DEFAULT_MAX_ITERATIONS, DEFAULT_STEP, DEFAULT_TOLERANCE};
use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::tag,
    character::complete::{alpha1, alphanumeric1, space0},
    combinator::{all_consuming, map, recognize, rest},
    multi::many0,
    sequence::{delimited, pair, preceded, separated_pair},
};
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::str::FromStr;
use strum_macros::{Display, EnumIter, EnumString};

/// One line of a task document
#[derive(Debug, Clone, PartialEq)]
pub enum Line<'a> {
    Blank,
    Comment(&'a str),
    Title(&'a str),
    Entry(&'a str, &'a str),
}

/// Parses a key (word characters without spaces)
pub fn parse_key(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        alt((alpha1, tag("_"))),
        many0(alt((alphanumeric1, tag("_")))),
    ))
    .parse(input)
}

/// Parses `key: value`, the value is the trimmed rest of the line
pub fn parse_entry(input: &str) -> IResult<&str, (&str, &str)> {
    let colon_separator = delimited(space0, tag(":"), space0);
    let mut parser = separated_pair(parse_key, colon_separator, rest);
    let (input, (key, value)) = parser.parse(input)?;
    Ok((input, (key, value.trim())))
}

/// comment lines start with //, #, % or ;
pub fn parse_comment(input: &str) -> IResult<&str, &str> {
    preceded(alt((tag("//"), tag("#"), tag("%"), tag(";"))), rest).parse(input)
}

pub fn parse_line(input: &str) -> IResult<&str, Line<'_>> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(("", Line::Blank));
    }
    alt((
        map(parse_comment, Line::Comment),
        map(all_consuming(parse_entry), |(key, value)| {
            Line::Entry(key, value)
        }),
        map(all_consuming(parse_key), Line::Title),
    ))
    .parse(trimmed)
}

/// Error types for reading a task document
#[derive(Debug, Clone, PartialEq)]
pub enum TaskError {
    /// line `line` (1-based) is neither a comment, a title nor a `key: value` pair
    Syntax { line: usize, content: String },
    UnknownKey { line: usize, key: String },
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
    DuplicateKey { line: usize, key: String },
    Io { path: String, reason: String },
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TaskError::Syntax { line, content } => {
                write!(f, "Syntax error on line {}: '{}'", line, content)
            }
            TaskError::UnknownKey { line, key } => {
                write!(f, "Unknown key '{}' on line {}", key, line)
            }
            TaskError::InvalidValue { key, value, reason } => {
                write!(f, "Invalid value '{}' for key '{}': {}", value, key, reason)
            }
            TaskError::DuplicateKey { line, key } => {
                write!(f, "Key '{}' repeated on line {}", key, line)
            }
            TaskError::Io { path, reason } => write!(f, "Cannot read task file '{}': {}", path, reason),
        }
    }
}

impl std::error::Error for TaskError {}

/// Keys of a task document; each accepts its `to_string` spelling and its aliases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display, EnumIter)]
pub enum TaskKey {
    #[strum(to_string = "function", serialize = "f")]
    Function,
    #[strum(to_string = "x", serialize = "point")]
    X,
    #[strum(to_string = "h", serialize = "step")]
    Step,
    #[strum(to_string = "tol", serialize = "tolerance")]
    Tolerance,
    #[strum(to_string = "max_iter", serialize = "max_iterations")]
    MaxIterations,
    #[strum(to_string = "loglevel", serialize = "log_level")]
    LogLevel,
    #[strum(to_string = "curve_points", serialize = "points")]
    CurvePoints,
    #[strum(serialize = "curve_output")]
    CurveOutput,
    #[strum(serialize = "table_output")]
    TableOutput,
}

fn parse_number<T>(key: &str, value: &str) -> Result<T, TaskError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    value.parse::<T>().map_err(|err| TaskError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: err.to_string(),
    })
}

/// Everything needed to run one derivative computation
#[derive(Debug, Clone, PartialEq)]
pub struct DerivativeTask {
    pub title: Option<String>,
    pub function: String,
    pub x: f64,
    pub h: f64,
    pub tolerance: f64,
    pub max_iterations: usize,
    pub loglevel: Option<String>,
    pub curve_points: usize,
    /// csv file for the derivative curve
    pub curve_output: Option<String>,
    /// tab-separated file for the extrapolation table
    pub table_output: Option<String>,
}

impl Default for DerivativeTask {
    fn default() -> Self {
        DerivativeTask {
            title: None,
            function: "sin(x)".to_string(),
            x: 1.5,
            h: DEFAULT_STEP,
            tolerance: DEFAULT_TOLERANCE,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            loglevel: None,
            curve_points: DEFAULT_CURVE_POINTS,
            curve_output: None,
            table_output: None,
        }
    }
}

impl DerivativeTask {
    pub fn from_file(path: &str) -> Result<Self, TaskError> {
        let content = fs::read_to_string(path).map_err(|err| TaskError::Io {
            path: path.to_string(),
            reason: err.to_string(),
        })?;
        content.parse()
    }

    fn set(&mut self, key: TaskKey, value: &str) -> Result<(), TaskError> {
        let name = key.to_string();
        if value.is_empty() {
            return Err(TaskError::InvalidValue {
                key: name,
                value: String::new(),
                reason: "empty value".to_string(),
            });
        }
        match key {
            TaskKey::Function => self.function = value.to_string(),
            TaskKey::X => self.x = parse_number(&name, value)?,
            TaskKey::Step => self.h = parse_number(&name, value)?,
            TaskKey::Tolerance => self.tolerance = parse_number(&name, value)?,
            TaskKey::MaxIterations => self.max_iterations = parse_number(&name, value)?,
            TaskKey::LogLevel => {
                level_from_str(value).map_err(|reason| TaskError::InvalidValue {
                    key: name,
                    value: value.to_string(),
                    reason,
                })?;
                self.loglevel = Some(value.to_string());
            }
            TaskKey::CurvePoints => self.curve_points = parse_number(&name, value)?,
            TaskKey::CurveOutput => self.curve_output = Some(value.to_string()),
            TaskKey::TableOutput => self.table_output = Some(value.to_string()),
        }
        Ok(())
    }
}

impl FromStr for DerivativeTask {
    type Err = TaskError;

    fn from_str(document: &str) -> Result<Self, Self::Err> {
        let mut task = DerivativeTask::default();
        let mut seen: HashSet<TaskKey> = HashSet::new();
        for (index, raw_line) in document.lines().enumerate() {
            let line_number = index + 1;
            let syntax_error = || TaskError::Syntax {
                line: line_number,
                content: raw_line.trim().to_string(),
            };
            let (_, line) = parse_line(raw_line).map_err(|_| syntax_error())?;
            match line {
                Line::Blank | Line::Comment(_) => {}
                Line::Title(title) => {
                    if task.title.is_some() {
                        return Err(syntax_error());
                    }
                    task.title = Some(title.to_string());
                }
                Line::Entry(key, value) => {
                    let canonical =
                        TaskKey::from_str(key).map_err(|_| TaskError::UnknownKey {
                            line: line_number,
                            key: key.to_string(),
                        })?;
                    if !seen.insert(canonical) {
                        return Err(TaskError::DuplicateKey {
                            line: line_number,
                            key: key.to_string(),
                        });
                    }
                    task.set(canonical, value)?;
                }
            }
        }
        Ok(task)
    }
}

/// writes the task back as a document that parses into the same task
impl fmt::Display for DerivativeTask {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Some(title) = &self.title {
            writeln!(f, "{}", title)?;
        }
        writeln!(f, "function: {}", self.function)?;
        writeln!(f, "x: {}", self.x)?;
        writeln!(f, "h: {}", self.h)?;
        writeln!(f, "tol: {:e}", self.tolerance)?;
        writeln!(f, "max_iter: {}", self.max_iterations)?;
        if let Some(loglevel) = &self.loglevel {
            writeln!(f, "loglevel: {}", loglevel)?;
        }
        writeln!(f, "curve_points: {}", self.curve_points)?;
        if let Some(path) = &self.curve_output {
            writeln!(f, "curve_output: {}", path)?;
        }
        if let Some(path) = &self.table_output {
            writeln!(f, "table_output: {}", path)?;
        }
        Ok(())
    }
}
