//! different utility modules used throughout the project
/// log level parsing, terminal logger and saving results into files
pub mod logger;
/// parse a task document of `key: value` lines with an optional title into a DerivativeTask
pub mod task_parser;
