//! Rule preparation errors.

use thiserror::Error;

/// Reasons a rule cannot be prepared.
///
/// A rule that fails to prepare evaluates to `INVALIDRULE` on every device.
#[derive(Debug, Error)]
pub enum RuleError {
    /// A context or text pattern does not compile.
    #[error("Invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        /// The offending pattern.
        pattern: String,
        /// Compilation error.
        #[source]
        source: regex::Error,
    },

    /// The rule names no attribute to read.
    #[error("No field to check.")]
    MissingField,

    /// The script does not parse.
    #[error("Script parse error: {0}")]
    ScriptParse(String),

    /// The script does not define the entry point.
    #[error("The script doesn't define a 'check(device)' function")]
    MissingEntryPoint,

    /// Loading the script did not finish within the time budget.
    #[error("The rule took too long to execute")]
    Timeout,

    /// The interpreter could not be started or stopped abruptly.
    #[error("Interpreter failure: {0}")]
    Interpreter(String),
}
