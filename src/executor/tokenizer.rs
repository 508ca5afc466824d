//! Invocation tokenizer
//!
//! Commands are split on whitespace only. Quotes, globs, pipes and escapes
//! carry no meaning here, so an argument that contains whitespace or quote
//! characters does not survive the split. Command authors must avoid such
//! arguments on the host path.

use std::fmt;

/// A command resolved into a program name and its arguments
///
/// An invocation is derived from exactly one command and never changes
/// after it has been created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    source: String,
    program: String,
    args: Vec<String>,
}

impl Invocation {
    /// Builds an invocation from an explicit program and argument list
    #[must_use]
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let program = program.into();
        let args: Vec<String> = args.into_iter().map(Into::into).collect();
        let source = shell_words::join(std::iter::once(&program).chain(args.iter()));
        Self {
            source,
            program,
            args,
        }
    }

    /// Tokenizes a raw command
    ///
    /// Returns `None` when the command holds no tokens; callers treat that
    /// as a blank line and skip it.
    #[must_use]
    pub fn parse(command: &str) -> Option<Self> {
        let mut tokens = tokenize(command).into_iter();
        let program = tokens.next()?;
        Some(Self {
            source: command.trim().to_string(),
            program,
            args: tokens.collect(),
        })
    }

    /// Program to execute
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments passed to the program
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// The command text this invocation was derived from
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Splits a command into its non-empty whitespace-delimited tokens
#[must_use]
pub fn tokenize(command: &str) -> Vec<String> {
    command.split_whitespace().map(str::to_string).collect()
}
