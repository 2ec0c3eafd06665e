//! Errors and warnings produced while translating CA source.
//!
//! Every directive-level problem aborts translation with a [`TranslateError`]
//! that knows where it happened. Findings that do not invalidate the output
//! (a missing library, an operand nobody declared) are collected as
//! [`Warning`]s unless the translator runs in strict mode.

use colored::*;
use std::fmt;
use std::path::Path;
use thiserror::Error;

// ========== ERROR KINDS ==========

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    MalformedDirective,
    ImportNotFound,
    UnmatchedControlStructure,
    UnterminatedBlock,
    DanglingFunction,
    DuplicateFunction,
    UnknownIdentifier,
    UnrecognizedDirective,
    Config,
    Io,
}

impl ErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::MalformedDirective => "malformed-directive",
            ErrorKind::ImportNotFound => "import-not-found",
            ErrorKind::UnmatchedControlStructure => "unmatched-control-structure",
            ErrorKind::UnterminatedBlock => "unterminated-block",
            ErrorKind::DanglingFunction => "dangling-function",
            ErrorKind::DuplicateFunction => "duplicate-function",
            ErrorKind::UnknownIdentifier => "unknown-identifier",
            ErrorKind::UnrecognizedDirective => "unrecognized-directive",
            ErrorKind::Config => "config",
            ErrorKind::Io => "io",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

// ========== SOURCE LOCATION ==========

/// Origin (file or library name) and 1-based line number of a source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub origin: String,
    pub line: usize,
}

impl Location {
    pub fn new(origin: impl Into<String>, line: usize) -> Self {
        Self {
            origin: origin.into(),
            line,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.origin, self.line)
    }
}

fn location_prefix(location: &Option<Location>) -> String {
    match location {
        Some(loc) => format!("{}: ", loc),
        None => String::new(),
    }
}

// ========== TRANSLATION ERROR ==========

#[derive(Debug, Clone, Error)]
#[error("{}{kind}: {message}", location_prefix(.location))]
pub struct TranslateError {
    pub kind: ErrorKind,
    pub message: String,
    pub location: Option<Location>,
    pub source_text: Option<String>,
    pub help: Option<String>,
}

impl TranslateError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            location: None,
            source_text: None,
            help: None,
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MalformedDirective, message)
    }

    pub fn unmatched(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnmatchedControlStructure, message)
    }

    pub fn io(path: &Path, err: std::io::Error) -> Self {
        Self::new(ErrorKind::Io, format!("{}: {}", path.display(), err))
    }

    /// Attach the line the error was found on. An existing location wins,
    /// so errors raised deeper down keep their more precise position.
    pub fn at(mut self, location: Location, text: &str) -> Self {
        match &self.location {
            None => {
                self.location = Some(location);
                self.source_text = Some(text.to_string());
            }
            Some(existing) if *existing == location && self.source_text.is_none() => {
                self.source_text = Some(text.to_string());
            }
            Some(_) => {}
        }
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Multi-line colored diagnostic for terminal output.
    pub fn render(&self) -> String {
        let mut out = String::new();

        out.push_str(&format!(
            "{}{}{}",
            "error[".red().bold(),
            self.kind.code().red().bold(),
            "]".red().bold()
        ));
        if let Some(loc) = &self.location {
            out.push_str(&format!(" {}", loc.to_string().cyan()));
        }
        out.push_str(&format!(": {}\n", self.message.bold()));

        if let (Some(loc), Some(text)) = (&self.location, &self.source_text) {
            out.push_str(&format!("{:>5} {} {}\n", loc.line.to_string().blue(), "│".blue(), text));
        }

        if let Some(help) = &self.help {
            out.push_str(&format!("  {} {}\n", "help:".green().bold(), help.green()));
        }

        out
    }
}

pub type TranslateResult<T> = Result<T, TranslateError>;

// ========== WARNINGS ==========

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub kind: ErrorKind,
    pub message: String,
    pub location: Option<Location>,
}

impl Warning {
    pub fn new(kind: ErrorKind, message: impl Into<String>, location: Option<Location>) -> Self {
        Self {
            kind,
            message: message.into(),
            location,
        }
    }

    /// Promote to a hard error (strict mode).
    pub fn into_error(self) -> TranslateError {
        TranslateError {
            kind: self.kind,
            message: self.message,
            location: self.location,
            source_text: None,
            help: None,
        }
    }

    pub fn render(&self) -> String {
        let mut out = format!("{}", "warning".yellow().bold());
        out.push_str(&format!("[{}]", self.kind.code().yellow()));
        if let Some(loc) = &self.location {
            out.push_str(&format!(" {}", loc.to_string().cyan()));
        }
        out.push_str(&format!(": {}", self.message));
        out
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(loc) = &self.location {
            write!(f, "{}: ", loc)?;
        }
        write!(f, "{}: {}", self.kind, self.message)
    }
}
