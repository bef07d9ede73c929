//! Error types for the NFS export subsystem

use std::path::PathBuf;

use thiserror::Error;

/// Broad failure category, used when reporting errors to RPC callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad option flags, option keys or option values
    Validation,
    /// Malformed export definition text
    Parse,
    /// The external export command failed
    Operational,
    /// The requested export does not exist
    Lookup,
    /// Filesystem failure
    Io,
    /// Bad daemon configuration
    Config,
}

impl ErrorKind {
    /// Name used as the prefix of RPC error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "ValidationError",
            ErrorKind::Parse => "ParseError",
            ErrorKind::Operational => "OperationalError",
            ErrorKind::Lookup => "LookupError",
            ErrorKind::Io => "IoError",
            ErrorKind::Config => "ConfigError",
        }
    }
}

/// Errors raised while validating, parsing or applying NFS exports.
#[derive(Error, Debug)]
pub enum NfsError {
    /// Two mutually exclusive flags were both set
    #[error("{message}")]
    ConflictingFlags {
        /// Which pair conflicted
        message: String,
    },
    /// Boolean option name not in the flag table
    #[error("unknown export option: {name}")]
    UnknownFlag {
        /// The offending option name
        name: String,
    },
    /// Raw bitmask carries bits outside the known flags
    #[error("unknown export option bits: {bits:#x}")]
    UnknownFlagBits {
        /// The unknown bits
        bits: u32,
    },
    /// Key-value option key not in the key table
    #[error("option {key} not valid")]
    UnknownOptionKey {
        /// The offending key
        key: String,
    },
    /// Key-value option whose value has the wrong type
    #[error("invalid value for option {key}: {value}")]
    InvalidOptionValue {
        /// Option key
        key: String,
        /// Rejected value
        value: String,
    },
    /// A single export definition line could not be parsed
    #[error("cannot parse export line {line:?}: {reason}")]
    Parse {
        /// The raw line
        line: String,
        /// What went wrong
        reason: String,
    },
    /// exportfs rejected the options (exit code 22)
    #[error("Invalid option: {stderr}")]
    InvalidOption {
        /// Diagnostic output of the command
        stderr: String,
    },
    /// exportfs exited with an unexpected code
    #[error("Unexpected exit code {code} from {command:?}, out= {output}")]
    UnexpectedExit {
        /// Command line that was run
        command: Vec<String>,
        /// Exit code (-1 when killed by a signal)
        code: i32,
        /// Combined stdout and stderr
        output: String,
    },
    /// The external command could not be started
    #[error("failed to run {command}: {source}")]
    Spawn {
        /// Program name
        command: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
    /// Export to remove is not currently active
    #[error("export {host}:{path} not found")]
    ExportNotFound {
        /// Export host
        host: String,
        /// Export path
        path: String,
    },
    /// An export definition file could not be read
    #[error("cannot read exports file {}: {source}", path.display())]
    ExportsFile {
        /// File that failed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
    /// Invalid configuration
    #[error("configuration error: {reason}")]
    Config {
        /// What is wrong
        reason: String,
    },
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl NfsError {
    /// Maps the error onto its category.
    pub fn kind(&self) -> ErrorKind {
        match self {
            NfsError::ConflictingFlags { .. }
            | NfsError::UnknownFlag { .. }
            | NfsError::UnknownFlagBits { .. }
            | NfsError::UnknownOptionKey { .. }
            | NfsError::InvalidOptionValue { .. } => ErrorKind::Validation,
            NfsError::Parse { .. } => ErrorKind::Parse,
            NfsError::InvalidOption { .. }
            | NfsError::UnexpectedExit { .. }
            | NfsError::Spawn { .. } => ErrorKind::Operational,
            NfsError::ExportNotFound { .. } => ErrorKind::Lookup,
            NfsError::ExportsFile { .. } | NfsError::Io(_) => ErrorKind::Io,
            NfsError::Config { .. } => ErrorKind::Config,
        }
    }
}

/// Result type alias using NfsError as the error type.
pub type Result<T> = std::result::Result<T, NfsError>;
