//! Error types for netmatch.

use thiserror::Error;

/// Error type for netmatch operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Text that is not a valid address or CIDR network
    #[error("can't parse IP \"{input}\": {reason}")]
    Parse { input: String, reason: &'static str },

    /// A list element failed to parse
    #[error("invalid list element {index}: {source}")]
    Element {
        index: usize,
        #[source]
        source: Box<Error>,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn parse(input: &str, reason: &'static str) -> Self {
        Error::Parse {
            input: input.to_string(),
            reason,
        }
    }

    /// Returns true for malformed address text, including list elements.
    pub fn is_format_error(&self) -> bool {
        match self {
            Error::Parse { .. } => true,
            Error::Element { source, .. } => source.is_format_error(),
            _ => false,
        }
    }
}

/// Result type alias for netmatch operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Broken internal invariants.
///
/// These are never returned to callers. They are reported through [`fatal`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IntegrityError {
    /// Identity registered while already present
    #[error("register: value {0} already registered")]
    AlreadyRegistered(u64),

    /// Identity deregistered while absent
    #[error("deregister: value {0} not registered")]
    NotRegistered(u64),

    /// Ledger entry whose value is gone
    #[error("release: value {0} dropped while still registered")]
    Orphaned(u64),

    /// Release hook returned with its value still registered
    #[error("release: hook for value {0} did not deregister")]
    HookDidNotDeregister(u64),

    /// Entries left over after teardown
    #[error("teardown left {0} registered values")]
    NotDrained(usize),

    /// Prefix length outside the family width
    #[error("invalid prefix length {prefix} for {family}")]
    InvalidPrefix { family: &'static str, prefix: u8 },

    /// A value that parsed once no longer parses
    #[error("cached value no longer parses: \"{0}\"")]
    Unparsable(String),
}

/// Log and abort on a broken invariant.
#[cold]
#[track_caller]
pub(crate) fn fatal(err: IntegrityError) -> ! {
    log::error!("integrity violation: {}", err);
    panic!("{}", err)
}
