use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Io,
    Parse,
    NotFound,
    InvalidArgument,
    Internal,
    // Storage could not be opened or its contents are unreadable
    Corrupt,
    Locked,
    MapFull,
    // Filter compiler
    InvalidState,
    NoOpenField,
    TypeMismatch,
    InvalidTagName,
    CapacityExceeded,
    DuplicateField,
}

#[derive(Debug)]
pub struct Error {
    pub kind: ErrorKind,
    pub context: String,
}

impl Error {
    pub fn new(kind: ErrorKind, context: String) -> Self {
        Error { kind, context }
    }

    pub fn corrupt(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::Corrupt, context.into())
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.context)
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error {
            kind: ErrorKind::Io,
            context: err.to_string(),
        }
    }
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Error {
            kind: ErrorKind::Corrupt,
            context: format!("record decode failed: {}", err),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error {
            kind: ErrorKind::Parse,
            context: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Per-record ingestion failures. These never abort a batch; the pipeline
/// tallies them in `IngestStats` and moves on to the next line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestError {
    MalformedInput(String),
    IdentityMismatch,
    InvalidSignature,
}

impl fmt::Display for IngestError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            IngestError::MalformedInput(reason) => write!(f, "malformed input: {}", reason),
            IngestError::IdentityMismatch => write!(f, "note id does not match its contents"),
            IngestError::InvalidSignature => write!(f, "invalid note signature"),
        }
    }
}

impl std::error::Error for IngestError {}
