use std::error::Error as StdError;
use std::fmt;
use std::io;

use tracing_error::{SpanTrace, SpanTraceStatus};

/* 📖 # Why a custom error type and not use anyhow/eyre/thiserror etc?

- Better control over error handling
- No dependencies to compile and integrate
- More transparency into error handling logic
- The file layer needs a small, closed taxonomy callers can match on
 */

/// Error variants that can occur in zfile operations.
/// Each variant represents a specific error category with its associated context.
#[derive(Debug)]
pub enum ErrorKind {
    /// The file or directory does not exist
    NotFound { path: String },

    /// An exclusive create found the path already present
    AlreadyExists { path: String },

    /// A read, write, flush, seek or other platform operation failed
    Io { path: String, source: io::Error },

    /// A caller-supplied bound is too small, or an argument is malformed
    InvalidArgument { message: String },

    /// The backend cannot perform the operation at all
    Unsupported { operation: String },

    /// Catch-all for other errors with a message
    Message { message: String },
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::NotFound { path } => write!(f, "Not found: {}", path),
            ErrorKind::AlreadyExists { path } => write!(f, "Already exists: {}", path),
            ErrorKind::Io { path, source } => write!(f, "I/O error at {}: {}", path, source),
            ErrorKind::InvalidArgument { message } => write!(f, "Invalid argument: {}", message),
            ErrorKind::Unsupported { operation } => {
                write!(f, "Unsupported operation: {}", operation)
            }
            ErrorKind::Message { message } => write!(f, "{}", message),
        }
    }
}

/* 📖 # Why separate ErrorKind and ZFileError?
This two-layer design provides a clear separation of concerns:
- ErrorKind: structural variants with specific contexts (paths, io sources)
- ZFileError: wraps ErrorKind with context strings and a span trace

Callers pattern match on ErrorKind (e.g. to tell `AlreadyExists` on a save file apart
from a plain I/O failure), while propagation code attaches context.
*/

/// Error type wrapping ErrorKind with context and the span trace at creation.
pub struct ZFileError {
    kind: ErrorKind,
    context: Vec<String>,
    span_trace: SpanTrace,
}

impl ZFileError {
    /// Creates a new error from an ErrorKind, capturing the current span trace.
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: vec![],
            span_trace: SpanTrace::capture(),
        }
    }

    /// Creates a `Message` error.
    pub fn message(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Message {
            message: message.into(),
        })
    }

    /// Creates an `InvalidArgument` error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument {
            message: message.into(),
        })
    }

    /// Classifies an `io::Error` raised for `path`.
    ///
    /// `NotFound` and `AlreadyExists` map onto their own variants, everything else is `Io`.
    pub fn io(path: impl Into<String>, source: io::Error) -> Self {
        let path = path.into();
        let kind = match source.kind() {
            io::ErrorKind::NotFound => ErrorKind::NotFound { path },
            io::ErrorKind::AlreadyExists => ErrorKind::AlreadyExists { path },
            io::ErrorKind::Unsupported => ErrorKind::Unsupported {
                operation: format!("{} ({})", source, path),
            },
            _ => ErrorKind::Io { path, source },
        };
        Self::new(kind)
    }

    /// Attaches context to an error.
    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.context.push(context.into());
        self
    }

    /// Attaches context using lazy evaluation.
    pub fn with_context<F>(mut self, f: F) -> Self
    where
        F: FnOnce() -> String,
    {
        self.context.push(f());
        self
    }

    /// Returns a reference to the underlying ErrorKind.
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Context strings in the order they were attached.
    pub fn get_context(&self) -> &[String] {
        &self.context
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.kind, ErrorKind::NotFound { .. })
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self.kind, ErrorKind::AlreadyExists { .. })
    }

    pub fn is_invalid_argument(&self) -> bool {
        matches!(self.kind, ErrorKind::InvalidArgument { .. })
    }

    pub fn is_io(&self) -> bool {
        matches!(self.kind, ErrorKind::Io { .. })
    }

    fn write_context(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, context) in self.context.iter().enumerate() {
            let connector = if index + 1 == self.context.len() {
                "└─"
            } else {
                "├─"
            };
            writeln!(f, "{} {}", connector, context)?;
        }
        Ok(())
    }
}

impl From<ErrorKind> for ZFileError {
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}

impl StdError for ZFileError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match &self.kind {
            ErrorKind::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl fmt::Display for ZFileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, ctx) in self.context.iter().enumerate() {
            if i == 0 {
                write!(f, "{}", ctx)?;
            } else {
                write!(f, ": {}", ctx)?;
            }
        }
        if !self.context.is_empty() {
            write!(f, ": ")?;
        }
        write!(f, "{}", self.kind)
    }
}

/* 📖 # Why a tree-shaped Debug output?

Errors are usually printed with `{:?}` by binaries and test failures. Showing the
message first, then the context chain as a tree, then the span trace keeps the most
relevant line at the top while preserving every step that was attached.
*/
impl fmt::Debug for ZFileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.kind)?;
        self.write_context(f)?;
        if self.span_trace.status() == SpanTraceStatus::CAPTURED {
            writeln!(f, "Trace: {}", self.span_trace)?;
        }
        Ok(())
    }
}

/* 📖 # Why use Box<ZFileError> in the result type?

Boxing the error reduces the size of the result type, making it more efficient to
return in the common case. Byte-level calls like `read_byte` sit on hot paths.
*/

/// Standard result type for zfile operations.
pub type ZFileResult<T> = std::result::Result<T, Box<ZFileError>>;

/// Extension trait for attaching context to Results.
pub trait ResultExt<T> {
    /// Attaches context to an error, consuming and re-wrapping it.
    fn context(self, context: impl Into<String>) -> ZFileResult<T>;

    /// Attaches context using lazy evaluation.
    /// Context is only evaluated if the result is an error.
    fn with_context<F>(self, f: F) -> ZFileResult<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for ZFileResult<T> {
    fn context(self, context: impl Into<String>) -> ZFileResult<T> {
        self.map_err(|err| Box::new(err.context(context)))
    }

    fn with_context<F>(self, f: F) -> ZFileResult<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|err| Box::new(err.with_context(f)))
    }
}

/// Builds a boxed `Message` error from format arguments.
#[macro_export]
macro_rules! err {
    ($($arg:tt)*) => {
        Box::new($crate::ZFileError::message(format!($($arg)*)))
    };
}

/// Returns early with a boxed `Message` error.
#[macro_export]
macro_rules! bail {
    ($($arg:tt)*) => {
        return Err($crate::err!($($arg)*))
    };
}
