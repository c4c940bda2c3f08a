/* 📖 # Why have zfile_base as a separate crate?
zfile_base holds the error type, tracing setup and platform backends that every other
crate builds on. Keeping them apart from the engine lets the backends be tested on
their own and keeps the dependency graph one-directional.
*/

pub mod error;
mod error_tests;
pub mod pal;
pub mod tracing;

// Re-export commonly used types for convenience
pub use error::{ErrorKind, ResultExt, ZFileError, ZFileResult};
pub use pal::{
    DirEntry, EntryKind, FilePath, LockKind, LockSupport, MockPal, OpenIntent, OpenedDirectory,
    PATH_SEP, PATH_SEP_CHAR, Pal, PalDirectory, PalFile, PalHandle, RealPal,
};
