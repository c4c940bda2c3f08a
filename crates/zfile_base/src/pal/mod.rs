/* 📖 # Why put the platform behind a trait?

The file layer runs on POSIX, on Windows and on I/O shims without locking or error
queries. Everything platform-specific sits behind the Pal trait so the engine holds a
single implementation of the observable semantics:
- RealPal talks to the operating system
- MockPal keeps everything in memory and can inject failures

Engine code depends only on `PalHandle`, never on a concrete backend.
*/

mod file_path;
pub mod mock;
pub mod real_pal;
mod traits;

pub use file_path::{FilePath, PATH_SEP, PATH_SEP_CHAR};
pub use mock::MockPal;
pub use real_pal::RealPal;
pub use traits::{
    DirEntry, EntryKind, LockKind, LockSupport, OpenIntent, OpenedDirectory, Pal, PalDirectory,
    PalFile, PalHandle,
};
