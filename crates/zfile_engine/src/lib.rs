/* 📖 # What does zfile_engine provide?

The platform-independent half of the file layer. Everything here talks to storage only
through `PalHandle`, so the same code (and the same tests) run on the real filesystem
and on MockPal:
- `path`: joining, `~` expansion and file-name offsets
- `file`, `line`: open handles with byte, block and line I/O
- `dir`: filtered directory listing and recursive creation
- `file_system`: the `FileSystem` value bundling backend, bounds and open callback
*/

pub mod config;
pub mod dir;
pub mod file;
pub mod file_system;
pub mod identity;
mod line;
pub mod path;

pub use config::{FileSystemConfig, load_config};
pub use dir::DirectoryHandle;
pub use file::{FileHandle, FileMode, FileType, SeekMode};
pub use file_system::{FileSystem, OpenCallback, OpenNotification};
pub use identity::IdentityContext;
pub use path::{build_path, filename_index, join_path};
