use arcstr::ArcStr;
use std::path::{Path, PathBuf};

/// Separator between path components on this platform.
#[cfg(windows)]
pub const PATH_SEP: &str = "\\";
/// Separator between path components on this platform.
#[cfg(not(windows))]
pub const PATH_SEP: &str = "/";

/// [`PATH_SEP`] as a single character.
#[cfg(windows)]
pub const PATH_SEP_CHAR: char = '\\';
/// [`PATH_SEP`] as a single character.
#[cfg(not(windows))]
pub const PATH_SEP_CHAR: char = '/';

/* 📖 # Why wrap ArcStr instead of using PathBuf?

Paths in this layer are plain strings: they are measured in bytes against fixed
bounds, scanned for separators and handed to the open-notification callback. PathBuf
hides the byte length behind OsStr and would invite component-wise normalization the
file layer must not do. ArcStr keeps the value immutable and makes clones cheap, which
matters because every open handle and directory handle keeps its own copy.
*/

/// Immutable path string as used by the file layer.
///
/// # Examples
///
/// ```
/// use zfile_base::FilePath;
///
/// let path = FilePath::from("lib/save/player");
/// assert_eq!(path.len(), 15);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct FilePath(ArcStr);

impl FilePath {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Converts to a regular Path for use with std::fs operations.
    pub fn as_path(&self) -> &Path {
        Path::new(self.0.as_str())
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True if the path starts at a filesystem root.
    pub fn is_absolute(&self) -> bool {
        self.0.starts_with(PATH_SEP_CHAR) || self.as_path().is_absolute()
    }
}

impl From<&str> for FilePath {
    fn from(s: &str) -> Self {
        Self(ArcStr::from(s))
    }
}

impl From<String> for FilePath {
    fn from(s: String) -> Self {
        Self(ArcStr::from(s))
    }
}

impl From<&Path> for FilePath {
    fn from(p: &Path) -> Self {
        Self(ArcStr::from(p.to_string_lossy().as_ref()))
    }
}

impl From<PathBuf> for FilePath {
    fn from(p: PathBuf) -> Self {
        Self::from(p.as_path())
    }
}

impl std::fmt::Display for FilePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for FilePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl AsRef<Path> for FilePath {
    fn as_ref(&self) -> &Path {
        self.as_path()
    }
}
