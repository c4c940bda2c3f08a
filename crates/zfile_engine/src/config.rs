use serde_derive::Deserialize;
use tracing::{debug, instrument};

use zfile_base::{FilePath, PalHandle, ResultExt, ZFileError, ZFileResult};

/// Bounds and tunables of the file layer.
///
/// Every field has a default, so a config file only needs the values it changes.
///
/// # Examples
///
/// ```
/// use zfile_engine::FileSystemConfig;
///
/// let config: FileSystemConfig = toml::from_str("copy_chunk_size = 4096").unwrap();
/// assert_eq!(config.copy_chunk_size, 4096);
/// assert_eq!(config.max_path_len, 1024);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileSystemConfig {
    /// Size of a path buffer including the terminator slot, so paths hold at most
    /// `max_path_len - 1` bytes.
    pub max_path_len: usize,
    /// Scratch bound for the intermediate prefixes built while creating directories.
    pub max_directory_path_len: usize,
    /// Bound for one `write_formatted` render, terminator slot included.
    pub max_format_len: usize,
    /// Bytes moved per read/write round in `copy`.
    pub copy_chunk_size: usize,
    /// Distance between tab stops when reading lines.
    pub tab_columns: usize,
}

impl Default for FileSystemConfig {
    fn default() -> Self {
        Self {
            max_path_len: 1024,
            max_directory_path_len: 512,
            max_format_len: 1024,
            copy_chunk_size: 1024,
            tab_columns: 4,
        }
    }
}

impl FileSystemConfig {
    /// Rejects values the file layer cannot operate with.
    pub fn validate(&self) -> ZFileResult<()> {
        let fields = [
            ("max_path_len", self.max_path_len),
            ("max_directory_path_len", self.max_directory_path_len),
            ("max_format_len", self.max_format_len),
            ("copy_chunk_size", self.copy_chunk_size),
            ("tab_columns", self.tab_columns),
        ];
        for (name, value) in fields {
            if value == 0 {
                return Err(Box::new(ZFileError::invalid_argument(format!(
                    "{} must be greater than zero",
                    name
                ))));
            }
        }
        Ok(())
    }
}

/// Load a [`FileSystemConfig`] from a TOML file read through the PAL.
#[instrument(skip(pal), fields(path = %path))]
pub fn load_config(pal: &PalHandle, path: &FilePath) -> ZFileResult<FileSystemConfig> {
    let text = pal
        .read_file_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path))?;
    let config: FileSystemConfig = toml::from_str(&text)
        .map_err(|e| zfile_base::err!("Failed to parse config file '{}': {}", path, e))?;
    config
        .validate()
        .with_context(|| format!("Invalid config file '{}'", path))?;
    debug!(?config, "config loaded");
    Ok(config)
}
