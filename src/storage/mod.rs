mod memory;
mod store;
mod types;

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

pub use memory::MemoryStore;
pub use store::{ConfigFile, JsonFile, ServiceContextFile};
pub use types::*;

use crate::error::{Error, Result};

pub const CONFIG_FILE: &str = "config.json";
pub const CONTEXT_FILE: &str = "contexts.json";

/// Overrides the location of the config file.
pub const CONFIG_PATH_ENV: &str = "APICR_CONFIG";
/// Overrides the location of the service context file.
pub const CONTEXT_PATH_ENV: &str = "APICR_CONTEXT";

/// A single persisted document.
///
/// Command code only talks to this trait so tests can swap the filesystem
/// for a [`MemoryStore`].
pub trait Store<T> {
    /// Returns the stored document, or `T::default()` when nothing has been saved yet.
    fn load(&self) -> Result<T>;
    fn save(&self, document: &T) -> Result<()>;
    /// Deletes the document. Deleting a missing document succeeds.
    fn remove(&self) -> Result<()>;
    fn location(&self) -> Result<PathBuf>;
}

/// Base directory holding every apicr document.
pub fn config_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join("apicr"))
        .ok_or(Error::MissingConfigDir)
}

/// `env_key` if set, else `file_name` in [`config_dir`]. A relative override
/// is taken relative to [`config_dir`], never the working directory.
pub(crate) fn resolve_path(env_key: &str, file_name: &str) -> Result<PathBuf> {
    let override_path = std::env::var_os(env_key)
        .filter(|p| !p.is_empty())
        .map(PathBuf::from);
    resolve_in(config_dir, override_path, file_name)
}

fn resolve_in<F>(base: F, override_path: Option<PathBuf>, file_name: &str) -> Result<PathBuf>
where
    F: FnOnce() -> Result<PathBuf>,
{
    match override_path {
        Some(path) if path.is_absolute() => Ok(path),
        Some(path) => Ok(base()?.join(path)),
        None => Ok(base()?.join(file_name)),
    }
}

/// Writes `contents` to a file readable only by its owner. Without
/// `overwrite`, an existing file is left alone and reported as
/// [`Error::FileExists`].
pub fn write_private(path: &Path, contents: &[u8], overwrite: bool) -> Result<()> {
    let mut options = OpenOptions::new();
    options.write(true);
    if overwrite {
        options.create(true).truncate(true);
    } else {
        options.create_new(true);
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path).map_err(|e| match e.kind() {
        io::ErrorKind::AlreadyExists => Error::FileExists(path.to_path_buf()),
        _ => Error::io(path, e),
    })?;
    file.write_all(contents).map_err(|e| Error::io(path, e))?;

    // `mode` only applies to newly created files.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))
            .map_err(|e| Error::io(path, e))?;
    }
    Ok(())
}
