//! Filesystem and environment access.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use super::basic::SError;

pub const DATA_DIR_NAME: &str = ".portan";

pub fn env_var_non_empty(name: &str) -> bool {
    match std::env::var(name) {
        Ok(v) => !v.is_empty(),
        Err(_) => false,
    }
}

pub fn mk_writable_dir(dirpath: &Path) -> io::Result<()> {
    fs::create_dir_all(dirpath)?;

    let mut perms = fs::metadata(dirpath)?.permissions();
    perms.set_readonly(false);
    #[cfg(unix)]
    {
        // Does not apply to Windows
        use std::os::unix::fs::PermissionsExt;
        perms.set_mode(0o700);
    }
    fs::set_permissions(dirpath, perms)
}

// Returns a path like $HOME/.portan/. Does not create it.
pub fn data_dir_path() -> Result<PathBuf, SError> {
    match dirs::home_dir() {
        Some(d) => Ok(d.join(DATA_DIR_NAME)),
        None => Err(SError::from("Unable to determine home directory")),
    }
}

/// Returns $HOME/.portan/<fname> if such a file exists.
pub fn existing_data_file(fname: &str) -> Option<PathBuf> {
    let path = data_dir_path().ok()?.join(fname);
    if path.is_file() {
        Some(path)
    } else {
        None
    }
}
