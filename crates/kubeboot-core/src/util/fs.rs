//! Filesystem utilities.

use kubeboot_types::{KubebootError, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Mode for private keys and credential bundles.
pub const SECRET_MODE: u32 = 0o600;

/// Mode for certificates and public keys.
pub const PUBLIC_MODE: u32 = 0o644;

/// Mode for the data directory.
pub const DATA_DIR_MODE: u32 = 0o755;

/// Mode for the certificate directory.
pub const CERT_DIR_MODE: u32 = 0o751;

/// Expand a leading tilde to the home directory.
pub fn expand_path(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();

    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }

    path.to_path_buf()
}

/// Read entire file as string (slurp).
pub fn slurp(path: impl AsRef<Path>) -> Result<String> {
    fs::read_to_string(path).map_err(Into::into)
}

/// Whether `path` exists and is not a directory.
pub fn file_exists(path: impl AsRef<Path>) -> bool {
    fs::metadata(path).map(|m| !m.is_dir()).unwrap_or(false)
}

/// Create a directory (and its parents) and force its mode.
pub fn ensure_dir(path: impl AsRef<Path>, mode: u32) -> Result<()> {
    let path = path.as_ref();
    fs::create_dir_all(path).map_err(|e| KubebootError::persistence(path, e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(mode))
            .map_err(|e| KubebootError::persistence(path, e))?;
    }
    #[cfg(not(unix))]
    let _ = mode;

    Ok(())
}

/// Replace `path` with `contents` in one step.
///
/// The data is written to a temporary file in the same directory, given
/// `mode`, synced, and renamed over the destination, so readers only ever
/// see the old or the new content.
pub fn write_atomic(path: impl AsRef<Path>, contents: &[u8], mode: u32) -> Result<()> {
    let path = path.as_ref();
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let write = || -> io::Result<()> {
        let mut tmp = tempfile::Builder::new()
            .prefix(".kubeboot-")
            .tempfile_in(dir)?;
        tmp.write_all(contents)?;
        set_mode(tmp.as_file(), mode)?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    };

    write().map_err(|e| KubebootError::persistence(path, e))
}

/// Open `path` for writing with create+truncate semantics and `mode`.
///
/// The mode is applied to pre-existing files too.
pub fn create_truncated(path: impl AsRef<Path>, mode: u32) -> Result<File> {
    let path = path.as_ref();

    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(mode);
    }

    let file = options
        .open(path)
        .map_err(|e| KubebootError::persistence(path, e))?;
    set_mode(&file, mode).map_err(|e| KubebootError::persistence(path, e))?;
    Ok(file)
}

#[cfg(unix)]
fn set_mode(file: &File, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(_file: &File, _mode: u32) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[cfg(unix)]
    fn mode_of(path: &Path) -> u32 {
        use std::os::unix::fs::PermissionsExt;
        fs::metadata(path).unwrap().permissions().mode() & 0o777
    }

    #[test]
    fn test_write_atomic_replaces_content() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("ca.crt");

        write_atomic(&path, b"first", PUBLIC_MODE).unwrap();
        write_atomic(&path, b"second", PUBLIC_MODE).unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"second");
        // No temporary files left behind.
        assert_eq!(fs::read_dir(temp_dir.path()).unwrap().count(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_write_atomic_applies_mode() {
        let temp_dir = TempDir::new().unwrap();
        let key = temp_dir.path().join("ca.key");
        let cert = temp_dir.path().join("ca.crt");

        write_atomic(&key, b"key", SECRET_MODE).unwrap();
        write_atomic(&cert, b"cert", PUBLIC_MODE).unwrap();

        assert_eq!(mode_of(&key), 0o600);
        assert_eq!(mode_of(&cert), 0o644);
    }

    #[test]
    fn test_write_atomic_missing_dir_is_persistence_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("missing").join("ca.crt");

        let err = write_atomic(&path, b"x", PUBLIC_MODE).unwrap_err();
        assert!(matches!(err, KubebootError::Persistence { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_create_truncated_tightens_existing_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("admin.conf");
        write_atomic(&path, b"old content that is long", PUBLIC_MODE).unwrap();

        let mut file = create_truncated(&path, SECRET_MODE).unwrap();
        file.write_all(b"new").unwrap();
        drop(file);

        assert_eq!(fs::read(&path).unwrap(), b"new");
        assert_eq!(mode_of(&path), 0o600);
    }

    #[test]
    fn test_file_exists_ignores_directories() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("sa.key");
        fs::write(&file, "x").unwrap();

        assert!(file_exists(&file));
        assert!(!file_exists(temp_dir.path()));
        assert!(!file_exists(temp_dir.path().join("nope")));
    }

    #[cfg(unix)]
    #[test]
    fn test_ensure_dir_sets_mode() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("data").join("pki");

        ensure_dir(&dir, CERT_DIR_MODE).unwrap();
        assert!(dir.is_dir());
        assert_eq!(mode_of(&dir), 0o751);
    }
}
