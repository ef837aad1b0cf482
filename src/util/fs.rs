use anyhow::{Context, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

#[cfg(unix)]
use std::os::unix::fs::{DirBuilderExt, PermissionsExt};

/// Create the store root with `mode`. Missing parents are created with the
/// default mode; a directory that already exists is left untouched.
/// Returns true when the directory was created here.
pub fn create_private_dir(path: &Path, mode: u32) -> Result<bool> {
    if path.is_dir() {
        return Ok(false);
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }

    let mut builder = fs::DirBuilder::new();
    #[cfg(unix)]
    builder.mode(mode);
    match builder.create(path) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::AlreadyExists && path.is_dir() => return Ok(false),
        Err(e) => {
            return Err(e).with_context(|| format!("create directory {}", path.display()))
        }
    }
    // The umask may have cleared bits from the requested mode.
    set_mode(path, mode)?;
    tracing::debug!(path = %path.display(), mode = %format!("{:04o}", mode), "store root created");
    Ok(true)
}

/// chmod `path` to exactly `mode` (no-op off unix).
pub fn set_mode(path: &Path, mode: u32) -> Result<()> {
    #[cfg(unix)]
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
        .with_context(|| format!("chmod {:04o} {}", mode, path.display()))?;
    #[cfg(not(unix))]
    let _ = (path, mode);
    Ok(())
}

/// Permission bits of `path`, `None` if unavailable or not on unix.
pub fn mode_of(path: &Path) -> Option<u32> {
    #[cfg(unix)]
    {
        fs::metadata(path).ok().map(|m| m.permissions().mode() & 0o777)
    }
    #[cfg(not(unix))]
    {
        let _ = path;
        None
    }
}
