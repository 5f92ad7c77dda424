//! Filesystem helpers

use std::path::Path;

/// Make `path` writable by its owner if it is not already.
///
/// Signing tools require a writable target even though they never
/// truncate it. On permission-bit filesystems the owner is granted
/// read+write; elsewhere the read-only attribute is cleared.
pub fn ensure_writable(path: &Path) -> std::io::Result<()> {
    let mut perms = std::fs::metadata(path)?.permissions();

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if perms.mode() & 0o200 != 0 {
            return Ok(());
        }
        perms.set_mode(perms.mode() | 0o600);
    }

    #[cfg(not(unix))]
    {
        if !perms.readonly() {
            return Ok(());
        }
        perms.set_readonly(false);
    }

    std::fs::set_permissions(path, perms)
}
