//! Small helpers shared by the CLI entry point.

use std::path::Path;

use anyhow::{Context, Result, bail};
#[cfg(unix)]
use tracing::warn;

/// Fail fast on an unusable output directory instead of partway through a
/// multi-gigabyte run: create it if missing, then prove it accepts writes.
pub fn ensure_output_dir(path: &Path) -> Result<()> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_dir() => {}
        Ok(_) => bail!("{} exists but is not a directory", path.display()),
        Err(_) => {
            std::fs::create_dir_all(path)
                .with_context(|| format!("cannot create output directory {}", path.display()))?;
        }
    }

    let probe = path.join(format!(".probe_{}", std::process::id()));
    std::fs::write(&probe, b"")
        .with_context(|| format!("cannot write into {}", path.display()))?;
    let _ = std::fs::remove_file(&probe);

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(path)?.permissions().mode();
        if mode & 0o002 != 0 {
            warn!("{} is writable by every user on this machine", path.display());
        }
    }

    Ok(())
}
