use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::time::SystemTime;

use tracing::debug;
use tracing::warn;

/// Creates `path` if needed and bumps its modification time.
pub fn touch(path: &Path) -> io::Result<()> {
    let file = OpenOptions::new().append(true).create(true).open(path)?;
    file.set_modified(SystemTime::now())
}

/// Best-effort reload signal: failures are logged, never returned.
pub fn signal_reload(path: &Path) {
    match touch(path) {
        Ok(()) => debug!(path = %path.display(), "reload signal sent"),
        Err(e) => warn!(path = %path.display(), "failed to touch reload signal file: {}", e),
    }
}
