use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Path of the staging file used while `path` is being replaced.
pub fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Writes `contents` to `path` and forces it to disk before returning.
pub fn write_synced<P: AsRef<Path>, C: AsRef<[u8]>>(path: P, contents: C) -> std::io::Result<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(contents.as_ref())?;
    file.sync_all()
}

/// Replaces `path` with `contents` without ever exposing a half-written file:
/// write `{path}.tmp`, sync, rename over `path`.
pub fn atomic_write<P: AsRef<Path>, C: AsRef<[u8]>>(path: P, contents: C) -> std::io::Result<()> {
    let path = path.as_ref();
    // Same directory keeps the rename on one filesystem.
    let temp_path = temp_path_for(path);
    write_synced(&temp_path, contents)?;
    fs::rename(&temp_path, path)
}
