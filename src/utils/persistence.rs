use std::{
    fs::{self, File},
    io::{self, Write},
    path::{Path, PathBuf},
};

use serde::Serialize;

use crate::errors::StoreError;

/// Sibling path a file is staged at before it replaces `path`.
pub fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|name| name.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Serializes `value` as pretty JSON and swaps it into `path` in one rename.
pub fn save_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StoreError> {
    let json = serde_json::to_string_pretty(value)?;
    replace_file(path, json.as_bytes())?;
    Ok(())
}

fn replace_file(path: &Path, data: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let staged = staging_path(path);
    let mut file = File::create(&staged)?;
    file.write_all(data)?;
    file.sync_all()?;
    fs::rename(&staged, path)
}
