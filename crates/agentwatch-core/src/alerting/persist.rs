//! JSON file persistence shared by the rule store and the alert history

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;

/// Read and deserialize a JSON file. `Ok(None)` when the file does not exist.
pub(crate) async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let raw = match tokio::fs::read(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    Ok(Some(serde_json::from_slice(&raw)?))
}

/// Serialize `value` as pretty JSON and replace the file contents.
///
/// The document is written to a sibling temp file and renamed over the
/// target, so a crash mid-write leaves the previous contents intact.
pub(crate) async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let json = serde_json::to_vec_pretty(value)?;
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");

    tokio::fs::write(&tmp, &json).await?;
    tokio::fs::rename(&tmp, path).await?;

    Ok(())
}

/// Copy the file to `<path>.bak`, replacing any earlier copy
pub(crate) async fn backup(path: &Path) -> Result<PathBuf> {
    let mut copy = path.as_os_str().to_owned();
    copy.push(".bak");
    let copy = PathBuf::from(copy);

    tokio::fs::copy(path, &copy).await?;
    Ok(copy)
}
