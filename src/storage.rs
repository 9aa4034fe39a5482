use crate::errors::AppError;
use crate::models::TapData;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, warn};

/// Reads the aggregates, starting from zero when the file is missing or
/// unusable.
pub async fn load_tap_data(path: &Path) -> TapData {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return TapData::default(),
        Err(err) => {
            error!(path = %path.display(), "failed to read tap data: {err}");
            return TapData::default();
        }
    };

    serde_json::from_slice(&bytes).unwrap_or_else(|err| {
        warn!(path = %path.display(), "discarding unparsable tap data: {err}");
        TapData::default()
    })
}

/// Writes through a sibling temp file so a crash never leaves half a document.
pub async fn persist_tap_data(path: &Path, data: &TapData) -> Result<(), AppError> {
    let payload = serde_json::to_vec_pretty(data).map_err(AppError::internal)?;
    let staging = staging_path(path);
    fs::write(&staging, payload).await?;
    fs::rename(&staging, path).await?;
    Ok(())
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
