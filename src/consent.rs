use crate::errors::ClientError;
use crate::geo::GeoResolver;
use crate::models::CountryCode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, warn};

pub const CONSENT_VERSION: &str = "1.0";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsentRecord {
    pub has_consented: bool,
    pub consent_date: DateTime<Utc>,
    pub consent_version: String,
}

/// The player's location-sharing decision, persisted in one well-known file.
/// A record written for another version counts as no decision at all.
#[derive(Debug, Clone)]
pub struct ConsentStore {
    path: PathBuf,
}

impl ConsentStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn set(&self, has_consented: bool) -> Result<ConsentRecord, ClientError> {
        let record = ConsentRecord {
            has_consented,
            consent_date: Utc::now(),
            consent_version: CONSENT_VERSION.to_string(),
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&self.path, serde_json::to_vec(&record)?).await?;
        info!(has_consented, "consent recorded");
        Ok(record)
    }

    pub async fn get(&self) -> Option<ConsentRecord> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return None,
            Err(err) => {
                warn!("failed to read consent record: {err}");
                return None;
            }
        };

        let record: ConsentRecord = match serde_json::from_slice(&bytes) {
            Ok(record) => record,
            Err(err) => {
                warn!("ignoring malformed consent record: {err}");
                return None;
            }
        };

        if record.consent_version != CONSENT_VERSION {
            info!(stored = %record.consent_version, "consent version changed, asking again");
            self.clear().await;
            return None;
        }
        Some(record)
    }

    pub async fn clear(&self) {
        match fs::remove_file(&self.path).await {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => warn!("failed to clear consent record: {err}"),
        }
    }

    pub async fn has_valid_consent(&self) -> bool {
        matches!(self.get().await, Some(record) if record.has_consented)
    }

    pub async fn has_declined(&self) -> bool {
        matches!(self.get().await, Some(record) if !record.has_consented)
    }

    pub async fn needs_consent(&self) -> bool {
        self.get().await.is_none()
    }
}

/// Country to tag outgoing increments with. Without consent the lookup is
/// never performed.
pub async fn session_location(consent: Option<&ConsentRecord>, resolver: &GeoResolver) -> CountryCode {
    match consent {
        Some(record) if record.has_consented => resolver.resolve().await,
        _ => CountryCode::unknown(),
    }
}
