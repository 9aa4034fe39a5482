use crate::errors::ClientError;
use crate::models::CountryCode;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

const LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Best-effort IP geolocation. One request, no retries, no caching.
#[derive(Clone)]
pub struct GeoResolver {
    client: Client,
    url: String,
}

impl GeoResolver {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
        }
    }

    /// Never fails: any problem yields the `unknown` sentinel.
    pub async fn resolve(&self) -> CountryCode {
        match self.lookup().await {
            Ok(Some(code)) => code,
            Ok(None) => {
                debug!(url = %self.url, "geolocation response had no usable country_code");
                CountryCode::unknown()
            }
            Err(err) => {
                debug!(url = %self.url, "geolocation lookup failed: {err}");
                CountryCode::unknown()
            }
        }
    }

    async fn lookup(&self) -> Result<Option<CountryCode>, ClientError> {
        let response = self.client.get(&self.url).timeout(LOOKUP_TIMEOUT).send().await?;
        if !response.status().is_success() {
            return Err(ClientError::Status(response.status()));
        }
        let body: Value = serde_json::from_slice(&response.bytes().await?)?;
        Ok(country_from_payload(&body))
    }
}

fn country_from_payload(body: &Value) -> Option<CountryCode> {
    body.get("country_code")
        .and_then(Value::as_str)
        .and_then(CountryCode::parse)
        .filter(|code| !code.is_unknown())
}
