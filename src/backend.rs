//! The counter service contract the game client talks to, and its HTTP
//! implementation.

use crate::errors::ClientError;
use crate::models::{ChangeEvent, CountryCode, CountryTaps, IncrementRequest, TotalResponse};
use futures::stream::{self, BoxStream, StreamExt};
use reqwest::{Client, Response, header};
use std::{collections::VecDeque, future::Future, time::Duration};
use tracing::{debug, warn};

pub type ChangeStream = BoxStream<'static, ChangeEvent>;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Remote counter service. Increments are fire-and-forget from the caller's
/// point of view: there is no dedup key and no acknowledgement beyond the
/// call's own result.
pub trait CounterBackend: Send + Sync + 'static {
    /// Atomically adds `amount` to the global total and to `country`'s row.
    fn increment_taps(
        &self,
        country: &CountryCode,
        amount: u64,
    ) -> impl Future<Output = Result<(), ClientError>> + Send;

    fn global_total(&self) -> impl Future<Output = Result<u64, ClientError>> + Send;

    /// Rows ordered by tap count descending.
    fn top_countries(
        &self,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<CountryTaps>, ClientError>> + Send;

    fn subscribe_changes(&self) -> impl Future<Output = Result<ChangeStream, ClientError>> + Send;
}

#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let client = Client::builder().connect_timeout(CONNECT_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

fn ensure_success(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(ClientError::Status(status))
    }
}

impl CounterBackend for HttpBackend {
    async fn increment_taps(&self, country: &CountryCode, amount: u64) -> Result<(), ClientError> {
        let request = IncrementRequest {
            country_code: country.as_str().to_string(),
            amount,
        };
        let response = self
            .client
            .post(self.url("/rpc/increment_taps"))
            .timeout(REQUEST_TIMEOUT)
            .json(&request)
            .send()
            .await?;
        ensure_success(response)?;
        Ok(())
    }

    async fn global_total(&self) -> Result<u64, ClientError> {
        let response = self
            .client
            .get(self.url("/api/total"))
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;
        let body: TotalResponse = ensure_success(response)?.json().await?;
        Ok(body.total_taps)
    }

    async fn top_countries(&self, limit: usize) -> Result<Vec<CountryTaps>, ClientError> {
        let response = self
            .client
            .get(self.url(&format!("/api/leaderboard?limit={limit}")))
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;
        Ok(ensure_success(response)?.json().await?)
    }

    async fn subscribe_changes(&self) -> Result<ChangeStream, ClientError> {
        let response = self
            .client
            .get(self.url("/api/changes"))
            .header(header::ACCEPT, "text/event-stream")
            .send()
            .await?;
        let body = Box::pin(ensure_success(response)?.bytes_stream());

        let events = stream::unfold(
            (body, EventStreamDecoder::default(), VecDeque::new()),
            |(mut body, mut decoder, mut ready)| async move {
                loop {
                    if let Some(event) = ready.pop_front() {
                        return Some((event, (body, decoder, ready)));
                    }
                    match body.next().await {
                        Some(Ok(chunk)) => ready.extend(decoder.push(&chunk)),
                        Some(Err(err)) => {
                            warn!("change stream interrupted: {err}");
                            return None;
                        }
                        None => return None,
                    }
                }
            },
        );
        Ok(events.boxed())
    }
}

/// Incremental `text/event-stream` framing. Only `data:` fields matter here.
#[derive(Debug, Default)]
struct EventStreamDecoder {
    buffer: Vec<u8>,
}

impl EventStreamDecoder {
    fn push(&mut self, chunk: &[u8]) -> Vec<ChangeEvent> {
        self.buffer.extend(chunk.iter().copied().filter(|b| *b != b'\r'));

        let mut events = Vec::new();
        while let Some(end) = self.buffer.windows(2).position(|w| w == b"\n\n") {
            let frame: Vec<u8> = self.buffer.drain(..end + 2).collect();
            let frame = String::from_utf8_lossy(&frame);
            let data: Vec<&str> = frame
                .lines()
                .filter_map(|line| line.strip_prefix("data:"))
                .map(|value| value.strip_prefix(' ').unwrap_or(value))
                .collect();
            if data.is_empty() {
                continue;
            }
            match serde_json::from_str(&data.join("\n")) {
                Ok(event) => events.push(event),
                Err(err) => debug!("skipping unrecognised change event: {err}"),
            }
        }
        events
    }
}
