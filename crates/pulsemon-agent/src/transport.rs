use anyhow::Context;
use reqwest::header;
use std::time::Duration;

use pulsemon_common::types::Metric;
use pulsemon_common::{compress, retry, sign, url};

use crate::config::{AgentConfig, Compression, ReportMode};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(1);
const UPDATE_PATH: &str = "/update/";
const UPDATES_PATH: &str = "/updates/";

/// Outbound HTTP transport for the reporter. Owns the client pool and
/// applies the configured encoding, compression, signing, and retry.
#[derive(Clone)]
pub struct Transport {
    client: reqwest::Client,
    base: String,
    mode: ReportMode,
    compress: Compression,
    batch: bool,
    key: Option<String>,
}

impl Transport {
    pub fn new(config: &AgentConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("cannot build HTTP client")?;
        Ok(Self {
            client,
            base: url::base_url(&config.address),
            mode: config.report_mode,
            compress: config.compress,
            batch: config.batch,
            key: (!config.key.is_empty()).then(|| config.key.clone()),
        })
    }

    /// Sends one drained batch of metrics per the configured encoding.
    pub async fn report(&self, metrics: &[Metric]) -> anyhow::Result<()> {
        if metrics.is_empty() {
            anyhow::bail!("no metrics to send");
        }
        match (self.batch, self.mode, self.compress) {
            (false, ReportMode::Raw, _) => self.send_raw(metrics).await,
            (false, ReportMode::Json, _) => self.send_single(metrics).await,
            (true, _, _) => self.send_batch(metrics).await,
        }
    }

    /// One empty-bodied POST per metric, value encoded in the path.
    async fn send_raw(&self, metrics: &[Metric]) -> anyhow::Result<()> {
        for metric in metrics {
            let target = url::update_url(&self.base, metric);
            tracing::debug!(url = %target, "raw update");
            let response = retry::with_backoff(|| {
                self.client
                    .post(&target)
                    .header(header::CONTENT_TYPE, "text/plain")
                    .send()
            })
            .await
            .context("sending metrics to server")?;
            self.log_status(response.status());
        }
        Ok(())
    }

    /// One JSON envelope per request.
    async fn send_single(&self, metrics: &[Metric]) -> anyhow::Result<()> {
        for metric in metrics {
            let body = serde_json::to_vec(metric)?;
            self.post_json(UPDATE_PATH, body).await?;
        }
        Ok(())
    }

    /// All envelopes in one JSON array.
    async fn send_batch(&self, metrics: &[Metric]) -> anyhow::Result<()> {
        let body = serde_json::to_vec(metrics)?;
        self.post_json(UPDATES_PATH, body).await
    }

    async fn post_json(&self, path: &str, body: Vec<u8>) -> anyhow::Result<()> {
        let target = format!("{}{}", self.base, path);
        let gzipped = self.compress == Compression::Gzip;
        let body = if gzipped {
            compress::compress(&body).context("cannot compress request body")?
        } else {
            body
        };
        // The signature covers the bytes actually sent, after compression.
        let signature = self
            .key
            .as_deref()
            .map(|key| sign::signature(key, &body));

        let response = retry::with_backoff(|| {
            let mut request = self
                .client
                .post(&target)
                .header(header::CONTENT_TYPE, "application/json")
                .body(body.clone());
            if gzipped {
                request = request.header(header::CONTENT_ENCODING, "gzip");
            }
            if let Some(signature) = &signature {
                request = request.header(sign::SIGNATURE_HEADER, signature);
            }
            request.send()
        })
        .await
        .context("sending metrics to server")?;
        self.log_status(response.status());
        Ok(())
    }

    fn log_status(&self, status: reqwest::StatusCode) {
        if status.is_success() {
            tracing::debug!(status = %status, "metrics delivered");
        } else {
            tracing::info!(status = %status, "server answered with an error code");
        }
    }
}
