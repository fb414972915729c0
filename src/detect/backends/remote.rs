#![cfg(feature = "backend-remote")]

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;
use url::Url;

use crate::config::parse_http_url;
use crate::detect::backend::ClassifierBackend;
use crate::detect::decode::{classifications_to_detections, Classification};
use crate::detect::lazy::LazyModel;
use crate::detect::result::Detection;
use crate::frame::Frame;

const JPEG_QUALITY: u8 = 80;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone, Debug)]
pub struct RemoteConfig {
    /// Image-classification endpoint. Receives a JPEG body, answers with a JSON
    /// array of `{"label": .., "score": ..}`.
    pub url: String,
    /// Optional bearer token.
    pub token: Option<String>,
    pub retry_after: Duration,
}

struct RemoteClient {
    agent: ureq::Agent,
    url: Url,
    token: Option<String>,
}

impl RemoteClient {
    fn connect(config: &RemoteConfig) -> Result<Self> {
        let url = parse_http_url(&config.url)?;
        let agent = ureq::AgentBuilder::new().timeout(REQUEST_TIMEOUT).build();
        Ok(Self {
            agent,
            url,
            token: config.token.clone(),
        })
    }

    fn classify(&self, jpeg: &[u8]) -> Result<Vec<Classification>> {
        let mut request = self
            .agent
            .post(self.url.as_str())
            .set("Content-Type", "image/jpeg");
        if let Some(token) = &self.token {
            request = request.set("Authorization", &format!("Bearer {}", token));
        }
        let body = request
            .send_bytes(jpeg)
            .context("remote classifier request failed")?
            .into_string()
            .context("remote classifier response was not text")?;
        serde_json::from_str(&body).context("remote classifier returned unexpected JSON")
    }
}

fn encode_jpeg(frame: &Frame) -> Result<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY)
        .encode(
            frame.pixels(),
            frame.width(),
            frame.height(),
            ExtendedColorType::Rgb8,
        )
        .context("failed to encode frame as JPEG")?;
    Ok(buf.into_inner())
}

/// Remote whole-frame classifier.
///
/// The HTTP call is blocking, so it runs on tokio's blocking pool while the
/// pipeline task awaits it. Results are mapped to bin categories and given a
/// centred placeholder box (see `classifications_to_detections`).
pub struct RemoteBackend {
    config: RemoteConfig,
    client: LazyModel<Arc<RemoteClient>>,
}

impl RemoteBackend {
    pub fn new(config: RemoteConfig) -> Self {
        let client = LazyModel::new("remote").with_retry(config.retry_after);
        Self { config, client }
    }
}

#[async_trait]
impl ClassifierBackend for RemoteBackend {
    fn name(&self) -> &'static str {
        "remote"
    }

    fn is_ready(&self) -> bool {
        self.client.is_loaded()
    }

    fn reload(&mut self) -> Result<()> {
        self.client.reset();
        Ok(())
    }

    async fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        let config = &self.config;
        let Some(client) = self
            .client
            .get_or_load(|| RemoteClient::connect(config).map(Arc::new))
        else {
            return Ok(Vec::new());
        };
        let client = Arc::clone(client);
        let owned = frame.clone();

        let results = tokio::task::spawn_blocking(move || {
            let jpeg = encode_jpeg(&owned)?;
            client.classify(&jpeg)
        })
        .await
        .context("remote classifier task panicked")??;

        Ok(classifications_to_detections(&results, frame.size()))
    }
}
