use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use url::Url;

use crate::bins::{AcceptedCategories, BinPreset};
use crate::detect::labels::MODEL_CLASSES;
use crate::detect::{SyntheticConfig, DEFAULT_LOAD_RETRY};

const DEFAULT_INPUT_WIDTH: u32 = 224;
const DEFAULT_INPUT_HEIGHT: u32 = 224;
const DEFAULT_SOURCE_FPS: u32 = 10;
const DEFAULT_SOURCE_WIDTH: u32 = 640;
const DEFAULT_SOURCE_HEIGHT: u32 = 480;
const DEFAULT_SYNTHETIC_INTERVAL_MS: u64 = 2000;
const DEFAULT_HIT_PROBABILITY: f64 = 0.7;

#[derive(Debug, Deserialize, Default)]
struct SentinelConfigFile {
    backend: Option<BackendConfigFile>,
    triage: Option<TriageConfigFile>,
    source: Option<SourceConfigFile>,
    synthetic: Option<SyntheticConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct BackendConfigFile {
    kind: Option<BackendKind>,
    model_path: Option<PathBuf>,
    input_width: Option<u32>,
    input_height: Option<u32>,
    labels: Option<Vec<String>>,
    remote_url: Option<String>,
    remote_token: Option<String>,
    retry_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct TriageConfigFile {
    bin: Option<BinPreset>,
    accepted: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Default)]
struct SourceConfigFile {
    width: Option<u32>,
    height: Option<u32>,
    fps: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct SyntheticConfigFile {
    interval_ms: Option<u64>,
    hit_probability: Option<f64>,
    seed: Option<u64>,
}

/// Which classifier backend a session starts with.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Synthetic,
    /// ONNX model run in-process (feature `backend-tract`).
    Local,
    /// HTTP image classifier (feature `backend-remote`).
    Remote,
}

impl BackendKind {
    pub fn id(&self) -> &'static str {
        match self {
            BackendKind::Synthetic => "synthetic",
            BackendKind::Local => "local",
            BackendKind::Remote => "remote",
        }
    }
}

impl FromStr for BackendKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "synthetic" | "stub" => Ok(BackendKind::Synthetic),
            "local" | "tract" => Ok(BackendKind::Local),
            "remote" => Ok(BackendKind::Remote),
            other => Err(anyhow!(
                "unknown backend '{}'; expected synthetic, local or remote",
                other
            )),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

#[derive(Debug, Clone)]
pub struct SentinelConfig {
    pub backend: BackendSettings,
    pub triage: TriageSettings,
    pub source: SourceSettings,
    pub synthetic: SyntheticSettings,
}

#[derive(Debug, Clone)]
pub struct BackendSettings {
    pub kind: BackendKind,
    pub model_path: Option<PathBuf>,
    pub input_width: u32,
    pub input_height: u32,
    pub labels: Vec<String>,
    pub remote_url: Option<String>,
    pub remote_token: Option<String>,
    /// Minimum wait before retrying a failed model load or connection.
    pub retry_after: Duration,
}

#[derive(Debug, Clone)]
pub struct TriageSettings {
    pub bin: BinPreset,
    /// Explicit accepted set. Overrides the bin defaults when present.
    pub accepted: Option<Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct SourceSettings {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

#[derive(Debug, Clone)]
pub struct SyntheticSettings {
    pub interval: Duration,
    pub hit_probability: f64,
    pub seed: Option<u64>,
}

impl SentinelConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("SENTINEL_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: SentinelConfigFile) -> Self {
        let backend = file.backend.unwrap_or_default();
        let triage = file.triage.unwrap_or_default();
        let source = file.source.unwrap_or_default();
        let synthetic = file.synthetic.unwrap_or_default();

        Self {
            backend: BackendSettings {
                kind: backend.kind.unwrap_or_default(),
                model_path: backend.model_path,
                input_width: backend.input_width.unwrap_or(DEFAULT_INPUT_WIDTH),
                input_height: backend.input_height.unwrap_or(DEFAULT_INPUT_HEIGHT),
                labels: backend
                    .labels
                    .unwrap_or_else(|| MODEL_CLASSES.iter().map(|c| c.to_string()).collect()),
                remote_url: backend.remote_url,
                remote_token: backend.remote_token,
                retry_after: backend
                    .retry_secs
                    .map(Duration::from_secs)
                    .unwrap_or(DEFAULT_LOAD_RETRY),
            },
            triage: TriageSettings {
                bin: triage.bin.unwrap_or_default(),
                accepted: triage.accepted,
            },
            source: SourceSettings {
                width: source.width.unwrap_or(DEFAULT_SOURCE_WIDTH),
                height: source.height.unwrap_or(DEFAULT_SOURCE_HEIGHT),
                fps: source.fps.unwrap_or(DEFAULT_SOURCE_FPS),
            },
            synthetic: SyntheticSettings {
                interval: Duration::from_millis(
                    synthetic
                        .interval_ms
                        .unwrap_or(DEFAULT_SYNTHETIC_INTERVAL_MS),
                ),
                hit_probability: synthetic
                    .hit_probability
                    .unwrap_or(DEFAULT_HIT_PROBABILITY),
                seed: synthetic.seed,
            },
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(kind) = std::env::var("SENTINEL_BACKEND") {
            if !kind.trim().is_empty() {
                self.backend.kind = kind.parse()?;
            }
        }
        if let Ok(path) = std::env::var("SENTINEL_MODEL_PATH") {
            if !path.trim().is_empty() {
                self.backend.model_path = Some(PathBuf::from(path));
            }
        }
        if let Ok(url) = std::env::var("SENTINEL_REMOTE_URL") {
            if !url.trim().is_empty() {
                self.backend.remote_url = Some(url);
            }
        }
        if let Ok(token) = std::env::var("SENTINEL_REMOTE_TOKEN") {
            if !token.trim().is_empty() {
                self.backend.remote_token = Some(token);
            }
        }
        if let Ok(bin) = std::env::var("SENTINEL_BIN") {
            if !bin.trim().is_empty() {
                self.triage.bin = bin.parse()?;
            }
        }
        if let Ok(accepted) = std::env::var("SENTINEL_ACCEPTED") {
            self.triage.accepted = Some(split_csv(&accepted));
        }
        if let Ok(fps) = std::env::var("SENTINEL_FPS") {
            self.source.fps = fps
                .trim()
                .parse()
                .map_err(|_| anyhow!("SENTINEL_FPS must be a positive integer"))?;
        }
        if let Ok(seed) = std::env::var("SENTINEL_SEED") {
            let seed: u64 = seed
                .trim()
                .parse()
                .map_err(|_| anyhow!("SENTINEL_SEED must be an unsigned integer"))?;
            self.synthetic.seed = Some(seed);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.source.fps == 0 {
            return Err(anyhow!("source fps must be at least 1"));
        }
        if self.source.width == 0 || self.source.height == 0 {
            return Err(anyhow!("source dimensions must be non-zero"));
        }
        if self.backend.input_width == 0 || self.backend.input_height == 0 {
            return Err(anyhow!("model input dimensions must be non-zero"));
        }
        if !(0.0..=1.0).contains(&self.synthetic.hit_probability) {
            return Err(anyhow!("synthetic hit_probability must be within [0, 1]"));
        }
        match self.backend.kind {
            BackendKind::Synthetic => {}
            BackendKind::Local => {
                if self.backend.model_path.is_none() {
                    return Err(anyhow!("local backend requires a model_path"));
                }
                if self.backend.labels.is_empty() {
                    return Err(anyhow!("local backend requires at least one label"));
                }
            }
            BackendKind::Remote => {
                let url = self
                    .backend
                    .remote_url
                    .as_deref()
                    .ok_or_else(|| anyhow!("remote backend requires a remote_url"))?;
                parse_http_url(url)?;
            }
        }
        Ok(())
    }

    /// Accepted set for a new session: the explicit list if configured,
    /// otherwise the selected bin's defaults.
    pub fn accepted(&self) -> AcceptedCategories {
        match &self.triage.accepted {
            Some(list) => list.iter().map(String::as_str).collect(),
            None => self.triage.bin.accepted(),
        }
    }

    pub fn synthetic_config(&self) -> SyntheticConfig {
        SyntheticConfig {
            interval: self.synthetic.interval,
            hit_probability: self.synthetic.hit_probability,
            seed: self.synthetic.seed,
            ..SyntheticConfig::default()
        }
    }

    #[cfg(feature = "backend-tract")]
    pub fn local_model_config(&self) -> Result<crate::detect::LocalModelConfig> {
        let model_path = self
            .backend
            .model_path
            .clone()
            .ok_or_else(|| anyhow!("local backend requires a model_path"))?;
        Ok(crate::detect::LocalModelConfig {
            model_path,
            input_width: self.backend.input_width,
            input_height: self.backend.input_height,
            labels: self.backend.labels.clone(),
            retry_after: self.backend.retry_after,
        })
    }

    #[cfg(feature = "backend-remote")]
    pub fn remote_config(&self) -> Result<crate::detect::RemoteConfig> {
        let url = self
            .backend
            .remote_url
            .clone()
            .ok_or_else(|| anyhow!("remote backend requires a remote_url"))?;
        Ok(crate::detect::RemoteConfig {
            url,
            token: self.backend.remote_token.clone(),
            retry_after: self.backend.retry_after,
        })
    }
}

impl Default for SentinelConfig {
    fn default() -> Self {
        Self::from_file(SentinelConfigFile::default())
    }
}

/// Parse a classifier endpoint, accepting only http and https URLs.
pub fn parse_http_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw).with_context(|| format!("invalid remote_url '{}'", raw))?;
    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(anyhow!(
                "remote_url must use http or https, got '{}': {}",
                other,
                raw
            ))
        }
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(anyhow!("remote_url has no host: {}", raw));
    }
    Ok(url)
}

fn read_config_file(path: &Path) -> Result<SentinelConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("toml"))
        .unwrap_or(false);
    let cfg = if is_toml {
        toml::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_file() {
        let cfg = SentinelConfig::default();
        assert_eq!(cfg.backend.kind, BackendKind::Synthetic);
        assert_eq!(cfg.backend.input_width, 224);
        assert_eq!(cfg.backend.labels.len(), 6);
        assert_eq!(cfg.backend.retry_after, Duration::from_secs(5));
        assert_eq!(cfg.source.fps, 10);
        assert_eq!((cfg.source.width, cfg.source.height), (640, 480));
        assert_eq!(cfg.synthetic.interval, Duration::from_millis(2000));
        assert!(cfg.accepted().contains("recyclables"));
        cfg.validate().unwrap();
    }

    #[test]
    fn explicit_accepted_overrides_bin() {
        let mut cfg = SentinelConfig::default();
        cfg.triage.bin = BinPreset::Black;
        cfg.triage.accepted = Some(vec!["glass".to_string(), "metal".to_string()]);
        let accepted = cfg.accepted();
        assert!(accepted.contains("glass"));
        assert!(!accepted.contains("general-waste"));

        cfg.triage.accepted = Some(Vec::new());
        assert!(cfg.accepted().is_empty());
    }

    #[test]
    fn validation_rejects_bad_settings() {
        let base = SentinelConfig::default();

        let mut cfg = base.clone();
        cfg.source.fps = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = base.clone();
        cfg.synthetic.hit_probability = 1.5;
        assert!(cfg.validate().is_err());

        let mut cfg = base.clone();
        cfg.backend.kind = BackendKind::Local;
        assert!(cfg.validate().is_err());
        cfg.backend.model_path = Some(PathBuf::from("model.onnx"));
        assert!(cfg.validate().is_ok());

        let mut cfg = base;
        cfg.backend.kind = BackendKind::Remote;
        cfg.backend.remote_url = Some("ftp://classifier".to_string());
        assert!(cfg.validate().is_err());
        cfg.backend.remote_url = Some("https://".to_string());
        assert!(cfg.validate().is_err());
        cfg.backend.remote_url = Some("https://classifier.local/v1".to_string());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn remote_url_must_parse() {
        for bad in [
            "http://exa mple.com/v1",
            "http://host:99999/x",
            "https://[::1/x",
            "ftp://classifier.local",
            "classifier.local/v1",
        ] {
            assert!(parse_http_url(bad).is_err(), "accepted {}", bad);
        }
        let url = parse_http_url("https://classifier.local:8443/v1/classify").unwrap();
        assert_eq!(url.host_str(), Some("classifier.local"));
        assert_eq!(url.port(), Some(8443));

        let mut cfg = SentinelConfig::default();
        cfg.backend.kind = BackendKind::Remote;
        cfg.backend.remote_url = Some("http://host:99999/x".to_string());
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn parses_backend_kinds() {
        assert_eq!("Local".parse::<BackendKind>().unwrap(), BackendKind::Local);
        assert_eq!("tract".parse::<BackendKind>().unwrap(), BackendKind::Local);
        assert!("cloud".parse::<BackendKind>().is_err());
    }
}
