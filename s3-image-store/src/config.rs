use std::path::PathBuf;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::storage::paths::strip_leading_slash;

/// Seconds in the `Cache-Control: max-age` written on every upload (30 days).
pub const CACHE_MAX_AGE_SECS: u64 = 30 * 24 * 60 * 60;

pub const DEFAULT_MAX_RESOLVE_ATTEMPTS: u32 = 100;

/// Quality bounds handed to the compressor, `min..=max` on a 0-100 scale.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
pub struct QualityRange {
    pub min: u8,
    pub max: u8,
}

impl Default for QualityRange {
    fn default() -> Self {
        Self { min: 65, max: 80 }
    }
}

/// Construction-time settings of the store. Immutable once built; clone it
/// to share between concurrent operations.
#[derive(Clone, Debug, Deserialize)]
#[serde(from = "StoreSettings")]
pub struct StoreConfig {
    access_key_id: Option<String>,
    secret_access_key: Option<String>,
    bucket: String,
    region: String,
    asset_host: Option<String>,
    path_prefix: String,
    endpoint: Option<String>,
    force_path_style: bool,
    conditional_writes: bool,
    max_resolve_attempts: u32,
    quality: QualityRange,
    scratch_dir: Option<PathBuf>,
}

impl StoreConfig {
    pub fn new(bucket: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            access_key_id: None,
            secret_access_key: None,
            bucket: bucket.into(),
            region: region.into(),
            asset_host: None,
            path_prefix: String::new(),
            endpoint: None,
            force_path_style: false,
            conditional_writes: true,
            max_resolve_attempts: DEFAULT_MAX_RESOLVE_ATTEMPTS,
            quality: QualityRange::default(),
            scratch_dir: None,
        }
    }

    pub fn with_credentials(
        mut self,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
    ) -> Self {
        self.access_key_id = Some(access_key_id.into());
        self.secret_access_key = Some(secret_access_key.into());
        self
    }

    pub fn with_asset_host(mut self, host: impl Into<String>) -> Self {
        self.asset_host = Some(host.into());
        self
    }

    /// A single leading `/` is dropped so `"/images"` and `"images"` build
    /// the same keys.
    pub fn with_path_prefix(mut self, prefix: impl AsRef<str>) -> Self {
        self.path_prefix = strip_leading_slash(prefix.as_ref()).to_string();
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_force_path_style(mut self, force: bool) -> Self {
        self.force_path_style = force;
        self
    }

    pub fn with_conditional_writes(mut self, enabled: bool) -> Self {
        self.conditional_writes = enabled;
        self
    }

    pub fn with_max_resolve_attempts(mut self, attempts: u32) -> Self {
        self.max_resolve_attempts = attempts;
        self
    }

    pub fn with_quality(mut self, quality: QualityRange) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bucket.trim().is_empty() {
            return Err(ConfigError::MissingBucket);
        }
        if self.region.trim().is_empty() {
            return Err(ConfigError::MissingRegion);
        }
        if self.access_key_id.is_some() != self.secret_access_key.is_some() {
            return Err(ConfigError::PartialCredentials);
        }
        let QualityRange { min, max } = self.quality;
        if min > max || max > 100 {
            return Err(ConfigError::InvalidQuality { min, max });
        }
        if self.max_resolve_attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }
        Ok(())
    }

    /// Public base URL of stored assets, without a trailing `/`.
    ///
    /// Falls back to the region-derived S3 URL, e.g.
    /// `https://s3.amazonaws.com/<bucket>` for `us-east-1` and
    /// `https://s3-<region>.amazonaws.com/<bucket>` elsewhere.
    pub fn host(&self) -> String {
        match self.asset_host.as_deref() {
            Some(host) if !host.trim().is_empty() => host.trim_end_matches('/').to_string(),
            _ if self.region == "us-east-1" => format!("https://s3.amazonaws.com/{}", self.bucket),
            _ => format!("https://s3-{}.amazonaws.com/{}", self.region, self.bucket),
        }
    }

    pub fn credentials(&self) -> Option<(&str, &str)> {
        self.access_key_id
            .as_deref()
            .zip(self.secret_access_key.as_deref())
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn path_prefix(&self) -> &str {
        &self.path_prefix
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    pub fn force_path_style(&self) -> bool {
        self.force_path_style
    }

    pub fn conditional_writes(&self) -> bool {
        self.conditional_writes
    }

    pub fn max_resolve_attempts(&self) -> u32 {
        self.max_resolve_attempts
    }

    pub fn quality(&self) -> QualityRange {
        self.quality
    }

    pub fn scratch_dir(&self) -> PathBuf {
        self.scratch_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

/// The store settings as the host writes them in its JSON configuration.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoreSettings {
    access_key_id: Option<String>,
    secret_access_key: Option<String>,
    bucket: String,
    region: String,
    asset_host: Option<String>,
    #[serde(default)]
    path_prefix: String,
    endpoint: Option<String>,
    #[serde(default)]
    force_path_style: bool,
    #[serde(default = "default_true")]
    conditional_writes: bool,
    #[serde(default = "default_attempts")]
    max_resolve_attempts: u32,
    #[serde(default)]
    quality: QualityRange,
    scratch_dir: Option<PathBuf>,
}

fn default_true() -> bool {
    true
}

fn default_attempts() -> u32 {
    DEFAULT_MAX_RESOLVE_ATTEMPTS
}

impl From<StoreSettings> for StoreConfig {
    fn from(settings: StoreSettings) -> Self {
        let mut config = StoreConfig::new(settings.bucket, settings.region)
            .with_path_prefix(&settings.path_prefix)
            .with_force_path_style(settings.force_path_style)
            .with_conditional_writes(settings.conditional_writes)
            .with_max_resolve_attempts(settings.max_resolve_attempts)
            .with_quality(settings.quality);
        config.access_key_id = settings.access_key_id;
        config.secret_access_key = settings.secret_access_key;
        config.asset_host = settings.asset_host;
        config.endpoint = settings.endpoint;
        config.scratch_dir = settings.scratch_dir;
        config
    }
}
