//! Configuration types for teletv

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Largest chunk a transport is asked for in one read
pub const MAX_CHUNK_SIZE: usize = 16 * 1024 * 1024;

/// App identifier and secret issued by the messaging service
///
/// These are read from the settings store, never from [`Config`].
#[derive(Clone, PartialEq, Eq)]
pub struct AppCredentials {
    /// Numeric app identifier
    pub api_id: i32,
    /// App secret
    pub api_hash: String,
}

impl AppCredentials {
    /// Validate the stored string forms of the credentials
    ///
    /// The identifier must be a base-10 integer and the secret must not be blank.
    pub fn parse(api_id: &str, api_hash: &str) -> Result<Self> {
        let api_id = api_id.trim();
        let api_hash = api_hash.trim();

        let id = api_id.parse::<i32>().map_err(|e| {
            Error::config(
                format!("app identifier {:?} is not a number: {}", api_id, e),
                crate::storage::keys::API_ID,
            )
        })?;
        if id <= 0 {
            return Err(Error::config(
                format!("app identifier must be positive, got {}", id),
                crate::storage::keys::API_ID,
            ));
        }
        if api_hash.is_empty() {
            return Err(Error::config(
                "app secret is empty",
                crate::storage::keys::API_HASH,
            ));
        }

        Ok(Self {
            api_id: id,
            api_hash: api_hash.to_string(),
        })
    }
}

impl std::fmt::Debug for AppCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppCredentials")
            .field("api_id", &self.api_id)
            .field("api_hash", &"<redacted>")
            .finish()
    }
}

/// Disk space preflight before an acquisition starts
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DiskSpaceConfig {
    /// Check free space before opening the cache slot (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Space to keep free beyond the media length (default: 64 MiB)
    #[serde(default = "default_min_free_space")]
    pub min_free_space: u64,
}

impl Default for DiskSpaceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_free_space: default_min_free_space(),
        }
    }
}

/// Media acquisition settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AcquisitionConfig {
    /// Directory holding the cache slot (default: "./cache")
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// File name of the single reusable cache slot (default: "current_video")
    #[serde(default = "default_slot_file_name")]
    pub slot_file_name: String,

    /// Bytes requested per chunk read (default: 1 MiB)
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Free space preflight
    #[serde(default)]
    pub disk_space: DiskSpaceConfig,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            slot_file_name: default_slot_file_name(),
            chunk_size: default_chunk_size(),
            disk_space: DiskSpaceConfig::default(),
        }
    }
}

impl AcquisitionConfig {
    /// Full path of the cache slot file
    pub fn slot_path(&self) -> PathBuf {
        self.cache_dir.join(&self.slot_file_name)
    }
}

/// Delay policy between repeated attempts
///
/// Login polling uses [`RetryPolicy::Fixed`]: the remote token lives only a
/// few tens of seconds, so the next poll must not drift past its lifetime.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RetryPolicy {
    /// Same delay before every attempt
    Fixed {
        /// Delay between attempts
        #[serde(with = "duration_serde")]
        delay: Duration,
    },
    /// Delay grows by `multiplier` per attempt, capped at `max_delay`
    Exponential {
        /// Delay before the first retry
        #[serde(with = "duration_serde")]
        initial_delay: Duration,
        /// Upper bound
        #[serde(with = "duration_serde")]
        max_delay: Duration,
        /// Growth factor
        multiplier: f64,
    },
}

/// Login polling settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoginConfig {
    /// Delay between token requests while a token is pending (default: fixed 2 s)
    #[serde(default = "default_poll_policy")]
    pub poll_policy: RetryPolicy,

    /// Delay after a transport failure while polling (default: fixed 3 s)
    #[serde(default = "default_transport_retry_policy")]
    pub transport_retry_policy: RetryPolicy,

    /// Account ids already logged in on this device, excluded by the remote
    #[serde(default)]
    pub except_ids: Vec<i64>,
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self {
            poll_policy: default_poll_policy(),
            transport_retry_policy: default_transport_retry_policy(),
            except_ids: vec![],
        }
    }
}

/// Navigation settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NavigationConfig {
    /// Delay before handing focus to the new screen (default: 150 ms)
    #[serde(default = "default_focus_delay", with = "duration_serde")]
    pub focus_delay: Duration,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            focus_delay: default_focus_delay(),
        }
    }
}

/// Listing sizes
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ListingConfig {
    /// Conversations fetched for the channel screen (default: 30)
    #[serde(default = "default_conversation_limit")]
    pub conversation_limit: usize,

    /// Video posts fetched per channel (default: 20)
    #[serde(default = "default_media_limit")]
    pub media_limit: usize,

    /// Search results fetched per query (default: 20)
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            conversation_limit: default_conversation_limit(),
            media_limit: default_media_limit(),
            search_limit: default_search_limit(),
        }
    }
}

/// Retry configuration for transient connection failures
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 5)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 30 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

/// Settings database location
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Settings database path (default: "./teletv.db")
    #[serde(default = "default_settings_path")]
    pub settings_path: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            settings_path: default_settings_path(),
        }
    }
}

/// Main configuration for the application context
///
/// Every field has a default, so `Config::default()` is a working setup and a
/// JSON document only needs the values it changes.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Media acquisition
    #[serde(default)]
    pub acquisition: AcquisitionConfig,

    /// Login polling
    #[serde(default)]
    pub login: LoginConfig,

    /// Navigation
    #[serde(default)]
    pub navigation: NavigationConfig,

    /// Listing sizes
    #[serde(default)]
    pub listing: ListingConfig,

    /// Connection retry
    #[serde(default)]
    pub connect: RetryConfig,

    /// Settings persistence
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

impl Config {
    /// Check value ranges that serde cannot express
    pub fn validate(&self) -> Result<()> {
        let chunk = self.acquisition.chunk_size;
        if chunk == 0 || chunk > MAX_CHUNK_SIZE {
            return Err(Error::config(
                format!("chunk size must be between 1 and {MAX_CHUNK_SIZE} bytes, got {chunk}"),
                "acquisition.chunk_size",
            ));
        }
        if self.acquisition.slot_file_name.trim().is_empty() {
            return Err(Error::config(
                "cache slot file name is empty",
                "acquisition.slot_file_name",
            ));
        }
        validate_login_policy(&self.login.poll_policy, "login.poll_policy")?;
        validate_login_policy(
            &self.login.transport_retry_policy,
            "login.transport_retry_policy",
        )?;
        if self.listing.conversation_limit == 0 || self.listing.media_limit == 0 {
            return Err(Error::config(
                "listing limits must be greater than zero",
                "listing",
            ));
        }
        if !is_growth_factor(self.connect.backoff_multiplier) {
            return Err(Error::config(
                "backoff multiplier must be at least 1.0",
                "connect.backoff_multiplier",
            ));
        }
        Ok(())
    }

    /// Parse a JSON configuration document and validate it
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("./cache")
}

fn default_slot_file_name() -> String {
    "current_video".to_string()
}

fn default_chunk_size() -> usize {
    1024 * 1024
}

fn default_min_free_space() -> u64 {
    64 * 1024 * 1024
}

fn default_true() -> bool {
    true
}

fn default_poll_policy() -> RetryPolicy {
    RetryPolicy::Fixed {
        delay: Duration::from_secs(2),
    }
}

fn default_transport_retry_policy() -> RetryPolicy {
    RetryPolicy::Fixed {
        delay: Duration::from_secs(3),
    }
}

fn default_focus_delay() -> Duration {
    Duration::from_millis(150)
}

fn default_conversation_limit() -> usize {
    30
}

fn default_media_limit() -> usize {
    20
}

fn default_search_limit() -> usize {
    20
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_settings_path() -> PathBuf {
    PathBuf::from("./teletv.db")
}

// Durations are written as milliseconds
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

fn is_growth_factor(multiplier: f64) -> bool {
    multiplier.is_finite() && multiplier >= 1.0
}

/// Login loops wait without an attempt limit, so every delay must be positive and bounded
fn validate_login_policy(policy: &RetryPolicy, key: &str) -> Result<()> {
    if policy.is_zero() {
        return Err(Error::config("login delays must be greater than zero", key));
    }
    if let RetryPolicy::Exponential { multiplier, .. } = policy
        && !is_growth_factor(*multiplier)
    {
        return Err(Error::config(
            format!("backoff multiplier must be a finite value of at least 1.0, got {multiplier}"),
            key,
        ));
    }
    Ok(())
}
