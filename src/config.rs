//! Configuration management

use std::{env, path::Path, sync::Arc, sync::LazyLock, time::Duration};

use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::cache::SignedResultCache;
use crate::crypto::AesBlobCrypter;
use crate::oauth::{BasicOAuthStore, FetcherConfig, OAuthFetcher, TokenPersistence};
use crate::transport::ReqwestFetcher;
use crate::{Error, Result};

/// `${VAR}` or `${VAR:-default}`
static ENV_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(?::-([^}]*))?\}").expect("env pattern is valid")
});

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Environment files to load before expanding `${VAR}` references.
    /// Paths support ~ expansion. Loaded in order, later files override earlier.
    pub env_files: Vec<String>,
    /// Client state sealing
    pub state: StateConfig,
    /// Default signing key
    pub signing: SigningConfig,
    /// Consumer registrations
    pub store: StoreConfig,
    /// Fetch behavior
    pub fetcher: FetcherSettings,
    /// Signed result cache
    pub cache: CacheConfig,
    /// Outbound HTTP
    pub transport: TransportConfig,
}

/// Client state sealing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    /// Master key material (at least 16 bytes); supports `${VAR}`
    pub master_key: String,
    /// Purpose label bound into every sealed blob
    pub label: String,
    /// Oldest state blob accepted, in seconds
    pub max_age_secs: u64,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            master_key: String::new(),
            label: "oauthState".to_string(),
            max_age_secs: 3600,
        }
    }
}

/// Store-wide default signing key
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SigningConfig {
    /// PEM file holding the RSA private key
    pub key_file: Option<String>,
    /// Name of the matching public key, sent as `xoauth_public_key`
    pub key_name: Option<String>,
    /// Consumer key; the container domain is used when unset
    pub consumer_key: Option<String>,
    /// Callback URL for services that use the default key
    pub callback_url: Option<String>,
}

/// Consumer registrations
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// JSON consumer file
    pub consumers_file: Option<String>,
}

/// Fetch behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetcherSettings {
    /// `server` (store) or `client` (sealed state)
    pub token_persistence: TokenPersistence,
    /// Include the exchange trace in `oauthErrorText`
    pub send_trace_to_client: bool,
}

impl Default for FetcherSettings {
    fn default() -> Self {
        Self {
            token_persistence: TokenPersistence::Server,
            send_trace_to_client: true,
        }
    }
}

/// Signed result cache
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Enable result caching
    pub enabled: bool,
    /// Entry lifetime in seconds
    pub ttl_secs: u64,
    /// Maximum number of entries
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            ttl_secs: 30,
            max_entries: 1000,
        }
    }
}

/// Outbound HTTP
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}

impl Config {
    /// Load configuration from file and environment
    ///
    /// # Errors
    ///
    /// Returns an error if the config file does not exist or cannot be parsed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new();

        if let Some(p) = path {
            if !p.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            figment = figment.merge(Yaml::file(p));
        }

        // GADGET_OAUTH_STATE__MASTER_KEY -> state.master_key
        figment = figment.merge(Env::prefixed("GADGET_OAUTH_").split("__"));

        let mut config: Self = figment
            .extract()
            .map_err(|e| Error::Config(e.to_string()))?;

        config.load_env_files();
        config.expand_env_vars();

        Ok(config)
    }

    /// Load environment files into the process environment.
    /// Files that don't exist are skipped.
    fn load_env_files(&self) {
        for path_str in &self.env_files {
            let expanded = match (path_str.strip_prefix('~'), dirs::home_dir()) {
                (Some(rest), Some(home)) => format!("{}{rest}", home.display()),
                _ => path_str.clone(),
            };

            let path = Path::new(&expanded);
            if !path.exists() {
                tracing::debug!("Env file not found (skipped): {expanded}");
                continue;
            }
            match dotenvy::from_path(path) {
                Ok(()) => tracing::info!("Loaded env file: {expanded}"),
                Err(e) => tracing::warn!("Failed to load env file {expanded}: {e}"),
            }
        }
    }

    /// Expand `${VAR}` in secrets and paths
    fn expand_env_vars(&mut self) {
        self.state.master_key = expand_env(&self.state.master_key);
        for value in [
            &mut self.signing.key_file,
            &mut self.signing.key_name,
            &mut self.signing.consumer_key,
            &mut self.signing.callback_url,
            &mut self.store.consumers_file,
        ]
        .into_iter()
        .flatten()
        {
            *value = expand_env(value);
        }
    }

    /// Crypter for client state
    pub fn build_crypter(&self) -> Result<AesBlobCrypter> {
        if self.state.master_key.is_empty() {
            return Err(Error::Config(
                "state.master_key must be set (GADGET_OAUTH_STATE__MASTER_KEY)".to_string(),
            ));
        }
        AesBlobCrypter::new(self.state.master_key.as_bytes(), &self.state.label)
    }

    /// Store populated from the consumer file and default key
    pub fn build_store(&self) -> Result<BasicOAuthStore> {
        let store = BasicOAuthStore::new();
        if let Some(file) = &self.store.consumers_file {
            store.load_consumers_file(Path::new(file))?;
        }
        if let Some(key_file) = &self.signing.key_file {
            store.load_default_key(
                Path::new(key_file),
                self.signing.consumer_key.as_deref(),
                self.signing.key_name.as_deref(),
                self.signing.callback_url.as_deref(),
            )?;
        }
        Ok(store)
    }

    /// Fetcher behavior
    #[must_use]
    pub fn fetcher_config(&self) -> FetcherConfig {
        FetcherConfig {
            token_persistence: self.fetcher.token_persistence,
            send_trace_to_client: self.fetcher.send_trace_to_client,
            state_max_age: Duration::from_secs(self.state.max_age_secs),
        }
    }

    /// Result cache, when enabled
    #[must_use]
    pub fn build_cache(&self) -> Option<SignedResultCache> {
        self.cache.enabled.then(|| {
            SignedResultCache::new(Duration::from_secs(self.cache.ttl_secs), self.cache.max_entries)
        })
    }

    /// Fully wired fetcher over the reqwest transport
    pub fn build_fetcher(&self) -> Result<OAuthFetcher> {
        let transport = ReqwestFetcher::new(Duration::from_secs(self.transport.timeout_secs))?;
        let fetcher = OAuthFetcher::new(
            Arc::new(self.build_store()?),
            Arc::new(transport),
            Arc::new(self.build_crypter()?),
            self.fetcher_config(),
        );
        Ok(match self.build_cache() {
            Some(cache) => fetcher.with_cache(Arc::new(cache)),
            None => fetcher,
        })
    }
}

/// Expand `${VAR}` and `${VAR:-default}` from the process environment.
/// Unset variables without a default expand to the empty string.
#[must_use]
pub fn expand_env(value: &str) -> String {
    ENV_PATTERN
        .replace_all(value, |caps: &regex::Captures| {
            let var_name = &caps[1];
            let default = caps.get(2).map_or("", |m| m.as_str());
            env::var(var_name).unwrap_or_else(|_| default.to_string())
        })
        .into_owned()
}
