//! Application configuration.
//!
//! One TOML file with a section per collaborator. Every field has a default,
//! so an empty file is valid. Credentials may come from the environment,
//! which wins over the file. Values that are empty or still contain a
//! `your_` template marker count as absent.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use signaldesk_core::analysis::{OpenAiNarrative, OpenAiSettings, SignalSynthesizer};
use signaldesk_core::clock::Clock;
use signaldesk_core::data::{
    twelve_data, MarketDataClient, MarketDataConfig, MarketDataVendor, SchedulerConfig,
    TwelveDataVendor,
};
use signaldesk_core::rng::SeedSource;

use crate::brokerage::{AlpacaBrokerage, Brokerage, BrokerageMode};
use crate::notify::{Notifier, TelegramNotifier};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("failed to build {service} client: {reason}")]
    Client {
        service: &'static str,
        reason: String,
    },
}

// ── Environment keys ────────────────────────────────────────────────

pub const ENV_MARKET_DATA_KEY: &str = "TWELVE_DATA_API_KEY";
pub const ENV_NARRATIVE_KEY: &str = "OPENAI_API_KEY";
pub const ENV_BROKER_KEY: &str = "ALPACA_API_KEY";
pub const ENV_BROKER_SECRET: &str = "ALPACA_SECRET_KEY";
pub const ENV_BOT_TOKEN: &str = "TELEGRAM_BOT_TOKEN";
pub const ENV_CHAT_ID: &str = "TELEGRAM_CHAT_ID";

/// True for values that were never filled in.
pub fn is_placeholder(value: &str) -> bool {
    let v = value.trim();
    v.is_empty() || v.contains("your_")
}

/// The trimmed value, unless it is missing or a placeholder.
pub fn configured(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .filter(|v| !is_placeholder(v))
        .map(str::trim)
}

// ── Sections ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketDataSection {
    pub api_key: Option<String>,
    pub base_url: String,
    pub min_interval_ms: u64,
    pub daily_budget: u32,
    pub batch_size: usize,
    pub cache_ttl_secs: i64,
}

impl Default for MarketDataSection {
    fn default() -> Self {
        let defaults = MarketDataConfig::default();
        Self {
            api_key: None,
            base_url: twelve_data::DEFAULT_BASE_URL.to_string(),
            min_interval_ms: defaults.scheduler.min_interval.as_millis() as u64,
            daily_budget: defaults.scheduler.daily_budget,
            batch_size: defaults.batch_size,
            cache_ttl_secs: defaults.cache_ttl.num_seconds(),
        }
    }
}

impl MarketDataSection {
    pub fn client_config(&self) -> MarketDataConfig {
        MarketDataConfig {
            scheduler: SchedulerConfig {
                min_interval: Duration::from_millis(self.min_interval_ms),
                daily_budget: self.daily_budget,
            },
            cache_ttl: chrono::Duration::seconds(self.cache_ttl_secs.max(0)),
            batch_size: self.batch_size,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NarrativeSection {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for NarrativeSection {
    fn default() -> Self {
        let defaults = OpenAiSettings::new(String::new());
        Self {
            api_key: None,
            base_url: defaults.base_url,
            model: defaults.model,
            max_tokens: defaults.max_tokens,
            temperature: defaults.temperature,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerageSection {
    pub api_key: Option<String>,
    pub secret_key: Option<String>,
    pub mode: BrokerageMode,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationSection {
    pub bot_token: Option<String>,
    pub chat_id: Option<String>,
}

/// Per-user knobs consumed by the automation pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Pass mark for evaluation scores.
    pub min_signal_score: f64,
    /// Share of available cash committed to one position, in percent.
    pub max_position_percent: f64,
    pub enable_real_trading: bool,
    pub enable_notifications: bool,
    /// Starting simulator cash.
    pub simulator_balance: f64,
    /// Feed real candle closes to the synthesizer instead of synthetic indicators.
    pub fetch_history: bool,
    pub history_size: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            min_signal_score: 75.0,
            max_position_percent: 10.0,
            enable_real_trading: false,
            enable_notifications: true,
            simulator_balance: 100_000.0,
            fetch_history: false,
            history_size: 90,
        }
    }
}

impl PipelineSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.min_signal_score > 0.0 && self.min_signal_score <= 100.0) {
            return Err(ConfigError::Invalid(format!(
                "pipeline.min_signal_score must be in (0, 100], got {}",
                self.min_signal_score
            )));
        }
        if !(self.max_position_percent > 0.0 && self.max_position_percent <= 100.0) {
            return Err(ConfigError::Invalid(format!(
                "pipeline.max_position_percent must be in (0, 100], got {}",
                self.max_position_percent
            )));
        }
        if !(self.simulator_balance.is_finite() && self.simulator_balance >= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "pipeline.simulator_balance must be a non-negative amount, got {}",
                self.simulator_balance
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    /// Ledger directory. Unset means the platform data dir.
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    pub level: String,
    /// `pretty` or `json`.
    pub format: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

// ── AppConfig ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub market_data: MarketDataSection,
    pub narrative: NarrativeSection,
    pub brokerage: BrokerageSection,
    pub notifications: NotificationSection,
    pub pipeline: PipelineSettings,
    pub store: StoreSection,
    pub logging: LoggingSection,
}

impl AppConfig {
    /// Parse a config from a TOML string. No env overrides, no validation.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load a config file. No env overrides, no validation.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// File (or defaults), then process environment, then validation.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Overlay credentials from `lookup`. Unset or empty keys leave the
    /// file value alone.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get(ENV_MARKET_DATA_KEY) {
            self.market_data.api_key = Some(v);
        }
        if let Some(v) = get(ENV_NARRATIVE_KEY) {
            self.narrative.api_key = Some(v);
        }
        if let Some(v) = get(ENV_BROKER_KEY) {
            self.brokerage.api_key = Some(v);
        }
        if let Some(v) = get(ENV_BROKER_SECRET) {
            self.brokerage.secret_key = Some(v);
        }
        if let Some(v) = get(ENV_BOT_TOKEN) {
            self.notifications.bot_token = Some(v);
        }
        if let Some(v) = get(ENV_CHAT_ID) {
            self.notifications.chat_id = Some(v);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.market_data.batch_size == 0 {
            return Err(ConfigError::Invalid(
                "market_data.batch_size must be at least 1".into(),
            ));
        }
        if self.market_data.daily_budget == 0 {
            return Err(ConfigError::Invalid(
                "market_data.daily_budget must be at least 1".into(),
            ));
        }
        self.pipeline.validate()
    }

    // ── Collaborators ──

    /// Market data client; mock-only when no usable API key is set.
    pub fn market_data_client(&self, clock: Arc<dyn Clock>) -> Result<MarketDataClient, ConfigError> {
        let config = self.market_data.client_config();
        let vendor = match configured(&self.market_data.api_key) {
            Some(key) => {
                let vendor = TwelveDataVendor::with_base_url(key, &self.market_data.base_url)
                    .map_err(|e| ConfigError::Client {
                        service: "market data",
                        reason: e.to_string(),
                    })?;
                Some(Arc::new(vendor) as Arc<dyn MarketDataVendor>)
            }
            None => {
                tracing::info!("no market data API key configured, serving mock data");
                None
            }
        };
        Ok(MarketDataClient::new(vendor, config, clock))
    }

    /// Synthesizer, with narrative enrichment only when a key is set.
    pub fn synthesizer(&self, seeds: SeedSource) -> Result<SignalSynthesizer, ConfigError> {
        let synthesizer = SignalSynthesizer::new(seeds);
        let Some(key) = configured(&self.narrative.api_key) else {
            return Ok(synthesizer);
        };
        let settings = OpenAiSettings {
            api_key: key.to_string(),
            base_url: self.narrative.base_url.clone(),
            model: self.narrative.model.clone(),
            max_tokens: self.narrative.max_tokens,
            temperature: self.narrative.temperature,
        };
        let provider = OpenAiNarrative::new(settings).map_err(|e| ConfigError::Client {
            service: "narrative",
            reason: e.to_string(),
        })?;
        Ok(synthesizer.with_narrative(Arc::new(provider)))
    }

    /// Brokerage adapter when both credentials are set.
    pub fn brokerage(&self) -> Result<Option<Arc<dyn Brokerage>>, ConfigError> {
        let (Some(key), Some(secret)) = (
            configured(&self.brokerage.api_key),
            configured(&self.brokerage.secret_key),
        ) else {
            return Ok(None);
        };
        let broker = AlpacaBrokerage::new(key, secret, self.brokerage.mode).map_err(|e| {
            ConfigError::Client {
                service: "brokerage",
                reason: e.to_string(),
            }
        })?;
        Ok(Some(Arc::new(broker)))
    }

    /// Notifier when both bot token and chat id are set.
    pub fn notifier(&self) -> Result<Option<Arc<dyn Notifier>>, ConfigError> {
        let (Some(token), Some(chat_id)) = (
            configured(&self.notifications.bot_token),
            configured(&self.notifications.chat_id),
        ) else {
            return Ok(None);
        };
        let notifier = TelegramNotifier::new(token, chat_id).map_err(|e| ConfigError::Client {
            service: "notifications",
            reason: e.to_string(),
        })?;
        Ok(Some(Arc::new(notifier)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn empty_file_is_all_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.market_data.min_interval_ms, 8_500);
        assert_eq!(config.market_data.daily_budget, 750);
        assert_eq!(config.market_data.batch_size, 8);
        assert_eq!(config.market_data.cache_ttl_secs, 300);
        assert_eq!(config.pipeline.min_signal_score, 75.0);
        assert_eq!(config.brokerage.mode, BrokerageMode::Paper);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [market_data]
            daily_budget = 100

            [pipeline]
            max_position_percent = 25.0
            fetch_history = true

            [brokerage]
            mode = "live"

            [logging]
            format = "json"
            "#,
        )
        .unwrap();
        assert_eq!(config.market_data.daily_budget, 100);
        assert_eq!(config.market_data.batch_size, 8);
        assert_eq!(config.pipeline.max_position_percent, 25.0);
        assert!(config.pipeline.fetch_history);
        assert_eq!(config.pipeline.history_size, 90);
        assert_eq!(config.brokerage.mode, BrokerageMode::Live);
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn malformed_toml_is_parse_error() {
        let err = AppConfig::from_toml("[market_data\nbatch_size = ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_file_is_read_error() {
        let err = AppConfig::from_file(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn placeholders_count_as_unset() {
        assert!(is_placeholder(""));
        assert!(is_placeholder("   "));
        assert!(is_placeholder("your_api_key_here"));
        assert!(!is_placeholder("abc123"));
        assert_eq!(configured(&Some(" key ".into())), Some("key"));
        assert_eq!(configured(&Some("your_key".into())), None);
        assert_eq!(configured(&None), None);
    }

    #[test]
    fn environment_overrides_file() {
        let mut config = AppConfig::from_toml(
            r#"
            [market_data]
            api_key = "from-file"
            [notifications]
            chat_id = "1"
            "#,
        )
        .unwrap();
        let env: HashMap<&str, &str> = [
            (ENV_MARKET_DATA_KEY, "from-env"),
            (ENV_BOT_TOKEN, "token"),
            (ENV_CHAT_ID, ""),
        ]
        .into_iter()
        .collect();
        config.apply_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.market_data.api_key.as_deref(), Some("from-env"));
        assert_eq!(config.notifications.bot_token.as_deref(), Some("token"));
        // empty env value leaves the file value
        assert_eq!(config.notifications.chat_id.as_deref(), Some("1"));
        assert_eq!(config.narrative.api_key, None);
    }

    #[test]
    fn validation_rejects_out_of_range_values() {
        let mut config = AppConfig::default();
        config.market_data.batch_size = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = AppConfig::default();
        config.market_data.daily_budget = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = AppConfig::default();
        config.pipeline.min_signal_score = 0.0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = AppConfig::default();
        config.pipeline.min_signal_score = 100.0;
        assert!(config.validate().is_ok());

        let mut config = AppConfig::default();
        config.pipeline.max_position_percent = 100.5;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn placeholder_credentials_build_no_collaborators() {
        let mut config = AppConfig::default();
        config.brokerage.api_key = Some("your_alpaca_key".into());
        config.brokerage.secret_key = Some("secret".into());
        config.notifications.bot_token = Some("token".into());
        assert!(config.brokerage().unwrap().is_none());
        assert!(config.notifier().unwrap().is_none());
        assert!(!config.synthesizer(SeedSource::new(1)).unwrap().has_narrative());
    }

    #[test]
    fn scheduler_settings_flow_into_client_config() {
        let mut section = MarketDataSection::default();
        section.min_interval_ms = 100;
        section.cache_ttl_secs = -5;
        let cfg = section.client_config();
        assert_eq!(cfg.scheduler.min_interval, Duration::from_millis(100));
        assert_eq!(cfg.cache_ttl, chrono::Duration::zero());
    }
}
