use serde::Deserialize;

/// Root application configuration. Loaded from environment variables
/// with the prefix `INSTANT_WIN__`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_node_id")]
    pub node_id: String,
    #[serde(default = "default_seed_demo_data")]
    pub seed_demo_data: bool,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub flow: FlowConfig,
    #[serde(default)]
    pub lottery: LotteryConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

fn default_node_id() -> String {
    "node-01".to_string()
}
fn default_seed_demo_data() -> bool {
    true
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_http_port() -> u16 {
    8080
}
fn default_metrics_enabled() -> bool {
    true
}
fn default_metrics_port() -> u16 {
    9091
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            http_port: default_http_port(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
            port: default_metrics_port(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            node_id: default_node_id(),
            seed_demo_data: default_seed_demo_data(),
            api: ApiConfig::default(),
            metrics: MetricsConfig::default(),
            flow: FlowConfig::default(),
            lottery: LotteryConfig::default(),
        }
    }
}

// ─── Flow Validation Config ─────────────────────────────────────────────

/// Bounds for the path statistics traversal.
#[derive(Debug, Clone, Deserialize)]
pub struct FlowConfig {
    #[serde(default = "default_max_path_depth")]
    pub max_path_depth: usize,
    #[serde(default = "default_max_total_paths")]
    pub max_total_paths: usize,
    /// Hard cap on node expansions during the statistics traversal.
    #[serde(default = "default_max_traversal_steps")]
    pub max_traversal_steps: usize,
}

fn default_max_path_depth() -> usize { 100 }
fn default_max_total_paths() -> usize { 1000 }
fn default_max_traversal_steps() -> usize { 100_000 }

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            max_path_depth: default_max_path_depth(),
            max_total_paths: default_max_total_paths(),
            max_traversal_steps: default_max_traversal_steps(),
        }
    }
}

// ─── Lottery Config ─────────────────────────────────────────────────────

/// Tuning for the probability factors applied to each eligible prize.
#[derive(Debug, Clone, Deserialize)]
pub struct LotteryConfig {
    #[serde(default = "default_fraud_window_hours")]
    pub fraud_window_hours: i64,
    #[serde(default = "default_fraud_heavy_threshold")]
    pub fraud_heavy_threshold: u32,
    #[serde(default = "default_fraud_heavy_factor")]
    pub fraud_heavy_factor: f64,
    #[serde(default = "default_fraud_light_factor")]
    pub fraud_light_factor: f64,
    #[serde(default = "default_value_scale")]
    pub value_scale: f64,
    #[serde(default = "default_value_floor")]
    pub value_floor: f64,
    #[serde(default = "default_low_stock_threshold")]
    pub low_stock_threshold: i64,
    #[serde(default = "default_low_stock_factor")]
    pub low_stock_factor: f64,
    #[serde(default = "default_daily_limit")]
    pub default_daily_limit: u32,
    #[serde(default = "default_max_custom_weight")]
    pub max_custom_weight: f64,
}

fn default_fraud_window_hours() -> i64 { 24 }
fn default_fraud_heavy_threshold() -> u32 { 3 }
fn default_fraud_heavy_factor() -> f64 { 0.1 }
fn default_fraud_light_factor() -> f64 { 0.5 }
fn default_value_scale() -> f64 { 1000.0 }
fn default_value_floor() -> f64 { 0.1 }
fn default_low_stock_threshold() -> i64 { 10 }
fn default_low_stock_factor() -> f64 { 0.5 }
fn default_daily_limit() -> u32 { 1 }
fn default_max_custom_weight() -> f64 { 10.0 }

impl Default for LotteryConfig {
    fn default() -> Self {
        Self {
            fraud_window_hours: default_fraud_window_hours(),
            fraud_heavy_threshold: default_fraud_heavy_threshold(),
            fraud_heavy_factor: default_fraud_heavy_factor(),
            fraud_light_factor: default_fraud_light_factor(),
            value_scale: default_value_scale(),
            value_floor: default_value_floor(),
            low_stock_threshold: default_low_stock_threshold(),
            low_stock_factor: default_low_stock_factor(),
            default_daily_limit: default_daily_limit(),
            max_custom_weight: default_max_custom_weight(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder().add_source(
            config::Environment::with_prefix("INSTANT_WIN")
                .separator("__")
                .try_parsing(true)
                .list_separator(","),
        );

        let config: Self = builder.build()?.try_deserialize()?;
        config.lottery.validate()?;
        Ok(config)
    }
}

/// Longest fraud window accepted from configuration: one year.
const MAX_FRAUD_WINDOW_HOURS: i64 = 24 * 366;

impl LotteryConfig {
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if !(0..=MAX_FRAUD_WINDOW_HOURS).contains(&self.fraud_window_hours) {
            return Err(config::ConfigError::Message(format!(
                "lottery.fraud_window_hours must be within 0..={}, got {}",
                MAX_FRAUD_WINDOW_HOURS, self.fraud_window_hours
            )));
        }
        if !self.max_custom_weight.is_finite() || self.max_custom_weight < 0.0 {
            return Err(config::ConfigError::Message(format!(
                "lottery.max_custom_weight must be a non-negative number, got {}",
                self.max_custom_weight
            )));
        }
        Ok(())
    }
}
