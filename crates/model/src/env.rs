use std::time::Duration;

/// Selects the entry point of the binary, `dispatch` or `workflow`
pub const BRIDGE_HANDLER: &str = "BRIDGE_HANDLER";
/// Default environment variable containing the workflow queue URL
pub const WORKFLOW_QUEUE_URL: &str = "SQS_WORKFLOW_QUEUE_URL";
/// Overrides the table named by the resource properties
pub const TARGET_TABLE_NAME: &str = "TARGET_TABLE_NAME";
pub const MAX_RETRY_ATTEMPTS: &str = "MAX_RETRY_ATTEMPTS";
pub const DISPATCH_BASE_DELAY_MS: &str = "DISPATCH_BASE_DELAY_MS";
pub const MUTATION_BASE_DELAY_MS: &str = "MUTATION_BASE_DELAY_MS";
pub const DELAY_FACTOR: &str = "DELAY_FACTOR";

pub const DEFAULT_MAX_RETRY_ATTEMPTS: u32 = 3;
pub const DEFAULT_DISPATCH_BASE_DELAY_MS: u64 = 5000;
pub const DEFAULT_MUTATION_BASE_DELAY_MS: u64 = 2000;
pub const DEFAULT_DELAY_FACTOR: u32 = 2;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing {0} environment variable")]
    Missing(&'static str),
    #[error("invalid value `{value}` for {name} environment variable")]
    Invalid { name: &'static str, value: String },
}

/// Settings of the bridge, read once at start up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    pub workflow_queue_url: Option<String>,
    pub target_table_name: Option<String>,
    pub max_retry_attempts: u32,
    pub dispatch_base_delay: Duration,
    pub mutation_base_delay: Duration,
    pub delay_factor: u32,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        BridgeConfig {
            workflow_queue_url: None,
            target_table_name: None,
            max_retry_attempts: DEFAULT_MAX_RETRY_ATTEMPTS,
            dispatch_base_delay: Duration::from_millis(DEFAULT_DISPATCH_BASE_DELAY_MS),
            mutation_base_delay: Duration::from_millis(DEFAULT_MUTATION_BASE_DELAY_MS),
            delay_factor: DEFAULT_DELAY_FACTOR,
        }
    }
}

impl BridgeConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from any variable source, unset values take their default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let text = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        Ok(BridgeConfig {
            workflow_queue_url: text(WORKFLOW_QUEUE_URL),
            target_table_name: text(TARGET_TABLE_NAME),
            max_retry_attempts: parse_or(
                MAX_RETRY_ATTEMPTS,
                text(MAX_RETRY_ATTEMPTS),
                DEFAULT_MAX_RETRY_ATTEMPTS,
            )?,
            dispatch_base_delay: Duration::from_millis(parse_or(
                DISPATCH_BASE_DELAY_MS,
                text(DISPATCH_BASE_DELAY_MS),
                DEFAULT_DISPATCH_BASE_DELAY_MS,
            )?),
            mutation_base_delay: Duration::from_millis(parse_or(
                MUTATION_BASE_DELAY_MS,
                text(MUTATION_BASE_DELAY_MS),
                DEFAULT_MUTATION_BASE_DELAY_MS,
            )?),
            delay_factor: parse_or(DELAY_FACTOR, text(DELAY_FACTOR), DEFAULT_DELAY_FACTOR)?,
        })
    }

    pub fn require_workflow_queue_url(&self) -> Result<&str, ConfigError> {
        self.workflow_queue_url
            .as_deref()
            .ok_or(ConfigError::Missing(WORKFLOW_QUEUE_URL))
    }
}

fn parse_or<T: std::str::FromStr>(
    name: &'static str,
    value: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match value {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}
