use crate::error::{LoomError, Result};
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// LlmConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_llm_model() -> String {
    "gpt-4".to_string()
}

fn default_max_tokens() -> u32 {
    500
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            model: default_llm_model(),
            max_tokens: default_max_tokens(),
            api_key_env: default_api_key_env(),
        }
    }
}

// ---------------------------------------------------------------------------
// ImagineConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImagineConfig {
    /// Base URL of the image-bot HTTP bridge.
    #[serde(default = "default_imagine_base_url")]
    pub base_url: String,
    #[serde(default = "default_token_env")]
    pub token_env: String,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Host that serves the generated grid images.
    #[serde(default = "default_cdn_base")]
    pub cdn_base: String,
}

fn default_imagine_base_url() -> String {
    "http://127.0.0.1:8062".to_string()
}

fn default_token_env() -> String {
    "IMAGINE_TOKEN".to_string()
}

fn default_poll_interval() -> u64 {
    5
}

fn default_cdn_base() -> String {
    "https://cdn.midjourney.com".to_string()
}

impl Default for ImagineConfig {
    fn default() -> Self {
        Self {
            base_url: default_imagine_base_url(),
            token_env: default_token_env(),
            poll_interval_secs: default_poll_interval(),
            cdn_base: default_cdn_base(),
        }
    }
}

// ---------------------------------------------------------------------------
// BatchConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Delay after every submission. The image service rate-limits bursts.
    #[serde(default = "default_pacing")]
    pub pacing_secs: u64,
    /// Upper bound for each external call; `None` disables the bound.
    #[serde(default = "default_call_timeout")]
    pub call_timeout_secs: Option<u64>,
    #[serde(default = "default_parameter_suffix")]
    pub parameter_suffix: String,
}

fn default_pacing() -> u64 {
    20
}

fn default_call_timeout() -> Option<u64> {
    Some(900)
}

pub fn default_parameter_suffix() -> String {
    "--ar 16:9 --v 6.1 --s 1000".to_string()
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            pacing_secs: default_pacing(),
            call_timeout_secs: default_call_timeout(),
            parameter_suffix: default_parameter_suffix(),
        }
    }
}

impl BatchConfig {
    pub fn pacing(&self) -> Duration {
        Duration::from_secs(self.pacing_secs)
    }

    pub fn call_timeout(&self) -> Option<Duration> {
        self.call_timeout_secs.map(Duration::from_secs)
    }
}

// ---------------------------------------------------------------------------
// ServerConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    5001
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub imagine: ImagineConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

impl Config {
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Err(LoomError::NotInitialized);
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.batch.pacing_secs == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "batch.pacing_secs is 0: submissions will hit the image service back to back"
                    .into(),
            });
        }
        if self.batch.parameter_suffix.trim().is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "batch.parameter_suffix is empty: prompts are submitted without parameters"
                    .into(),
            });
        }
        if self.batch.call_timeout_secs == Some(0) {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "batch.call_timeout_secs is 0: every external call would time out".into(),
            });
        }
        if self.imagine.poll_interval_secs == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "imagine.poll_interval_secs must be at least 1".into(),
            });
        }
        if self.llm.max_tokens == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "llm.max_tokens must be at least 1".into(),
            });
        }

        warnings
    }
}
