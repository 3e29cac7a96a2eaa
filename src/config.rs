use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};

const APP_NAME: &str = "nlsh";
const DEFAULT_THRESHOLD: u8 = 70;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub provider: String,
    pub model: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyConfig {
    pub confidence_threshold: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BehaviorConfig {
    /// How many past interactions are folded into the generation prompt.
    pub history_window: usize,
    pub max_output_lines: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryConfig {
    pub enabled: bool,
    pub refresh_interval_days: u32,
    pub max_tools: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub llm: Option<LlmConfig>,
    #[serde(default)]
    pub verify: VerifyConfig,
    #[serde(default)]
    pub behavior: BehaviorConfig,
    #[serde(default)]
    pub inventory: InventoryConfig,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            history_window: 5,
            max_output_lines: 100,
        }
    }
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            refresh_interval_days: 7,
            max_tools: 120,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm: None,
            verify: VerifyConfig::default(),
            behavior: BehaviorConfig::default(),
            inventory: InventoryConfig::default(),
        }
    }
}

impl Config {
    /// Configured provider credentials, or None when setup hasn't run.
    /// Ollama is the one provider that works without a key.
    pub fn active_provider(&self) -> Option<&LlmConfig> {
        self.llm
            .as_ref()
            .filter(|llm| !llm.provider.is_empty())
            .filter(|llm| !llm.api_key.is_empty() || llm.provider == "ollama")
    }

    pub fn confidence_threshold(&self) -> u8 {
        self.verify.confidence_threshold.min(100)
    }
}

pub fn get_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
        .join("config.toml")
}

pub fn load_config() -> Config {
    let path = get_config_path();
    if path.exists() {
        if let Ok(content) = fs::read_to_string(&path) {
            if let Ok(config) = toml::from_str(&content) {
                return config;
            }
        }
    }
    Config::default()
}

pub fn save_config(config: &Config) -> std::io::Result<()> {
    let path = get_config_path();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(config)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    fs::write(path, content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_provider_until_setup() {
        assert!(Config::default().active_provider().is_none());
    }

    #[test]
    fn provider_needs_a_key_except_ollama() {
        let mut config = Config {
            llm: Some(LlmConfig {
                provider: "openai".to_string(),
                model: "gpt-4o-mini".to_string(),
                api_key: String::new(),
                endpoint: None,
            }),
            ..Config::default()
        };
        assert!(config.active_provider().is_none());

        config.llm.as_mut().unwrap().api_key = "sk-test".to_string();
        assert!(config.active_provider().is_some());

        config.llm = Some(LlmConfig {
            provider: "ollama".to_string(),
            model: "llama3.2".to_string(),
            api_key: String::new(),
            endpoint: None,
        });
        assert!(config.active_provider().is_some());
    }

    #[test]
    fn threshold_is_clamped() {
        let config = Config {
            verify: VerifyConfig {
                confidence_threshold: 250,
            },
            ..Config::default()
        };
        assert_eq!(config.confidence_threshold(), 100);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [llm]
            provider = "anthropic"
            model = "claude-3-5-haiku-latest"
            api_key = "sk-test"
            "#,
        )
        .unwrap();
        assert_eq!(config.verify.confidence_threshold, DEFAULT_THRESHOLD);
        assert_eq!(config.llm.unwrap().provider, "anthropic");
    }
}
