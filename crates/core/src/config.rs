use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub oracle: OracleConfig,
    pub runtime: RuntimeConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct OracleConfig {
    pub provider: OracleProvider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct RuntimeConfig {
    /// Cap on tool-call/handoff rounds within a single turn.
    pub max_rounds: u32,
    pub tool_timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OracleProvider {
    OpenAi,
    Anthropic,
    Ollama,
    Rules,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            oracle: OracleConfig {
                provider: OracleProvider::Rules,
                api_key: None,
                base_url: None,
                model: "rules".to_string(),
                timeout_secs: 30,
            },
            runtime: RuntimeConfig { max_rounds: 8, tool_timeout_secs: 10 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for OracleProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "anthropic" => Ok(Self::Anthropic),
            "ollama" => Ok(Self::Ollama),
            "rules" => Ok(Self::Rules),
            other => Err(ConfigError::Validation(format!(
                "unsupported oracle provider `{other}` (expected openai|anthropic|ollama|rules)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    oracle: Option<OraclePatch>,
    runtime: Option<RuntimePatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct OraclePatch {
    provider: Option<OracleProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct RuntimePatch {
    max_rounds: Option<u32>,
    tool_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("skydesk.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(oracle) = patch.oracle {
            if let Some(provider) = oracle.provider {
                self.oracle.provider = provider;
            }
            if let Some(api_key_value) = oracle.api_key {
                self.oracle.api_key = Some(api_key_value.into());
            }
            if let Some(base_url) = oracle.base_url {
                self.oracle.base_url = Some(base_url);
            }
            if let Some(model) = oracle.model {
                self.oracle.model = model;
            }
            if let Some(timeout_secs) = oracle.timeout_secs {
                self.oracle.timeout_secs = timeout_secs;
            }
        }

        if let Some(runtime) = patch.runtime {
            if let Some(max_rounds) = runtime.max_rounds {
                self.runtime.max_rounds = max_rounds;
            }
            if let Some(tool_timeout_secs) = runtime.tool_timeout_secs {
                self.runtime.tool_timeout_secs = tool_timeout_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("SKYDESK_ORACLE_PROVIDER") {
            self.oracle.provider = value.parse()?;
        }
        if let Some(value) = read_env("SKYDESK_ORACLE_API_KEY") {
            self.oracle.api_key = Some(value.into());
        }
        if let Some(value) = read_env("SKYDESK_ORACLE_BASE_URL") {
            self.oracle.base_url = Some(value);
        }
        if let Some(value) = read_env("SKYDESK_ORACLE_MODEL") {
            self.oracle.model = value;
        }
        if let Some(value) = read_env("SKYDESK_ORACLE_TIMEOUT_SECS") {
            self.oracle.timeout_secs = parse_u64("SKYDESK_ORACLE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("SKYDESK_RUNTIME_MAX_ROUNDS") {
            self.runtime.max_rounds = parse_u32("SKYDESK_RUNTIME_MAX_ROUNDS", &value)?;
        }
        if let Some(value) = read_env("SKYDESK_RUNTIME_TOOL_TIMEOUT_SECS") {
            self.runtime.tool_timeout_secs =
                parse_u64("SKYDESK_RUNTIME_TOOL_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("SKYDESK_LOG_LEVEL") {
            self.logging.level = value;
        }
        if let Some(value) = read_env("SKYDESK_LOG_FORMAT") {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.runtime.max_rounds == 0 {
            return Err(ConfigError::Validation(
                "runtime.max_rounds must be at least 1".to_string(),
            ));
        }
        if self.oracle.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "oracle.timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.runtime.tool_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "runtime.tool_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.oracle.provider != OracleProvider::Rules && self.oracle.model.trim().is_empty() {
            return Err(ConfigError::Validation("oracle.model must not be empty".to_string()));
        }
        Ok(())
    }
}

fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.exists().then(|| path.to_path_buf());
    }
    let default = PathBuf::from("skydesk.toml");
    default.exists().then_some(default)
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;
    toml::from_str(&raw)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::{Mutex, OnceLock};

    use super::{AppConfig, ConfigError, LoadOptions, LogFormat, OracleProvider};

    // Env-var mutation is process-global; serialize tests that touch it.
    fn env_lock() -> &'static Mutex<()> {
        static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        LOCK.get_or_init(|| Mutex::new(()))
    }

    fn with_env(vars: &[(&str, &str)], body: impl FnOnce()) {
        let _guard = env_lock().lock().unwrap();
        let keys = [
            "SKYDESK_ORACLE_PROVIDER",
            "SKYDESK_ORACLE_API_KEY",
            "SKYDESK_ORACLE_BASE_URL",
            "SKYDESK_ORACLE_MODEL",
            "SKYDESK_ORACLE_TIMEOUT_SECS",
            "SKYDESK_RUNTIME_MAX_ROUNDS",
            "SKYDESK_RUNTIME_TOOL_TIMEOUT_SECS",
            "SKYDESK_LOG_LEVEL",
            "SKYDESK_LOG_FORMAT",
        ];
        for key in keys {
            std::env::remove_var(key);
        }
        for (key, value) in vars {
            std::env::set_var(key, value);
        }
        body();
        for (key, _) in vars {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn defaults_are_valid() {
        with_env(&[], || {
            let config = AppConfig::load(LoadOptions::default()).expect("default config loads");
            assert_eq!(config.oracle.provider, OracleProvider::Rules);
            assert_eq!(config.runtime.max_rounds, 8);
            assert_eq!(config.logging.format, LogFormat::Compact);
        });
    }

    #[test]
    fn env_overrides_take_effect() {
        with_env(
            &[
                ("SKYDESK_ORACLE_PROVIDER", "anthropic"),
                ("SKYDESK_RUNTIME_MAX_ROUNDS", "3"),
                ("SKYDESK_LOG_FORMAT", "json"),
            ],
            || {
                let config = AppConfig::load(LoadOptions::default()).expect("config loads");
                assert_eq!(config.oracle.provider, OracleProvider::Anthropic);
                assert_eq!(config.runtime.max_rounds, 3);
                assert_eq!(config.logging.format, LogFormat::Json);
            },
        );
    }

    #[test]
    fn invalid_env_override_is_rejected() {
        with_env(&[("SKYDESK_RUNTIME_MAX_ROUNDS", "lots")], || {
            let error = AppConfig::load(LoadOptions::default()).unwrap_err();
            assert!(matches!(error, ConfigError::InvalidEnvOverride { .. }));
        });
    }

    #[test]
    fn zero_round_cap_fails_validation() {
        with_env(&[("SKYDESK_RUNTIME_MAX_ROUNDS", "0")], || {
            let error = AppConfig::load(LoadOptions::default()).unwrap_err();
            assert!(matches!(error, ConfigError::Validation(_)));
        });
    }

    #[test]
    fn config_file_patch_applies() {
        with_env(&[], || {
            let dir = std::env::temp_dir().join("skydesk-config-test");
            std::fs::create_dir_all(&dir).unwrap();
            let path = dir.join("skydesk.toml");
            let mut file = std::fs::File::create(&path).unwrap();
            writeln!(
                file,
                "[oracle]\nprovider = \"ollama\"\nmodel = \"llama3.1\"\n\n[runtime]\nmax_rounds = 5"
            )
            .unwrap();

            let options = LoadOptions { config_path: Some(path.clone()), require_file: true };
            let config = AppConfig::load(options).expect("config loads from file");
            assert_eq!(config.oracle.provider, OracleProvider::Ollama);
            assert_eq!(config.oracle.model, "llama3.1");
            assert_eq!(config.runtime.max_rounds, 5);

            std::fs::remove_file(path).unwrap();
        });
    }

    #[test]
    fn missing_required_file_is_an_error() {
        with_env(&[], || {
            let options = LoadOptions {
                config_path: Some("/nonexistent/skydesk.toml".into()),
                require_file: true,
            };
            let error = AppConfig::load(options).unwrap_err();
            assert!(matches!(error, ConfigError::MissingConfigFile(_)));
        });
    }
}
