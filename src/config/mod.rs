#[cfg(feature = "cli")]
pub mod cli;

use crate::utils::error::{Result, RosterError};
use crate::utils::validation::{
    validate_backend_url, validate_file_name, validate_path, validate_range,
    validate_required_field, validate_secret, Validate,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECONDS: u64 = 10;
const DEFAULT_SESSION_DIRECTORY: &str = "./.roster";
const DEFAULT_SESSION_FILE: &str = "session.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterConfig {
    pub supabase: SupabaseConfig,
    pub session: Option<SessionConfig>,
    pub schedule: Option<ScheduleConfig>,
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupabaseConfig {
    pub url: Option<String>,
    pub anon_key: Option<String>,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub directory: Option<String>,
    pub file: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Offset from UTC that defines "today" when the backend cannot say.
    pub utc_offset_minutes: Option<i32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LoggingConfig {
    pub level: Option<String>,
    pub format: Option<LogFormat>,
}

impl LoggingConfig {
    pub fn level(&self) -> &str {
        self.level.as_deref().unwrap_or("info")
    }

    pub fn format(&self) -> LogFormat {
        self.format.unwrap_or_default()
    }
}

impl RosterConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(RosterError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| RosterError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Configuration taken purely from `SUPABASE_*` / `ROSTER_*` environment variables.
    pub fn from_env() -> Self {
        Self {
            supabase: SupabaseConfig {
                url: env::var("SUPABASE_URL").ok(),
                anon_key: env::var("SUPABASE_ANON_KEY").ok(),
                timeout_seconds: env::var("SUPABASE_TIMEOUT_SECONDS")
                    .ok()
                    .and_then(|v| v.parse().ok()),
            },
            session: env::var("ROSTER_SESSION_DIR").ok().map(|directory| SessionConfig {
                directory: Some(directory),
                file: None,
            }),
            schedule: None,
            logging: None,
        }
    }

    /// Loads `path` if it exists, otherwise falls back to [`RosterConfig::from_env`].
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::from_file(path)
        } else {
            tracing::debug!(
                "config file {} not found, using environment",
                path.as_ref().display()
            );
            Ok(Self::from_env())
        }
    }

    // Replaces ${VAR} with the environment value; unknown variables are left as-is.
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| RosterError::ConfigError {
            message: format!("invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn validate_config(&self) -> Result<()> {
        let url = validate_required_field("supabase.url", &self.supabase.url)?;
        validate_backend_url("supabase.url", url)?;

        let key = validate_required_field("supabase.anon_key", &self.supabase.anon_key)?;
        validate_secret("supabase.anon_key", key)?;

        if let Some(timeout) = self.supabase.timeout_seconds {
            validate_range("supabase.timeout_seconds", timeout, 1, 120)?;
        }

        validate_path("session.directory", self.session_directory())?;
        validate_file_name("session.file", self.session_file())?;

        // UTC-12:00 .. UTC+14:00
        validate_range("schedule.utc_offset_minutes", self.utc_offset_minutes(), -720, 840)?;

        Ok(())
    }

    pub fn supabase_url(&self) -> &str {
        self.supabase.url.as_deref().unwrap_or_default()
    }

    pub fn anon_key(&self) -> &str {
        self.supabase.anon_key.as_deref().unwrap_or_default()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.supabase.timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECONDS))
    }

    pub fn session_directory(&self) -> &str {
        self.session
            .as_ref()
            .and_then(|s| s.directory.as_deref())
            .unwrap_or(DEFAULT_SESSION_DIRECTORY)
    }

    pub fn session_file(&self) -> &str {
        self.session
            .as_ref()
            .and_then(|s| s.file.as_deref())
            .unwrap_or(DEFAULT_SESSION_FILE)
    }

    pub fn utc_offset_minutes(&self) -> i32 {
        self.schedule
            .as_ref()
            .and_then(|s| s.utc_offset_minutes)
            .unwrap_or(crate::adapters::memory::DEFAULT_UTC_OFFSET_MINUTES)
    }

    pub fn logging(&self) -> LoggingConfig {
        self.logging.clone().unwrap_or_default()
    }
}

impl Validate for RosterConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_full_config() {
        let toml_content = r#"
[supabase]
url = "https://abc.supabase.co"
anon_key = "public-anon-key"
timeout_seconds = 5

[session]
directory = "/tmp/roster"

[schedule]
utc_offset_minutes = 0

[logging]
level = "debug"
format = "json"
"#;

        let config = RosterConfig::from_toml_str(toml_content).unwrap();

        assert_eq!(config.supabase_url(), "https://abc.supabase.co");
        assert_eq!(config.timeout(), Duration::from_secs(5));
        assert_eq!(config.session_directory(), "/tmp/roster");
        assert_eq!(config.session_file(), "session.json");
        assert_eq!(config.utc_offset_minutes(), 0);
        assert_eq!(config.logging().format(), LogFormat::Json);
        assert_eq!(config.logging().level(), "debug");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_defaults_for_optional_sections() {
        let toml_content = r#"
[supabase]
url = "https://abc.supabase.co"
anon_key = "k"
"#;

        let config = RosterConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.timeout(), Duration::from_secs(10));
        assert_eq!(config.session_directory(), "./.roster");
        assert_eq!(config.utc_offset_minutes(), 330);
        assert_eq!(config.logging().format(), LogFormat::Compact);
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("ROSTER_TEST_SUPABASE_URL", "https://env.supabase.co");

        let toml_content = r#"
[supabase]
url = "${ROSTER_TEST_SUPABASE_URL}"
anon_key = "${ROSTER_TEST_MISSING_KEY}"
"#;

        let config = RosterConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.supabase_url(), "https://env.supabase.co");
        // unset variables stay visible and fail validation
        assert_eq!(config.anon_key(), "${ROSTER_TEST_MISSING_KEY}");
        assert!(config.validate().is_err());

        std::env::remove_var("ROSTER_TEST_SUPABASE_URL");
    }

    #[test]
    fn test_config_validation() {
        let bad_url = RosterConfig::from_toml_str(
            r#"
[supabase]
url = "invalid-url"
anon_key = "k"
"#,
        )
        .unwrap();
        assert!(bad_url.validate().is_err());

        let missing_key = RosterConfig::from_toml_str(
            r#"
[supabase]
url = "https://abc.supabase.co"
"#,
        )
        .unwrap();
        assert!(matches!(
            missing_key.validate(),
            Err(RosterError::MissingConfigError { .. })
        ));

        let bad_offset = RosterConfig::from_toml_str(
            r#"
[supabase]
url = "https://abc.supabase.co"
anon_key = "k"

[schedule]
utc_offset_minutes = 900
"#,
        )
        .unwrap();
        assert!(bad_offset.validate().is_err());
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();

        let toml_content = r#"
[supabase]
url = "https://file.supabase.co"
anon_key = "k"
"#;

        temp_file.write_all(toml_content.as_bytes()).unwrap();

        let config = RosterConfig::load(temp_file.path()).unwrap();
        assert_eq!(config.supabase_url(), "https://file.supabase.co");
    }
}
