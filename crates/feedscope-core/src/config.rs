// Configuration loading and parsing (feedscope.toml, credentials.toml).

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::poller::PollTimings;
use crate::store::default_preference_path;
use crate::team::CurrentUser;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub session: SessionConfig,
    pub polling: PollingConfig,
    pub bridge: BridgeConfig,
    pub storage: StorageConfig,
    pub credentials: CredentialsConfig,
}

// ---------------------------------------------------------------------------
// feedscope.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the entire feedscope.toml file.
#[derive(Debug, Clone, Deserialize)]
struct FeedscopeFile {
    api: ApiConfig,
    #[serde(default)]
    session: SessionConfig,
    #[serde(default)]
    polling: PollingConfig,
    #[serde(default)]
    bridge: BridgeConfig,
    #[serde(default)]
    storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    #[serde(default = "default_teams_path")]
    pub teams_path: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Opened by the "Create a Team" entry.
    #[serde(default = "default_create_team_url")]
    pub create_team_url: String,
}

fn default_teams_path() -> String {
    "/teams".into()
}

fn default_timeout_ms() -> u64 {
    10_000
}

pub const DEFAULT_CREATE_TEAM_URL: &str = "https://zeit.co/teams/create";

fn default_create_team_url() -> String {
    DEFAULT_CREATE_TEAM_URL.into()
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// The signed-in account. Both fields absent means nobody is signed in
/// until the host sends a session event.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub uid: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

impl SessionConfig {
    /// The configured user. The username falls back to the uid.
    pub fn user(&self) -> Option<CurrentUser> {
        let uid = self.uid.as_ref()?;
        let username = self.username.clone().unwrap_or_else(|| uid.clone());
        Some(CurrentUser::new(uid.clone(), username))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    #[serde(default = "default_retry_ms")]
    pub retry_ms: u64,
    #[serde(default = "default_offline_check_ms")]
    pub offline_check_ms: u64,
}

fn default_interval_ms() -> u64 {
    4000
}

fn default_retry_ms() -> u64 {
    1000
}

fn default_offline_check_ms() -> u64 {
    1000
}

impl Default for PollingConfig {
    fn default() -> Self {
        PollingConfig {
            interval_ms: default_interval_ms(),
            retry_ms: default_retry_ms(),
            offline_check_ms: default_offline_check_ms(),
        }
    }
}

impl PollingConfig {
    pub fn timings(&self) -> PollTimings {
        PollTimings {
            interval: Duration::from_millis(self.interval_ms),
            retry: Duration::from_millis(self.retry_ms),
            offline_check: Duration::from_millis(self.offline_check_ms),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_bridge_port")]
    pub port: u16,
}

fn default_bridge_port() -> u16 {
    9123
}

impl Default for BridgeConfig {
    fn default() -> Self {
        BridgeConfig {
            enabled: false,
            port: default_bridge_port(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
    /// Where the `currentTeam` preference is stored. Defaults to
    /// `$HOME/.feedscope.json`.
    #[serde(default)]
    pub preference_path: Option<String>,
}

impl StorageConfig {
    pub fn resolve_preference_path(&self) -> Option<PathBuf> {
        match &self.preference_path {
            Some(path) => Some(PathBuf::from(path)),
            None => default_preference_path(),
        }
    }
}

// ---------------------------------------------------------------------------
// credentials.toml
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CredentialsConfig {
    #[serde(default)]
    pub api_token: Option<String>,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Load and validate config from `{base_dir}/config/`.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let config_dir = base_dir.join("config");

    // --- feedscope.toml (required) ---
    let main_path = config_dir.join("feedscope.toml");
    let main_text = read_file(&main_path)?;
    let file: FeedscopeFile = toml::from_str(&main_text).map_err(|e| ConfigError::ParseError {
        path: main_path.clone(),
        source: e,
    })?;

    // --- credentials.toml (optional) ---
    let credentials_path = config_dir.join("credentials.toml");
    let credentials = if credentials_path.exists() {
        let cred_text = read_file(&credentials_path)?;
        toml::from_str(&cred_text).map_err(|e| ConfigError::ParseError {
            path: credentials_path.clone(),
            source: e,
        })?
    } else {
        CredentialsConfig::default()
    };

    let config = Config {
        api: file.api,
        session: file.session,
        polling: file.polling,
        bridge: file.bridge,
        storage: file.storage,
        credentials,
    };

    validate(&config)?;

    Ok(config)
}

/// Ensure all config files exist by copying missing ones from `defaults/`.
/// Returns the list of files that were copied. Skips `.example` files.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");

    if !defaults_dir.exists() {
        if !config_dir.exists() {
            return Err(ConfigError::DefaultsCopyError {
                message: format!(
                    "neither defaults/ nor config/ directory found in {}; \
                     run from the project root or ensure defaults/ is present",
                    base_dir.display()
                ),
            });
        }
        return Ok(vec![]);
    }

    std::fs::create_dir_all(&config_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to create config directory: {e}"),
    })?;

    let entries = std::fs::read_dir(&defaults_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to read defaults directory: {e}"),
    })?;

    let mut copied = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ConfigError::DefaultsCopyError {
            message: format!("failed to read defaults entry: {e}"),
        })?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(file_name) = path.file_name() else {
            continue;
        };
        if file_name.to_str().is_some_and(|n| n.ends_with(".example")) {
            continue;
        }
        let target = config_dir.join(file_name);

        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
        {
            Ok(mut dest) => {
                let content = std::fs::read(&path).map_err(|e| ConfigError::DefaultsCopyError {
                    message: format!("failed to read {}: {e}", path.display()),
                })?;
                std::io::Write::write_all(&mut dest, &content).map_err(|e| {
                    ConfigError::DefaultsCopyError {
                        message: format!("failed to write {}: {e}", target.display()),
                    }
                })?;
                copied.push(target);
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
            Err(e) => {
                return Err(ConfigError::DefaultsCopyError {
                    message: format!("failed to create {}: {e}", target.display()),
                });
            }
        }
    }

    Ok(copied)
}

/// Loads config relative to the current working directory, copying
/// defaults first.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    ensure_config_files(&cwd)?;
    load_config_from(&cwd)
}

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validation(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.into(),
        message: message.into(),
    }
}

fn validate(config: &Config) -> Result<(), ConfigError> {
    let urls = [
        ("api.base_url", &config.api.base_url),
        ("api.create_team_url", &config.api.create_team_url),
    ];
    for (field, url) in urls {
        let url = url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(validation(field, format!("must be an http(s) URL, got {url:?}")));
        }
    }
    if config.api.teams_path.trim().is_empty() {
        return Err(validation("api.teams_path", "must not be empty"));
    }
    if config.api.timeout_ms == 0 {
        return Err(validation("api.timeout_ms", "must be > 0"));
    }

    let polling = &config.polling;
    let delay_fields: &[(&str, u64)] = &[
        ("polling.interval_ms", polling.interval_ms),
        ("polling.retry_ms", polling.retry_ms),
        ("polling.offline_check_ms", polling.offline_check_ms),
    ];
    for (name, val) in delay_fields {
        if *val == 0 {
            return Err(validation(name, "must be > 0"));
        }
    }

    if config.session.uid.as_deref().is_some_and(|uid| uid.trim().is_empty()) {
        return Err(validation("session.uid", "must not be empty when set"));
    }
    if config.session.uid.is_none() && config.session.username.is_some() {
        return Err(validation("session.uid", "required when session.username is set"));
    }

    if config.bridge.enabled && config.bridge.port == 0 {
        return Err(validation("bridge.port", "must be > 0 when the bridge is enabled"));
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const SHIPPED_DEFAULTS: &str = include_str!("../../../defaults/feedscope.toml");

    /// Fresh scratch directory with a `config/` holding `feedscope.toml`.
    fn scratch(name: &str, main: &str) -> PathBuf {
        let tmp = std::env::temp_dir().join(format!("feedscope_config_test_{name}"));
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(tmp.join("config")).unwrap();
        fs::write(tmp.join("config/feedscope.toml"), main).unwrap();
        tmp
    }

    const MINIMAL: &str = r#"
[api]
base_url = "https://api.example.com"
"#;

    #[test]
    fn shipped_defaults_load() {
        let tmp = scratch("shipped", SHIPPED_DEFAULTS);
        let config = load_config_from(&tmp).expect("defaults should validate");

        assert_eq!(config.polling.timings(), PollTimings::default());
        assert!(!config.bridge.enabled);
        assert!(config.credentials.api_token.is_none());

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn minimal_file_fills_defaults() {
        let tmp = scratch("minimal", MINIMAL);
        let config = load_config_from(&tmp).unwrap();

        assert_eq!(config.api.teams_path, "/teams");
        assert_eq!(config.api.timeout(), Duration::from_secs(10));
        assert_eq!(config.polling.interval_ms, 4000);
        assert_eq!(config.polling.retry_ms, 1000);
        assert_eq!(config.polling.offline_check_ms, 1000);
        assert_eq!(config.bridge.port, 9123);
        assert!(config.session.user().is_none());

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn session_user_falls_back_to_uid_for_name() {
        let tmp = scratch(
            "session",
            r#"
[api]
base_url = "https://api.example.com"

[session]
uid = "u_1"
"#,
        );
        let config = load_config_from(&tmp).unwrap();
        assert_eq!(config.session.user(), Some(CurrentUser::new("u_1", "u_1")));
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn credentials_are_optional_but_parsed_when_present() {
        let tmp = scratch("creds", MINIMAL);
        fs::write(tmp.join("config/credentials.toml"), "api_token = \"tok\"\n").unwrap();

        let config = load_config_from(&tmp).unwrap();
        assert_eq!(config.credentials.api_token.as_deref(), Some("tok"));
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let tmp = scratch("malformed", "[api\nbase_url = ");
        let err = load_config_from(&tmp).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn missing_main_file_is_reported() {
        let tmp = std::env::temp_dir().join("feedscope_config_test_missing");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(&tmp).unwrap();

        let err = load_config_from(&tmp).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn non_http_base_url_is_rejected() {
        let tmp = scratch(
            "bad_url",
            r#"
[api]
base_url = "ftp://example.com"
"#,
        );
        match load_config_from(&tmp).unwrap_err() {
            ConfigError::ValidationError { field, .. } => assert_eq!(field, "api.base_url"),
            other => panic!("expected ValidationError, got: {other}"),
        }
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn create_team_url_defaults_and_is_validated() {
        let tmp = scratch(
            "create_team_default",
            r#"
[api]
base_url = "https://api.example.com"
"#,
        );
        let config = load_config_from(&tmp).unwrap();
        assert_eq!(config.api.create_team_url, DEFAULT_CREATE_TEAM_URL);
        let _ = fs::remove_dir_all(&tmp);

        let tmp = scratch(
            "create_team_bad",
            r#"
[api]
base_url = "https://api.example.com"
create_team_url = "javascript:alert(1)"
"#,
        );
        match load_config_from(&tmp).unwrap_err() {
            ConfigError::ValidationError { field, .. } => {
                assert_eq!(field, "api.create_team_url")
            }
            other => panic!("expected ValidationError, got: {other}"),
        }
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn zero_poll_delay_is_rejected() {
        let tmp = scratch(
            "zero_delay",
            r#"
[api]
base_url = "https://api.example.com"

[polling]
retry_ms = 0
"#,
        );
        match load_config_from(&tmp).unwrap_err() {
            ConfigError::ValidationError { field, .. } => assert_eq!(field, "polling.retry_ms"),
            other => panic!("expected ValidationError, got: {other}"),
        }
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn username_without_uid_is_rejected() {
        let tmp = scratch(
            "no_uid",
            r#"
[api]
base_url = "https://api.example.com"

[session]
username = "ada"
"#,
        );
        assert!(matches!(
            load_config_from(&tmp),
            Err(ConfigError::ValidationError { .. })
        ));
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn explicit_preference_path_wins() {
        let storage = StorageConfig {
            preference_path: Some("/tmp/prefs.json".into()),
        };
        assert_eq!(
            storage.resolve_preference_path(),
            Some(PathBuf::from("/tmp/prefs.json"))
        );
    }

    #[test]
    fn ensure_config_files_copies_missing_files() {
        let tmp = std::env::temp_dir().join("feedscope_config_test_ensure_copies");
        let _ = fs::remove_dir_all(&tmp);

        let defaults_dir = tmp.join("defaults");
        fs::create_dir_all(&defaults_dir).unwrap();
        fs::write(defaults_dir.join("feedscope.toml"), SHIPPED_DEFAULTS).unwrap();
        fs::write(
            defaults_dir.join("credentials.toml.example"),
            "api_token = \"...\"\n",
        )
        .unwrap();

        assert!(!tmp.join("config").exists());

        let copied = ensure_config_files(&tmp).expect("should succeed");
        assert_eq!(copied.len(), 1);
        assert!(tmp.join("config/feedscope.toml").exists());
        assert!(!tmp.join("config/credentials.toml.example").exists());

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn ensure_config_files_skips_existing() {
        let tmp = std::env::temp_dir().join("feedscope_config_test_ensure_skips");
        let _ = fs::remove_dir_all(&tmp);

        let defaults_dir = tmp.join("defaults");
        let config_dir = tmp.join("config");
        fs::create_dir_all(&defaults_dir).unwrap();
        fs::create_dir_all(&config_dir).unwrap();
        fs::write(defaults_dir.join("feedscope.toml"), SHIPPED_DEFAULTS).unwrap();
        fs::write(config_dir.join("feedscope.toml"), "# custom\n").unwrap();

        let copied = ensure_config_files(&tmp).expect("should succeed");
        assert!(copied.is_empty());

        let content = fs::read_to_string(config_dir.join("feedscope.toml")).unwrap();
        assert_eq!(content, "# custom\n");

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn ensure_config_files_errors_when_both_dirs_missing() {
        let tmp = std::env::temp_dir().join("feedscope_config_test_both_missing");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(&tmp).unwrap();

        let err = ensure_config_files(&tmp).unwrap_err();
        match &err {
            ConfigError::DefaultsCopyError { message } => {
                assert!(message.contains("neither defaults/ nor config/"));
            }
            other => panic!("expected DefaultsCopyError, got: {other}"),
        }

        let _ = fs::remove_dir_all(&tmp);
    }
}
