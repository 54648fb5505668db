use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub pagination: PaginationConfig,
    #[serde(default)]
    pub client: ClientConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:5000".to_string()
}

/// Page sizes and windows used when a request leaves them out.
#[derive(Debug, Deserialize, Clone)]
pub struct PaginationConfig {
    #[serde(default = "default_limit")]
    pub default_limit: i64,
    #[serde(default = "default_subject_limit")]
    pub subject_limit: i64,
    #[serde(default = "default_recent_limit")]
    pub recent_limit: i64,
    #[serde(default = "default_recent_days")]
    pub recent_days: i64,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            subject_limit: default_subject_limit(),
            recent_limit: default_recent_limit(),
            recent_days: default_recent_days(),
        }
    }
}

fn default_limit() -> i64 {
    50
}
fn default_subject_limit() -> i64 {
    20
}
fn default_recent_limit() -> i64 {
    50
}
fn default_recent_days() -> i64 {
    7
}

#[derive(Debug, Deserialize, Clone)]
pub struct ClientConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:5000".to_string()
}

impl Config {
    /// Defaults for commands that only talk to a running server.
    pub fn minimal() -> Self {
        Self {
            db: DbConfig {
                path: PathBuf::from("./data/worksheets.sqlite"),
            },
            server: ServerConfig::default(),
            pagination: PaginationConfig::default(),
            client: ClientConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    let p = &config.pagination;
    for (name, value) in [
        ("default_limit", p.default_limit),
        ("subject_limit", p.subject_limit),
        ("recent_limit", p.recent_limit),
        ("recent_days", p.recent_days),
    ] {
        if value < 1 {
            anyhow::bail!("pagination.{} must be >= 1", name);
        }
    }

    if config.client.base_url.trim().is_empty() {
        anyhow::bail!("client.base_url must not be empty");
    }

    Ok(config)
}

/// Config for commands that only talk to the HTTP API. A missing file means
/// built-in defaults; a file that exists must load cleanly.
pub fn load_client_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no config file; using defaults");
        return Ok(Config::minimal());
    }
    load_config(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults_fill_optional_sections() {
        let file = write_config("[db]\npath = \"/tmp/w.sqlite\"\n");
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.server.bind, "127.0.0.1:5000");
        assert_eq!(config.pagination.default_limit, 50);
        assert_eq!(config.pagination.subject_limit, 20);
        assert_eq!(config.pagination.recent_days, 7);
    }

    #[test]
    fn test_client_config_defaults_only_when_file_is_missing() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = load_client_config(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.client.base_url, "http://127.0.0.1:5000");

        let broken = write_config("[client\nbase_url = ");
        let err = load_client_config(broken.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));

        let invalid = write_config("[db]\npath = \"w.sqlite\"\n\n[client]\nbase_url = \"  \"\n");
        assert!(load_client_config(invalid.path()).is_err());
    }

    #[test]
    fn test_rejects_zero_page_size() {
        let file = write_config("[db]\npath = \"w.sqlite\"\n\n[pagination]\ndefault_limit = 0\n");
        let err = load_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("default_limit"));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(load_config(Path::new("/nonexistent/wks.toml")).is_err());
    }
}
