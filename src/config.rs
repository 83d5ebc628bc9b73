use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "peptidex", about = "Peptide reference site")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Path to data directory
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Directory holding the pre-built content indexes
    #[arg(long)]
    pub content_dir: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub content: ContentConfig,
    pub auth: AuthConfig,
    pub admin: AdminConfig,
    pub billing: BillingConfig,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
    /// Separate database for community submissions
    pub ugc_path: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct ContentConfig {
    pub path: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct AuthConfig {
    pub cookie_name: String,
    pub session_hours: u64,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct AdminConfig {
    /// Static token accepted in `x-admin-token` for moderation automation
    pub token: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct BillingConfig {
    pub webhook_secret: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            cookie_name: "peptidex_session".to_string(),
            session_hours: 720,
        }
    }
}

impl Config {
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let data_dir = Self::data_dir(cli);
        let config_path = cli
            .config
            .clone()
            .unwrap_or_else(|| data_dir.join("config.toml"));

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Config::default()
        };

        // CLI overrides
        if let Some(ref host) = cli.host {
            config.server.host = host.clone();
        }
        if let Some(port) = cli.port {
            config.server.port = port;
        }
        if let Some(ref dir) = cli.content_dir {
            config.content.path = Some(dir.clone());
        }

        // Secrets may come from the environment instead of the file
        if let Some(token) = non_empty_env("PEPTIDEX_ADMIN_TOKEN") {
            config.admin.token = Some(token);
        }
        if let Some(secret) = non_empty_env("PEPTIDEX_WEBHOOK_SECRET") {
            config.billing.webhook_secret = Some(secret);
        }

        config.resolve_paths(&data_dir);
        Ok(config)
    }

    /// Fill unset paths relative to the data directory.
    pub fn resolve_paths(&mut self, data_dir: &std::path::Path) {
        if self.database.path.is_none() {
            self.database.path = Some(data_dir.join("peptidex.db"));
        }
        if self.database.ugc_path.is_none() {
            self.database.ugc_path = Some(data_dir.join("ugc.db"));
        }
        if self.content.path.is_none() {
            self.content.path = Some(data_dir.join("content"));
        }
    }

    pub fn data_dir(cli: &Cli) -> PathBuf {
        cli.data_dir.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".peptidex")
        })
    }

    pub fn db_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from("peptidex.db"))
    }

    pub fn ugc_db_path(&self) -> PathBuf {
        self.database
            .ugc_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("ugc.db"))
    }

    pub fn content_path(&self) -> PathBuf {
        self.content
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from("content"))
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli_with(data_dir: PathBuf) -> Cli {
        Cli {
            config: None,
            host: None,
            port: None,
            data_dir: Some(data_dir),
            content_dir: None,
        }
    }

    #[test]
    fn default_config_has_expected_values() {
        let config = Config::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.auth.cookie_name, "peptidex_session");
        assert_eq!(config.auth.session_hours, 720);
        assert!(config.database.path.is_none());
        assert!(config.admin.token.is_none());
        assert!(config.billing.webhook_secret.is_none());
    }

    #[test]
    fn data_dir_uses_cli_override() {
        let cli = cli_with(PathBuf::from("/tmp/test-peptidex"));
        assert_eq!(Config::data_dir(&cli), PathBuf::from("/tmp/test-peptidex"));
    }

    #[test]
    fn load_with_no_config_file_resolves_paths_under_data_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config::load(&cli_with(tmp.path().to_path_buf())).unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.db_path(), tmp.path().join("peptidex.db"));
        assert_eq!(config.ugc_db_path(), tmp.path().join("ugc.db"));
        assert_eq!(config.content_path(), tmp.path().join("content"));
    }

    #[test]
    fn load_applies_cli_overrides() {
        let tmp = tempfile::tempdir().unwrap();
        let mut cli = cli_with(tmp.path().to_path_buf());
        cli.host = Some("127.0.0.1".to_string());
        cli.port = Some(8080);
        cli.content_dir = Some(PathBuf::from("/srv/content"));
        let config = Config::load(&cli).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.content_path(), PathBuf::from("/srv/content"));
    }

    #[test]
    fn load_reads_toml_file() {
        let tmp = tempfile::tempdir().unwrap();
        let config_path = tmp.path().join("config.toml");
        std::fs::write(
            &config_path,
            r#"
[server]
host = "192.168.1.1"
port = 9000

[auth]
cookie_name = "my_cookie"
session_hours = 24

[admin]
token = "automation"

[database]
ugc_path = "/var/lib/peptidex/community.db"
"#,
        )
        .unwrap();

        let mut cli = cli_with(tmp.path().to_path_buf());
        cli.config = Some(config_path);
        let config = Config::load(&cli).unwrap();
        assert_eq!(config.server.host, "192.168.1.1");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.auth.cookie_name, "my_cookie");
        assert_eq!(config.auth.session_hours, 24);
        assert_eq!(
            config.ugc_db_path(),
            PathBuf::from("/var/lib/peptidex/community.db")
        );
        assert_eq!(config.db_path(), tmp.path().join("peptidex.db"));
    }
}
