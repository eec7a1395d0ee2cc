use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Parser, Debug, Default)]
#[command(name = "forum", about = "A discussion forum server")]
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

    /// Grant the admin role to the user with this email, then exit
    #[arg(long, value_name = "EMAIL")]
    pub make_admin: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
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
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct AuthConfig {
    pub cookie_name: String,
    pub session_hours: u64,
    pub bcrypt_cost: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            cookie_name: "session_id".to_string(),
            session_hours: 24,
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }
}

impl AuthConfig {
    /// Errors for zero or for a value too large to add to a timestamp.
    pub fn session_lifetime(&self) -> anyhow::Result<chrono::Duration> {
        if self.session_hours == 0 {
            anyhow::bail!("auth.session_hours must be at least 1");
        }
        i64::try_from(self.session_hours)
            .ok()
            .and_then(chrono::Duration::try_hours)
            .filter(|lifetime| chrono::Utc::now().checked_add_signed(*lifetime).is_some())
            .ok_or_else(|| anyhow::anyhow!("auth.session_hours is too large: {}", self.session_hours))
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

        if config.database.path.is_none() {
            config.database.path = Some(data_dir.join("forum.db"));
        }

        config.auth.session_lifetime()?;

        Ok(config)
    }

    /// Falls back to the working directory when no home directory is known.
    pub fn data_dir(cli: &Cli) -> PathBuf {
        cli.data_dir.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".forum")
        })
    }

    pub fn db_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from("forum.db"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli_in(dir: &std::path::Path) -> Cli {
        Cli {
            data_dir: Some(dir.to_path_buf()),
            ..Cli::default()
        }
    }

    #[test]
    fn default_config_has_expected_values() {
        let config = Config::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.auth.cookie_name, "session_id");
        assert_eq!(config.auth.session_hours, 24);
        assert_eq!(config.auth.bcrypt_cost, bcrypt::DEFAULT_COST);
        assert!(config.database.path.is_none());
    }

    #[test]
    fn session_lifetime_in_hours() {
        let auth = AuthConfig::default();
        assert_eq!(auth.session_lifetime().unwrap(), chrono::Duration::hours(24));
    }

    #[test]
    fn out_of_range_session_hours_are_rejected() {
        for hours in [0, 10_000_000_000_000_000, u64::MAX] {
            let auth = AuthConfig {
                session_hours: hours,
                ..AuthConfig::default()
            };
            assert!(auth.session_lifetime().is_err(), "{} hours accepted", hours);
        }
    }

    #[test]
    fn load_rejects_unusable_session_hours() {
        let tmp = tempfile::tempdir().unwrap();
        let config_path = tmp.path().join("config.toml");
        std::fs::write(&config_path, "[auth]\nsession_hours = 0\n").unwrap();
        let cli = Cli {
            config: Some(config_path),
            ..cli_in(tmp.path())
        };
        assert!(Config::load(&cli).is_err());
    }

    #[test]
    fn data_dir_uses_cli_override() {
        let cli = cli_in(std::path::Path::new("/tmp/test-forum"));
        assert_eq!(Config::data_dir(&cli), PathBuf::from("/tmp/test-forum"));
    }

    #[test]
    fn data_dir_defaults_to_dot_forum() {
        let dir = Config::data_dir(&Cli::default());
        assert!(dir.ends_with(".forum"));
    }

    #[test]
    fn load_with_no_config_file_uses_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config::load(&cli_in(tmp.path())).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.db_path(), tmp.path().join("forum.db"));
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

[database]
path = "/var/lib/forum/main.db"

[auth]
cookie_name = "my_cookie"
session_hours = 2
bcrypt_cost = 6
"#,
        )
        .unwrap();

        let cli = Cli {
            config: Some(config_path),
            ..cli_in(tmp.path())
        };
        let config = Config::load(&cli).unwrap();
        assert_eq!(config.server.host, "192.168.1.1");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.db_path(), PathBuf::from("/var/lib/forum/main.db"));
        assert_eq!(config.auth.cookie_name, "my_cookie");
        assert_eq!(config.auth.session_hours, 2);
        assert_eq!(config.auth.bcrypt_cost, 6);
    }

    #[test]
    fn cli_overrides_beat_toml_values() {
        let tmp = tempfile::tempdir().unwrap();
        let config_path = tmp.path().join("config.toml");
        std::fs::write(
            &config_path,
            r#"
[server]
host = "192.168.1.1"
port = 9000
"#,
        )
        .unwrap();

        let cli = Cli {
            config: Some(config_path),
            host: Some("10.0.0.1".to_string()),
            port: Some(4000),
            ..cli_in(tmp.path())
        };
        let config = Config::load(&cli).unwrap();
        assert_eq!(config.server.host, "10.0.0.1");
        assert_eq!(config.server.port, 4000);
    }

    #[test]
    fn malformed_toml_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let config_path = tmp.path().join("config.toml");
        std::fs::write(&config_path, "[server\nport = ").unwrap();
        let cli = Cli {
            config: Some(config_path),
            ..cli_in(tmp.path())
        };
        assert!(Config::load(&cli).is_err());
    }
}
