use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::time::Duration;

use crate::delivery::EngineOptions;
use crate::ws::actor::KeepaliveSettings;

/// Courier message routing server
///
/// Command-line layer. Every field is optional and left out of serialization
/// when not given, so an absent flag never masks the TOML or env layers.
#[derive(Parser, Serialize, Clone, Debug, Default)]
#[command(name = "courier-server", version, about = "Courier message routing server")]
pub struct CliArgs {
    /// Port to listen on [default: 8000]
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Bind address [default: 0.0.0.0]
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind_address: Option<String>,

    /// Path to TOML config file
    #[arg(long, default_value = "./courier.toml")]
    #[serde(skip)]
    pub config: String,

    /// Enable structured JSON logging (for Docker/production)
    #[arg(long)]
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub json_logs: bool,

    /// Output a commented TOML config template and exit
    #[arg(long)]
    #[serde(skip)]
    pub generate_config: bool,

    /// Data directory for uploaded files [default: ./data]
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,

    /// Externally visible base URL used to build upload links
    /// (default: http://<bind_address>:<port>)
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_url: Option<String>,

    /// Allowed CORS origins (repeatable). Empty allows any origin.
    #[arg(long = "cors-allowed-origin")]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cors_allowed_origins: Vec<String>,
}

/// Effective server configuration after all layers are merged.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Config {
    pub port: u16,

    pub bind_address: String,

    /// Path of the TOML file that was read
    #[serde(skip)]
    pub config: String,

    #[serde(default)]
    pub json_logs: bool,

    /// Print the config template instead of serving
    #[serde(skip)]
    pub generate_config: bool,

    pub data_dir: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_url: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cors_allowed_origins: Vec<String>,

    /// WebSocket session settings (loaded from [ws] section in TOML)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ws: Option<WsConfig>,

    /// Offline mailbox settings (loaded from [mailbox] section in TOML)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mailbox: Option<MailboxConfig>,

    /// Upload settings (loaded from [uploads] section in TOML)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploads: Option<UploadsConfig>,
}

/// Configuration for WebSocket sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsConfig {
    /// Seconds between server pings; 0 disables keepalive (default: 30)
    #[serde(default = "default_ping_interval")]
    pub ping_interval_secs: u64,

    /// Seconds to wait for a pong before closing the session (default: 10)
    #[serde(default = "default_pong_timeout")]
    pub pong_timeout_secs: u64,

    /// Close the previous connection when a client ID connects again (default: false)
    #[serde(default = "default_close_superseded")]
    pub close_superseded: bool,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            ping_interval_secs: 30,
            pong_timeout_secs: 10,
            close_superseded: false,
        }
    }
}

fn default_ping_interval() -> u64 {
    30
}

fn default_pong_timeout() -> u64 {
    10
}

fn default_close_superseded() -> bool {
    false
}

/// Configuration for offline mailboxes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MailboxConfig {
    /// Maximum pending messages per offline client. Unset means unbounded;
    /// when full, the oldest pending message is dropped.
    #[serde(default)]
    pub max_pending_per_client: Option<NonZeroUsize>,
}

/// Configuration for file uploads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadsConfig {
    /// Maximum upload size in megabytes (default: 25)
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size_mb: u32,

    /// Subdirectory of data_dir holding uploaded files (default: "uploads")
    #[serde(default = "default_uploads_dir")]
    pub dir_name: String,
}

impl Default for UploadsConfig {
    fn default() -> Self {
        Self {
            max_upload_size_mb: 25,
            dir_name: "uploads".to_string(),
        }
    }
}

fn default_max_upload_size() -> u32 {
    25
}

fn default_uploads_dir() -> String {
    "uploads".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8000,
            bind_address: "0.0.0.0".to_string(),
            config: "./courier.toml".to_string(),
            json_logs: false,
            generate_config: false,
            data_dir: "./data".to_string(),
            public_url: None,
            cors_allowed_origins: Vec::new(),
            ws: None,
            mailbox: None,
            uploads: None,
        }
    }
}

impl Config {
    /// Load config with layered precedence:
    /// built-in defaults < TOML file < env vars (COURIER_*) < CLI args
    pub fn load() -> Result<Self, figment::Error> {
        Self::load_from(CliArgs::parse())
    }

    pub fn load_from(cli: CliArgs) -> Result<Self, figment::Error> {
        let mut config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&cli.config))
            .merge(Env::prefixed("COURIER_"))
            .merge(Serialized::defaults(&cli))
            .extract()?;

        config.config = cli.config;
        config.generate_config = cli.generate_config;
        Ok(config)
    }

    /// Base URL that upload links are built on, without a trailing slash.
    pub fn public_url(&self) -> String {
        match &self.public_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => {
                let host = if self.bind_address == "0.0.0.0" {
                    "127.0.0.1"
                } else {
                    self.bind_address.as_str()
                };
                format!("http://{}:{}", host, self.port)
            }
        }
    }

    pub fn engine_options(&self) -> EngineOptions {
        let ws = self.ws.clone().unwrap_or_default();
        let mailbox = self.mailbox.clone().unwrap_or_default();
        EngineOptions {
            mailbox_capacity: mailbox.max_pending_per_client,
            close_superseded: ws.close_superseded,
        }
    }

    pub fn keepalive(&self) -> KeepaliveSettings {
        let ws = self.ws.clone().unwrap_or_default();
        KeepaliveSettings {
            ping_interval: (ws.ping_interval_secs > 0)
                .then(|| Duration::from_secs(ws.ping_interval_secs)),
            pong_timeout: Duration::from_secs(ws.pong_timeout_secs),
        }
    }

    pub fn max_upload_bytes(&self) -> usize {
        let uploads = self.uploads.clone().unwrap_or_default();
        uploads.max_upload_size_mb as usize * 1024 * 1024
    }

    pub fn uploads_dir(&self) -> std::path::PathBuf {
        let uploads = self.uploads.clone().unwrap_or_default();
        std::path::Path::new(&self.data_dir).join(uploads.dir_name)
    }
}

/// Generate a commented TOML config template
pub fn generate_config_template() -> String {
    r#"# Courier Server Configuration
# Place this file at ./courier.toml or specify with --config <path>
# All settings can be overridden via environment variables (COURIER_PORT, etc.)
# or CLI flags (--port, etc.)

# Server port (default: 8000)
# port = 8000

# Bind address (default: 0.0.0.0 — all interfaces)
# bind_address = "0.0.0.0"

# Enable structured JSON logging for Docker/production
# json_logs = false

# Data directory for uploaded files
# data_dir = "./data"

# Externally visible base URL for upload links
# public_url = "https://chat.example.com"

# Allowed CORS origins; leave empty to allow any origin
# cors_allowed_origins = ["https://chat.example.com"]

# ---- WebSocket Sessions ----
# [ws]
# ping_interval_secs = 30   # 0 disables server pings
# pong_timeout_secs = 10
# close_superseded = false  # true sends the old socket a Close frame when a client ID reconnects

# ---- Offline Mailboxes ----
# [mailbox]
# Unset means unbounded. When full, the oldest pending message is dropped.
# max_pending_per_client = 1000

# ---- Uploads ----
# [uploads]
# max_upload_size_mb = 25
# dir_name = "uploads"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.public_url(), "http://127.0.0.1:8000");
        assert_eq!(config.max_upload_bytes(), 25 * 1024 * 1024);

        let options = config.engine_options();
        assert!(!options.close_superseded);
        assert!(options.mailbox_capacity.is_none());

        let keepalive = config.keepalive();
        assert_eq!(keepalive.ping_interval, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_public_url_trims_trailing_slash() {
        let config = Config {
            public_url: Some("https://chat.example.com/".to_string()),
            ..Config::default()
        };
        assert_eq!(config.public_url(), "https://chat.example.com");
    }

    #[test]
    fn test_toml_sections_are_extracted() {
        let toml = r#"
            port = 9100
            [ws]
            ping_interval_secs = 0
            close_superseded = true
            [mailbox]
            max_pending_per_client = 3
        "#;
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::string(toml))
            .extract()
            .unwrap();

        assert_eq!(config.port, 9100);
        assert!(config.keepalive().ping_interval.is_none());
        let options = config.engine_options();
        assert!(options.close_superseded);
        assert_eq!(options.mailbox_capacity.map(NonZeroUsize::get), Some(3));
    }

    fn write_config_file(dir: &tempfile::TempDir, contents: &str) -> String {
        let path = dir.path().join("courier.toml");
        std::fs::write(&path, contents).unwrap();
        path.to_str().unwrap().to_string()
    }

    #[test]
    fn test_toml_file_used_when_flags_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config_file(
            &dir,
            "port = 9100\ndata_dir = \"/srv/courier\"\njson_logs = true\n",
        );

        let config =
            Config::load_from(CliArgs::parse_from(["courier-server", "--config", &path])).unwrap();

        assert_eq!(config.port, 9100);
        assert_eq!(config.data_dir, "/srv/courier");
        assert!(config.json_logs);
        assert_eq!(config.bind_address, "0.0.0.0");
        assert_eq!(config.config, path);
    }

    #[test]
    fn test_cli_flags_override_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config_file(&dir, "port = 9100\nbind_address = \"10.0.0.1\"\n");

        let config = Config::load_from(CliArgs::parse_from([
            "courier-server",
            "--config",
            &path,
            "--port",
            "9200",
            "--generate-config",
        ]))
        .unwrap();

        assert_eq!(config.port, 9200);
        assert_eq!(config.bind_address, "10.0.0.1");
        assert!(config.generate_config);
    }

    #[test]
    fn test_missing_config_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");

        let config = Config::load_from(CliArgs::parse_from([
            "courier-server",
            "--config",
            path.to_str().unwrap(),
        ]))
        .unwrap();

        assert_eq!(config.port, 8000);
        assert_eq!(config.data_dir, "./data");
        assert!(!config.json_logs);
    }

    #[test]
    fn test_template_mentions_every_section() {
        let template = generate_config_template();
        for section in ["[ws]", "[mailbox]", "[uploads]"] {
            assert!(template.contains(section), "missing {}", section);
        }
    }
}
