//! Configuration management

use anyhow::Result;
use serde::Deserialize;

/// Connection settings supplied by the host application.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server host name, or a Unix socket path starting with `/`.
    #[serde(default = "default_host")]
    pub host: String,

    /// TCP port; ignored when `host` is a socket path.
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub password: Option<String>,

    /// Opaque play-queue header layout blob. Stored for UI
    /// collaborators; the engine never interprets it.
    #[serde(default)]
    pub header_layout: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            password: None,
            header_layout: None,
        }
    }
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    6600
}

/// Get config directory (XDG_CONFIG_HOME or platform default)
pub fn get_config_dir() -> std::path::PathBuf {
    if let Ok(dir) = std::env::var("MPD_CONTROL_CONFIG_DIR") {
        return std::path::PathBuf::from(dir);
    }

    #[cfg(target_os = "macos")]
    {
        if let Ok(home) = std::env::var("HOME") {
            return std::path::PathBuf::from(home).join("Library/Application Support/mpd-control");
        }
    }

    #[cfg(target_os = "linux")]
    {
        if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
            return std::path::PathBuf::from(xdg).join("mpd-control");
        }
        if let Ok(home) = std::env::var("HOME") {
            return std::path::PathBuf::from(home).join(".config/mpd-control");
        }
    }

    #[cfg(target_os = "windows")]
    {
        if let Ok(appdata) = std::env::var("APPDATA") {
            return std::path::PathBuf::from(appdata).join("mpd-control");
        }
    }

    // Fallback to current directory
    std::path::PathBuf::from(".")
}

pub fn load_config() -> Result<Config> {
    let config_dir = get_config_dir();

    let mut builder = ::config::Config::builder()
        // Start with defaults
        .set_default("host", "localhost")?
        .set_default("port", 6600)?
        // Load from config file if it exists
        .add_source(
            ::config::File::with_name(&config_dir.join("config").to_string_lossy()).required(false),
        )
        // Override with environment variables (MPD_CONTROL_HOST, etc.)
        .add_source(
            ::config::Environment::with_prefix("MPD_CONTROL")
                .separator("__")
                .try_parsing(true),
        );

    // Support the conventional MPD_HOST/MPD_PORT/MPD_PASSWORD variables
    // (same precedence the mpc client uses): they beat the config file
    // but lose to MPD_CONTROL_* overrides handled above.
    if std::env::var("MPD_CONTROL_HOST").is_err() {
        if let Ok(host) = std::env::var("MPD_HOST") {
            // MPD_HOST may carry the password as "password@host"
            if let Some((password, host)) = host.split_once('@') {
                builder = builder.set_override("password", password)?;
                builder = builder.set_override("host", host)?;
            } else {
                builder = builder.set_override("host", host)?;
            }
        }
    }
    if std::env::var("MPD_CONTROL_PORT").is_err() {
        if let Ok(port) = std::env::var("MPD_PORT") {
            if let Ok(port_num) = port.parse::<u16>() {
                builder = builder.set_override("port", port_num as i64)?;
            }
        }
    }
    if std::env::var("MPD_CONTROL_PASSWORD").is_err() {
        if let Ok(password) = std::env::var("MPD_PASSWORD") {
            builder = builder.set_override("password", password)?;
        }
    }

    let config = builder.build()?;

    Ok(config.try_deserialize()?)
}
