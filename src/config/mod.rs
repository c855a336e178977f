use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::error;

const DEFAULT_REMINDER_HOUR: u32 = 9;
const DEFAULT_REMINDER_MINUTE: u32 = 0;
const DEFAULT_SMTP_PORT: u16 = 587;

// ─── ReminderConfig ───────────────────────────────────────────────────────────

/// Daily reminder send time (`[reminder]` in config.toml), local wall clock.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReminderConfig {
    /// Hour of day (0-23). Default: 9.
    pub hour: u32,
    /// Minute (0-59). Default: 0.
    pub minute: u32,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            hour: DEFAULT_REMINDER_HOUR,
            minute: DEFAULT_REMINDER_MINUTE,
        }
    }
}

// ─── EmailConfig ─────────────────────────────────────────────────────────────

/// Outbound SMTP settings (`[email]` in config.toml).
///
/// All fields except `port` and `display_name` default to unset; with no
/// host/credentials configured, reminder delivery falls back to logging.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EmailConfig {
    pub host: Option<String>,
    /// SMTP submission port (STARTTLS). Default: 587.
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from_address: Option<String>,
    pub display_name: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: DEFAULT_SMTP_PORT,
            username: None,
            password: None,
            from_address: None,
            display_name: "Task Tracker".to_string(),
        }
    }
}

impl EmailConfig {
    pub fn is_configured(&self) -> bool {
        self.host.is_some()
            && self.username.is_some()
            && self.password.is_some()
            && self.from_address.is_some()
    }
}

// ─── TOML config file ─────────────────────────────────────────────────────────

/// `{data_dir}/config.toml` — all fields are optional overrides.
/// Priority: CLI / env var  >  TOML  >  built-in default.
#[derive(Deserialize, Default)]
struct TomlConfig {
    /// Log level filter string, e.g. "debug", "info,trackd=trace" (default: "info").
    log: Option<String>,
    /// Log output format: "pretty" (default, human-readable) | "json" (structured).
    log_format: Option<String>,
    /// Daily reminder send time (`[reminder]`).
    reminder: Option<ReminderConfig>,
    /// Outbound SMTP settings (`[email]`).
    email: Option<EmailConfig>,
}

fn load_toml(data_dir: &Path) -> Option<TomlConfig> {
    let path = data_dir.join("config.toml");
    let contents = std::fs::read_to_string(&path).ok()?;
    match toml::from_str::<TomlConfig>(&contents) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            error!(path = %path.display(), err = %e, "failed to parse config.toml — using defaults");
            None
        }
    }
}

// ─── TrackdConfig ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct TrackdConfig {
    pub data_dir: PathBuf,
    pub log: String,
    pub log_format: String,
    pub reminder: ReminderConfig,
    pub email: EmailConfig,
}

impl TrackdConfig {
    /// Build config from CLI/env args + optional TOML file.
    ///
    /// Priority (highest to lowest):
    ///   1. CLI / env — passed as `Some(value)` from clap
    ///   2. TOML file at `{data_dir}/config.toml`
    ///   3. Built-in defaults
    pub fn new(data_dir: Option<PathBuf>, log: Option<String>) -> Self {
        let data_dir = data_dir.unwrap_or_else(default_data_dir);

        let toml = load_toml(&data_dir).unwrap_or_default();

        let log = log.or(toml.log).unwrap_or_else(|| "info".to_string());

        let log_format = std::env::var("TRACKD_LOG_FORMAT")
            .ok()
            .filter(|s| !s.is_empty())
            .or(toml.log_format)
            .unwrap_or_else(|| "pretty".to_string());

        let reminder = toml.reminder.unwrap_or_default();
        let email = toml.email.unwrap_or_default();

        Self {
            data_dir,
            log,
            log_format,
            reminder,
            email,
        }
    }
}

fn default_data_dir() -> PathBuf {
    #[cfg(target_os = "macos")]
    {
        // ~/Library/Application Support/trackd
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("trackd");
        }
    }
    #[cfg(target_os = "linux")]
    {
        // $XDG_DATA_HOME/trackd or ~/.local/share/trackd
        if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
            return PathBuf::from(xdg).join("trackd");
        }
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join(".local")
                .join("share")
                .join("trackd");
        }
    }
    #[cfg(target_os = "windows")]
    {
        // %APPDATA%\trackd
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata).join("trackd");
        }
    }
    // Fallback
    PathBuf::from(".trackd")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reminder_defaults_to_nine_sharp() {
        let cfg = ReminderConfig::default();
        assert_eq!((cfg.hour, cfg.minute), (9, 0));
    }

    #[test]
    fn email_unconfigured_by_default() {
        assert!(!EmailConfig::default().is_configured());
    }

    #[test]
    fn toml_sections_parse() {
        let toml: TomlConfig = toml::from_str(
            r#"
            log = "debug"

            [reminder]
            hour = 17
            minute = 30

            [email]
            host = "smtp.example.com"
            username = "reminders@example.com"
            password = "hunter2"
            from_address = "reminders@example.com"
            "#,
        )
        .unwrap();
        let reminder = toml.reminder.unwrap();
        assert_eq!((reminder.hour, reminder.minute), (17, 30));
        let email = toml.email.unwrap();
        assert!(email.is_configured());
        assert_eq!(email.port, 587, "port falls back to the default");
    }
}
