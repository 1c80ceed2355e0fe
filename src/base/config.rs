//! Load configuration via `config` crate with env-override support.

use std::{ops::Deref, path::PathBuf, sync::Arc};

use serde::Deserialize;

use super::types::Res;

/// Default location of the persisted ticket registry.
fn default_tickets_path() -> PathBuf {
    PathBuf::from("tickets.json")
}

/// Default number of message fingerprints remembered for duplicate suppression.
fn default_dedup_capacity() -> usize {
    10_000
}

/// Default inactivity period, in minutes, after which ticket threads auto-archive.
fn default_thread_auto_archive_minutes() -> u16 {
    60
}

/// Auto-archive periods the platform accepts for threads.
const ALLOWED_AUTO_ARCHIVE_MINUTES: [u16; 4] = [60, 1440, 4320, 10080];

/// Configuration for the ticket-bot application.
#[derive(Debug, Clone)]
pub struct Config {
    pub inner: Arc<ConfigInner>,
}

impl Deref for Config {
    type Target = ConfigInner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl From<ConfigInner> for Config {
    fn from(inner: ConfigInner) -> Self {
        Self { inner: Arc::new(inner) }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ConfigInner {
    /// Bot authentication token (`BOT_TOKEN`).
    #[serde(default)]
    pub bot_token: String,
    /// Channel under which ticket threads are created (`CHANNEL_ID`).
    #[serde(default)]
    pub channel_id: u64,
    /// Role that grants the staff capability (`STAFF_ROLE_ID`).
    #[serde(default)]
    pub staff_role_id: u64,
    /// Where the ticket registry is persisted (`TICKETS_PATH`).
    #[serde(default = "default_tickets_path")]
    pub tickets_path: PathBuf,
    /// How many relay fingerprints are remembered (`DEDUP_CAPACITY`).
    #[serde(default = "default_dedup_capacity")]
    pub dedup_capacity: usize,
    /// Thread auto-archive period in minutes (`THREAD_AUTO_ARCHIVE_MINUTES`).
    #[serde(default = "default_thread_auto_archive_minutes")]
    pub thread_auto_archive_minutes: u16,
}

impl Default for ConfigInner {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            channel_id: 0,
            staff_role_id: 0,
            tickets_path: default_tickets_path(),
            dedup_capacity: default_dedup_capacity(),
            thread_auto_archive_minutes: default_thread_auto_archive_minutes(),
        }
    }
}

impl Config {
    pub fn load(explicit_path: Option<&std::path::Path>) -> Res<Self> {
        let mut cfg = config::Config::builder();

        if let Some(p) = explicit_path {
            cfg = cfg.add_source(config::File::from(p.to_path_buf()));
        } else if std::path::Path::new(".hidden/config.toml").exists() {
            cfg = cfg.add_source(config::File::with_name(".hidden/config.toml"));
        }

        // Environment wins over the file.
        cfg = cfg.add_source(config::Environment::default().try_parsing(true));

        let result = Config {
            inner: Arc::new(cfg.build()?.try_deserialize()?),
        };

        result.validate()?;

        Ok(result)
    }

    /// Checks that every required value is present and in range.
    pub fn validate(&self) -> Res<()> {
        if self.bot_token.trim().is_empty() {
            return Err(anyhow::anyhow!("Missing required configuration `BOT_TOKEN`."));
        }

        if self.channel_id == 0 {
            return Err(anyhow::anyhow!("Missing required configuration `CHANNEL_ID`."));
        }

        if self.staff_role_id == 0 {
            return Err(anyhow::anyhow!("Missing required configuration `STAFF_ROLE_ID`."));
        }

        if self.dedup_capacity < 1 {
            return Err(anyhow::anyhow!("Deduplication capacity must be at least 1."));
        }

        if !ALLOWED_AUTO_ARCHIVE_MINUTES.contains(&self.thread_auto_archive_minutes) {
            return Err(anyhow::anyhow!("Thread auto-archive minutes must be one of {:?}.", ALLOWED_AUTO_ARCHIVE_MINUTES));
        }

        Ok(())
    }

    /// The bot token with everything but its ends hidden, for logs.
    pub fn masked_token(&self) -> String {
        let token = &self.bot_token;
        let chars: Vec<char> = token.chars().collect();

        if chars.len() <= 10 {
            return "*".repeat(chars.len());
        }

        let head: String = chars[..5].iter().collect();
        let tail: String = chars[chars.len() - 5..].iter().collect();

        format!("{head}...{tail}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> ConfigInner {
        ConfigInner {
            bot_token: "abcdefghijklmnopqrstuvwxyz".to_string(),
            channel_id: 1,
            staff_role_id: 2,
            ..Default::default()
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(Config::from(valid()).validate().is_ok());
    }

    #[test]
    fn missing_values_are_rejected() {
        let no_token = ConfigInner { bot_token: " ".to_string(), ..valid() };
        let no_channel = ConfigInner { channel_id: 0, ..valid() };
        let no_role = ConfigInner { staff_role_id: 0, ..valid() };

        for inner in [no_token, no_channel, no_role] {
            let err = Config::from(inner).validate().unwrap_err();
            assert!(err.to_string().contains("Missing required configuration"));
        }
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        assert!(Config::from(ConfigInner { dedup_capacity: 0, ..valid() }).validate().is_err());
        assert!(Config::from(ConfigInner { thread_auto_archive_minutes: 30, ..valid() }).validate().is_err());
    }

    #[test]
    fn token_is_masked() {
        assert_eq!(Config::from(valid()).masked_token(), "abcde...vwxyz");
        assert_eq!(Config::from(ConfigInner { bot_token: "short".to_string(), ..valid() }).masked_token(), "*****");
    }

    #[test]
    fn file_values_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "bot_token = \"abcdefghijklmnopqrstuvwxyz\"\nchannel_id = 500\nstaff_role_id = 77\ndedup_capacity = 5\n",
        )
        .unwrap();

        let config = Config::load(Some(path.as_path())).unwrap();

        assert_eq!(config.channel_id, 500);
        assert_eq!(config.staff_role_id, 77);
        assert_eq!(config.dedup_capacity, 5);
        assert_eq!(config.thread_auto_archive_minutes, 60);
    }
}
