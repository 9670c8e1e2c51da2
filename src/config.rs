//! Configuration management for DND Lion

use crate::db::{ScheduleSettings, DEFAULT_REPLY_MESSAGE};
use crate::modules::recurrence::{LeadPolicy, LeadTime, DEFAULT_LEAD_TIME_SECS};
use anyhow::{anyhow, Context, Result};
use chrono_tz::Tz;
use serde::Deserialize;
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub reply: ReplyConfig,
    /// Schedule to seed the settings store with at startup
    #[serde(default)]
    pub schedule: Option<ScheduleConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> String {
    "dndlion.db".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Seconds fire instants are moved earlier to absorb wake-up latency
    #[serde(default = "default_lead_time_secs")]
    pub lead_time_secs: i64,
    #[serde(default)]
    pub lead_policy: LeadPolicy,
    /// IANA timezone the schedule's wall-clock times are in
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            lead_time_secs: default_lead_time_secs(),
            lead_policy: LeadPolicy::default(),
            timezone: default_timezone(),
        }
    }
}

fn default_lead_time_secs() -> i64 {
    DEFAULT_LEAD_TIME_SECS
}

fn default_timezone() -> String {
    "UTC".to_string()
}

impl SchedulerConfig {
    pub fn lead(&self) -> Result<LeadTime> {
        LeadTime::new(self.lead_time_secs, self.lead_policy)
            .with_context(|| format!("Invalid lead_time_secs {}", self.lead_time_secs))
    }

    /// Reject values that would fail later at startup
    fn validate(&self) -> Result<()> {
        self.tz()?;
        self.lead()?;
        Ok(())
    }

    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| anyhow!("Invalid timezone {:?}: {}", self.timezone, e))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReplyConfig {
    #[serde(default = "default_reply_message")]
    pub default_message: String,
}

impl Default for ReplyConfig {
    fn default() -> Self {
        Self {
            default_message: default_reply_message(),
        }
    }
}

fn default_reply_message() -> String {
    DEFAULT_REPLY_MESSAGE.to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    pub start_time: String,
    pub end_time: String,
    pub days: Vec<String>,
    #[serde(default)]
    pub reply_message: Option<String>,
}

impl ScheduleConfig {
    /// Settings to store for this schedule, not yet active
    pub fn to_settings(&self, reply: &ReplyConfig) -> ScheduleSettings {
        ScheduleSettings {
            start_time: self.start_time.clone(),
            end_time: self.end_time.clone(),
            days: self.days.iter().cloned().collect(),
            reply_message: self
                .reply_message
                .clone()
                .unwrap_or_else(|| reply.default_message.clone()),
            is_active: false,
        }
    }
}

impl Config {
    /// Load configuration from dndlion.toml
    pub fn load() -> Result<Self> {
        Self::load_from("dndlion.toml")
    }

    /// Load configuration from a specific path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        // Try to load from file first
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;

            let mut config = Self::parse(&content)
                .with_context(|| format!("Failed to parse config from {}", path.display()))?;

            // Expand environment variables
            config.expand_env_vars();
            return Ok(config);
        }

        // Fall back to environment variables only
        Self::from_env()
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.scheduler.validate()?;
        Ok(config)
    }

    /// Load configuration entirely from environment variables
    pub fn from_env() -> Result<Self> {
        let lead_policy = match std::env::var("DND_LEAD_POLICY") {
            Ok(policy) => match policy.as_str() {
                "enable_only" => LeadPolicy::EnableOnly,
                "both_edges" => LeadPolicy::BothEdges,
                other => return Err(anyhow!("Unknown DND_LEAD_POLICY: {}", other)),
            },
            Err(_) => LeadPolicy::default(),
        };

        let lead_time_secs = match std::env::var("DND_LEAD_TIME_SECS") {
            Ok(secs) => secs
                .trim()
                .parse()
                .with_context(|| format!("DND_LEAD_TIME_SECS is not a number: {:?}", secs))?,
            Err(_) => default_lead_time_secs(),
        };

        let schedule = match (
            std::env::var("DND_START_TIME"),
            std::env::var("DND_END_TIME"),
            std::env::var("DND_DAYS"),
        ) {
            (Ok(start_time), Ok(end_time), Ok(days)) => Some(ScheduleConfig {
                start_time,
                end_time,
                days: days
                    .split(',')
                    .map(|d| d.trim().to_string())
                    .filter(|d| !d.is_empty())
                    .collect(),
                reply_message: None,
            }),
            _ => None,
        };

        let config = Config {
            database: DatabaseConfig {
                path: std::env::var("DATABASE_PATH").unwrap_or_else(|_| default_db_path()),
            },
            scheduler: SchedulerConfig {
                lead_time_secs,
                lead_policy,
                timezone: std::env::var("DND_TIMEZONE").unwrap_or_else(|_| default_timezone()),
            },
            reply: ReplyConfig {
                default_message: std::env::var("DND_REPLY_MESSAGE")
                    .unwrap_or_else(|_| default_reply_message()),
            },
            schedule,
        };
        config.scheduler.validate()?;
        Ok(config)
    }

    /// Expand ${VAR} patterns in string fields
    fn expand_env_vars(&mut self) {
        self.database.path = expand_env(&self.database.path);
        self.reply.default_message = expand_env(&self.reply.default_message);
        if let Some(ref mut schedule) = self.schedule {
            if let Some(ref mut message) = schedule.reply_message {
                *message = expand_env(message);
            }
        }
    }
}

/// Expand ${VAR} patterns in a string
fn expand_env(s: &str) -> String {
    let mut result = s.to_string();

    // Find all ${VAR} patterns
    while let Some(start) = result.find("${") {
        if let Some(end) = result[start..].find('}') {
            let var_name = &result[start + 2..start + end];
            let replacement = std::env::var(var_name).unwrap_or_default();
            result = format!("{}{}{}", &result[..start], replacement, &result[start + end + 1..]);
        } else {
            break;
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_expand_env() {
        std::env::set_var("DNDLION_TEST_VAR", "hello");
        assert_eq!(expand_env("${DNDLION_TEST_VAR}"), "hello");
        assert_eq!(expand_env("prefix_${DNDLION_TEST_VAR}_suffix"), "prefix_hello_suffix");
        assert_eq!(expand_env("no vars"), "no vars");
        std::env::remove_var("DNDLION_TEST_VAR");
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.database.path, "dndlion.db");
        assert_eq!(config.scheduler.lead().unwrap(), LeadTime::default());
        assert_eq!(config.scheduler.tz().unwrap(), Tz::UTC);
        assert_eq!(config.reply.default_message, DEFAULT_REPLY_MESSAGE);
        assert!(config.schedule.is_none());
    }

    #[test]
    fn test_full_config() {
        let config = Config::parse(
            r#"
            [database]
            path = "/var/lib/dndlion/settings.db"

            [scheduler]
            lead_time_secs = 30
            lead_policy = "both_edges"
            timezone = "Europe/Berlin"

            [schedule]
            start_time = "10:00 PM"
            end_time = "07:00 AM"
            days = ["Mon", "Tue"]
            "#,
        )
        .unwrap();

        assert_eq!(
            config.scheduler.lead().unwrap(),
            LeadTime::new(30, LeadPolicy::BothEdges).unwrap()
        );
        assert_eq!(config.scheduler.tz().unwrap(), chrono_tz::Europe::Berlin);

        let settings = config.schedule.unwrap().to_settings(&config.reply);
        assert_eq!(settings.reply_message, DEFAULT_REPLY_MESSAGE);
        assert!(settings.to_request().unwrap().is_overnight());
    }

    #[test]
    fn test_bad_timezone_is_rejected() {
        assert!(Config::parse("[scheduler]\ntimezone = \"Mars/Olympus\"").is_err());
    }

    #[test]
    fn test_out_of_range_lead_time_is_rejected() {
        assert!(Config::parse("[scheduler]\nlead_time_secs = 9223372036854775807").is_err());
        assert!(Config::parse("[scheduler]\nlead_time_secs = -10").is_err());
        assert!(Config::parse("[scheduler]\nlead_time_secs = 3601").is_err());
        assert!(Config::parse("[scheduler]\nlead_time_secs = 0").is_ok());
    }

    #[test]
    fn test_missing_file_falls_back_to_env() {
        let config = Config::load_from("/nonexistent/dndlion.toml").unwrap();
        assert!(!config.database.path.is_empty());
    }
}
