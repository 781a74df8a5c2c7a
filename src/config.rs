//! Service configuration, read from the `wedding` table of Rocket's figment
//! (`Rocket.toml` profiles, overridable with `ROCKET_WEDDING_*` variables).

use chrono::{FixedOffset, NaiveDate};
use rocket::figment::Figment;
use serde::Deserialize;
use tracing::info;

pub const CONFIG_KEY: &str = "wedding";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub couple_names: String,
    /// Origin used when building invite links, e.g. `https://example.wedding`.
    pub public_url: String,
    pub fallback_wedding_date: NaiveDate,
    /// Venue wall-clock offset, `+02:00` style.
    pub utc_offset: String,
    pub max_failed_lookups: u32,
    pub lookup_ban_secs: i64,
    /// Hex SHA-256 of the admin password. Admin login is disabled when unset.
    pub admin_password_sha256: Option<String>,
    pub mail: Option<MailConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    pub relay: String,
    pub username: String,
    pub password: String,
    pub from: String,
    pub to: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            couple_names: "Roan & Lariney".to_owned(),
            public_url: "http://127.0.0.1:8000".to_owned(),
            fallback_wedding_date: NaiveDate::from_ymd_opt(2026, 8, 1).unwrap_or_default(),
            utc_offset: "+02:00".to_owned(),
            max_failed_lookups: 5,
            lookup_ban_secs: 86_400,
            admin_password_sha256: None,
            mail: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid `{CONFIG_KEY}` configuration: {0}")]
    Extract(#[from] rocket::figment::Error),

    #[error("invalid utc_offset {0:?}, expected something like +02:00")]
    Offset(String),
}

impl AppConfig {
    pub fn from_figment(figment: &Figment) -> Result<Self, ConfigError> {
        let config: Self = if figment.contains(CONFIG_KEY) {
            figment.focus(CONFIG_KEY).extract()?
        } else {
            info!("no [{CONFIG_KEY}] configuration found, using defaults");
            Self::default()
        };
        config.venue_offset()?;
        Ok(config)
    }

    pub fn venue_offset(&self) -> Result<FixedOffset, ConfigError> {
        self.utc_offset
            .trim()
            .parse()
            .map_err(|_| ConfigError::Offset(self.utc_offset.clone()))
    }

    pub fn invite_link(&self, invite_code: &str) -> String {
        format!(
            "{}/rsvp?code={invite_code}",
            self.public_url.trim_end_matches('/')
        )
    }
}
