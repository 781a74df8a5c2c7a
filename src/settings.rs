//! Typed view over the `wedding_settings` key/value collection.

use std::collections::HashMap;

use serde::Serialize;
use tracing::warn;

use crate::error::StoreError;
use crate::store::SettingsRepository;

pub const WEDDING_DATE: &str = "wedding_date";
pub const ENABLE_DIETARY: &str = "enable_dietary";
pub const FREE_TEXT_MODE: &str = "free_text_mode";
pub const SONG_REQUEST_REQUIRED: &str = "song_request_required";
pub const WATERMARK_URL: &str = "watermark_url";
pub const VENUE_TEXT: &str = "venue_text";
pub const DIRECTIONS_TEXT: &str = "directions_text";
pub const DIRECTIONS_MAP_URL: &str = "directions_map_url";
pub const ACCOMMODATION_TEXT: &str = "accommodation_text";
pub const NOTES_TEXT: &str = "notes_text";
pub const WEATHER_LOCATION: &str = "weather_location";

pub const KNOWN_KEYS: [&str; 11] = [
    WEDDING_DATE,
    ENABLE_DIETARY,
    FREE_TEXT_MODE,
    SONG_REQUEST_REQUIRED,
    WATERMARK_URL,
    VENUE_TEXT,
    DIRECTIONS_TEXT,
    DIRECTIONS_MAP_URL,
    ACCOMMODATION_TEXT,
    NOTES_TEXT,
    WEATHER_LOCATION,
];

const DEFAULT_WEATHER_LOCATION: &str = "Kirkwood,Eastern Cape,ZA";

/// What the guest's free-text field is collecting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FreeTextMode {
    #[default]
    SongRequest,
    Message,
}

/// Switches that shape the RSVP form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FormOptions {
    pub enable_dietary: bool,
    pub free_text_mode: FreeTextMode,
    pub song_request_required: bool,
}

impl Default for FormOptions {
    fn default() -> Self {
        Self {
            enable_dietary: true,
            free_text_mode: FreeTextMode::SongRequest,
            song_request_required: true,
        }
    }
}

impl FormOptions {
    /// The song request must be filled in for this answer.
    pub fn requires_song_request(&self, attending: bool) -> bool {
        attending && self.free_text_mode == FreeTextMode::SongRequest && self.song_request_required
    }
}

/// Free-text wedding details shown on the landing and thank-you pages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WeddingInfo {
    pub venue_text: Option<String>,
    pub directions_text: Option<String>,
    pub directions_map_url: Option<String>,
    pub accommodation_text: Option<String>,
    pub notes_text: Option<String>,
    pub weather_location: String,
    pub watermark_url: Option<String>,
}

impl WeddingInfo {
    pub fn has_details(&self) -> bool {
        [&self.venue_text, &self.directions_text, &self.accommodation_text, &self.notes_text]
            .iter()
            .any(|text| text.is_some())
    }

    pub fn weather_url(&self) -> String {
        format!(
            "https://www.accuweather.com/en/search-locations?query={}",
            urlencoding::encode(&self.weather_location)
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WeddingSettings {
    values: HashMap<String, String>,
}

impl WeddingSettings {
    pub fn from_values(values: HashMap<String, String>) -> Self {
        Self { values }
    }

    pub async fn load(repo: &dyn SettingsRepository) -> Result<Self, StoreError> {
        repo.load(&KNOWN_KEYS).await.map(Self::from_values)
    }

    /// Like [`WeddingSettings::load`], but a failing store yields defaults.
    pub async fn load_or_default(repo: &dyn SettingsRepository) -> Self {
        Self::load(repo).await.unwrap_or_else(|e| {
            warn!(error = %e, "wedding settings unavailable, using defaults");
            Self::default()
        })
    }

    fn text(&self, key: &str) -> Option<String> {
        self.values
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(str::to_owned)
    }

    fn flag(&self, key: &str, default: bool) -> bool {
        match self.values.get(key).map(|v| v.trim().to_ascii_lowercase()) {
            None => default,
            Some(v) => match v.as_str() {
                "true" | "1" | "yes" | "on" => true,
                "false" | "0" | "no" | "off" => false,
                _ => {
                    warn!(key, value = %v, "unrecognised boolean setting");
                    default
                }
            },
        }
    }

    pub fn wedding_date(&self) -> Option<String> {
        self.text(WEDDING_DATE)
    }

    pub fn form_options(&self) -> FormOptions {
        let defaults = FormOptions::default();
        let free_text_mode = match self.text(FREE_TEXT_MODE).as_deref() {
            None | Some("song_request") => FreeTextMode::SongRequest,
            Some("message") => FreeTextMode::Message,
            Some(other) => {
                warn!(value = other, "unrecognised free_text_mode");
                defaults.free_text_mode
            }
        };

        FormOptions {
            enable_dietary: self.flag(ENABLE_DIETARY, defaults.enable_dietary),
            free_text_mode,
            song_request_required: self.flag(SONG_REQUEST_REQUIRED, defaults.song_request_required),
        }
    }

    pub fn info(&self) -> WeddingInfo {
        WeddingInfo {
            venue_text: self.text(VENUE_TEXT),
            directions_text: self.text(DIRECTIONS_TEXT),
            directions_map_url: self.text(DIRECTIONS_MAP_URL),
            accommodation_text: self.text(ACCOMMODATION_TEXT),
            notes_text: self.text(NOTES_TEXT),
            weather_location: self
                .text(WEATHER_LOCATION)
                .unwrap_or_else(|| DEFAULT_WEATHER_LOCATION.to_owned()),
            watermark_url: self.text(WATERMARK_URL),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(pairs: &[(&str, &str)]) -> WeddingSettings {
        WeddingSettings::from_values(
            pairs
                .iter()
                .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
                .collect(),
        )
    }

    #[test]
    fn empty_settings_give_the_full_form() {
        let options = settings(&[]).form_options();
        assert_eq!(options, FormOptions::default());
        assert!(options.requires_song_request(true));
        assert!(!options.requires_song_request(false));
    }

    #[test]
    fn message_mode_never_requires_a_song() {
        let options = settings(&[(FREE_TEXT_MODE, "message")]).form_options();
        assert!(!options.requires_song_request(true));
    }

    #[test]
    fn flags_accept_common_spellings() {
        let options = settings(&[(ENABLE_DIETARY, " FALSE "), (SONG_REQUEST_REQUIRED, "0")])
            .form_options();
        assert!(!options.enable_dietary);
        assert!(!options.song_request_required);

        let garbled = settings(&[(ENABLE_DIETARY, "perhaps")]).form_options();
        assert!(garbled.enable_dietary);
    }

    #[test]
    fn blank_text_settings_read_as_unset() {
        let info = settings(&[(NOTES_TEXT, "   "), (WEATHER_LOCATION, "")]).info();
        assert_eq!(info.notes_text, None);
        assert_eq!(info.weather_location, DEFAULT_WEATHER_LOCATION);
        assert!(!info.has_details());
    }

    #[test]
    fn weather_link_is_percent_encoded() {
        let info = settings(&[]).info();
        assert_eq!(
            info.weather_url(),
            "https://www.accuweather.com/en/search-locations?query=Kirkwood%2CEastern%20Cape%2CZA"
        );
    }
}
