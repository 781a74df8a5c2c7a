use std::sync::Arc;

use crate::admin::GuestAdmin;
use crate::config::{AppConfig, ConfigError};
use crate::countdown::Countdown;
use crate::invite::InviteResolver;
use crate::notify::{self, Notifier};
use crate::settings::WeddingSettings;
use crate::store::{GuestRepository, RsvpRepository, SettingsRepository};
use crate::submission::RsvpWorkflow;
use crate::throttle::{AttemptStore, LookupThrottle};

/// Backends the service is assembled from.
pub struct Backends {
    pub guests: Arc<dyn GuestRepository>,
    pub rsvps: Arc<dyn RsvpRepository>,
    pub settings: Arc<dyn SettingsRepository>,
    pub attempts: Arc<dyn AttemptStore>,
    /// `None` builds the notifier from `config.mail`.
    pub notifier: Option<Arc<dyn Notifier>>,
}

/// Everything handlers need, held in Rocket managed state.
pub struct AppState {
    pub config: AppConfig,
    pub resolver: InviteResolver,
    pub workflow: RsvpWorkflow,
    pub throttle: LookupThrottle,
    pub admin: GuestAdmin,
    pub countdown: Countdown,
    settings: Arc<dyn SettingsRepository>,
}

impl AppState {
    pub fn new(config: AppConfig, backends: Backends) -> Result<Self, ConfigError> {
        let countdown = Countdown::new(config.venue_offset()?, config.fallback_wedding_date);
        let notifier = backends
            .notifier
            .unwrap_or_else(|| mail_notifier(&config));

        Ok(Self {
            resolver: InviteResolver::new(backends.guests.clone()),
            workflow: RsvpWorkflow::new(backends.rsvps, notifier),
            throttle: LookupThrottle::new(
                backends.attempts,
                config.max_failed_lookups,
                config.lookup_ban_secs,
            ),
            admin: GuestAdmin::new(backends.guests),
            countdown,
            settings: backends.settings,
            config,
        })
    }

    /// Current settings; a failing store yields defaults.
    pub async fn settings(&self) -> WeddingSettings {
        WeddingSettings::load_or_default(self.settings.as_ref()).await
    }
}

fn mail_notifier(config: &AppConfig) -> Arc<dyn Notifier> {
    let Some(mail) = &config.mail else {
        tracing::info!("no mail relay configured, response mails disabled");
        return Arc::new(notify::Disabled);
    };
    match notify::SmtpNotifier::new(mail) {
        Ok(notifier) => Arc::new(notifier),
        Err(e) => {
            tracing::warn!(error = %e, "mail relay misconfigured, response mails disabled");
            Arc::new(notify::Disabled)
        }
    }
}
