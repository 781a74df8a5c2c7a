#![allow(dead_code)]

use std::sync::Arc;

use rocket::local::asynchronous::Client;
use wedding_rsvp::config::AppConfig;
use wedding_rsvp::models::{Guest, GuestDetails};
use wedding_rsvp::notify::{Notifier, Recording};
use wedding_rsvp::state::{AppState, Backends};
use wedding_rsvp::store::{GuestRepository, MemoryStore};
use wedding_rsvp::throttle::MemoryAttempts;

/// sha256("secret")
pub const ADMIN_PASSWORD_SHA256: &str =
    "2bb80d537b1da3e38bd30361aa855686bde0eacd7162fef6a25fe97bf527a25b";

pub struct TestApp {
    pub client: Client,
    pub store: Arc<MemoryStore>,
    pub notices: Arc<Recording>,
}

pub fn config() -> AppConfig {
    AppConfig {
        public_url: "https://wedding.test".to_owned(),
        max_failed_lookups: 3,
        admin_password_sha256: Some(ADMIN_PASSWORD_SHA256.to_owned()),
        ..AppConfig::default()
    }
}

pub async fn app() -> TestApp {
    app_with(config()).await
}

pub async fn app_with(config: AppConfig) -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let notices = Arc::new(Recording::default());
    let state = AppState::new(
        config,
        Backends {
            guests: store.clone(),
            rsvps: store.clone(),
            settings: store.clone(),
            attempts: Arc::new(MemoryAttempts::new()),
            notifier: Some(notices.clone() as Arc<dyn Notifier>),
        },
    )
    .expect("valid test config");

    let client = Client::tracked(wedding_rsvp::build(state))
        .await
        .expect("valid rocket instance");

    TestApp {
        client,
        store,
        notices,
    }
}

pub async fn guest(store: &MemoryStore, name: &str, code: &str, plus_one_allowed: bool) -> Guest {
    let details = GuestDetails {
        name: name.to_owned(),
        plus_one_allowed,
        ..GuestDetails::default()
    };
    store.insert(&details, code).await.expect("guest inserted")
}
