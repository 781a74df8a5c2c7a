#[macro_use]
extern crate rocket;

use rocket::{Build, Rocket};
use rocket_dyn_templates::Template;
use tracing_subscriber::{fmt, EnvFilter};

pub mod admin;
pub mod config;
pub mod countdown;
pub mod error;
pub mod invite;
pub mod models;
pub mod notify;
pub mod routes;
pub mod schema;
pub mod settings;
pub mod state;
pub mod store;
pub mod submission;
pub mod throttle;

use state::AppState;

/// Installs the `RUST_LOG` driven subscriber. Safe to call more than once.
pub fn init_tracing() {
    let _ = fmt().with_env_filter(EnvFilter::from_default_env()).try_init();
}

/// Routes, catchers and templates, without any backend.
pub fn mount(rocket: Rocket<Build>) -> Rocket<Build> {
    rocket
        .mount("/", routes::public::routes())
        .mount("/admin", routes::admin::routes())
        .register("/admin", routes::admin::catchers())
        .attach(Template::fairing())
}

/// A complete application over already-built state.
pub fn build(state: AppState) -> Rocket<Build> {
    mount(rocket::build()).manage(state)
}
