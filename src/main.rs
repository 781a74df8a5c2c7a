#[macro_use]
extern crate rocket;

use std::sync::Arc;

use rocket::fairing::AdHoc;
use rocket::{Build, Rocket};
use rocket_db_pools::diesel::MysqlPool;
use rocket_db_pools::{deadpool_redis, Database};
use tracing::{error, info};

use wedding_rsvp::config::AppConfig;
use wedding_rsvp::state::{AppState, Backends};
use wedding_rsvp::store::MysqlStore;
use wedding_rsvp::throttle::RedisAttempts;

#[derive(Database)]
#[database("rsvp")]
struct Db(MysqlPool);

#[derive(Database)]
#[database("redis")]
struct Redis(deadpool_redis::Pool);

async fn assemble(rocket: Rocket<Build>) -> Result<Rocket<Build>, Rocket<Build>> {
    let config = match AppConfig::from_figment(rocket.figment()) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "bad configuration");
            return Err(rocket);
        }
    };

    let (Some(db), Some(redis)) = (Db::fetch(&rocket), Redis::fetch(&rocket)) else {
        error!("database pools are not initialised");
        return Err(rocket);
    };
    let store = Arc::new(MysqlStore::new(db.0.clone()));
    let backends = Backends {
        guests: store.clone(),
        rsvps: store.clone(),
        settings: store,
        attempts: Arc::new(RedisAttempts::new(redis.0.clone())),
        notifier: None,
    };

    match AppState::new(config, backends) {
        Ok(state) => {
            info!(couple = %state.config.couple_names, "rsvp service ready");
            Ok(rocket.manage(state))
        }
        Err(e) => {
            error!(error = %e, "bad configuration");
            Err(rocket)
        }
    }
}

#[launch]
fn rocket() -> _ {
    wedding_rsvp::init_tracing();

    wedding_rsvp::mount(rocket::build())
        .attach(Db::init())
        .attach(Redis::init())
        .attach(AdHoc::try_on_ignite("Wedding services", assemble))
}
