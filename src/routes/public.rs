use std::net::IpAddr;

use rocket::form::Form;
use rocket::http::{CookieJar, Status};
use rocket::response::stream::{Event, EventStream};
use rocket::response::Redirect;
use rocket::serde::json::{self, Json};
use rocket::tokio::select;
use rocket::tokio::time::interval;
use rocket::{Route, Shutdown, State};
use rocket_dyn_templates::{context, Template};
use tracing::warn;

use crate::countdown::{TimeLeft, REFRESH_INTERVAL};
use crate::error::{FieldErrors, LookupError, SubmitError, TRY_AGAIN};
use crate::invite::normalize_code;
use crate::models::{Answer, ResolvedGuest};
use crate::settings::FormOptions;
use crate::state::AppState;
use crate::submission::RsvpAnswers;

const GUEST_COOKIE: &str = "guest";

#[derive(FromForm)]
struct Invitation {
    code: String,
}

#[derive(FromForm, Default)]
struct RsvpForm {
    status: Option<String>,
    plus_one_name: Option<String>,
    dietary_notes: Option<String>,
    free_text: Option<String>,
}

/// The guest resolved earlier in this browser session.
enum Session {
    /// Re-read from the store just now.
    Current(ResolvedGuest),
    /// The store could not be reached; this is the copy kept in the cookie.
    Remembered(ResolvedGuest),
    /// No guest, or the guest was removed.
    Missing,
}

fn remember_guest(cookies: &CookieJar<'_>, guest: &ResolvedGuest) {
    match json::to_string(guest) {
        Ok(value) => cookies.add_private((GUEST_COOKIE, value)),
        Err(e) => warn!(error = %e, "could not remember resolved guest"),
    }
}

fn remembered_guest(cookies: &CookieJar<'_>) -> Option<ResolvedGuest> {
    let cookie = cookies.get_private(GUEST_COOKIE)?;
    json::from_str(cookie.value()).ok()
}

#[get("/")]
async fn index(state: &State<AppState>) -> Template {
    let settings = state.settings().await;
    let info = settings.info();
    let time_left = state.countdown.current(settings.wedding_date().as_deref());

    Template::render(
        "index",
        context! {
            couple_names: &state.config.couple_names,
            time_left,
            weather_url: info.weather_url(),
            info,
        },
    )
}

#[get("/countdown")]
async fn countdown(state: &State<AppState>) -> Json<TimeLeft> {
    let settings = state.settings().await;
    Json(state.countdown.current(settings.wedding_date().as_deref()))
}

/// Pushes the countdown now and every minute after, until the viewer leaves
/// or the server shuts down. Dropping the stream drops its timer.
#[get("/countdown/stream")]
async fn countdown_stream(state: &State<AppState>, mut shutdown: Shutdown) -> EventStream![] {
    let clock = state.countdown;
    let wedding_date = state.settings().await.wedding_date();

    EventStream! {
        let mut ticker = interval(REFRESH_INTERVAL);
        loop {
            select! {
                _ = ticker.tick() => {},
                _ = &mut shutdown => break,
            }
            yield Event::json(&clock.current(wedding_date.as_deref()));
        }
    }
}

fn code_page(code: &str, error: Option<LookupError>) -> Template {
    Template::render(
        "rsvp",
        context! {
            code,
            error: error.map(|e| e.to_string()),
        },
    )
}

async fn lookup(
    state: &AppState,
    cookies: &CookieJar<'_>,
    client_ip: Option<IpAddr>,
    code: &str,
) -> Result<Redirect, (Status, Template)> {
    if normalize_code(code).is_none() {
        return Err((Status::Ok, code_page(code, None)));
    }
    if state.throttle.is_blocked(client_ip).await {
        return Err((
            Status::TooManyRequests,
            code_page(code, Some(LookupError::Throttled)),
        ));
    }

    match state.resolver.resolve(code).await {
        Ok(Some(guest)) => {
            remember_guest(cookies, &guest);
            Ok(Redirect::to(uri!("/rsvp/form")))
        }
        Ok(None) => Err((Status::Ok, code_page(code, None))),
        Err(e) => {
            if e == LookupError::NotFound {
                state.throttle.record_failure(client_ip).await;
            }
            Err((Status::NotFound, code_page(code, Some(e))))
        }
    }
}

#[get("/rsvp?<code>")]
async fn rsvp(
    state: &State<AppState>,
    cookies: &CookieJar<'_>,
    client_ip: Option<IpAddr>,
    code: Option<&str>,
) -> Result<Redirect, (Status, Template)> {
    lookup(state, cookies, client_ip, code.unwrap_or_default()).await
}

#[post("/rsvp", data = "<invitation>")]
async fn authenticate(
    state: &State<AppState>,
    cookies: &CookieJar<'_>,
    client_ip: Option<IpAddr>,
    invitation: Form<Invitation>,
) -> Result<Redirect, (Status, Template)> {
    lookup(state, cookies, client_ip, &invitation.code).await
}

async fn current_guest(state: &AppState, cookies: &CookieJar<'_>) -> Session {
    let Some(remembered) = remembered_guest(cookies) else {
        return Session::Missing;
    };
    match state.resolver.resume(&remembered.id).await {
        Ok(guest) => {
            if guest != remembered {
                remember_guest(cookies, &guest);
            }
            Session::Current(guest)
        }
        Err(LookupError::NotFound) => {
            cookies.remove_private(GUEST_COOKIE);
            Session::Missing
        }
        Err(_) => Session::Remembered(remembered),
    }
}

fn unavailable(
    guest: &ResolvedGuest,
    options: &FormOptions,
    values: &RsvpForm,
) -> (Status, Template) {
    (
        Status::ServiceUnavailable,
        form_page(guest, options, values, &FieldErrors::new(), Some(TRY_AGAIN.to_owned())),
    )
}

fn form_page(
    guest: &ResolvedGuest,
    options: &FormOptions,
    values: &RsvpForm,
    errors: &FieldErrors,
    notice: Option<String>,
) -> Template {
    Template::render(
        "form",
        context! {
            name: &guest.name,
            plus_one_allowed: guest.plus_one_allowed,
            options,
            status: values.status.as_deref().unwrap_or("attending"),
            plus_one_name: values.plus_one_name.as_deref().unwrap_or_default(),
            dietary_notes: values.dietary_notes.as_deref().unwrap_or_default(),
            free_text: values.free_text.as_deref().unwrap_or_default(),
            errors,
            notice,
        },
    )
}

#[get("/rsvp/form")]
async fn rsvp_form(
    state: &State<AppState>,
    cookies: &CookieJar<'_>,
) -> Result<(Status, Template), Redirect> {
    let options = state.settings().await.form_options();
    let blank = RsvpForm::default();

    match current_guest(state, cookies).await {
        Session::Current(guest) => Ok((
            Status::Ok,
            form_page(&guest, &options, &blank, &FieldErrors::new(), None),
        )),
        Session::Remembered(guest) => Ok(unavailable(&guest, &options, &blank)),
        Session::Missing => Err(Redirect::to(uri!("/rsvp"))),
    }
}

#[post("/rsvp/form", data = "<form>")]
async fn rsvp_submit(
    state: &State<AppState>,
    cookies: &CookieJar<'_>,
    form: Form<RsvpForm>,
) -> Result<Redirect, (Status, Template)> {
    let options = state.settings().await.form_options();
    let values = form.into_inner();
    let guest = match current_guest(state, cookies).await {
        Session::Current(guest) => guest,
        Session::Remembered(guest) => return Err(unavailable(&guest, &options, &values)),
        Session::Missing => return Ok(Redirect::to(uri!("/rsvp"))),
    };

    let Some(answer) = values.status.as_deref().and_then(|s| s.parse::<Answer>().ok()) else {
        let mut errors = FieldErrors::new();
        errors.insert("status", "Please let us know if you can make it.".to_owned());
        return Err((
            Status::UnprocessableEntity,
            form_page(&guest, &options, &values, &errors, None),
        ));
    };

    let answers = RsvpAnswers {
        answer,
        plus_one_name: values.plus_one_name.clone(),
        dietary_notes: values.dietary_notes.clone(),
        free_text: values.free_text.clone(),
    };

    match state.workflow.submit(&guest, &answers, &options).await {
        Ok(done) => Ok(Redirect::to(uri!(thanks(attending = done.attending)))),
        Err(SubmitError::Validation(errors)) => Err((
            Status::UnprocessableEntity,
            form_page(&guest, &options, &values, &errors, None),
        )),
        Err(e) => {
            let status = match e {
                SubmitError::InProgress => Status::Conflict,
                _ => Status::ServiceUnavailable,
            };
            warn!(guest_id = %guest.id, error = %e, "rsvp not saved");
            Err((
                status,
                form_page(&guest, &options, &values, &FieldErrors::new(), Some(e.to_string())),
            ))
        }
    }
}

#[get("/rsvp/thanks?<attending>")]
async fn thanks(state: &State<AppState>, attending: bool) -> Template {
    let info = state.settings().await.info();
    Template::render(
        "thanks",
        context! {
            attending,
            couple_names: &state.config.couple_names,
            weather_url: info.weather_url(),
            has_details: info.has_details(),
            info,
        },
    )
}

pub fn routes() -> Vec<Route> {
    routes![
        index,
        countdown,
        countdown_stream,
        rsvp,
        authenticate,
        rsvp_form,
        rsvp_submit,
        thanks
    ]
}
