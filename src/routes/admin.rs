use rocket::form::Form;
use rocket::http::{CookieJar, Status};
use rocket::request::FlashMessage;
use rocket::response::{Flash, Redirect};
use rocket::{Route, State};
use rocket_dyn_templates::{context, Template};
use serde::Serialize;
use tracing::warn;

use crate::admin::{self, clean_details, AdminSession, GuestFormError, GuestStats};
use crate::error::AppError;
use crate::models::{Guest, GuestWithRsvp};
use crate::state::AppState;

#[derive(FromForm)]
struct Login {
    password: String,
}

#[derive(FromForm)]
struct GuestForm {
    name: String,
    email: Option<String>,
    phone: Option<String>,
    plus_one_allowed: bool,
}

#[derive(Responder)]
enum Saved {
    Done(Flash<Redirect>),
    Rejected((Status, Template)),
}

#[derive(Serialize)]
struct Notice {
    kind: String,
    message: String,
}

/// One dashboard line.
#[derive(Serialize)]
struct GuestLine<'a> {
    #[serde(flatten)]
    entry: &'a GuestWithRsvp,
    status: &'static str,
    invite_link: String,
}

#[get("/login")]
fn login_page(session: Option<AdminSession>) -> Result<Template, Redirect> {
    match session {
        Some(_) => Err(Redirect::to("/admin")),
        None => Ok(Template::render("admin_login", context! { error: None::<&str> })),
    }
}

#[post("/login", data = "<form>")]
fn login(
    state: &State<AppState>,
    cookies: &CookieJar<'_>,
    form: Form<Login>,
) -> Result<Redirect, (Status, Template)> {
    if admin::password_matches(state.config.admin_password_sha256.as_deref(), &form.password) {
        admin::start_session(cookies);
        return Ok(Redirect::to("/admin"));
    }
    warn!("failed admin login");
    Err((
        Status::Forbidden,
        Template::render("admin_login", context! { error: "Wrong password." }),
    ))
}

#[post("/logout")]
fn logout(cookies: &CookieJar<'_>) -> Redirect {
    admin::end_session(cookies);
    Redirect::to("/admin/login")
}

#[get("/?<q>")]
async fn dashboard(
    _session: AdminSession,
    state: &State<AppState>,
    flash: Option<FlashMessage<'_>>,
    q: Option<&str>,
) -> Result<Template, AppError> {
    let guests = state.admin.list(q).await?;
    let stats = GuestStats::tally(&guests);
    let lines: Vec<GuestLine<'_>> = guests
        .iter()
        .map(|entry| GuestLine {
            entry,
            status: entry.status().label(),
            invite_link: state.config.invite_link(&entry.guest.invite_code),
        })
        .collect();

    Ok(Template::render(
        "admin",
        context! {
            stats,
            guests: lines,
            q: q.unwrap_or_default(),
            flash: flash.map(|f| Notice {
                kind: f.kind().to_owned(),
                message: f.message().to_owned(),
            }),
        },
    ))
}

#[post("/guests", data = "<form>")]
async fn add_guest(
    _session: AdminSession,
    state: &State<AppState>,
    form: Form<GuestForm>,
) -> Flash<Redirect> {
    let to_dashboard = Redirect::to("/admin");
    let added = match clean_details(
        &form.name,
        form.email.as_deref(),
        form.phone.as_deref(),
        form.plus_one_allowed,
    ) {
        Ok(details) => state.admin.add(&details).await,
        Err(e) => Err(e),
    };

    match added {
        Ok(guest) => Flash::success(
            to_dashboard,
            format!("Added {} with code {}.", guest.name, guest.invite_code),
        ),
        Err(e) => {
            if let GuestFormError::Store(cause) = &e {
                warn!(error = %cause, "guest not added");
            }
            Flash::error(to_dashboard, e.to_string())
        }
    }
}

fn edit_page(guest: &Guest, error: Option<String>) -> Template {
    Template::render("admin_edit", context! { guest, error })
}

#[get("/guests/<id>/edit")]
async fn edit_guest(
    _session: AdminSession,
    state: &State<AppState>,
    id: &str,
) -> Result<Template, AppError> {
    let guest = state.admin.get(id).await?.ok_or(AppError::NotFound)?;
    Ok(edit_page(&guest, None))
}

#[post("/guests/<id>", data = "<form>")]
async fn update_guest(
    _session: AdminSession,
    state: &State<AppState>,
    id: &str,
    form: Form<GuestForm>,
) -> Result<Saved, AppError> {
    let details = clean_details(
        &form.name,
        form.email.as_deref(),
        form.phone.as_deref(),
        form.plus_one_allowed,
    );
    let outcome = match details {
        Ok(details) => state.admin.update(id, &details).await,
        Err(e) => Err(e),
    };

    match outcome {
        Ok(Some(guest)) => Ok(Saved::Done(Flash::success(
            Redirect::to("/admin"),
            format!("Saved {}.", guest.name),
        ))),
        Ok(None) => Err(AppError::NotFound),
        Err(GuestFormError::Store(e)) => Err(AppError::Internal(e)),
        Err(e @ GuestFormError::NameRequired) => {
            let guest = state.admin.get(id).await?.ok_or(AppError::NotFound)?;
            Ok(Saved::Rejected((
                Status::UnprocessableEntity,
                edit_page(&guest, Some(e.to_string())),
            )))
        }
    }
}

#[post("/guests/<id>/delete")]
async fn delete_guest(
    _session: AdminSession,
    state: &State<AppState>,
    id: &str,
) -> Result<Flash<Redirect>, AppError> {
    if !state.admin.remove(id).await? {
        return Err(AppError::NotFound);
    }
    Ok(Flash::success(Redirect::to("/admin"), "Guest removed."))
}

#[catch(401)]
fn unauthorized() -> Redirect {
    Redirect::to("/admin/login")
}

pub fn routes() -> Vec<Route> {
    routes![
        login_page,
        login,
        logout,
        dashboard,
        add_guest,
        edit_guest,
        update_guest,
        delete_guest
    ]
}

pub fn catchers() -> Vec<rocket::Catcher> {
    catchers![unauthorized]
}
