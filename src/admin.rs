//! Admin session and guest management.

use std::sync::Arc;

use rocket::http::{Cookie, CookieJar, SameSite, Status};
use rocket::request::{FromRequest, Outcome, Request};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::error::StoreError;
use crate::invite::generate_unique_code;
use crate::models::{AttendanceStatus, Guest, GuestDetails, GuestWithRsvp};
use crate::store::GuestRepository;

pub const SESSION_COOKIE: &str = "admin_session";
const SESSION_HOURS: i64 = 12;

/// Proof that the request carries a valid admin session cookie. Requests
/// without one are forwarded with `401`, which the admin catcher turns into
/// a redirect to the login page.
pub struct AdminSession;

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AdminSession {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, ()> {
        match req.cookies().get_private(SESSION_COOKIE) {
            Some(_) => Outcome::Success(AdminSession),
            None => Outcome::Forward(Status::Unauthorized),
        }
    }
}

pub fn start_session(cookies: &CookieJar<'_>) {
    let cookie = Cookie::build((SESSION_COOKIE, "admin"))
        .same_site(SameSite::Strict)
        .max_age(rocket::time::Duration::hours(SESSION_HOURS));
    cookies.add_private(cookie);
}

pub fn end_session(cookies: &CookieJar<'_>) {
    cookies.remove_private(SESSION_COOKIE);
}

/// Checks `attempt` against the configured hex SHA-256 digest.
pub fn password_matches(expected_sha256: Option<&str>, attempt: &str) -> bool {
    let Some(expected) = expected_sha256 else {
        warn!("admin login attempted but no admin password is configured");
        return false;
    };
    let Ok(expected) = hex::decode(expected.trim()) else {
        warn!("admin_password_sha256 is not valid hex");
        return false;
    };

    let digest = Sha256::digest(attempt.as_bytes());
    expected.len() == digest.len()
        && expected
            .iter()
            .zip(digest.iter())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GuestStats {
    pub total: usize,
    pub attending: usize,
    pub not_attending: usize,
    pub maybe: usize,
    pub pending: usize,
    pub plus_ones: usize,
}

impl GuestStats {
    pub fn tally(guests: &[GuestWithRsvp]) -> Self {
        let mut stats = Self {
            total: guests.len(),
            ..Self::default()
        };
        for entry in guests {
            match entry.status() {
                AttendanceStatus::Attending => {
                    stats.attending += 1;
                    let bringing = entry.guest.plus_one_allowed
                        && entry
                            .rsvp
                            .as_ref()
                            .and_then(|r| r.plus_one_name.as_deref())
                            .is_some_and(|n| !n.trim().is_empty());
                    if bringing {
                        stats.plus_ones += 1;
                    }
                }
                AttendanceStatus::NotAttending => stats.not_attending += 1,
                AttendanceStatus::Maybe => stats.maybe += 1,
                AttendanceStatus::Pending => stats.pending += 1,
            }
        }
        stats
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GuestFormError {
    #[error("A guest needs a name.")]
    NameRequired,

    #[error("Could not save the guest.")]
    Store(#[from] StoreError),
}

fn optional(text: Option<&str>) -> Option<String> {
    text.map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_owned)
}

/// Trims the admin's input; blank contact fields become `None`.
pub fn clean_details(
    name: &str,
    email: Option<&str>,
    phone: Option<&str>,
    plus_one_allowed: bool,
) -> Result<GuestDetails, GuestFormError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(GuestFormError::NameRequired);
    }
    Ok(GuestDetails {
        name: name.to_owned(),
        email: optional(email),
        phone: optional(phone),
        plus_one_allowed,
    })
}

#[derive(Clone)]
pub struct GuestAdmin {
    guests: Arc<dyn GuestRepository>,
}

impl GuestAdmin {
    pub fn new(guests: Arc<dyn GuestRepository>) -> Self {
        Self { guests }
    }

    /// Guests newest first, optionally narrowed to names containing `query`.
    pub async fn list(&self, query: Option<&str>) -> Result<Vec<GuestWithRsvp>, StoreError> {
        let all = self.guests.list_with_rsvps().await?;
        let Some(needle) = query.map(str::trim).filter(|q| !q.is_empty()) else {
            return Ok(all);
        };
        let needle = needle.to_lowercase();
        Ok(all
            .into_iter()
            .filter(|g| g.guest.name.to_lowercase().contains(&needle))
            .collect())
    }

    pub async fn add(&self, details: &GuestDetails) -> Result<Guest, GuestFormError> {
        let code = generate_unique_code(self.guests.as_ref()).await?;
        let guest = self.guests.insert(details, &code).await?;
        info!(guest_id = %guest.id, "guest added");
        Ok(guest)
    }

    pub async fn get(&self, id: &str) -> Result<Option<Guest>, StoreError> {
        self.guests.find_by_id(id).await
    }

    pub async fn update(
        &self,
        id: &str,
        details: &GuestDetails,
    ) -> Result<Option<Guest>, GuestFormError> {
        let updated = self.guests.update(id, details).await?;
        if updated.is_some() {
            info!(guest_id = id, "guest updated");
        }
        Ok(updated)
    }

    pub async fn remove(&self, id: &str) -> Result<bool, StoreError> {
        let removed = self.guests.delete(id).await?;
        if removed {
            info!(guest_id = id, "guest removed");
        }
        Ok(removed)
    }
}
