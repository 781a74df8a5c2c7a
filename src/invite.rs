//! Invitation codes: normalization, lookup, and generation.

use std::sync::Arc;

use rand::{distributions::Alphanumeric, Rng};
use tracing::{debug, info, warn};

use crate::error::{LookupError, StoreError};
use crate::models::ResolvedGuest;
use crate::store::GuestRepository;

pub const CODE_LEN: usize = 8;
const MAX_GENERATION_ATTEMPTS: usize = 16;

/// Trimmed, lower-cased form of a typed code, or `None` when nothing was typed.
pub fn normalize_code(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

#[derive(Clone)]
pub struct InviteResolver {
    guests: Arc<dyn GuestRepository>,
}

impl InviteResolver {
    pub fn new(guests: Arc<dyn GuestRepository>) -> Self {
        Self { guests }
    }

    /// Resolves a typed code to its guest.
    ///
    /// Blank input resolves to `Ok(None)` without querying. A failing store
    /// is logged and reported as [`LookupError::Unavailable`], which shows the
    /// guest the same message as an unknown code.
    pub async fn resolve(&self, raw: &str) -> Result<Option<ResolvedGuest>, LookupError> {
        let Some(code) = normalize_code(raw) else {
            return Ok(None);
        };

        match self.guests.find_by_code(&code).await {
            Ok(Some(guest)) => {
                info!(guest_id = %guest.id, "invitation resolved");
                Ok(Some(guest.into()))
            }
            Ok(None) => {
                debug!(code_len = code.len(), "no guest for invitation code");
                Err(LookupError::NotFound)
            }
            Err(e) => {
                warn!(error = %e, "invitation lookup failed");
                Err(LookupError::Unavailable)
            }
        }
    }

    /// Re-reads a guest previously resolved in this session. `NotFound` means
    /// the guest was removed; `Unavailable` means the store could not say.
    pub async fn resume(&self, guest_id: &str) -> Result<ResolvedGuest, LookupError> {
        match self.guests.find_by_id(guest_id).await {
            Ok(Some(guest)) => Ok(guest.into()),
            Ok(None) => Err(LookupError::NotFound),
            Err(e) => {
                warn!(error = %e, guest_id, "guest reload failed");
                Err(LookupError::Unavailable)
            }
        }
    }
}

fn random_code() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(CODE_LEN)
        .map(char::from)
        .collect::<String>()
        .to_ascii_lowercase()
}

/// Draws random codes until one is not already taken.
pub async fn generate_unique_code(guests: &dyn GuestRepository) -> Result<String, StoreError> {
    for _ in 0..MAX_GENERATION_ATTEMPTS {
        let code = random_code();
        if !guests.code_exists(&code).await? {
            return Ok(code);
        }
    }
    Err(StoreError::Conflict(
        "could not draw an unused invitation code".to_owned(),
    ))
}
