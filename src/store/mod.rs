//! Repository seams over guest, response and settings persistence.
//!
//! Handlers and workflows only see these traits; the composition root picks
//! the adapter ([`mysql::MysqlStore`] in production, [`memory::MemoryStore`]
//! in tests).

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::{Guest, GuestDetails, GuestWithRsvp, RsvpResponse, RsvpWrite};

pub mod memory;
pub mod mysql;

pub use memory::MemoryStore;
pub use mysql::MysqlStore;

#[async_trait]
pub trait GuestRepository: Send + Sync {
    /// Exact match on an already-normalized invitation code.
    async fn find_by_code(&self, invite_code: &str) -> Result<Option<Guest>, StoreError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<Guest>, StoreError>;

    async fn code_exists(&self, invite_code: &str) -> Result<bool, StoreError>;

    async fn insert(&self, details: &GuestDetails, invite_code: &str) -> Result<Guest, StoreError>;

    /// Returns `None` when no guest has the id.
    async fn update(&self, id: &str, details: &GuestDetails) -> Result<Option<Guest>, StoreError>;

    /// Deletes the guest and its response. Returns whether a guest was removed.
    async fn delete(&self, id: &str) -> Result<bool, StoreError>;

    /// Every guest, newest first, paired with its response if any.
    async fn list_with_rsvps(&self) -> Result<Vec<GuestWithRsvp>, StoreError>;
}

#[async_trait]
pub trait RsvpRepository: Send + Sync {
    /// Insert-or-overwrite keyed on the guest. At most one row per guest.
    async fn upsert(&self, write: &RsvpWrite) -> Result<RsvpResponse, StoreError>;

    async fn find_by_guest(&self, guest_id: &str) -> Result<Option<RsvpResponse>, StoreError>;
}

#[async_trait]
pub trait SettingsRepository: Send + Sync {
    /// Values for whichever of `keys` are present.
    async fn load(&self, keys: &[&str]) -> Result<HashMap<String, String>, StoreError>;
}
