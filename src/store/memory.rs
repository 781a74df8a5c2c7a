use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{Duration, NaiveDateTime, Utc};
use parking_lot::Mutex;
use uuid::Uuid;

use super::{GuestRepository, RsvpRepository, SettingsRepository};
use crate::error::StoreError;
use crate::models::{Guest, GuestDetails, GuestWithRsvp, RsvpResponse, RsvpWrite};

#[derive(Default)]
struct Tables {
    guests: Vec<Guest>,
    rsvps: HashMap<String, RsvpResponse>,
    settings: HashMap<String, String>,
}

/// Process-local store with the same constraints as the MySQL schema:
/// unique invite codes, one response per guest, cascade on guest delete.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    offline: AtomicBool,
    upserts: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent call fail, as an unreachable database would.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of upserts that reached the table.
    pub fn upsert_count(&self) -> usize {
        self.upserts.load(Ordering::SeqCst)
    }

    pub fn rsvp_count(&self) -> usize {
        self.tables.lock().rsvps.len()
    }

    pub fn set_setting(&self, key: &str, value: &str) {
        self.tables
            .lock()
            .settings
            .insert(key.to_owned(), value.to_owned());
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Pool("store offline".to_owned()));
        }
        Ok(())
    }

    // Strictly increasing so newest-first ordering is stable within a test.
    fn next_stamp(tables: &Tables) -> NaiveDateTime {
        let now = Utc::now().naive_utc();
        match tables.guests.iter().map(|g| g.created_at).max() {
            Some(latest) if latest >= now => latest + Duration::microseconds(1),
            _ => now,
        }
    }
}

#[async_trait]
impl GuestRepository for MemoryStore {
    async fn find_by_code(&self, invite_code: &str) -> Result<Option<Guest>, StoreError> {
        self.check_online()?;
        Ok(self
            .tables
            .lock()
            .guests
            .iter()
            .find(|g| g.invite_code == invite_code)
            .cloned())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Guest>, StoreError> {
        self.check_online()?;
        Ok(self.tables.lock().guests.iter().find(|g| g.id == id).cloned())
    }

    async fn code_exists(&self, invite_code: &str) -> Result<bool, StoreError> {
        self.check_online()?;
        Ok(self
            .tables
            .lock()
            .guests
            .iter()
            .any(|g| g.invite_code == invite_code))
    }

    async fn insert(&self, details: &GuestDetails, invite_code: &str) -> Result<Guest, StoreError> {
        self.check_online()?;
        let mut tables = self.tables.lock();
        if tables.guests.iter().any(|g| g.invite_code == invite_code) {
            return Err(StoreError::Conflict(format!(
                "invite code {invite_code} already exists"
            )));
        }

        let stamp = Self::next_stamp(&tables);
        let guest = Guest {
            id: Uuid::new_v4().to_string(),
            name: details.name.clone(),
            email: details.email.clone(),
            phone: details.phone.clone(),
            invite_code: invite_code.to_owned(),
            plus_one_allowed: details.plus_one_allowed,
            created_at: stamp,
            updated_at: stamp,
        };
        tables.guests.push(guest.clone());
        Ok(guest)
    }

    async fn update(&self, id: &str, details: &GuestDetails) -> Result<Option<Guest>, StoreError> {
        self.check_online()?;
        let mut tables = self.tables.lock();
        let Some(guest) = tables.guests.iter_mut().find(|g| g.id == id) else {
            return Ok(None);
        };
        guest.name.clone_from(&details.name);
        guest.email.clone_from(&details.email);
        guest.phone.clone_from(&details.phone);
        guest.plus_one_allowed = details.plus_one_allowed;
        guest.updated_at = Utc::now().naive_utc();
        Ok(Some(guest.clone()))
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        self.check_online()?;
        let mut tables = self.tables.lock();
        let before = tables.guests.len();
        tables.guests.retain(|g| g.id != id);
        let removed = tables.guests.len() != before;
        if removed {
            tables.rsvps.remove(id);
        }
        Ok(removed)
    }

    async fn list_with_rsvps(&self) -> Result<Vec<GuestWithRsvp>, StoreError> {
        self.check_online()?;
        let tables = self.tables.lock();
        let mut listed: Vec<GuestWithRsvp> = tables
            .guests
            .iter()
            .map(|guest| GuestWithRsvp {
                guest: guest.clone(),
                rsvp: tables.rsvps.get(&guest.id).cloned(),
            })
            .collect();
        listed.sort_by(|a, b| b.guest.created_at.cmp(&a.guest.created_at));
        Ok(listed)
    }
}

#[async_trait]
impl RsvpRepository for MemoryStore {
    async fn upsert(&self, write: &RsvpWrite) -> Result<RsvpResponse, StoreError> {
        self.check_online()?;
        let mut tables = self.tables.lock();
        if !tables.guests.iter().any(|g| g.id == write.guest_id()) {
            return Err(StoreError::Conflict(format!(
                "guest {} does not exist",
                write.guest_id()
            )));
        }

        let now = Utc::now().naive_utc();
        let previous = tables.rsvps.get(write.guest_id());
        let response = RsvpResponse {
            id: previous.map_or_else(|| Uuid::new_v4().to_string(), |p| p.id.clone()),
            guest_id: write.guest_id().to_owned(),
            status: write.status(),
            dietary_notes: write.dietary_notes().map(str::to_owned),
            plus_one_name: write.plus_one_name().map(str::to_owned),
            message: write.message().map(str::to_owned),
            responded_at: Some(write.responded_at()),
            created_at: previous.map_or(now, |p| p.created_at),
            updated_at: now,
        };
        tables
            .rsvps
            .insert(response.guest_id.clone(), response.clone());
        self.upserts.fetch_add(1, Ordering::SeqCst);
        Ok(response)
    }

    async fn find_by_guest(&self, guest_id: &str) -> Result<Option<RsvpResponse>, StoreError> {
        self.check_online()?;
        Ok(self.tables.lock().rsvps.get(guest_id).cloned())
    }
}

#[async_trait]
impl SettingsRepository for MemoryStore {
    async fn load(&self, keys: &[&str]) -> Result<HashMap<String, String>, StoreError> {
        self.check_online()?;
        let tables = self.tables.lock();
        Ok(keys
            .iter()
            .filter_map(|k| tables.settings.get(*k).map(|v| ((*k).to_owned(), v.clone())))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn details(name: &str) -> GuestDetails {
        GuestDetails {
            name: name.to_owned(),
            ..GuestDetails::default()
        }
    }

    #[tokio::test]
    async fn duplicate_invite_codes_are_rejected() {
        let store = MemoryStore::new();
        store.insert(&details("Anna"), "abc123").await.unwrap();
        let err = store.insert(&details("Ben"), "abc123").await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn listing_is_newest_first() {
        let store = MemoryStore::new();
        store.insert(&details("First"), "one").await.unwrap();
        store.insert(&details("Second"), "two").await.unwrap();
        let names: Vec<_> = store
            .list_with_rsvps()
            .await
            .unwrap()
            .into_iter()
            .map(|g| g.guest.name)
            .collect();
        assert_eq!(names, ["Second", "First"]);
    }

    #[tokio::test]
    async fn settings_only_return_requested_keys() {
        let store = MemoryStore::new();
        store.set_setting("wedding_date", "2026-08-01");
        store.set_setting("notes_text", "Bring a jacket");
        let loaded = store.load(&["wedding_date", "venue_text"]).await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded["wedding_date"], "2026-08-01");
    }

    #[tokio::test]
    async fn offline_store_fails_every_call() {
        let store = MemoryStore::new();
        store.set_offline(true);
        assert!(store.find_by_code("abc").await.is_err());
        assert!(store.load(&["wedding_date"]).await.is_err());
    }
}
