use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use rocket_db_pools::diesel::prelude::*;
use rocket_db_pools::diesel::dsl::{exists, select};
use rocket_db_pools::diesel::{AsyncMysqlConnection, MysqlPool, RunQueryDsl};
use rocket_db_pools::diesel::pooled_connection::deadpool::Object;
use tracing::debug;
use uuid::Uuid;

use super::{GuestRepository, RsvpRepository, SettingsRepository};
use crate::error::StoreError;
use crate::models::{
    Guest, GuestChanges, GuestDetails, GuestWithRsvp, RsvpChanges, RsvpResponse, RsvpRow,
    RsvpWrite, SettingRow,
};

/// Diesel adapter over the `rsvp` MySQL pool managed by `rocket_db_pools`.
#[derive(Clone)]
pub struct MysqlStore {
    pool: MysqlPool,
}

impl MysqlStore {
    pub fn new(pool: MysqlPool) -> Self {
        Self { pool }
    }

    async fn conn(&self) -> Result<Object<AsyncMysqlConnection>, StoreError> {
        self.pool
            .get()
            .await
            .map_err(|e| StoreError::Pool(e.to_string()))
    }
}

#[async_trait]
impl GuestRepository for MysqlStore {
    async fn find_by_code(&self, code: &str) -> Result<Option<Guest>, StoreError> {
        use crate::schema::guests::dsl::*;
        let mut conn = self.conn().await?;

        let guest = guests
            .filter(invite_code.eq(code))
            .select(Guest::as_select())
            .first(&mut conn)
            .await
            .optional()?;
        Ok(guest)
    }

    async fn find_by_id(&self, guest_id: &str) -> Result<Option<Guest>, StoreError> {
        use crate::schema::guests::dsl::*;
        let mut conn = self.conn().await?;

        let guest = guests
            .find(guest_id)
            .select(Guest::as_select())
            .first(&mut conn)
            .await
            .optional()?;
        Ok(guest)
    }

    async fn code_exists(&self, code: &str) -> Result<bool, StoreError> {
        use crate::schema::guests::dsl::*;
        let mut conn = self.conn().await?;

        let taken: bool = select(exists(guests.filter(invite_code.eq(code))))
            .get_result(&mut conn)
            .await?;
        Ok(taken)
    }

    async fn insert(&self, details: &GuestDetails, code: &str) -> Result<Guest, StoreError> {
        use crate::schema::guests::dsl::*;
        let mut conn = self.conn().await?;

        let stamp = Utc::now().naive_utc();
        let new_guest = Guest {
            id: Uuid::new_v4().to_string(),
            name: details.name.clone(),
            email: details.email.clone(),
            phone: details.phone.clone(),
            invite_code: code.to_owned(),
            plus_one_allowed: details.plus_one_allowed,
            created_at: stamp,
            updated_at: stamp,
        };

        diesel::insert_into(guests)
            .values(&new_guest)
            .execute(&mut conn)
            .await?;
        debug!(guest_id = %new_guest.id, "guest inserted");
        Ok(new_guest)
    }

    async fn update(
        &self,
        guest_id: &str,
        details: &GuestDetails,
    ) -> Result<Option<Guest>, StoreError> {
        use crate::schema::guests::dsl::*;
        let mut conn = self.conn().await?;

        let changes = GuestChanges {
            name: &details.name,
            email: details.email.as_deref(),
            phone: details.phone.as_deref(),
            plus_one_allowed: details.plus_one_allowed,
            updated_at: Utc::now().naive_utc(),
        };
        diesel::update(guests.find(guest_id))
            .set(&changes)
            .execute(&mut conn)
            .await?;

        let guest = guests
            .find(guest_id)
            .select(Guest::as_select())
            .first(&mut conn)
            .await
            .optional()?;
        Ok(guest)
    }

    async fn delete(&self, guest_id: &str) -> Result<bool, StoreError> {
        use crate::schema::guests::dsl::*;
        let mut conn = self.conn().await?;

        // rsvps.guest_id cascades on delete
        let removed = diesel::delete(guests.find(guest_id))
            .execute(&mut conn)
            .await?;
        Ok(removed > 0)
    }

    async fn list_with_rsvps(&self) -> Result<Vec<GuestWithRsvp>, StoreError> {
        use crate::schema::{guests, rsvps};
        let mut conn = self.conn().await?;

        let all_guests: Vec<Guest> = guests::table
            .select(Guest::as_select())
            .order(guests::created_at.desc())
            .load(&mut conn)
            .await?;

        let mut by_guest: HashMap<String, RsvpResponse> = rsvps::table
            .select(RsvpRow::as_select())
            .load::<RsvpRow>(&mut conn)
            .await?
            .into_iter()
            .map(|row| (row.guest_id.clone(), RsvpResponse::from(row)))
            .collect();

        Ok(all_guests
            .into_iter()
            .map(|guest| {
                let rsvp = by_guest.remove(&guest.id);
                GuestWithRsvp { guest, rsvp }
            })
            .collect())
    }
}

#[async_trait]
impl RsvpRepository for MysqlStore {
    async fn upsert(&self, write: &RsvpWrite) -> Result<RsvpResponse, StoreError> {
        use crate::schema::rsvps::dsl::*;
        let mut conn = self.conn().await?;

        let stamp = Utc::now().naive_utc();
        let row = RsvpRow {
            id: Uuid::new_v4().to_string(),
            guest_id: write.guest_id().to_owned(),
            status: write.status().as_str().to_owned(),
            dietary_notes: write.dietary_notes().map(str::to_owned),
            plus_one_name: write.plus_one_name().map(str::to_owned),
            message: write.message().map(str::to_owned),
            responded_at: Some(write.responded_at()),
            created_at: stamp,
            updated_at: stamp,
        };
        let changes = RsvpChanges {
            status: write.status().as_str(),
            dietary_notes: write.dietary_notes(),
            plus_one_name: write.plus_one_name(),
            message: write.message(),
            responded_at: Some(write.responded_at()),
            updated_at: stamp,
        };

        // ON DUPLICATE KEY UPDATE against the unique guest_id key
        diesel::insert_into(rsvps)
            .values(&row)
            .on_conflict(diesel::dsl::DuplicatedKeys)
            .do_update()
            .set(&changes)
            .execute(&mut conn)
            .await?;

        let stored = rsvps
            .filter(guest_id.eq(write.guest_id()))
            .select(RsvpRow::as_select())
            .first::<RsvpRow>(&mut conn)
            .await?;
        Ok(stored.into())
    }

    async fn find_by_guest(&self, guest: &str) -> Result<Option<RsvpResponse>, StoreError> {
        use crate::schema::rsvps::dsl::*;
        let mut conn = self.conn().await?;

        let row = rsvps
            .filter(guest_id.eq(guest))
            .select(RsvpRow::as_select())
            .first::<RsvpRow>(&mut conn)
            .await
            .optional()?;
        Ok(row.map(RsvpResponse::from))
    }
}

#[async_trait]
impl SettingsRepository for MysqlStore {
    async fn load(&self, keys: &[&str]) -> Result<HashMap<String, String>, StoreError> {
        use crate::schema::wedding_settings::dsl::*;
        let mut conn = self.conn().await?;

        let rows: Vec<SettingRow> = wedding_settings
            .filter(key.eq_any(keys.iter().copied()))
            .select(SettingRow::as_select())
            .load(&mut conn)
            .await?;
        Ok(rows.into_iter().map(|row| (row.key, row.value)).collect())
    }
}
