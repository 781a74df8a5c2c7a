use std::fmt;
use std::str::FromStr;

use super::schema::{guests, rsvps, wedding_settings};
use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

/// A guest on the list. The invitation code is stored already normalized
/// (trimmed, lower-case), so lookups compare on equality.
#[derive(Debug, Clone, PartialEq, Eq, Insertable, Selectable, Queryable, Serialize, Deserialize)]
#[diesel(table_name = guests)]
pub struct Guest {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub invite_code: String,
    pub plus_one_allowed: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// The slice of a guest the RSVP form is bound to once an invite resolves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedGuest {
    pub id: String,
    pub name: String,
    pub plus_one_allowed: bool,
}

impl From<Guest> for ResolvedGuest {
    fn from(guest: Guest) -> Self {
        Self {
            id: guest.id,
            name: guest.name,
            plus_one_allowed: guest.plus_one_allowed,
        }
    }
}

/// Administrator input for creating or editing a guest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GuestDetails {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub plus_one_allowed: bool,
}

#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = guests)]
#[diesel(treat_none_as_null = true)]
pub struct GuestChanges<'a> {
    pub name: &'a str,
    pub email: Option<&'a str>,
    pub phone: Option<&'a str>,
    pub plus_one_allowed: bool,
    pub updated_at: NaiveDateTime,
}

/// Attendance recorded on a response. `Maybe` is part of the stored schema
/// but no submission path produces it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    #[default]
    Pending,
    Attending,
    NotAttending,
    Maybe,
}

impl AttendanceStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Attending => "attending",
            Self::NotAttending => "not_attending",
            Self::Maybe => "maybe",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Attending => "Attending",
            Self::NotAttending => "Not Attending",
            Self::Maybe => "Maybe",
        }
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown attendance status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for AttendanceStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "attending" => Ok(Self::Attending),
            "not_attending" => Ok(Self::NotAttending),
            "maybe" => Ok(Self::Maybe),
            other => Err(UnknownStatus(other.to_owned())),
        }
    }
}

/// The two answers a guest can give through the form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Answer {
    Attending,
    NotAttending,
}

impl Answer {
    pub const fn is_attending(self) -> bool {
        matches!(self, Self::Attending)
    }
}

impl From<Answer> for AttendanceStatus {
    fn from(answer: Answer) -> Self {
        match answer {
            Answer::Attending => Self::Attending,
            Answer::NotAttending => Self::NotAttending,
        }
    }
}

impl FromStr for Answer {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "attending" => Ok(Self::Attending),
            "not_attending" => Ok(Self::NotAttending),
            other => Err(UnknownStatus(other.to_owned())),
        }
    }
}

#[derive(Debug, Clone, Insertable, Selectable, Queryable)]
#[diesel(table_name = rsvps)]
pub struct RsvpRow {
    pub id: String,
    pub guest_id: String,
    pub status: String,
    pub dietary_notes: Option<String>,
    pub plus_one_name: Option<String>,
    pub message: Option<String>,
    pub responded_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Columns overwritten when a guest responds again. Every field is written,
/// `None` included, so nothing survives from the previous answer.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = rsvps)]
#[diesel(treat_none_as_null = true)]
pub struct RsvpChanges<'a> {
    pub status: &'a str,
    pub dietary_notes: Option<&'a str>,
    pub plus_one_name: Option<&'a str>,
    pub message: Option<&'a str>,
    pub responded_at: Option<NaiveDateTime>,
    pub updated_at: NaiveDateTime,
}

/// A guest's single stored response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RsvpResponse {
    pub id: String,
    pub guest_id: String,
    pub status: AttendanceStatus,
    pub dietary_notes: Option<String>,
    pub plus_one_name: Option<String>,
    pub message: Option<String>,
    pub responded_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl From<RsvpRow> for RsvpResponse {
    fn from(row: RsvpRow) -> Self {
        let status = row.status.parse().unwrap_or_else(|e: UnknownStatus| {
            tracing::warn!(rsvp_id = %row.id, error = %e, "treating unreadable status as pending");
            AttendanceStatus::Pending
        });

        Self {
            id: row.id,
            guest_id: row.guest_id,
            status,
            dietary_notes: row.dietary_notes,
            plus_one_name: row.plus_one_name,
            message: row.message,
            responded_at: row.responded_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// A fully validated, policy-applied response ready to be written. Only the
/// submission workflow can build one, so the store never sees raw form input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RsvpWrite {
    pub(crate) guest_id: String,
    pub(crate) answer: Answer,
    pub(crate) dietary_notes: Option<String>,
    pub(crate) plus_one_name: Option<String>,
    pub(crate) message: Option<String>,
    pub(crate) responded_at: NaiveDateTime,
}

impl RsvpWrite {
    pub fn guest_id(&self) -> &str {
        &self.guest_id
    }

    pub fn answer(&self) -> Answer {
        self.answer
    }

    pub fn status(&self) -> AttendanceStatus {
        self.answer.into()
    }

    pub fn dietary_notes(&self) -> Option<&str> {
        self.dietary_notes.as_deref()
    }

    pub fn plus_one_name(&self) -> Option<&str> {
        self.plus_one_name.as_deref()
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn responded_at(&self) -> NaiveDateTime {
        self.responded_at
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GuestWithRsvp {
    pub guest: Guest,
    pub rsvp: Option<RsvpResponse>,
}

impl GuestWithRsvp {
    pub fn status(&self) -> AttendanceStatus {
        self.rsvp.as_ref().map_or(AttendanceStatus::Pending, |r| r.status)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Insertable, Selectable, Queryable)]
#[diesel(table_name = wedding_settings)]
pub struct SettingRow {
    pub key: String,
    pub value: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_its_column_text() {
        for status in [
            AttendanceStatus::Pending,
            AttendanceStatus::Attending,
            AttendanceStatus::NotAttending,
            AttendanceStatus::Maybe,
        ] {
            assert_eq!(status.as_str().parse::<AttendanceStatus>(), Ok(status));
        }
    }

    #[test]
    fn form_answers_exclude_pending_and_maybe() {
        assert!("maybe".parse::<Answer>().is_err());
        assert!("pending".parse::<Answer>().is_err());
        assert_eq!("attending".parse::<Answer>(), Ok(Answer::Attending));
    }

    #[test]
    fn unreadable_status_row_reads_as_pending() {
        let stamp = chrono::NaiveDate::from_ymd_opt(2026, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap();
        let row = RsvpRow {
            id: "r1".into(),
            guest_id: "g1".into(),
            status: "declined?".into(),
            dietary_notes: None,
            plus_one_name: None,
            message: None,
            responded_at: None,
            created_at: stamp,
            updated_at: stamp,
        };
        assert_eq!(RsvpResponse::from(row).status, AttendanceStatus::Pending);
    }
}
