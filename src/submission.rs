//! The RSVP submission workflow: validate the answers for the guest's
//! situation, drop whatever does not apply, and overwrite the guest's single
//! response row.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{NaiveDateTime, Utc};
use parking_lot::Mutex;
use tracing::{error, info};

use crate::error::{FieldErrors, SubmitError};
use crate::models::{Answer, ResolvedGuest, RsvpResponse, RsvpWrite};
use crate::notify::{Notifier, ResponseNotice};
use crate::settings::FormOptions;
use crate::store::RsvpRepository;

pub const FIELD_FREE_TEXT: &str = "free_text";
pub const SONG_REQUEST_MISSING: &str = "Please tell us which song will get you on the dance floor.";

/// Answers as typed into the form, before any policy is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RsvpAnswers {
    pub answer: Answer,
    pub plus_one_name: Option<String>,
    pub dietary_notes: Option<String>,
    /// Song request or message, depending on [`FormOptions::free_text_mode`].
    pub free_text: Option<String>,
}

fn clean(text: Option<&str>) -> Option<String> {
    text.map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_owned)
}

/// Field-level checks. An empty map means the answers may be written.
pub fn validate(answers: &RsvpAnswers, options: &FormOptions) -> FieldErrors {
    let mut errors = FieldErrors::new();
    if options.requires_song_request(answers.answer.is_attending())
        && clean(answers.free_text.as_deref()).is_none()
    {
        errors.insert(FIELD_FREE_TEXT, SONG_REQUEST_MISSING.to_owned());
    }
    errors
}

/// Turns validated answers into the row to write. Fields that do not apply
/// are nulled so an earlier answer cannot linger: no plus-one unless the
/// guest attends and is entitled to one, no dietary notes unless the guest
/// attends and the field is enabled.
pub fn prepare(
    guest: &ResolvedGuest,
    answers: &RsvpAnswers,
    options: &FormOptions,
    responded_at: NaiveDateTime,
) -> Result<RsvpWrite, FieldErrors> {
    let errors = validate(answers, options);
    if !errors.is_empty() {
        return Err(errors);
    }

    let attending = answers.answer.is_attending();
    let plus_one_name = if attending && guest.plus_one_allowed {
        clean(answers.plus_one_name.as_deref())
    } else {
        None
    };
    let dietary_notes = if attending && options.enable_dietary {
        clean(answers.dietary_notes.as_deref())
    } else {
        None
    };

    Ok(RsvpWrite {
        guest_id: guest.id.clone(),
        answer: answers.answer,
        dietary_notes,
        plus_one_name,
        message: clean(answers.free_text.as_deref()),
        responded_at,
    })
}

/// Guests with a submission currently being written.
#[derive(Default)]
pub struct InFlight {
    active: Mutex<HashSet<String>>,
}

/// Releases the guest's slot when dropped.
pub struct InFlightGuard<'a> {
    owner: &'a InFlight,
    guest_id: String,
}

impl InFlight {
    pub fn try_begin(&self, guest_id: &str) -> Option<InFlightGuard<'_>> {
        if self.active.lock().insert(guest_id.to_owned()) {
            Some(InFlightGuard {
                owner: self,
                guest_id: guest_id.to_owned(),
            })
        } else {
            None
        }
    }

    pub fn is_active(&self, guest_id: &str) -> bool {
        self.active.lock().contains(guest_id)
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.owner.active.lock().remove(&self.guest_id);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submitted {
    pub attending: bool,
    pub response: RsvpResponse,
}

pub struct RsvpWorkflow {
    rsvps: Arc<dyn RsvpRepository>,
    notifier: Arc<dyn Notifier>,
    in_flight: InFlight,
}

impl RsvpWorkflow {
    pub fn new(rsvps: Arc<dyn RsvpRepository>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            rsvps,
            notifier,
            in_flight: InFlight::default(),
        }
    }

    pub fn in_flight(&self) -> &InFlight {
        &self.in_flight
    }

    /// Validates and upserts the guest's response.
    ///
    /// Validation failures return before anything is written. A second
    /// submission for a guest whose first is still being written is refused.
    /// Store failures are logged and reported generically; nothing partial
    /// is kept, so the guest can simply submit again.
    pub async fn submit(
        &self,
        guest: &ResolvedGuest,
        answers: &RsvpAnswers,
        options: &FormOptions,
    ) -> Result<Submitted, SubmitError> {
        let write = prepare(guest, answers, options, Utc::now().naive_utc())
            .map_err(SubmitError::Validation)?;

        let Some(_slot) = self.in_flight.try_begin(&guest.id) else {
            info!(guest_id = %guest.id, "duplicate submission while one is in flight");
            return Err(SubmitError::InProgress);
        };

        let response = self.rsvps.upsert(&write).await.map_err(|e| {
            error!(guest_id = %guest.id, error = %e, "rsvp upsert failed");
            SubmitError::Store(e)
        })?;
        info!(guest_id = %guest.id, status = %response.status, "rsvp recorded");

        self.notifier.response_received(ResponseNotice {
            guest_name: guest.name.clone(),
            status: response.status,
            plus_one_allowed: guest.plus_one_allowed,
            plus_one_name: response.plus_one_name.clone(),
            dietary_notes: response.dietary_notes.clone(),
            message: response.message.clone(),
        });

        Ok(Submitted {
            attending: write.answer().is_attending(),
            response,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AttendanceStatus, GuestDetails};
    use crate::notify::Recording;
    use crate::settings::FreeTextMode;
    use crate::store::{GuestRepository, MemoryStore};
    use pretty_assertions::assert_eq;

    struct Fixture {
        store: Arc<MemoryStore>,
        notices: Arc<Recording>,
        workflow: RsvpWorkflow,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let notices = Arc::new(Recording::default());
        let workflow = RsvpWorkflow::new(store.clone(), notices.clone());
        Fixture {
            store,
            notices,
            workflow,
        }
    }

    async fn guest(store: &MemoryStore, plus_one_allowed: bool) -> ResolvedGuest {
        store
            .insert(
                &GuestDetails {
                    name: "Anna Botha".into(),
                    plus_one_allowed,
                    ..GuestDetails::default()
                },
                "abc123",
            )
            .await
            .unwrap()
            .into()
    }

    fn attending(song: &str) -> RsvpAnswers {
        RsvpAnswers {
            answer: Answer::Attending,
            plus_one_name: Some("Ben Botha".into()),
            dietary_notes: Some("Vegetarian".into()),
            free_text: Some(song.into()),
        }
    }

    #[tokio::test]
    async fn declining_clears_plus_one_and_dietary_notes() {
        let f = fixture();
        let anna = guest(&f.store, true).await;
        let options = FormOptions::default();

        f.workflow
            .submit(&anna, &attending("September"), &options)
            .await
            .unwrap();

        let declined = RsvpAnswers {
            answer: Answer::NotAttending,
            ..attending("  ")
        };
        let result = f.workflow.submit(&anna, &declined, &options).await.unwrap();

        assert!(!result.attending);
        let stored = f.store.find_by_guest(&anna.id).await.unwrap().unwrap();
        assert_eq!(stored.status, AttendanceStatus::NotAttending);
        assert_eq!(stored.plus_one_name, None);
        assert_eq!(stored.dietary_notes, None);
        assert_eq!(stored.message, None);
    }

    #[tokio::test]
    async fn resubmitting_overwrites_the_single_row() {
        let f = fixture();
        let anna = guest(&f.store, true).await;
        let options = FormOptions::default();

        let first = f
            .workflow
            .submit(&anna, &attending("September"), &options)
            .await
            .unwrap();
        let second_answers = RsvpAnswers {
            plus_one_name: None,
            dietary_notes: Some("Gluten free".into()),
            ..attending("Jerusalema")
        };
        let second = f
            .workflow
            .submit(&anna, &second_answers, &options)
            .await
            .unwrap();

        assert_eq!(f.store.rsvp_count(), 1);
        assert_eq!(first.response.id, second.response.id);
        let stored = f.store.find_by_guest(&anna.id).await.unwrap().unwrap();
        assert_eq!(stored.plus_one_name, None);
        assert_eq!(stored.dietary_notes.as_deref(), Some("Gluten free"));
        assert_eq!(stored.message.as_deref(), Some("Jerusalema"));
        assert!(stored.responded_at >= first.response.responded_at);
    }

    #[tokio::test]
    async fn missing_song_request_blocks_the_write() {
        let f = fixture();
        let anna = guest(&f.store, false).await;

        let err = f
            .workflow
            .submit(&anna, &attending(" \t "), &FormOptions::default())
            .await
            .unwrap_err();

        let fields = err.field_errors().unwrap();
        assert_eq!(fields.get(FIELD_FREE_TEXT).map(String::as_str), Some(SONG_REQUEST_MISSING));
        assert_eq!(f.store.upsert_count(), 0);
        assert!(f.notices.notices().is_empty());
    }

    #[tokio::test]
    async fn song_request_is_optional_when_declining_or_in_message_mode() {
        let f = fixture();
        let anna = guest(&f.store, false).await;

        let declined = RsvpAnswers {
            answer: Answer::NotAttending,
            ..attending("")
        };
        assert!(f
            .workflow
            .submit(&anna, &declined, &FormOptions::default())
            .await
            .is_ok());

        let message_mode = FormOptions {
            free_text_mode: FreeTextMode::Message,
            ..FormOptions::default()
        };
        assert!(f
            .workflow
            .submit(&anna, &attending(""), &message_mode)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn plus_one_name_is_dropped_for_unentitled_guests() {
        let f = fixture();
        let anna = guest(&f.store, false).await;

        f.workflow
            .submit(&anna, &attending("September"), &FormOptions::default())
            .await
            .unwrap();

        let stored = f.store.find_by_guest(&anna.id).await.unwrap().unwrap();
        assert_eq!(stored.plus_one_name, None);
    }

    #[tokio::test]
    async fn dietary_notes_are_dropped_when_the_field_is_disabled() {
        let f = fixture();
        let anna = guest(&f.store, true).await;
        let options = FormOptions {
            enable_dietary: false,
            ..FormOptions::default()
        };

        f.workflow
            .submit(&anna, &attending("September"), &options)
            .await
            .unwrap();

        let stored = f.store.find_by_guest(&anna.id).await.unwrap().unwrap();
        assert_eq!(stored.dietary_notes, None);
        assert_eq!(stored.plus_one_name.as_deref(), Some("Ben Botha"));
    }

    #[tokio::test]
    async fn store_failure_is_generic_and_retryable() {
        let f = fixture();
        let anna = guest(&f.store, true).await;
        let options = FormOptions::default();

        f.store.set_offline(true);
        let err = f
            .workflow
            .submit(&anna, &attending("September"), &options)
            .await
            .unwrap_err();
        assert!(matches!(err, SubmitError::Store(_)));
        assert_eq!(err.to_string(), "Something went wrong. Please try again.");
        assert!(!f.workflow.in_flight().is_active(&anna.id));

        f.store.set_offline(false);
        assert!(f
            .workflow
            .submit(&anna, &attending("September"), &options)
            .await
            .is_ok());
        assert_eq!(f.store.rsvp_count(), 1);
    }

    #[tokio::test]
    async fn concurrent_submission_for_the_same_guest_is_refused() {
        let f = fixture();
        let anna = guest(&f.store, true).await;

        let _held = f.workflow.in_flight().try_begin(&anna.id).unwrap();
        let err = f
            .workflow
            .submit(&anna, &attending("September"), &FormOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SubmitError::InProgress));
        assert_eq!(f.store.upsert_count(), 0);
    }

    #[tokio::test]
    async fn success_notifies_the_couple() {
        let f = fixture();
        let anna = guest(&f.store, true).await;

        let done = f
            .workflow
            .submit(&anna, &attending(" September "), &FormOptions::default())
            .await
            .unwrap();

        assert!(done.attending);
        let notices = f.notices.notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].guest_name, "Anna Botha");
        assert_eq!(notices[0].message.as_deref(), Some("September"));
    }

    #[test]
    fn in_flight_slot_is_released_on_drop() {
        let in_flight = InFlight::default();
        {
            let _slot = in_flight.try_begin("g1").unwrap();
            assert!(in_flight.try_begin("g1").is_none());
            assert!(in_flight.try_begin("g2").is_some());
        }
        assert!(in_flight.try_begin("g1").is_some());
    }
}
