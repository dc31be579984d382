use crate::application::sync_client::{DayFetch, SyncClient, SyncError};
use crate::domain::models::{BenchId, Reservation, ReservationDraft};
use crate::domain::validator::{ConflictValidator, ValidationError};
use crate::infrastructure::store_client::ReservationStoreApi;
use chrono::{Duration as ChronoDuration, NaiveDate};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;

/// Visible state of the selected day's reservation set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DayState {
    #[default]
    Idle,
    Loading,
    Loaded(DayFetch),
    Failed {
        message: String,
    },
}

impl DayState {
    pub fn reservations(&self) -> &[Reservation] {
        match self {
            Self::Loaded(fetch) => &fetch.reservations,
            _ => &[],
        }
    }
}

/// The active create or edit form. At most one exists at a time; submitting
/// or cancelling clears it, a failed submission keeps it for correction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReservationForm {
    Create { draft: ReservationDraft },
    Edit { id: String, draft: ReservationDraft },
}

impl ReservationForm {
    pub fn draft(&self) -> &ReservationDraft {
        match self {
            Self::Create { draft } | Self::Edit { draft, .. } => draft,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("another operation is still in progress")]
    Busy,
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error("no loaded reservation with id {0}")]
    NoSuchReservation(String),
}

#[derive(Debug)]
struct StoreState {
    selected_day: NaiveDate,
    fetch_epoch: u64,
    day: DayState,
    mutation_in_flight: bool,
    form: Option<ReservationForm>,
}

/// Session state for the timetable: owns the loaded day, gates mutations,
/// and keeps the visible set consistent with the remote store.
///
/// One mutation may be in flight at a time; fetches are made stale-safe by
/// an epoch the response must still match when it lands. The inner lock is
/// never held across an await.
pub struct ReservationStore<C: ReservationStoreApi> {
    sync: SyncClient<C>,
    validator: ConflictValidator,
    state: Mutex<StoreState>,
}

impl<C: ReservationStoreApi> ReservationStore<C> {
    pub fn new(sync: SyncClient<C>, validator: ConflictValidator, initial_day: NaiveDate) -> Self {
        Self {
            sync,
            validator,
            state: Mutex::new(StoreState {
                selected_day: initial_day,
                fetch_epoch: 0,
                day: DayState::Idle,
                mutation_in_flight: false,
                form: None,
            }),
        }
    }

    pub fn selected_day(&self) -> NaiveDate {
        self.state_lock().selected_day
    }

    pub fn day_state(&self) -> DayState {
        self.state_lock().day.clone()
    }

    pub fn form(&self) -> Option<ReservationForm> {
        self.state_lock().form.clone()
    }

    /// Switches to `date` and fetches its reservations. Any fetch still in
    /// flight for a previous selection is invalidated: its late result is
    /// dropped, never applied. Returns the now-visible state.
    pub async fn select_day(&self, date: NaiveDate) -> DayState {
        let epoch = {
            let mut state = self.state_lock();
            state.selected_day = date;
            state.fetch_epoch += 1;
            state.day = DayState::Loading;
            state.fetch_epoch
        };

        let fetched = self.sync.fetch_day(date).await;

        let mut state = self.state_lock();
        if state.fetch_epoch != epoch {
            tracing::debug!(%date, "dropping stale fetch result");
            return state.day.clone();
        }
        state.day = match fetched {
            Ok(day) => DayState::Loaded(day),
            Err(error) => DayState::Failed {
                message: error.to_string(),
            },
        };
        state.day.clone()
    }

    /// Re-fetches the current day, replacing the set wholesale.
    pub async fn refresh(&self) -> DayState {
        let day = self.selected_day();
        self.select_day(day).await
    }

    pub async fn go_to_previous_day(&self) -> DayState {
        let day = self.selected_day() - ChronoDuration::days(1);
        self.select_day(day).await
    }

    pub async fn go_to_next_day(&self) -> DayState {
        let day = self.selected_day() + ChronoDuration::days(1);
        self.select_day(day).await
    }

    /// Opens a create form seeded with the day's opening slot.
    pub fn open_create_form(&self, bench_id: BenchId) {
        let grid = self.validator.grid();
        let mut state = self.state_lock();
        let start_time = state.selected_day.and_time(grid.operating_start());
        let end_time = start_time + ChronoDuration::minutes(i64::from(grid.slot_minutes()));
        state.form = Some(ReservationForm::Create {
            draft: ReservationDraft {
                bench_id,
                user_name: String::new(),
                start_time,
                end_time,
            },
        });
    }

    /// Opens an edit form seeded from a loaded reservation.
    pub fn open_edit_form(&self, id: &str) -> Result<(), StoreError> {
        let mut state = self.state_lock();
        let reservation = state
            .day
            .reservations()
            .iter()
            .find(|reservation| reservation.id == id)
            .cloned()
            .ok_or_else(|| StoreError::NoSuchReservation(id.to_string()))?;
        state.form = Some(ReservationForm::Edit {
            id: reservation.id.clone(),
            draft: ReservationDraft::from_reservation(&reservation),
        });
        Ok(())
    }

    pub fn cancel_form(&self) {
        self.state_lock().form = None;
    }

    /// Validates locally, then creates remotely and refreshes. A local
    /// failure performs no network call; a remote failure keeps the draft
    /// in the form for correction.
    pub async fn submit_create(&self, draft: ReservationDraft) -> Result<DayState, StoreError> {
        {
            let state = self.state_lock();
            self.validator
                .validate(&draft, state.day.reservations(), None)?;
        }

        self.begin_mutation()?;
        let result = self.sync.create(&draft).await;
        self.end_mutation();

        match result {
            Ok(created) => {
                tracing::debug!(id = %created.id, "reservation created");
                self.state_lock().form = None;
                Ok(self.refresh().await)
            }
            Err(error) => {
                self.state_lock().form = Some(ReservationForm::Create { draft });
                Err(error.into())
            }
        }
    }

    /// Same flow as `submit_create`, excluding the edited reservation from
    /// the overlap scan so an unchanged interval resubmits cleanly.
    pub async fn submit_update(
        &self,
        id: &str,
        draft: ReservationDraft,
    ) -> Result<DayState, StoreError> {
        {
            let state = self.state_lock();
            self.validator
                .validate(&draft, state.day.reservations(), Some(id))?;
        }

        self.begin_mutation()?;
        let result = self.sync.update(id, &draft).await;
        self.end_mutation();

        match result {
            Ok(updated) => {
                tracing::debug!(id = %updated.id, "reservation updated");
                self.state_lock().form = None;
                Ok(self.refresh().await)
            }
            Err(error) => {
                self.state_lock().form = Some(ReservationForm::Edit {
                    id: id.to_string(),
                    draft,
                });
                Err(error.into())
            }
        }
    }

    /// Deletes after the caller-supplied confirmation approves. Declining
    /// returns `Ok(false)` with no network call; a remote failure does not
    /// assume the record is gone.
    pub async fn submit_delete(
        &self,
        id: &str,
        confirm: impl FnOnce(&Reservation) -> bool,
    ) -> Result<bool, StoreError> {
        let target = {
            let state = self.state_lock();
            state
                .day
                .reservations()
                .iter()
                .find(|reservation| reservation.id == id)
                .cloned()
                .ok_or_else(|| StoreError::NoSuchReservation(id.to_string()))?
        };

        if !confirm(&target) {
            tracing::debug!(id, "delete declined by confirmation");
            return Ok(false);
        }

        self.begin_mutation()?;
        let result = self.sync.delete(id).await;
        self.end_mutation();

        match result {
            Ok(()) => {
                let mut state = self.state_lock();
                if matches!(&state.form, Some(ReservationForm::Edit { id: editing, .. }) if editing == id)
                {
                    state.form = None;
                }
                drop(state);
                self.refresh().await;
                Ok(true)
            }
            Err(error) => Err(error.into()),
        }
    }

    /// Administrative bulk delete of reservations older than `days`.
    /// Refreshes on success; zero deletions is success.
    pub async fn cleanup_old_data(&self, days: u32) -> Result<u64, StoreError> {
        self.begin_mutation()?;
        let result = self.sync.cleanup_older_than(days).await;
        self.end_mutation();

        let deleted = result?;
        tracing::debug!(deleted, "old reservations cleaned up");
        self.refresh().await;
        Ok(deleted)
    }

    fn begin_mutation(&self) -> Result<(), StoreError> {
        let mut state = self.state_lock();
        if state.mutation_in_flight {
            return Err(StoreError::Busy);
        }
        state.mutation_in_flight = true;
        Ok(())
    }

    fn end_mutation(&self) {
        self.state_lock().mutation_in_flight = false;
    }

    fn state_lock(&self) -> std::sync::MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
