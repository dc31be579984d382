use crate::domain::models::{Reservation, ReservationDraft};
use crate::domain::time_grid::TimeGrid;
use thiserror::Error;

/// A rejected candidate, naming the first rule it violated. The validator
/// never auto-corrects a candidate or silently drops it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("user name must not be empty")]
    EmptyUserName,
    #[error("end time must be after start time")]
    InvalidInterval,
    #[error("times must fall on {slot_minutes}-minute slot boundaries")]
    Misaligned { slot_minutes: u32 },
    #[error("times must be within operating hours")]
    OutsideOperatingHours,
    #[error("the requested window overlaps reservation {conflicting_id}")]
    Overlap { conflicting_id: String },
}

/// Local admission control for the reservation set. The remote store may or
/// may not enforce overlap itself; displayed-state correctness never depends
/// on it.
#[derive(Debug, Clone, Default)]
pub struct ConflictValidator {
    grid: TimeGrid,
}

impl ConflictValidator {
    pub fn new(grid: TimeGrid) -> Self {
        Self { grid }
    }

    pub fn grid(&self) -> &TimeGrid {
        &self.grid
    }

    /// Checks run in order and short-circuit on the first failure. When
    /// editing, `exclude_id` removes the reservation being replaced from the
    /// overlap scan so an unchanged interval revalidates cleanly.
    pub fn validate(
        &self,
        candidate: &ReservationDraft,
        existing: &[Reservation],
        exclude_id: Option<&str>,
    ) -> Result<(), ValidationError> {
        if candidate.user_name.trim().is_empty() {
            return Err(ValidationError::EmptyUserName);
        }
        if candidate.start_time >= candidate.end_time {
            return Err(ValidationError::InvalidInterval);
        }
        if !self.grid.is_aligned(candidate.start_time) || !self.grid.is_aligned(candidate.end_time)
        {
            return Err(ValidationError::Misaligned {
                slot_minutes: self.grid.slot_minutes(),
            });
        }
        if !self.grid.is_within_window(candidate.start_time)
            || !self.grid.is_within_window(candidate.end_time)
        {
            return Err(ValidationError::OutsideOperatingHours);
        }

        let conflict = existing
            .iter()
            .filter(|reservation| reservation.bench_id == candidate.bench_id)
            .filter(|reservation| exclude_id != Some(reservation.id.as_str()))
            .find(|reservation| {
                intervals_overlap(
                    candidate.start_time,
                    candidate.end_time,
                    reservation.start_time,
                    reservation.end_time,
                )
            });
        match conflict {
            Some(reservation) => Err(ValidationError::Overlap {
                conflicting_id: reservation.id.clone(),
            }),
            None => Ok(()),
        }
    }
}

/// Half-open interval test: `[s1, e1)` and `[s2, e2)` overlap iff
/// `s1 < e2 && s2 < e1`. Touching endpoints do not conflict.
fn intervals_overlap<T: PartialOrd>(s1: T, e1: T, s2: T, e2: T) -> bool {
    s1 < e2 && s2 < e1
}
