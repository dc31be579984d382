use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One of the two fixed bookable benches.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BenchId {
    Front,
    Back,
}

impl BenchId {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Front => "front",
            Self::Back => "back",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "front" => Some(Self::Front),
            "back" => Some(Self::Back),
            _ => None,
        }
    }
}

/// A confirmed reservation as loaded from the store. Times are venue-local
/// wall-clock instants on the day being viewed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Reservation {
    pub id: String,
    pub bench_id: BenchId,
    pub user_name: String,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
}

impl Reservation {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "reservation.id")?;
        validate_non_empty(&self.user_name, "reservation.user_name")?;
        if self.end_time <= self.start_time {
            return Err("reservation.end_time must be after reservation.start_time".to_string());
        }
        Ok(())
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end_time - self.start_time).num_minutes()
    }
}

/// In-progress form values for a create or edit. Not persisted; the store
/// assigns the id on creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReservationDraft {
    pub bench_id: BenchId,
    pub user_name: String,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
}

impl ReservationDraft {
    /// Seed an edit draft from an existing reservation.
    pub fn from_reservation(reservation: &Reservation) -> Self {
        Self {
            bench_id: reservation.bench_id,
            user_name: reservation.user_name.clone(),
            start_time: reservation.start_time,
            end_time: reservation.end_time,
        }
    }
}

pub(crate) fn validate_non_empty(value: &str, field_name: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field_name} must not be empty"));
    }
    Ok(())
}
