pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::store::{DayState, ReservationForm, ReservationStore, StoreError};
pub use application::sync_client::{DayFetch, RetryPolicy, SyncClient, SyncError};
pub use domain::geometry::{BarGeometry, GeometryMapper};
pub use domain::models::{BenchId, Reservation, ReservationDraft};
pub use domain::time_grid::TimeGrid;
pub use domain::validator::{ConflictValidator, ValidationError};
pub use infrastructure::config::ApiConfig;
pub use infrastructure::error::ApiError;
pub use infrastructure::store_client::{ReqwestStoreClient, ReservationStoreApi};
