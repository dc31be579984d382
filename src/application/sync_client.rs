use crate::domain::models::{Reservation, ReservationDraft};
use crate::infrastructure::config::ApiConfig;
use crate::infrastructure::error::ApiError;
use crate::infrastructure::record_mapper::{decode_record, encode_create, encode_update};
use crate::infrastructure::store_client::{ReservationRecord, ReservationStoreApi};
use chrono::NaiveDate;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;

/// Bounds for the fetch retry loop. Mutations never retry: without a dedup
/// token a repeated create/update is not idempotent, so retry stays an
/// explicit user action.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 8_000,
        }
    }
}

impl RetryPolicy {
    fn delay_for(&self, attempt: u32) -> Duration {
        let doubled = self
            .base_delay_ms
            .saturating_mul(2u64.saturating_pow(attempt));
        Duration::from_millis(doubled.min(self.max_delay_ms))
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SyncError {
    #[error("giving up after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: ApiError,
    },
    #[error(transparent)]
    Request(#[from] ApiError),
}

/// A successfully fetched day. `discarded` counts records dropped by the
/// shape filter; it is diagnostic only and never an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DayFetch {
    pub reservations: Vec<Reservation>,
    pub discarded: usize,
}

/// Network-resilient CRUD against the reservation store. Stateless between
/// calls; all knobs come from the injected config and retry policy.
pub struct SyncClient<C: ReservationStoreApi> {
    api: Arc<C>,
    config: ApiConfig,
    retry_policy: RetryPolicy,
}

impl<C: ReservationStoreApi> SyncClient<C> {
    pub fn new(api: Arc<C>, config: ApiConfig) -> Self {
        Self {
            api,
            config,
            retry_policy: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    /// Fetches the day's reservations, retrying transient failures with
    /// exponential backoff. Each attempt's timeout budget grows, so the
    /// total wall-clock time stays finite and bounded.
    pub async fn fetch_day(&self, date: NaiveDate) -> Result<DayFetch, SyncError> {
        let max_attempts = self.retry_policy.max_retries.saturating_add(1);
        let mut attempt: u32 = 0;

        loop {
            let timeout = self.config.fetch_timeout + self.config.fetch_timeout_step * attempt;
            match self.api.fetch_day(date, timeout).await {
                Ok(records) => return Ok(self.filter_records(records)),
                Err(error) if error.is_transient() && attempt + 1 < max_attempts => {
                    let delay = self.retry_policy.delay_for(attempt);
                    tracing::warn!(
                        %date,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        "transient fetch failure, backing off: {error}"
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(error) if error.is_transient() => {
                    return Err(SyncError::RetriesExhausted {
                        attempts: attempt + 1,
                        source: error,
                    });
                }
                Err(error) => return Err(SyncError::Request(error)),
            }
        }
    }

    pub async fn create(&self, draft: &ReservationDraft) -> Result<Reservation, SyncError> {
        let request = encode_create(draft, self.config.timezone);
        let record = self
            .api
            .create(&request, self.config.mutation_timeout)
            .await?;
        decode_record(&record, self.config.timezone).ok_or_else(|| {
            SyncError::Request(ApiError::InvalidPayload(
                "create response is not a usable reservation record".to_string(),
            ))
        })
    }

    pub async fn update(&self, id: &str, draft: &ReservationDraft) -> Result<Reservation, SyncError> {
        let request = encode_update(draft, self.config.timezone);
        let record = self
            .api
            .update(id, &request, self.config.mutation_timeout)
            .await?;
        decode_record(&record, self.config.timezone).ok_or_else(|| {
            SyncError::Request(ApiError::InvalidPayload(
                "update response is not a usable reservation record".to_string(),
            ))
        })
    }

    pub async fn delete(&self, id: &str) -> Result<(), SyncError> {
        self.api
            .delete(id, self.config.mutation_timeout)
            .await
            .map_err(SyncError::from)
    }

    /// Bulk-deletes reservations older than the threshold. Zero deletions is
    /// a valid outcome, not an error.
    pub async fn cleanup_older_than(&self, days: u32) -> Result<u64, SyncError> {
        self.api
            .cleanup_older_than(days, self.config.cleanup_timeout)
            .await
            .map_err(SyncError::from)
    }

    fn filter_records(&self, records: Vec<ReservationRecord>) -> DayFetch {
        let total = records.len();
        let mut seen_ids: HashSet<String> = HashSet::new();
        let mut reservations = Vec::with_capacity(total);

        for record in &records {
            let Some(reservation) = decode_record(record, self.config.timezone) else {
                continue;
            };
            if !seen_ids.insert(reservation.id.clone()) {
                tracing::warn!(id = %reservation.id, "discarding duplicate reservation id");
                continue;
            }
            reservations.push(reservation);
        }

        let discarded = total - reservations.len();
        if discarded > 0 {
            tracing::warn!(discarded, total, "discarded malformed reservation records");
        }
        DayFetch {
            reservations,
            discarded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::BenchId;
    use crate::infrastructure::store_client::{
        CreateReservationRequest, ReservationRecord, UpdateReservationRequest,
    };
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Debug, Clone)]
    enum FakeFetch {
        Records(Vec<ReservationRecord>),
        Timeout,
        ServerError,
        Rejected,
    }

    #[derive(Debug, Default)]
    struct FakeStoreApi {
        fetch_responses: Mutex<VecDeque<FakeFetch>>,
        fetch_calls: AtomicUsize,
        fetch_timeouts: Mutex<Vec<Duration>>,
        create_responses: Mutex<VecDeque<Result<ReservationRecord, ApiError>>>,
        create_calls: AtomicUsize,
        cleanup_responses: Mutex<VecDeque<Result<u64, ApiError>>>,
    }

    impl FakeStoreApi {
        fn with_fetch_responses(responses: Vec<FakeFetch>) -> Self {
            Self {
                fetch_responses: Mutex::new(responses.into()),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl ReservationStoreApi for FakeStoreApi {
        async fn fetch_day(
            &self,
            _date: NaiveDate,
            timeout: Duration,
        ) -> Result<Vec<ReservationRecord>, ApiError> {
            self.fetch_calls.fetch_add(1, Ordering::SeqCst);
            self.fetch_timeouts
                .lock()
                .expect("fetch timeout lock poisoned")
                .push(timeout);

            let response = self
                .fetch_responses
                .lock()
                .expect("fetch response lock poisoned")
                .pop_front()
                .unwrap_or(FakeFetch::Records(Vec::new()));

            match response {
                FakeFetch::Records(records) => Ok(records),
                FakeFetch::Timeout => {
                    Err(ApiError::Network("reservation fetch timed out".to_string()))
                }
                FakeFetch::ServerError => Err(ApiError::Server {
                    status: 503,
                    message: "database unavailable".to_string(),
                }),
                FakeFetch::Rejected => Err(ApiError::Rejected {
                    status: 400,
                    message: "invalid date".to_string(),
                }),
            }
        }

        async fn create(
            &self,
            _request: &CreateReservationRequest,
            _timeout: Duration,
        ) -> Result<ReservationRecord, ApiError> {
            self.create_calls.fetch_add(1, Ordering::SeqCst);
            self.create_responses
                .lock()
                .expect("create response lock poisoned")
                .pop_front()
                .unwrap_or_else(|| Ok(sample_record("rsv-created", "front")))
        }

        async fn update(
            &self,
            id: &str,
            _request: &UpdateReservationRequest,
            _timeout: Duration,
        ) -> Result<ReservationRecord, ApiError> {
            Ok(sample_record(id, "front"))
        }

        async fn delete(&self, _id: &str, _timeout: Duration) -> Result<(), ApiError> {
            Ok(())
        }

        async fn cleanup_older_than(&self, _days: u32, _timeout: Duration) -> Result<u64, ApiError> {
            self.cleanup_responses
                .lock()
                .expect("cleanup response lock poisoned")
                .pop_front()
                .unwrap_or(Ok(0))
        }
    }

    fn sample_record(id: &str, bench: &str) -> ReservationRecord {
        ReservationRecord {
            id: Some(id.to_string()),
            bench_id: Some(bench.to_string()),
            user_name: Some("中村".to_string()),
            start_time: Some("2026-08-06T09:00:00+09:00".to_string()),
            end_time: Some("2026-08-06T10:00:00+09:00".to_string()),
        }
    }

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay_ms: 1,
            max_delay_ms: 4,
        }
    }

    fn sync_client(api: Arc<FakeStoreApi>) -> SyncClient<FakeStoreApi> {
        SyncClient::new(api, ApiConfig::default()).with_retry_policy(fast_policy(3))
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 6).expect("valid date")
    }

    fn sample_draft() -> ReservationDraft {
        ReservationDraft {
            bench_id: BenchId::Front,
            user_name: "中村".to_string(),
            start_time: day().and_hms_opt(9, 0, 0).expect("valid time"),
            end_time: day().and_hms_opt(10, 0, 0).expect("valid time"),
        }
    }

    #[tokio::test]
    async fn fetch_retries_transient_failures_then_succeeds() {
        let api = Arc::new(FakeStoreApi::with_fetch_responses(vec![
            FakeFetch::Timeout,
            FakeFetch::ServerError,
            FakeFetch::Records(vec![sample_record("rsv-1", "front")]),
        ]));
        let client = sync_client(Arc::clone(&api));

        let fetched = client.fetch_day(day()).await.expect("fetch succeeds");

        assert_eq!(fetched.reservations.len(), 1);
        assert_eq!(fetched.discarded, 0);
        assert_eq!(api.fetch_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn fetch_timeout_budget_grows_per_attempt() {
        let api = Arc::new(FakeStoreApi::with_fetch_responses(vec![
            FakeFetch::Timeout,
            FakeFetch::Timeout,
            FakeFetch::Records(Vec::new()),
        ]));
        let client = sync_client(Arc::clone(&api));

        client.fetch_day(day()).await.expect("fetch succeeds");

        let timeouts = api.fetch_timeouts.lock().expect("timeouts").clone();
        assert_eq!(
            timeouts,
            vec![
                Duration::from_millis(8_000),
                Duration::from_millis(10_000),
                Duration::from_millis(12_000),
            ]
        );
    }

    #[tokio::test]
    async fn fetch_reports_exhausted_retries_after_the_bound() {
        let api = Arc::new(FakeStoreApi::with_fetch_responses(vec![
            FakeFetch::Timeout,
            FakeFetch::Timeout,
            FakeFetch::Timeout,
            FakeFetch::Timeout,
        ]));
        let client = sync_client(Arc::clone(&api));

        let error = client.fetch_day(day()).await.expect_err("fetch exhausts");

        assert!(matches!(
            error,
            SyncError::RetriesExhausted { attempts: 4, .. }
        ));
        // Initial attempt plus the three configured retries, no more.
        assert_eq!(api.fetch_calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn fetch_permanent_rejection_is_never_retried() {
        let api = Arc::new(FakeStoreApi::with_fetch_responses(vec![FakeFetch::Rejected]));
        let client = sync_client(Arc::clone(&api));

        let error = client.fetch_day(day()).await.expect_err("fetch fails");

        assert!(matches!(
            error,
            SyncError::Request(ApiError::Rejected { status: 400, .. })
        ));
        assert_eq!(api.fetch_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn fetch_filters_malformed_and_duplicate_records() {
        let mut nameless = sample_record("rsv-2", "back");
        nameless.user_name = None;
        let api = Arc::new(FakeStoreApi::with_fetch_responses(vec![FakeFetch::Records(
            vec![
                sample_record("rsv-1", "front"),
                nameless,
                sample_record("rsv-1", "front"),
            ],
        )]));
        let client = sync_client(api);

        let fetched = client.fetch_day(day()).await.expect("fetch succeeds");

        assert_eq!(fetched.reservations.len(), 1);
        assert_eq!(fetched.discarded, 2);
    }

    #[tokio::test]
    async fn create_does_not_retry_transient_failures() {
        let api = Arc::new(FakeStoreApi::default());
        api.create_responses
            .lock()
            .expect("create responses")
            .push_back(Err(ApiError::Server {
                status: 503,
                message: "unavailable".to_string(),
            }));
        let client = sync_client(Arc::clone(&api));

        let error = client.create(&sample_draft()).await.expect_err("create fails");

        assert!(matches!(
            error,
            SyncError::Request(ApiError::Server { status: 503, .. })
        ));
        assert_eq!(api.create_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn create_decodes_the_stored_record() {
        let api = Arc::new(FakeStoreApi::default());
        let client = sync_client(api);

        let created = client.create(&sample_draft()).await.expect("create succeeds");

        assert_eq!(created.id, "rsv-created");
        assert_eq!(created.bench_id, BenchId::Front);
    }

    #[tokio::test]
    async fn cleanup_with_nothing_eligible_returns_zero() {
        let api = Arc::new(FakeStoreApi::default());
        let client = sync_client(api);

        let deleted = client.cleanup_older_than(30).await.expect("cleanup succeeds");

        assert_eq!(deleted, 0);
    }

    #[test]
    fn backoff_delay_doubles_and_caps() {
        let policy = RetryPolicy {
            max_retries: 5,
            base_delay_ms: 1_000,
            max_delay_ms: 8_000,
        };
        assert_eq!(policy.delay_for(0), Duration::from_millis(1_000));
        assert_eq!(policy.delay_for(1), Duration::from_millis(2_000));
        assert_eq!(policy.delay_for(2), Duration::from_millis(4_000));
        assert_eq!(policy.delay_for(3), Duration::from_millis(8_000));
        assert_eq!(policy.delay_for(4), Duration::from_millis(8_000));
    }
}
