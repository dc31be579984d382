use crate::infrastructure::config::ApiConfig;
use crate::infrastructure::error::ApiError;
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, StatusCode};
use std::time::Duration;

/// One reservation as the store serialized it. Every field is optional so a
/// partially-written record survives deserialization; the mapper decides
/// what to discard.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ReservationRecord {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub bench_id: Option<String>,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct CreateReservationRequest {
    pub bench_id: String,
    pub user_name: String,
    pub start_time: String,
    pub end_time: String,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct UpdateReservationRequest {
    pub user_name: String,
    pub start_time: String,
    pub end_time: String,
}

#[derive(Debug, serde::Deserialize)]
struct CleanupResponse {
    deleted_count: u64,
}

#[derive(Debug, serde::Deserialize)]
struct ErrorDetail {
    detail: Option<String>,
}

/// Wire-level access to the reservation store. Implementations are
/// stateless between calls; every method carries its own timeout budget so
/// the sync layer can stretch it per attempt.
#[async_trait]
pub trait ReservationStoreApi: Send + Sync {
    async fn fetch_day(
        &self,
        date: NaiveDate,
        timeout: Duration,
    ) -> Result<Vec<ReservationRecord>, ApiError>;

    async fn create(
        &self,
        request: &CreateReservationRequest,
        timeout: Duration,
    ) -> Result<ReservationRecord, ApiError>;

    async fn update(
        &self,
        id: &str,
        request: &UpdateReservationRequest,
        timeout: Duration,
    ) -> Result<ReservationRecord, ApiError>;

    async fn delete(&self, id: &str, timeout: Duration) -> Result<(), ApiError>;

    async fn cleanup_older_than(&self, days: u32, timeout: Duration) -> Result<u64, ApiError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestStoreClient {
    client: Client,
    config: ApiConfig,
}

impl ReqwestStoreClient {
    pub fn new(config: ApiConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    fn reservations_endpoint(&self) -> String {
        format!("{}/reservations", self.config.api_root())
    }

    fn reservation_endpoint(&self, id: &str) -> String {
        format!("{}/reservations/{id}", self.config.api_root())
    }

    fn cleanup_endpoint(&self) -> String {
        format!("{}/cleanup/old-data", self.config.api_root())
    }

    fn network_error(context: &str, error: reqwest::Error) -> ApiError {
        if error.is_timeout() {
            ApiError::Network(format!("{context} timed out: {error}"))
        } else {
            ApiError::Network(format!("{context} failed: {error}"))
        }
    }

    /// Maps a non-success response to the taxonomy, preferring the store's
    /// structured `detail` message over the raw body.
    fn status_error(status: StatusCode, body: &str) -> ApiError {
        let message = serde_json::from_str::<ErrorDetail>(body)
            .ok()
            .and_then(|payload| payload.detail)
            .map(|detail| detail.trim().to_string())
            .filter(|detail| !detail.is_empty())
            .unwrap_or_else(|| format!("http {}", status.as_u16()));

        if status.is_server_error() {
            ApiError::Server {
                status: status.as_u16(),
                message,
            }
        } else {
            ApiError::Rejected {
                status: status.as_u16(),
                message,
            }
        }
    }

    async fn read_body(response: reqwest::Response, context: &str) -> Result<(StatusCode, String), ApiError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| Self::network_error(context, error))?;
        Ok((status, body))
    }

    fn parse_record(body: &str, context: &str) -> Result<ReservationRecord, ApiError> {
        serde_json::from_str(body)
            .map_err(|error| ApiError::InvalidPayload(format!("{context}: {error}")))
    }
}

#[async_trait]
impl ReservationStoreApi for ReqwestStoreClient {
    async fn fetch_day(
        &self,
        date: NaiveDate,
        timeout: Duration,
    ) -> Result<Vec<ReservationRecord>, ApiError> {
        let response = self
            .client
            .get(self.reservations_endpoint())
            .query(&[("date", date.format("%Y-%m-%d").to_string())])
            .timeout(timeout)
            .send()
            .await
            .map_err(|error| Self::network_error("reservation fetch", error))?;

        let (status, body) = Self::read_body(response, "reservation fetch").await?;
        if !status.is_success() {
            return Err(Self::status_error(status, &body));
        }

        serde_json::from_str(&body).map_err(|error| {
            ApiError::InvalidPayload(format!("reservation list is not an array of records: {error}"))
        })
    }

    async fn create(
        &self,
        request: &CreateReservationRequest,
        timeout: Duration,
    ) -> Result<ReservationRecord, ApiError> {
        let response = self
            .client
            .post(self.reservations_endpoint())
            .json(request)
            .timeout(timeout)
            .send()
            .await
            .map_err(|error| Self::network_error("reservation create", error))?;

        let (status, body) = Self::read_body(response, "reservation create").await?;
        if !status.is_success() {
            return Err(Self::status_error(status, &body));
        }
        Self::parse_record(&body, "invalid create response")
    }

    async fn update(
        &self,
        id: &str,
        request: &UpdateReservationRequest,
        timeout: Duration,
    ) -> Result<ReservationRecord, ApiError> {
        let response = self
            .client
            .put(self.reservation_endpoint(id))
            .json(request)
            .timeout(timeout)
            .send()
            .await
            .map_err(|error| Self::network_error("reservation update", error))?;

        let (status, body) = Self::read_body(response, "reservation update").await?;
        if !status.is_success() {
            return Err(Self::status_error(status, &body));
        }
        Self::parse_record(&body, "invalid update response")
    }

    async fn delete(&self, id: &str, timeout: Duration) -> Result<(), ApiError> {
        let response = self
            .client
            .delete(self.reservation_endpoint(id))
            .timeout(timeout)
            .send()
            .await
            .map_err(|error| Self::network_error("reservation delete", error))?;

        let (status, body) = Self::read_body(response, "reservation delete").await?;
        if !status.is_success() {
            return Err(Self::status_error(status, &body));
        }
        Ok(())
    }

    async fn cleanup_older_than(&self, days: u32, timeout: Duration) -> Result<u64, ApiError> {
        let response = self
            .client
            .post(self.cleanup_endpoint())
            .query(&[("days_to_keep", days)])
            .timeout(timeout)
            .send()
            .await
            .map_err(|error| Self::network_error("cleanup", error))?;

        let (status, body) = Self::read_body(response, "cleanup").await?;
        if !status.is_success() {
            return Err(Self::status_error(status, &body));
        }

        let parsed: CleanupResponse = serde_json::from_str(&body)
            .map_err(|error| ApiError::InvalidPayload(format!("invalid cleanup response: {error}")))?;
        Ok(parsed.deleted_count)
    }
}
