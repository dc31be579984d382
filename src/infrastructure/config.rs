use crate::infrastructure::error::ApiError;
use chrono_tz::Tz;
use std::time::Duration;
use url::Url;

const BACKEND_URL_ENV: &str = "BENCH_BACKEND_URL";
const TIMEZONE_ENV: &str = "BENCH_TIMEZONE";
const DEFAULT_TIMEZONE: Tz = chrono_tz::Asia::Tokyo;

/// Connection settings for the reservation store, resolved once at
/// construction and injected into the client — business logic never reads
/// ambient process state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    /// Origin of the store, no trailing slash. Empty means same-origin
    /// deployment: requests go to the relative `/api` root.
    pub base_url: String,
    /// Timezone the venue's wall-clock times are anchored to.
    pub timezone: Tz,
    /// First fetch attempt's budget.
    pub fetch_timeout: Duration,
    /// Added to the budget on each retry attempt.
    pub fetch_timeout_step: Duration,
    pub mutation_timeout: Duration,
    pub cleanup_timeout: Duration,
}

impl ApiConfig {
    pub fn from_env() -> Result<Self, ApiError> {
        Self::from_parts(
            std::env::var(BACKEND_URL_ENV).ok(),
            std::env::var(TIMEZONE_ENV).ok(),
        )
    }

    pub fn from_parts(
        backend_url: Option<String>,
        timezone: Option<String>,
    ) -> Result<Self, ApiError> {
        let base_url = normalize_base_url(backend_url.as_deref())?;
        let timezone = match timezone.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
            Some(name) => name
                .parse::<Tz>()
                .map_err(|_| ApiError::InvalidConfig(format!("unknown timezone {name}")))?,
            None => DEFAULT_TIMEZONE,
        };

        Ok(Self {
            base_url,
            timezone,
            ..Self::default()
        })
    }

    /// `{base}/api`, the prefix every store route hangs off.
    pub fn api_root(&self) -> String {
        format!("{}/api", self.base_url)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            timezone: DEFAULT_TIMEZONE,
            fetch_timeout: Duration::from_millis(8_000),
            fetch_timeout_step: Duration::from_millis(2_000),
            mutation_timeout: Duration::from_millis(8_000),
            cleanup_timeout: Duration::from_millis(15_000),
        }
    }
}

/// Strips trailing slashes; an unset or empty value falls back to the
/// relative `/api` root. Anything else must be an absolute URL.
fn normalize_base_url(value: Option<&str>) -> Result<String, ApiError> {
    let trimmed = value.unwrap_or_default().trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Ok(String::new());
    }
    let parsed = Url::parse(trimmed)
        .map_err(|error| ApiError::InvalidConfig(format!("invalid backend url {trimmed}: {error}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ApiError::InvalidConfig(format!(
            "backend url must be http(s), got {trimmed}"
        )));
    }
    Ok(trimmed.to_string())
}
