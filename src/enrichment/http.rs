//! HTTP plumbing shared by the provider clients.

use serde::de::DeserializeOwned;
use std::time::Duration;

use super::domain::ProviderError;

/// User agent sent to every provider.
pub const USER_AGENT: &str = concat!("tune-ledger/", env!("CARGO_PKG_VERSION"));

/// Build a client with our user agent and a request timeout.
pub fn build_client(user_agent: &str, timeout: Duration) -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .build()
        .map_err(|e| ProviderError::Network(e.to_string()))
}

/// GET `url` and decode a JSON body.
pub async fn get_json<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
) -> Result<T, ProviderError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| ProviderError::Network(e.to_string()))?;

    let status = response.status();

    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(ProviderError::RateLimited);
    }

    if !status.is_success() {
        return Err(ProviderError::Api(format!(
            "HTTP {}: {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or("Unknown")
        )));
    }

    response
        .json::<T>()
        .await
        .map_err(|e| ProviderError::Parse(e.to_string()))
}

/// Leading four-digit year of a date string ("1975", "1975-10", "1975-10-31T..").
pub fn year_from_date(date: &str) -> Option<i32> {
    date.get(..4).and_then(|y| y.parse().ok())
}

/// Milliseconds to whole seconds, rounded.
pub fn millis_to_secs(millis: u64) -> u32 {
    u32::try_from((millis + 500) / 1000).unwrap_or(u32::MAX)
}
