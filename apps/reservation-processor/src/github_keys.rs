//! Fetches SSH public key material for a GitHub username, used both when
//! materialising a pod spec (§4.1 step 2) and by `AddUser` (§4.1). GitHub
//! publishes a user's registered public keys at a stable, unauthenticated
//! URL, one per line.

use std::time::Duration;

use crate::config::Config;
use domain_reservations::{ReservationError, ReservationResult};

/// `GET github.com/<user>.keys`, retried with exponential backoff on 404/5xx
/// up to `retry_max_attempts`, per §4.1's `AddUser` retry policy.
pub async fn fetch_public_keys(client: &reqwest::Client, config: &Config, github_user: &str) -> ReservationResult<String> {
    let url = format!("https://github.com/{github_user}.keys");
    let mut delay_ms = config.retry_base_delay_ms;

    for attempt in 0..config.retry_max_attempts {
        match client.get(&url).send().await {
            Ok(resp) if resp.status().is_success() => {
                let body = resp
                    .text()
                    .await
                    .map_err(|e| ReservationError::Transient(e.to_string()))?;
                if body.trim().is_empty() {
                    return Err(ReservationError::UserFatal(format!(
                        "no public keys registered for github user {github_user}"
                    )));
                }
                return Ok(body.trim().to_string());
            }
            Ok(resp) if resp.status().as_u16() == 404 => {
                return Err(ReservationError::UserFatal(format!(
                    "unknown github user {github_user}"
                )));
            }
            Ok(resp) => {
                tracing::warn!(attempt, status = %resp.status(), github_user, "ssh key fetch failed, retrying");
            }
            Err(e) => {
                tracing::warn!(attempt, error = %e, github_user, "ssh key fetch request error, retrying");
            }
        }

        if attempt + 1 < config.retry_max_attempts {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            delay_ms = (delay_ms * 2).min(config.retry_max_delay_ms);
        }
    }

    Err(ReservationError::Transient(format!(
        "exhausted {} attempts fetching ssh keys for {github_user}",
        config.retry_max_attempts
    )))
}
