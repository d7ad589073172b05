use log::debug;

use super::ProbeOutcome;

/// Issues an HTTP GET against the target address. The bounded timeout lives
/// on the shared client, see `CheckExecutor::new`.
pub async fn run(client: &reqwest::Client, address: &str) -> ProbeOutcome {
    debug!("-> HTTP GET {}", address);

    match client.get(address).send().await {
        Ok(response) => {
            let status = response.status();
            if status.is_success() {
                ProbeOutcome {
                    success: true,
                    status_code: Some(status.as_u16()),
                    error: None,
                }
            } else {
                ProbeOutcome {
                    success: false,
                    status_code: Some(status.as_u16()),
                    error: Some(format!("{} returned status {}", address, status)),
                }
            }
        }
        Err(e) if e.is_timeout() => {
            ProbeOutcome::failed(format!("request to {} timed out: {}", address, e))
        }
        Err(e) => ProbeOutcome::failed(format!("failed to reach {}: {}", address, e)),
    }
}
