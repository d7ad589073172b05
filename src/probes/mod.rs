mod http;
mod ping;
mod tcp;

use crate::model::{CheckDefinition, CheckType};

/// Default timeout for probes that accept a millisecond override in their
/// parameters string.
pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 5_000;

/// What a single probe observed. `status_code` is only ever set by the HTTP
/// probe, and only when a response actually arrived.
#[derive(Clone, Debug)]
pub struct ProbeOutcome {
    pub success: bool,
    pub status_code: Option<u16>,
    pub error: Option<String>,
}

impl ProbeOutcome {
    pub fn passed() -> Self {
        ProbeOutcome {
            success: true,
            status_code: None,
            error: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        ProbeOutcome {
            success: false,
            status_code: None,
            error: Some(message.into()),
        }
    }
}

/// Runs the probe the check calls for. Dispatch is a closed match over the
/// check type; a new variant does not compile until it is handled here.
pub async fn run(client: &reqwest::Client, check: &CheckDefinition) -> ProbeOutcome {
    match check.check_type {
        CheckType::HttpGet => http::run(client, &check.target.address).await,
        CheckType::Ping => ping::run(&check.target.address, check.parameters.as_deref()).await,
        CheckType::TcpPort => tcp::run(&check.target.address, check.parameters.as_deref()).await,
    }
}
