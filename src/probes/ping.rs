use std::io::ErrorKind;
use std::time::Duration;

use log::{debug, warn};
use tokio::net::{lookup_host, TcpStream};
use tokio::time;

use super::{ProbeOutcome, DEFAULT_PROBE_TIMEOUT_MS};

// Reachability is tested against the TCP echo port. A completed connect and
// a refused connect both mean the host answered.
const ECHO_PORT: u16 = 7;

pub async fn run(address: &str, parameters: Option<&str>) -> ProbeOutcome {
    let timeout = timeout_from_parameters(parameters);
    debug!("-> PING {} (timeout {} ms)", address, timeout.as_millis());

    let addr = match lookup_host((address, ECHO_PORT)).await {
        Ok(mut addrs) => match addrs.next() {
            Some(addr) => addr,
            None => {
                return ProbeOutcome::failed(format!(
                    "unknown host {}: no addresses resolved",
                    address
                ))
            }
        },
        Err(e) => return ProbeOutcome::failed(format!("unknown host {}: {}", address, e)),
    };

    match time::timeout(timeout, TcpStream::connect(addr)).await {
        Ok(Ok(_stream)) => ProbeOutcome::passed(),
        Ok(Err(e)) if e.kind() == ErrorKind::ConnectionRefused => ProbeOutcome::passed(),
        Ok(Err(e)) => ProbeOutcome::failed(format!("host {} is unreachable: {}", address, e)),
        Err(_) => ProbeOutcome::failed(format!(
            "host {} did not answer within {} ms",
            address,
            timeout.as_millis()
        )),
    }
}

/// The parameters string, when it parses as an integer, overrides the
/// reachability timeout in milliseconds.
fn timeout_from_parameters(parameters: Option<&str>) -> Duration {
    let Some(raw) = parameters.map(str::trim).filter(|p| !p.is_empty()) else {
        return Duration::from_millis(DEFAULT_PROBE_TIMEOUT_MS);
    };
    match raw.parse::<u64>() {
        Ok(ms) => Duration::from_millis(ms),
        Err(_) => {
            warn!(
                "Ignoring unparseable ping timeout override '{}', using the default of {} ms.",
                raw, DEFAULT_PROBE_TIMEOUT_MS
            );
            Duration::from_millis(DEFAULT_PROBE_TIMEOUT_MS)
        }
    }
}
