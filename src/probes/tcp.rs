use std::time::Duration;

use log::debug;
use tokio::net::{lookup_host, TcpStream};
use tokio::time;

use super::{ProbeOutcome, DEFAULT_PROBE_TIMEOUT_MS};

pub async fn run(address: &str, parameters: Option<&str>) -> ProbeOutcome {
    let (port, timeout) = match parse_parameters(parameters) {
        Ok(parsed) => parsed,
        // A bad parameters string is a configuration error; no connection
        // is attempted.
        Err(message) => return ProbeOutcome::failed(message),
    };
    debug!(
        "-> TCP connect {}:{} (timeout {} ms)",
        address,
        port,
        timeout.as_millis()
    );

    let addr = match lookup_host((address, port)).await {
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

    // The stream closes on drop on every path below.
    match time::timeout(timeout, TcpStream::connect(addr)).await {
        Ok(Ok(_stream)) => ProbeOutcome::passed(),
        Ok(Err(e)) => ProbeOutcome::failed(format!("connect to {}:{} failed: {}", address, port, e)),
        Err(_) => ProbeOutcome::failed(format!(
            "connect to {}:{} timed out after {} ms",
            address,
            port,
            timeout.as_millis()
        )),
    }
}

/// Parses `"<port>"` or `"<port>:<timeoutMs>"`.
fn parse_parameters(parameters: Option<&str>) -> Result<(u16, Duration), String> {
    let Some(raw) = parameters.map(str::trim).filter(|p| !p.is_empty()) else {
        return Err("missing TCP port parameter".to_string());
    };
    let (port_part, timeout_part) = match raw.split_once(':') {
        Some((port, timeout)) => (port, Some(timeout)),
        None => (raw, None),
    };
    let port = port_part
        .trim()
        .parse::<u16>()
        .ok()
        .filter(|p| *p != 0)
        .ok_or_else(|| format!("invalid TCP port in parameters '{}'", raw))?;
    let timeout_ms = match timeout_part {
        Some(timeout) => timeout
            .trim()
            .parse::<u64>()
            .map_err(|_| format!("invalid timeout in parameters '{}'", raw))?,
        None => DEFAULT_PROBE_TIMEOUT_MS,
    };
    Ok((port, Duration::from_millis(timeout_ms)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;
    use tokio::net::TcpListener;

    #[test]
    fn test_parse_port_only() {
        let (port, timeout) = parse_parameters(Some("8080")).unwrap();
        assert_eq!(port, 8080);
        assert_eq!(timeout, Duration::from_millis(5000));
    }

    #[test]
    fn test_parse_port_and_timeout() {
        let (port, timeout) = parse_parameters(Some("443:250")).unwrap();
        assert_eq!(port, 443);
        assert_eq!(timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_missing_parameters() {
        assert!(parse_parameters(None).is_err());
        assert!(parse_parameters(Some("  ")).is_err());
    }

    #[test]
    fn test_out_of_range_port() {
        let message = parse_parameters(Some("70000")).unwrap_err();
        assert!(message.contains("70000"));
    }

    #[test]
    fn test_non_numeric_port_and_timeout() {
        assert!(parse_parameters(Some("http")).is_err());
        assert!(parse_parameters(Some("8080:soon")).is_err());
        assert!(parse_parameters(Some("0")).is_err());
    }

    #[tokio::test]
    async fn test_open_port_is_a_pass() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let outcome = run("127.0.0.1", Some(&port.to_string())).await;
        assert!(outcome.success);
        assert!(outcome.error.is_none());
    }

    #[tokio::test]
    async fn test_closed_port_is_a_failure() {
        // Bind and drop a listener to find a port that is certainly closed.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let outcome = run("127.0.0.1", Some(&format!("{}:200", port))).await;
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains(&port.to_string()));
    }

    #[tokio::test]
    async fn test_invalid_port_attempts_no_connection() {
        let started = Instant::now();
        let outcome = run("host.that.would.block.invalid", Some("70000")).await;
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("70000"));
        // Neither resolution nor a connect happened.
        assert!(started.elapsed() < Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_unknown_host_is_distinguished() {
        let outcome = run("synmon-does-not-exist.invalid", Some("80")).await;
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("unknown host"));
    }

    #[tokio::test]
    async fn test_unreachable_connect_is_bounded_by_the_timeout() {
        // A non-routable address either times out at 200 ms or fails fast
        // with a network error; it must not hang.
        let started = Instant::now();
        let outcome = run("10.255.255.1", Some("80:200")).await;
        assert!(!outcome.success);
        assert!(started.elapsed() < Duration::from_secs(3));
    }
}
