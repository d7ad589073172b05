use std::{env, fmt};

pub struct Config {
    pub server: ServerConfig,
    pub scheduler: SchedulerConfig,
    pub definitions_file: Option<String>,
}

impl Config {
    pub fn new() -> Self {
        let address =
            env::var("SYNMON_SERVER_ADDRESS").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("SYNMON_SERVER_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);
        let pool_size = env::var("SYNMON_SCHEDULER_POOL_SIZE")
            .ok()
            .and_then(|p| p.parse().ok())
            .filter(|p| *p > 0)
            .unwrap_or(10);
        let definitions_file = env::var("SYNMON_DEFINITIONS_FILE")
            .ok()
            .filter(|p| !p.is_empty());

        Config {
            server: ServerConfig { address, port },
            scheduler: SchedulerConfig { pool_size },
            definitions_file,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("server", &self.server)
            .field("scheduler", &self.scheduler)
            .field("definitions_file", &self.definitions_file)
            .finish()
    }
}

pub struct ServerConfig {
    pub address: String,
    /// Port 0 binds an ephemeral port; the server logs the one it got.
    pub port: u16,
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("address", &self.address)
            .field("port", &self.port)
            .finish()
    }
}

/// The base URL clients use to reach this server.
impl fmt::Display for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "http://{}:{}", self.address, self.port)
    }
}

pub struct SchedulerConfig {
    /// Number of worker slots shared by all scheduled checks.
    pub pool_size: usize,
}

impl fmt::Debug for SchedulerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchedulerConfig")
            .field("pool_size", &self.pool_size)
            .finish()
    }
}
