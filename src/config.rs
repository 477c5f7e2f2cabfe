use std::net::SocketAddr;
use std::time::Duration;

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";
const DEFAULT_TIMEOUT_SECS: u64 = 300;
const DEFAULT_SEED: u64 = 42;

/// Service settings, read once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Wall-clock budget of one generation run.
    pub timeout: Duration,
    /// Seed used when a request does not pin one.
    pub default_seed: u64,
    pub max_concurrent_runs: usize,
}

fn available_cores() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            default_seed: DEFAULT_SEED,
            max_concurrent_runs: available_cores(),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let bind_addr = lookup("TIMETABLE_BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| format!("TIMETABLE_BIND_ADDR: {}", e))?;
        let timeout_secs = parse_or("TIMETABLE_TIMEOUT_SECS", &lookup, DEFAULT_TIMEOUT_SECS)?;
        if timeout_secs == 0 {
            return Err("TIMETABLE_TIMEOUT_SECS must be positive".to_string());
        }
        let max_concurrent_runs = parse_or("TIMETABLE_MAX_CONCURRENT_RUNS", &lookup, available_cores())?;
        if max_concurrent_runs == 0 {
            return Err("TIMETABLE_MAX_CONCURRENT_RUNS must be positive".to_string());
        }
        Ok(Self {
            bind_addr,
            timeout: Duration::from_secs(timeout_secs),
            default_seed: parse_or("TIMETABLE_DEFAULT_SEED", &lookup, DEFAULT_SEED)?,
            max_concurrent_runs,
        })
    }
}

fn parse_or<T>(key: &str, lookup: &impl Fn(&str) -> Option<String>, default: T) -> Result<T, String>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| format!("{}: invalid value '{}': {}", key, raw, e)),
        None => Ok(default),
    }
}
