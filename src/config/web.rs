use std::{net::SocketAddr, time::Duration};

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Upper bound on any scrape timeout, in seconds.
pub const MAX_SCRAPE_TIMEOUT_SECS: f64 = 86_400.0;

/// HTTP endpoint configuration.
///
/// ```toml
/// [web]
/// listen_address = "0.0.0.0:9184"
/// telemetry_path = "/metrics"
/// max_requests = 5
/// timeout_margin = 0.5
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default, deny_unknown_fields)]
#[validate(schema(function = "validate_timeouts"))]
pub struct WebConfig {
    #[validate(custom(function = "validate_listen_address"))]
    pub listen_address: String,

    /// Path serving the exposition. Must start with `/`; `/health` is taken.
    #[validate(custom(function = "validate_telemetry_path"))]
    pub telemetry_path: String,

    /// Scrapes allowed to run at once; further requests get 503.
    #[validate(range(min = 1))]
    pub max_requests: usize,

    /// Seconds subtracted from the scraper's advertised timeout, leaving
    /// room to encode and send the response.
    #[validate(range(min = 0.0))]
    pub timeout_margin: f64,

    /// Seconds assumed when the scraper does not advertise a timeout.
    pub default_scrape_timeout: f64,

    /// Lower bound on the effective scrape timeout, in seconds.
    pub min_scrape_timeout: f64,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            listen_address: "0.0.0.0:9184".to_string(),
            telemetry_path: "/metrics".to_string(),
            max_requests: 5,
            timeout_margin: 0.5,
            default_scrape_timeout: 10.0,
            min_scrape_timeout: 0.5,
        }
    }
}

impl WebConfig {
    /// Effective timeout for one scrape, given the value of the
    /// `X-Prometheus-Scrape-Timeout-Seconds` header if there was one.
    ///
    /// A missing, unparsable or non-positive header falls back to
    /// `default_scrape_timeout`. The margin is subtracted and the result is
    /// never below `min_scrape_timeout` nor above `MAX_SCRAPE_TIMEOUT_SECS`.
    pub fn scrape_timeout(&self, header: Option<&str>) -> Duration {
        let advertised = header
            .and_then(|raw| raw.trim().parse::<f64>().ok())
            .filter(|secs| secs.is_finite() && *secs > 0.0)
            .unwrap_or(self.default_scrape_timeout)
            .min(MAX_SCRAPE_TIMEOUT_SECS);

        let effective = (advertised - self.timeout_margin)
            .max(self.min_scrape_timeout)
            .min(MAX_SCRAPE_TIMEOUT_SECS);
        Duration::try_from_secs_f64(effective)
            .unwrap_or(Duration::from_secs_f64(MAX_SCRAPE_TIMEOUT_SECS))
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        self.listen_address.parse()
    }
}

fn validate_listen_address(address: &str) -> Result<(), ValidationError> {
    address.parse::<SocketAddr>().map(|_| ()).map_err(|e| {
        let mut err = ValidationError::new("invalid_listen_address");
        err.message = Some(format!("Invalid listen address '{}': {}", address, e).into());
        err
    })
}

fn validate_telemetry_path(path: &str) -> Result<(), ValidationError> {
    let problem = if !path.starts_with('/') || path.len() < 2 {
        "must start with '/' and name a resource"
    } else if path == "/health" {
        "is reserved for the health endpoint"
    } else {
        return Ok(());
    };

    let mut err = ValidationError::new("invalid_telemetry_path");
    err.message = Some(format!("Telemetry path '{}' {}", path, problem).into());
    Err(err)
}

fn validate_timeouts(config: &WebConfig) -> Result<(), ValidationError> {
    let in_range = |secs: f64| secs > 0.0 && secs <= MAX_SCRAPE_TIMEOUT_SECS;
    if !config.timeout_margin.is_finite() {
        let mut err = ValidationError::new("invalid_timeout_margin");
        err.message = Some("Timeout margin must be a finite number of seconds".into());
        return Err(err);
    }
    if in_range(config.default_scrape_timeout) && in_range(config.min_scrape_timeout) {
        Ok(())
    } else {
        let mut err = ValidationError::new("invalid_scrape_timeout");
        err.message = Some(
            format!(
                "Scrape timeouts must be positive and at most {} seconds",
                MAX_SCRAPE_TIMEOUT_SECS
            )
            .into(),
        );
        Err(err)
    }
}
