use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub market: MarketConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            market: MarketConfig::load()?,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Marketplace policy knobs sourced from the environment.
///
/// The submission window is expressed in the platform's reference clock,
/// modelled as a fixed UTC offset (the default is IST, +05:30).
#[derive(Debug, Clone)]
pub struct MarketConfig {
    pub business_open_hour: u32,
    pub business_close_hour: u32,
    pub utc_offset_minutes: i32,
    pub currency: String,
    pub webhook_secret: String,
    pub payment_gates_submission: bool,
}

impl MarketConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let business_open_hour = parse_hour("MARKET_OPEN_HOUR", 9)?;
        let business_close_hour = parse_hour("MARKET_CLOSE_HOUR", 23)?;
        if business_open_hour >= business_close_hour {
            return Err(ConfigError::InvalidBusinessWindow);
        }

        let utc_offset_minutes = match env::var("MARKET_UTC_OFFSET_MINUTES") {
            Ok(raw) => raw
                .trim()
                .parse::<i32>()
                .ok()
                .filter(|offset| offset.abs() < 24 * 60)
                .ok_or(ConfigError::InvalidUtcOffset)?,
            Err(_) => 330,
        };

        let currency = env::var("MARKET_CURRENCY").unwrap_or_else(|_| "INR".to_string());
        let webhook_secret =
            env::var("MARKET_WEBHOOK_SECRET").unwrap_or_else(|_| "dev-webhook-secret".to_string());
        let payment_gates_submission = env::var("MARKET_PAYMENT_GATES_SUBMISSION")
            .map(|raw| raw.trim().eq_ignore_ascii_case("true") || raw.trim() == "1")
            .unwrap_or(true);

        Ok(Self {
            business_open_hour,
            business_close_hour,
            utc_offset_minutes,
            currency,
            webhook_secret,
            payment_gates_submission,
        })
    }
}

fn parse_hour(var: &str, default: u32) -> Result<u32, ConfigError> {
    match env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse::<u32>()
            .ok()
            .filter(|hour| *hour <= 24)
            .ok_or(ConfigError::InvalidBusinessWindow),
        Err(_) => Ok(default),
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidBusinessWindow,
    InvalidUtcOffset,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidBusinessWindow => write!(
                f,
                "MARKET_OPEN_HOUR/MARKET_CLOSE_HOUR must be hours with open < close"
            ),
            ConfigError::InvalidUtcOffset => {
                write!(f, "MARKET_UTC_OFFSET_MINUTES must be a valid offset in minutes")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}
