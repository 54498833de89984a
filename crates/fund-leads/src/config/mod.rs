use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

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
    pub leads: LeadConfig,
    pub email: EmailConfig,
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
        let format = match env::var("APP_LOG_FORMAT").as_deref() {
            Ok("pretty") => LogFormat::Pretty,
            _ => LogFormat::Compact,
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig {
                log_level,
                format,
                include_target: environment != AppEnvironment::Production,
            },
            leads: LeadConfig::from_env()?,
            email: EmailConfig::from_env()?,
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

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Pretty,
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub format: LogFormat,
    pub include_target: bool,
}

/// Knobs for intake throttling, lead follow-up, and notification fan-out.
#[derive(Debug, Clone, PartialEq)]
pub struct LeadConfig {
    pub rate_limit_max: u32,
    pub rate_limit_window: Duration,
    pub stale_after_days: i64,
    pub digest_window_days: i64,
    pub admin_email: String,
    pub digest_recipient: String,
    pub dispatch_concurrency: usize,
    pub send_timeout: Duration,
    pub queue_capacity: usize,
    pub test_mode: bool,
    pub test_recipient: Option<String>,
}

impl Default for LeadConfig {
    fn default() -> Self {
        Self {
            rate_limit_max: 3,
            rate_limit_window: Duration::from_secs(24 * 60 * 60),
            stale_after_days: 7,
            digest_window_days: 7,
            admin_email: "leads-admin@fundleads.local".to_string(),
            digest_recipient: "operations@fundleads.local".to_string(),
            dispatch_concurrency: 5,
            send_timeout: Duration::from_secs(10),
            queue_capacity: 256,
            test_mode: false,
            test_recipient: None,
        }
    }
}

impl LeadConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let window_hours: u64 = parse_var("LEADS_RATE_LIMIT_WINDOW_HOURS", 24)?;
        let timeout_secs: u64 = parse_var("LEADS_SEND_TIMEOUT_SECS", 10)?;

        Ok(Self {
            rate_limit_max: parse_var("LEADS_RATE_LIMIT_MAX", defaults.rate_limit_max)?,
            rate_limit_window: Duration::from_secs(window_hours * 60 * 60),
            stale_after_days: parse_var("LEADS_STALE_AFTER_DAYS", defaults.stale_after_days)?,
            digest_window_days: parse_var(
                "LEADS_DIGEST_WINDOW_DAYS",
                defaults.digest_window_days,
            )?,
            admin_email: env::var("LEADS_ADMIN_EMAIL").unwrap_or(defaults.admin_email),
            digest_recipient: env::var("LEADS_DIGEST_RECIPIENT")
                .unwrap_or(defaults.digest_recipient),
            dispatch_concurrency: parse_var(
                "LEADS_DISPATCH_CONCURRENCY",
                defaults.dispatch_concurrency,
            )?
            .max(1),
            send_timeout: Duration::from_secs(timeout_secs),
            queue_capacity: parse_var("LEADS_QUEUE_CAPACITY", defaults.queue_capacity)?.max(1),
            test_mode: parse_var("LEADS_TEST_MODE", defaults.test_mode)?,
            test_recipient: env::var("LEADS_TEST_RECIPIENT")
                .ok()
                .filter(|value| !value.trim().is_empty()),
        })
    }
}

/// Outbound mail transport selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmailTransportConfig {
    Smtp {
        host: String,
        port: u16,
        username: Option<String>,
        password: Option<String>,
    },
    /// Writes `.eml` files to a directory instead of delivering.
    File { path: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailConfig {
    pub transport: EmailTransportConfig,
    pub from_email: String,
    pub from_name: String,
}

impl EmailConfig {
    /// `SMTP_HOST` selects SMTP delivery; without it mail lands in `EMAIL_OUTBOX_DIR`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let transport = match env::var("SMTP_HOST") {
            Ok(host) if !host.trim().is_empty() => EmailTransportConfig::Smtp {
                host,
                port: parse_var("SMTP_PORT", 587)?,
                username: env::var("SMTP_USER").ok(),
                password: env::var("SMTP_PASSWORD").ok(),
            },
            _ => EmailTransportConfig::File {
                path: env::var("EMAIL_OUTBOX_DIR").unwrap_or_else(|_| "outbox".to_string()),
            },
        };

        Ok(Self {
            transport,
            from_email: env::var("EMAIL_FROM")
                .unwrap_or_else(|_| "noreply@fundleads.local".to_string()),
            from_name: env::var("EMAIL_FROM_NAME").unwrap_or_else(|_| "Fund Leads".to_string()),
        })
    }
}

fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse::<T>().map_err(|_| ConfigError::InvalidValue {
            name,
            value: raw,
        }),
        Err(_) => Ok(default),
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidValue { name: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidValue { name, value } => {
                write!(f, "{name} has an invalid value '{value}'")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort | ConfigError::InvalidValue { .. } => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}
