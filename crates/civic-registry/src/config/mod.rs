use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

/// Distinguishes runtime behavior for different stages of the portal.
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

/// Top-level configuration for the registry portal.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub identity: IdentityConfig,
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

        let officers = match env::var("OFFICER_TOKENS") {
            Ok(raw) => parse_officer_tokens(&raw)?,
            Err(_) => Vec::new(),
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            identity: IdentityConfig { officers },
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

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Bearer credentials accepted for officer actions.
#[derive(Debug, Clone, Default)]
pub struct IdentityConfig {
    pub officers: Vec<OfficerCredential>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfficerCredential {
    pub token: String,
    pub officer_id: String,
    pub display_name: Option<String>,
}

/// Parse `token=officer-id[:Display Name]` entries separated by commas.
pub fn parse_officer_tokens(raw: &str) -> Result<Vec<OfficerCredential>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (token, officer) = entry
                .split_once('=')
                .ok_or_else(|| ConfigError::InvalidOfficerToken(entry.to_string()))?;
            let (officer_id, display_name) = match officer.split_once(':') {
                Some((id, name)) => (id.trim(), Some(name.trim().to_string())),
                None => (officer.trim(), None),
            };

            if token.trim().is_empty() || officer_id.is_empty() {
                return Err(ConfigError::InvalidOfficerToken(entry.to_string()));
            }

            Ok(OfficerCredential {
                token: token.trim().to_string(),
                officer_id: officer_id.to_string(),
                display_name: display_name.filter(|name| !name.is_empty()),
            })
        })
        .collect()
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidOfficerToken(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidOfficerToken(entry) => write!(
                f,
                "OFFICER_TOKENS entry '{entry}' must look like token=officer-id[:name]"
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort | ConfigError::InvalidOfficerToken(_) => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}
