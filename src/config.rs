use clap::{Args, Parser, ValueEnum};
use ipnetwork::IpNetwork;

#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Config {
    /// Database connection URL
    #[arg(long, env = "TALLY_DATABASE_URL")]
    pub database_url: String,

    #[command(flatten)]
    pub server: ServerConfig,

    #[command(flatten)]
    pub auth: AuthConfig,

    #[command(flatten)]
    pub cookies: CookieConfig,

    #[command(flatten)]
    pub rate_limit: RateLimitConfig,

    #[command(flatten)]
    pub telemetry: TelemetryConfig,
}

#[derive(Clone, Debug, Args)]
pub struct ServerConfig {
    /// Host to listen on
    #[arg(long, env = "TALLY_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "TALLY_PORT", default_value_t = 3000)]
    pub port: u16,

    /// Port for the management endpoints (health probes)
    #[arg(long, env = "TALLY_MGMT_PORT", default_value_t = 3001)]
    pub mgmt_port: u16,

    /// Seconds to wait for in-flight requests during shutdown
    #[arg(long, env = "TALLY_SHUTDOWN_TIMEOUT_SECS", default_value_t = 10)]
    pub shutdown_timeout_secs: u64,

    /// Comma-separated list of CIDRs to trust for X-Forwarded-For IP extraction
    #[arg(
        long,
        env = "TALLY_TRUSTED_PROXIES",
        default_value = "10.0.0.0/8,172.16.0.0/12,192.168.0.0/16,127.0.0.1/32",
        value_delimiter = ','
    )]
    pub trusted_proxies: Vec<IpNetwork>,
}

#[derive(Clone, Debug, Args)]
pub struct AuthConfig {
    /// Secret key for JWT signing
    #[arg(long, env = "TALLY_JWT_SECRET")]
    pub jwt_secret: String,

    /// Access token time-to-live in seconds
    #[arg(long, env = "TALLY_ACCESS_TOKEN_TTL_SECS", default_value_t = 86_400)]
    pub access_token_ttl_secs: i64,

    /// Refresh token time-to-live in seconds
    #[arg(long, env = "TALLY_REFRESH_TOKEN_TTL_SECS", default_value_t = 604_800)]
    pub refresh_token_ttl_secs: i64,
}

/// Attributes shared by the access, refresh and CSRF cookies. Clearing a
/// cookie reuses the same attribute set, otherwise browsers keep it.
#[derive(Clone, Debug, Args)]
pub struct CookieConfig {
    /// Name of the access token cookie
    #[arg(long, env = "TALLY_ACCESS_COOKIE_NAME", default_value = "access_token")]
    pub access_token_name: String,

    /// Name of the refresh token cookie
    #[arg(long, env = "TALLY_REFRESH_COOKIE_NAME", default_value = "refresh_token")]
    pub refresh_token_name: String,

    /// Name of the CSRF token cookie (readable by client script)
    #[arg(long, env = "TALLY_CSRF_COOKIE_NAME", default_value = "csrf_token")]
    pub csrf_token_name: String,

    /// Request header carrying the CSRF token echo
    #[arg(long, env = "TALLY_CSRF_HEADER_NAME", default_value = "x-csrf-token")]
    pub csrf_header_name: String,

    /// Cookie domain attribute
    #[arg(long, env = "TALLY_COOKIE_DOMAIN")]
    pub domain: Option<String>,

    /// Cookie path attribute
    #[arg(long, env = "TALLY_COOKIE_PATH", default_value = "/")]
    pub path: String,

    /// Cookie SameSite attribute
    #[arg(long, env = "TALLY_COOKIE_SAME_SITE", value_enum, default_value_t = SameSitePolicy::Strict)]
    pub same_site: SameSitePolicy,

    /// Cookie Secure attribute
    #[arg(long, env = "TALLY_COOKIE_SECURE", default_value_t = false)]
    pub secure: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum SameSitePolicy {
    Strict,
    Lax,
    None,
}

impl std::fmt::Display for SameSitePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Strict => "strict",
            Self::Lax => "lax",
            Self::None => "none",
        })
    }
}

#[derive(Clone, Debug, Args)]
pub struct RateLimitConfig {
    /// Requests per second allowed on the auth endpoints
    #[arg(long, env = "TALLY_AUTH_RATE_LIMIT_PER_SECOND", default_value_t = 1)]
    pub auth_per_second: u64,

    /// Burst allowance for the auth endpoints
    #[arg(long, env = "TALLY_AUTH_RATE_LIMIT_BURST", default_value_t = 5)]
    pub auth_burst: u32,
}

#[derive(Clone, Debug, Args)]
pub struct TelemetryConfig {
    /// Log output format
    #[arg(long, env = "TALLY_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// OTLP endpoint for traces and metrics; telemetry export is disabled when unset
    #[arg(long, env = "TALLY_OTLP_ENDPOINT")]
    pub otlp_endpoint: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Text => "text",
            Self::Json => "json",
        })
    }
}

impl Config {
    pub fn load() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_minimal() -> Config {
        Config::try_parse_from([
            "tally-server",
            "--database-url",
            "postgres://localhost/tally",
            "--jwt-secret",
            "test_secret",
        ])
        .expect("minimal config should parse")
    }

    #[test]
    fn test_defaults_match_documented_values() {
        let config = parse_minimal();

        assert_eq!(config.auth.access_token_ttl_secs, 86_400);
        assert_eq!(config.auth.refresh_token_ttl_secs, 604_800);
        assert_eq!(config.cookies.access_token_name, "access_token");
        assert_eq!(config.cookies.refresh_token_name, "refresh_token");
        assert_eq!(config.cookies.csrf_token_name, "csrf_token");
        assert_eq!(config.cookies.csrf_header_name, "x-csrf-token");
        assert_eq!(config.cookies.same_site, SameSitePolicy::Strict);
        assert_eq!(config.cookies.path, "/");
        assert!(!config.cookies.secure);
        assert!(config.cookies.domain.is_none());
    }

    #[test]
    fn test_same_site_parses_lowercase_values() {
        let config = Config::try_parse_from([
            "tally-server",
            "--database-url",
            "postgres://localhost/tally",
            "--jwt-secret",
            "test_secret",
            "--same-site",
            "lax",
        ])
        .expect("config with same-site should parse");

        assert_eq!(config.cookies.same_site, SameSitePolicy::Lax);
    }

    #[test]
    fn test_trusted_proxies_parse_as_networks() {
        let config = parse_minimal();
        assert_eq!(config.server.trusted_proxies.len(), 4);
    }
}
