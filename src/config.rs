use clap::Parser;

use crate::domain::{BrandSettings, Brands, DomainResolver};
use crate::rate_limit::WindowPolicy;

// one day
pub const MAX_RATE_WINDOW_SECS: u64 = 86_400;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("--rate-limit must be at least 1")]
    ZeroRateLimit,
    #[error("--rate-window must be at least 1 second")]
    ZeroRateWindow,
    #[error("--rate-window ({0}s) must not exceed {MAX_RATE_WINDOW_SECS}s")]
    RateWindowTooLong(u64),
    #[error("--upstream-timeout must be at least 1 second")]
    ZeroUpstreamTimeout,
    #[error("--upstream-timeout ({timeout}s) must be shorter than --max-handler-secs ({max}s)")]
    DeadlineExceedsHandlerLimit { timeout: u64, max: u64 },
}

// CLI argument structure, every flag can also come from the environment
#[derive(Parser, Debug, Clone)]
#[command(name = "fingerprint-gateway")]
#[command(about = "Rate limited proxy in front of a paid completion API")]
pub struct Args {
    /// Port to run the server on
    #[arg(short, long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    /// Base URL of the OpenAI-compatible completion API
    #[arg(long, env = "UPSTREAM_URL", default_value = "https://openrouter.ai/api/v1")]
    pub upstream_url: String,

    /// API key sent as a bearer token upstream
    #[arg(long, env = "OPENROUTER_API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// Model requested from the upstream
    #[arg(long, env = "UPSTREAM_MODEL", default_value = "openai/gpt-4o-mini")]
    pub model: String,

    /// Hard deadline for one upstream call, in seconds
    #[arg(long, env = "UPSTREAM_TIMEOUT_SECS", default_value_t = 175)]
    pub upstream_timeout: u64,

    /// Maximum time the hosting platform lets a handler run, in seconds
    #[arg(long, env = "MAX_HANDLER_SECS", default_value_t = 180)]
    pub max_handler_secs: u64,

    /// Rate limit max requests per window
    #[arg(long, env = "RATE_LIMIT", default_value_t = 10)]
    pub rate_limit: u32,

    /// Rate limit window in seconds
    #[arg(long, env = "RATE_WINDOW_SECS", default_value_t = 60)]
    pub rate_window: u64,

    /// How often idle identities are swept from the limiter, in seconds
    #[arg(long, env = "SWEEP_INTERVAL_SECS", default_value_t = 60)]
    pub sweep_interval: u64,

    /// Salt mixed into fingerprint hashes
    #[arg(long, env = "FINGERPRINT_SALT", default_value = "", hide_env_values = true)]
    pub fingerprint_salt: String,

    /// Root domain of the primary brand
    #[arg(long, env = "PRIMARY_DOMAIN", default_value = "example.com")]
    pub primary_domain: String,

    /// Root domain of the alternate brand
    #[arg(long, env = "ALTERNATE_DOMAIN", default_value = "example.org")]
    pub alternate_domain: String,

    /// Subdomain of the primary domain served as the reserved variant
    #[arg(long, env = "RESERVED_SUBDOMAIN", default_value = "app")]
    pub reserved_subdomain: String,

    #[arg(long, env = "PRIMARY_NAME", default_value = "Primary")]
    pub primary_name: String,

    #[arg(long, env = "PRIMARY_NOTIFY_EMAIL")]
    pub primary_notify_email: Option<String>,

    /// Upstream key for primary-brand traffic, defaults to --api-key
    #[arg(long, env = "PRIMARY_API_KEY", hide_env_values = true)]
    pub primary_api_key: Option<String>,

    #[arg(long, env = "ALTERNATE_NAME", default_value = "Alternate")]
    pub alternate_name: String,

    #[arg(long, env = "ALTERNATE_NOTIFY_EMAIL")]
    pub alternate_notify_email: Option<String>,

    /// Upstream key for alternate-brand traffic, defaults to --api-key
    #[arg(long, env = "ALTERNATE_API_KEY", hide_env_values = true)]
    pub alternate_api_key: Option<String>,
}

impl Args {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rate_limit == 0 {
            return Err(ConfigError::ZeroRateLimit);
        }
        if self.rate_window == 0 {
            return Err(ConfigError::ZeroRateWindow);
        }
        if self.rate_window > MAX_RATE_WINDOW_SECS {
            return Err(ConfigError::RateWindowTooLong(self.rate_window));
        }
        if self.upstream_timeout == 0 {
            return Err(ConfigError::ZeroUpstreamTimeout);
        }
        if self.upstream_timeout >= self.max_handler_secs {
            return Err(ConfigError::DeadlineExceedsHandlerLimit {
                timeout: self.upstream_timeout,
                max: self.max_handler_secs,
            });
        }
        Ok(())
    }

    pub fn window_policy(&self) -> WindowPolicy {
        WindowPolicy {
            max_requests: self.rate_limit,
            window_ms: self.rate_window.saturating_mul(1_000),
        }
    }

    pub fn domain_resolver(&self) -> DomainResolver {
        DomainResolver {
            primary_root: self.primary_domain.to_ascii_lowercase(),
            alternate_root: self.alternate_domain.to_ascii_lowercase(),
            reserved_subdomain: self.reserved_subdomain.to_ascii_lowercase(),
        }
    }

    pub fn brands(&self) -> Brands {
        Brands {
            primary: BrandSettings {
                display_name: self.primary_name.clone(),
                notification_email: self.primary_notify_email.clone(),
                api_key: self.primary_api_key.clone(),
            },
            alternate: BrandSettings {
                display_name: self.alternate_name.clone(),
                notification_email: self.alternate_notify_email.clone(),
                api_key: self.alternate_api_key.clone(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Args {
        let mut argv = vec!["fingerprint-gateway", "--api-key", "sk-test"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn defaults_match_the_gateway_contract() {
        let args = parse(&[]);
        assert_eq!(args.validate(), Ok(()));

        let policy = args.window_policy();
        assert_eq!(policy.max_requests, 10);
        assert_eq!(policy.window_ms, 60_000);
        assert_eq!(args.upstream_timeout, 175);
    }

    #[test]
    fn zero_limits_are_rejected() {
        assert_eq!(parse(&["--rate-limit", "0"]).validate(), Err(ConfigError::ZeroRateLimit));
        assert_eq!(parse(&["--rate-window", "0"]).validate(), Err(ConfigError::ZeroRateWindow));
        assert_eq!(
            parse(&["--upstream-timeout", "0"]).validate(),
            Err(ConfigError::ZeroUpstreamTimeout)
        );
    }

    #[test]
    fn oversized_rate_window_is_rejected() {
        let args = parse(&["--rate-window", "18446744073709551"]);
        assert_eq!(
            args.validate(),
            Err(ConfigError::RateWindowTooLong(18_446_744_073_709_551))
        );

        let args = parse(&["--rate-window", "86400"]);
        assert_eq!(args.validate(), Ok(()));
        assert_eq!(args.window_policy().window_ms, 86_400_000);
    }

    #[test]
    fn brand_api_keys_are_optional() {
        let args = parse(&["--alternate-api-key", "sk-alt"]);
        let brands = args.brands();
        assert_eq!(brands.primary.api_key, None);
        assert_eq!(brands.alternate.api_key.as_deref(), Some("sk-alt"));
    }

    #[test]
    fn deadline_must_fit_inside_handler_limit() {
        let args = parse(&["--upstream-timeout", "180"]);
        assert_eq!(
            args.validate(),
            Err(ConfigError::DeadlineExceedsHandlerLimit {
                timeout: 180,
                max: 180
            })
        );
    }

    #[test]
    fn domains_are_lowercased() {
        let args = parse(&["--alternate-domain", "Example.NET"]);
        assert_eq!(args.domain_resolver().alternate_root, "example.net");
    }
}
