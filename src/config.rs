use std::collections::HashMap;
use std::env::VarError;
use std::fmt;

/// Price identifier used when `STRIPE_PRICE_ID` is not set.
pub const DEFAULT_PRICE_ID: &str = "price_default";

pub const ENV_LINKEDIN_CLIENT_ID: &str = "LINKEDIN_CLIENT_ID";
pub const ENV_LINKEDIN_REDIRECT_URI: &str = "LINKEDIN_REDIRECT_URI";
pub const ENV_LINKEDIN_SCOPES: &str = "LINKEDIN_SCOPES";
pub const ENV_STRIPE_PUBLISHABLE_KEY: &str = "STRIPE_PUBLISHABLE_KEY";
pub const ENV_STRIPE_SECRET_KEY: &str = "STRIPE_SECRET_KEY";
pub const ENV_STRIPE_PRICE_ID: &str = "STRIPE_PRICE_ID";

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {var}")]
    Missing { var: &'static str },

    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Read a required variable. A present but blank value counts as missing.
fn required<F>(lookup: &F, var: &'static str) -> ConfigResult<String>
where
    F: Fn(&str) -> Option<String>,
{
    optional(lookup, var).ok_or(ConfigError::Missing { var })
}

fn optional<F>(lookup: &F, var: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(var)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Snapshot the given variables. Unset ones are left out; a value that is not
/// valid UTF-8 is an error rather than being treated as unset.
fn read_env(vars: &[&'static str]) -> ConfigResult<HashMap<&'static str, String>> {
    let mut env = HashMap::new();
    for &var in vars {
        match std::env::var(var) {
            Ok(value) => {
                env.insert(var, value);
            }
            Err(VarError::NotPresent) => {}
            Err(VarError::NotUnicode(_)) => {
                return Err(ConfigError::Invalid {
                    var,
                    reason: "not valid UTF-8".to_string(),
                })
            }
        }
    }
    Ok(env)
}

// ── LinkedIn ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedInConfig {
    pub client_id: String,
    pub redirect_uri: String,
    /// Space separated, passed through to the provider as-is.
    pub scopes: String,
}

impl LinkedInConfig {
    pub fn from_env() -> ConfigResult<Self> {
        let env = read_env(&[
            ENV_LINKEDIN_CLIENT_ID,
            ENV_LINKEDIN_REDIRECT_URI,
            ENV_LINKEDIN_SCOPES,
        ])?;
        Self::from_lookup(|var| env.get(var).cloned())
    }

    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let client_id = required(&lookup, ENV_LINKEDIN_CLIENT_ID)?;
        let redirect_uri = required(&lookup, ENV_LINKEDIN_REDIRECT_URI)?;
        let scopes = required(&lookup, ENV_LINKEDIN_SCOPES)?;

        if !(redirect_uri.starts_with("https://") || redirect_uri.starts_with("http://")) {
            return Err(ConfigError::Invalid {
                var: ENV_LINKEDIN_REDIRECT_URI,
                reason: "must be an absolute http(s) URL".to_string(),
            });
        }

        Ok(Self {
            client_id,
            redirect_uri,
            scopes,
        })
    }

    /// State cookies are only marked `Secure` when the callback is served over TLS.
    pub fn secure_cookies(&self) -> bool {
        self.redirect_uri.starts_with("https://")
    }
}

// ── Payments ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserPaymentsConfig {
    pub publishable_key: String,
}

impl BrowserPaymentsConfig {
    pub fn from_env() -> ConfigResult<Self> {
        let env = read_env(&[ENV_STRIPE_PUBLISHABLE_KEY])?;
        Self::from_lookup(|var| env.get(var).cloned())
    }

    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            publishable_key: required(&lookup, ENV_STRIPE_PUBLISHABLE_KEY)?,
        })
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct ServerPaymentsConfig {
    pub secret_key: String,
    pub price_id: String,
}

impl ServerPaymentsConfig {
    pub fn from_env() -> ConfigResult<Self> {
        let env = read_env(&[ENV_STRIPE_SECRET_KEY, ENV_STRIPE_PRICE_ID])?;
        Self::from_lookup(|var| env.get(var).cloned())
    }

    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let secret_key = required(&lookup, ENV_STRIPE_SECRET_KEY)?;
        let price_id =
            optional(&lookup, ENV_STRIPE_PRICE_ID).unwrap_or_else(|| DEFAULT_PRICE_ID.to_string());
        Ok(Self {
            secret_key,
            price_id,
        })
    }
}

impl fmt::Debug for ServerPaymentsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerPaymentsConfig")
            .field("secret_key", &"[redacted]")
            .field("price_id", &self.price_id)
            .finish()
    }
}

// ── Aggregate ────────────────────────────────────────────────────────────────

/// Everything the server needs before it may accept traffic.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub linkedin: LinkedInConfig,
    pub browser_payments: BrowserPaymentsConfig,
    pub server_payments: ServerPaymentsConfig,
}

impl AppConfig {
    pub fn from_env() -> ConfigResult<Self> {
        Ok(Self {
            linkedin: LinkedInConfig::from_env()?,
            browser_payments: BrowserPaymentsConfig::from_env()?,
            server_payments: ServerPaymentsConfig::from_env()?,
        })
    }

    /// Loads every section, stopping at the first error.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            linkedin: LinkedInConfig::from_lookup(&lookup)?,
            browser_payments: BrowserPaymentsConfig::from_lookup(&lookup)?,
            server_payments: ServerPaymentsConfig::from_lookup(&lookup)?,
        })
    }
}
