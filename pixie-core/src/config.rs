use std::env;
use std::time::Duration;

/// Which JWT signing scheme is active for this process. Chosen once at boot
/// from `JWT_ALGO`; there is no runtime dual-validation or key rollover.
#[derive(Debug, Clone)]
pub enum SigningScheme {
    Hmac { secret: String },
    Rsa { public_key_path: String, private_key_path: Option<String> },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub s3_endpoint: String,
    pub s3_access_key: String,
    pub s3_secret_key: String,
    pub s3_bucket: String,

    pub database_url: String,

    pub nats_url: Option<String>,

    pub signing_scheme: SigningScheme,
    pub token_lifetime: Duration,

    pub plugins_dir: String,

    pub thumb_workers: usize,
    pub thumb_sizes: Vec<u32>,

    pub static_dir: String,
    pub recreate_admin_enabled: bool,
    pub auth_core_enabled: bool,
}

#[derive(Debug)]
pub struct ConfigError(pub String);

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "configuration error: {}", self.0)
    }
}

impl std::error::Error for ConfigError {}

fn require(name: &str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError(format!("missing required env var {name}")))
}

fn optional(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

impl Config {
    /// Load configuration from the process environment, first populating it
    /// from a `.env` file if one is present (a no-op in production images).
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let s3_endpoint = require("S3_ENDPOINT")?;
        let s3_access_key = require("S3_ACCESS_KEY")?;
        let s3_secret_key = require("S3_SECRET_KEY")?;
        let s3_bucket = require("S3_BUCKET")?;
        let database_url = require("DATABASE_URL")?;
        let nats_url = env::var("NATS_URL").ok();

        let algo = optional("JWT_ALGO", "HS256");
        let signing_scheme = match algo.as_str() {
            "HS256" => SigningScheme::Hmac {
                secret: require("JWT_SECRET")?,
            },
            "RS256" => SigningScheme::Rsa {
                public_key_path: require("JWT_PUBLIC_KEY_FILE")?,
                private_key_path: env::var("JWT_PRIVATE_KEY_FILE").ok(),
            },
            other => {
                return Err(ConfigError(format!(
                    "unsupported JWT_ALGO {other}, expected HS256 or RS256"
                )))
            }
        };

        let token_lifetime_hours: u64 = optional("JWT_LIFETIME_HOURS", "24")
            .parse()
            .map_err(|_| ConfigError("JWT_LIFETIME_HOURS must be an integer".into()))?;

        let plugins_dir = optional("PLUGINS_DIR", "./plugins");

        let thumb_workers: usize = optional("THUMB_WORKERS", "4")
            .parse()
            .map_err(|_| ConfigError("THUMB_WORKERS must be an integer".into()))?;

        let thumb_sizes = optional("THUMB_SIZES", "512")
            .split(',')
            .map(|s| {
                s.trim()
                    .parse::<u32>()
                    .map_err(|_| ConfigError(format!("invalid THUMB_SIZES entry: {s}")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let static_dir = optional("STATIC_DIR", "./static");

        let recreate_admin_enabled = optional("RECREATE_ADMIN_ENABLED", "false")
            .eq_ignore_ascii_case("true");

        let auth_core_enabled = optional("AUTH_CORE_ENABLED", "true").eq_ignore_ascii_case("true");

        Ok(Config {
            s3_endpoint,
            s3_access_key,
            s3_secret_key,
            s3_bucket,
            database_url,
            nats_url,
            signing_scheme,
            token_lifetime: Duration::from_secs(token_lifetime_hours * 3600),
            plugins_dir,
            thumb_workers,
            thumb_sizes,
            static_dir,
            recreate_admin_enabled,
            auth_core_enabled,
        })
    }
}
