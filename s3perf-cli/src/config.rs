//! Configuration of the `s3perf` binary.
//!
//! Configuration is layered, with the following precedence (highest to lowest):
//!
//! 1. Environment variables (prefixed with `S3PERF__`)
//! 2. YAML configuration file (specified via `-c` or `--config` flag)
//! 3. Defaults
//!
//! Environment variables use double underscores (`__`) to denote nested structures, for example
//! `S3PERF__ACCELERATED__ENDPOINT=http://localhost:9000` or `S3PERF__DEFAULTS__NUM_KEYS=100`. The
//! same configuration in YAML looks like this:
//!
//! ```yaml
//! accelerated:
//!   endpoint: http://localhost:9000
//!
//! defaults:
//!   num_keys: 100
//! ```

use std::borrow::Cow;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use figment::providers::{Env, Format, Serialized, Yaml};
use s3perf_backend::S3CompatibleConfig;
use s3perf_bench::Defaults;
use s3perf_bench::autoheal::AutoHealPoller;
use secrecy::{CloneableSecret, ExposeSecret, SecretBox, SerializableSecret, zeroize::Zeroize};
use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;

/// Environment variable prefix for all configuration options.
const ENV_PREFIX: &str = "S3PERF__";

/// Newtype around `String` that keeps secrets out of `Debug` output.
///
/// Use with [`secrecy::SecretBox`].
#[derive(Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConfigSecret(String);

impl ConfigSecret {
    /// Returns the secret value.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Debug for ConfigSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "[redacted]")
    }
}

impl CloneableSecret for ConfigSecret {}
impl SerializableSecret for ConfigSecret {}
impl Zeroize for ConfigSecret {
    fn zeroize(&mut self) {
        self.0.zeroize();
    }
}

fn expose(secret: &Option<SecretBox<ConfigSecret>>) -> Option<String> {
    secret
        .as_ref()
        .map(|secret| secret.expose_secret().as_str().to_owned())
}

/// Connection settings of one S3-compatible endpoint.
///
/// Used in: [`Config::reference`], [`Config::accelerated`]
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Endpoint {
    /// Endpoint URL.
    ///
    /// When unset, the AWS endpoint of [`region`](Self::region) is used.
    ///
    /// # Environment Variables
    ///
    /// - `S3PERF__REFERENCE__ENDPOINT`
    /// - `S3PERF__ACCELERATED__ENDPOINT`
    pub endpoint: Option<String>,

    /// Signing region.
    ///
    /// # Default
    ///
    /// `us-east-1`
    pub region: String,

    /// Address buckets by path instead of by virtual host.
    ///
    /// Required by most self-hosted S3-compatible services.
    pub path_style: bool,

    /// Access key id.
    ///
    /// When unset, credentials are read from the standard AWS environment variables, profile or
    /// instance metadata.
    pub access_key: Option<String>,

    /// Secret access key.
    pub secret_key: Option<SecretBox<ConfigSecret>>,

    /// Session token for temporary credentials.
    pub session_token: Option<SecretBox<ConfigSecret>>,

    /// Timeout of a single request, e.g. `30s`.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Option<Duration>,
}

impl Endpoint {
    /// Returns the backend settings, with secrets exposed.
    pub fn backend_config(&self) -> S3CompatibleConfig {
        S3CompatibleConfig {
            endpoint: self.endpoint.clone(),
            region: self.region.clone(),
            path_style: self.path_style,
            access_key: self.access_key.clone(),
            secret_key: expose(&self.secret_key),
            session_token: expose(&self.session_token),
            request_timeout: self.request_timeout,
        }
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self {
            endpoint: None,
            region: "us-east-1".into(),
            path_style: false,
            access_key: None,
            secret_key: None,
            session_token: None,
            request_timeout: None,
        }
    }
}

/// Limits of the auto-heal poller.
///
/// Leaving both `max_attempts` and `timeout` unset polls until the object is readable.
///
/// Used in: [`Config::autoheal`]
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AutoHeal {
    /// Pause between failed attempts, e.g. `100ms`. Defaults to no pause.
    #[serde(with = "humantime_serde")]
    pub interval: Duration,

    /// Maximum number of `get` attempts.
    pub max_attempts: Option<u64>,

    /// Maximum time spent polling, e.g. `5m`.
    #[serde(with = "humantime_serde")]
    pub timeout: Option<Duration>,
}

impl AutoHeal {
    /// Builds the poller described by this configuration.
    pub fn poller(&self) -> AutoHealPoller {
        AutoHealPoller {
            interval: self.interval,
            max_attempts: self.max_attempts,
            timeout: self.timeout,
        }
    }
}

/// [Sentry](https://sentry.io/) error reporting.
///
/// Sentry is disabled unless a DSN is provided.
///
/// Used in: [`Config::sentry`]
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Sentry {
    /// Sentry DSN.
    ///
    /// # Environment Variable
    ///
    /// `S3PERF__SENTRY__DSN`
    pub dsn: Option<SecretBox<ConfigSecret>>,

    /// Environment name, e.g. `production`.
    pub environment: Option<Cow<'static, str>>,

    /// Sample rate of error events, between `0.0` and `1.0`.
    ///
    /// # Default
    ///
    /// `1.0`
    pub sample_rate: f32,

    /// Enables the Sentry SDK's debug output.
    pub debug: bool,
}

impl Sentry {
    /// Returns whether Sentry reporting is enabled.
    pub fn is_enabled(&self) -> bool {
        self.dsn.is_some()
    }
}

impl Default for Sentry {
    fn default() -> Self {
        Self {
            dsn: None,
            environment: None,
            sample_rate: 1.0,
            debug: false,
        }
    }
}

/// Log output format.
///
/// Used in: [`Logging::format`]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum LogFormat {
    /// Chooses [`LogFormat::Pretty`] for a TTY, otherwise [`LogFormat::Simplified`].
    Auto,
    /// Multi-line human readable output with colors.
    Pretty,
    /// Single-line output without colors.
    Simplified,
    /// Newline-delimited JSON objects.
    Json,
}

/// Error returned when parsing an unknown [`LogFormat`].
#[derive(Clone, Debug)]
pub struct FormatParseError(String);

impl fmt::Display for FormatParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            r#"error parsing "{}" as format: expected one of "auto", "pretty", "simplified", "json""#,
            self.0
        )
    }
}

impl std::error::Error for FormatParseError {}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogFormat::Auto => "auto",
            LogFormat::Pretty => "pretty",
            LogFormat::Simplified => "simplified",
            LogFormat::Json => "json",
        })
    }
}

impl std::str::FromStr for LogFormat {
    type Err = FormatParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let result = match s {
            "" => LogFormat::Auto,
            s if s.eq_ignore_ascii_case("auto") => LogFormat::Auto,
            s if s.eq_ignore_ascii_case("pretty") => LogFormat::Pretty,
            s if s.eq_ignore_ascii_case("simplified") => LogFormat::Simplified,
            s if s.eq_ignore_ascii_case("json") => LogFormat::Json,
            s => return Err(FormatParseError(s.into())),
        };

        Ok(result)
    }
}

mod display_fromstr {
    pub fn serialize<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
        T: std::fmt::Display,
    {
        serializer.collect_str(&value)
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        D: serde::Deserializer<'de>,
        T: std::str::FromStr,
        <T as std::str::FromStr>::Err: std::fmt::Display,
    {
        use serde::Deserialize;
        let s = <std::borrow::Cow<'de, str>>::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Logging to stderr.
///
/// Logs never go to stdout, which carries the JSON response.
///
/// Used in: [`Config::logging`]
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Logging {
    /// Minimum level, e.g. `info` or `debug`. `RUST_LOG` takes precedence when set.
    #[serde(with = "display_fromstr")]
    pub level: LevelFilter,

    /// Output format.
    #[serde(with = "display_fromstr")]
    pub format: LogFormat,
}

impl Default for Logging {
    fn default() -> Self {
        Self {
            level: LevelFilter::INFO,
            format: LogFormat::Auto,
        }
    }
}

/// Complete configuration of the `s3perf` binary.
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// The baseline endpoint.
    pub reference: Endpoint,

    /// The accelerating proxy in front of the reference endpoint.
    pub accelerated: Endpoint,

    /// Values applied to benchmark requests that leave fields unset.
    ///
    /// # Environment Variables
    ///
    /// - `S3PERF__DEFAULTS__NUM_KEYS`
    /// - `S3PERF__DEFAULTS__OBJ_LENGTH`
    /// - `S3PERF__DEFAULTS__LIST_ITERATIONS`
    /// - `S3PERF__DEFAULTS__CONCURRENCY`
    /// - `S3PERF__DEFAULTS__KEY_PREFIX`
    pub defaults: Defaults,

    /// Limits of the `autoheal` command.
    pub autoheal: AutoHeal,

    /// Log output.
    pub logging: Logging,

    /// Error reporting.
    pub sentry: Sentry,
}

impl Config {
    /// Loads the configuration from defaults, an optional YAML file and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = figment::Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        let config = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;

        Ok(config)
    }
}
