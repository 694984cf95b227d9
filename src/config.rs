use crate::storage::queue::MAX_VISIBILITY;
use anyhow::{Context, Result, ensure};
use clap::Parser;
use std::{env, str::FromStr, time::Duration};

const DEFAULT_VISIBILITY_SECS: u64 = 30;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// `None` leaves every storage adapter disconnected.
    pub connection_string: Option<String>,
    pub public_base_url: String,
    pub visibility_timeout: Duration,
}

// Connection strings may carry credentials and must not reach the logs.
impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field(
                "connection_string",
                &self.connection_string.as_ref().map(|_| "<set>"),
            )
            .field("public_base_url", &self.public_base_url)
            .field("visibility_timeout", &self.visibility_timeout)
            .finish()
    }
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Retail back-office storage API")]
pub struct Args {
    /// Host to bind to (overrides RETAIL_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides RETAIL_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Storage connection string, e.g. `Root=./data` (overrides RETAIL_STORAGE_CONNECTION_STRING)
    #[arg(long)]
    pub connection_string: Option<String>,

    /// Base URL used when building blob links (overrides RETAIL_PUBLIC_BASE_URL)
    #[arg(long)]
    pub public_base_url: Option<String>,

    /// Seconds a received queue message stays hidden (overrides RETAIL_QUEUE_VISIBILITY_SECS)
    #[arg(long)]
    pub visibility_timeout_secs: Option<u64>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        let args = Args::parse();
        let migrate = args.migrate;
        Ok((Self::merge(args, |key| env::var(key))?, migrate))
    }

    /// CLI values win over environment values, which win over defaults.
    fn merge<F>(args: Args, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Result<String, env::VarError>,
    {
        let env_host = lookup("RETAIL_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = parse_env(&lookup, "RETAIL_PORT")?.unwrap_or(3000);
        let env_conn = lookup("RETAIL_STORAGE_CONNECTION_STRING")
            .ok()
            .filter(|v| !v.trim().is_empty());
        let env_base_url = lookup("RETAIL_PUBLIC_BASE_URL").ok();
        let env_visibility =
            parse_env(&lookup, "RETAIL_QUEUE_VISIBILITY_SECS")?.unwrap_or(DEFAULT_VISIBILITY_SECS);

        let visibility_secs = args.visibility_timeout_secs.unwrap_or(env_visibility);
        ensure!(
            visibility_secs <= MAX_VISIBILITY.as_secs(),
            "queue visibility of {visibility_secs}s exceeds the {}s maximum",
            MAX_VISIBILITY.as_secs()
        );

        let port = args.port.unwrap_or(env_port);
        let public_base_url = args
            .public_base_url
            .or(env_base_url)
            .unwrap_or_else(|| format!("http://localhost:{port}"));

        Ok(Self {
            host: args.host.unwrap_or(env_host),
            port,
            connection_string: args.connection_string.or(env_conn),
            public_base_url,
            visibility_timeout: Duration::from_secs(visibility_secs),
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_env<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Result<String, env::VarError>,
{
    match lookup(key) {
        Ok(value) => value
            .parse::<T>()
            .map(Some)
            .with_context(|| format!("parsing {} value `{}`", key, value)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(err) => Err(err).with_context(|| format!("reading {}", key)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Result<String, env::VarError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned().ok_or(env::VarError::NotPresent)
    }

    #[test]
    fn defaults_apply_without_env_or_flags() {
        let cfg = AppConfig::merge(Args::default(), env_of(&[])).unwrap();
        assert_eq!(cfg.addr(), "0.0.0.0:3000");
        assert_eq!(cfg.connection_string, None);
        assert_eq!(cfg.public_base_url, "http://localhost:3000");
        assert_eq!(cfg.visibility_timeout, Duration::from_secs(30));
    }

    #[test]
    fn flags_override_environment() {
        let args = Args {
            port: Some(8080),
            connection_string: Some("Root=/cli".into()),
            ..Args::default()
        };
        let cfg = AppConfig::merge(
            args,
            env_of(&[
                ("RETAIL_PORT", "9000"),
                ("RETAIL_STORAGE_CONNECTION_STRING", "Root=/env"),
                ("RETAIL_QUEUE_VISIBILITY_SECS", "5"),
            ]),
        )
        .unwrap();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.connection_string.as_deref(), Some("Root=/cli"));
        assert_eq!(cfg.public_base_url, "http://localhost:8080");
        assert_eq!(cfg.visibility_timeout, Duration::from_secs(5));
    }

    #[test]
    fn invalid_numbers_are_errors() {
        let err = AppConfig::merge(Args::default(), env_of(&[("RETAIL_PORT", "eighty")]))
            .unwrap_err();
        assert!(err.to_string().contains("RETAIL_PORT"));
    }

    #[test]
    fn visibility_beyond_seven_days_is_rejected() {
        let err = AppConfig::merge(
            Args::default(),
            env_of(&[("RETAIL_QUEUE_VISIBILITY_SECS", "18446744073709551615")]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("maximum"));

        let args = Args {
            visibility_timeout_secs: Some(7 * 24 * 60 * 60),
            ..Args::default()
        };
        let cfg = AppConfig::merge(args, env_of(&[])).unwrap();
        assert_eq!(cfg.visibility_timeout, MAX_VISIBILITY);
    }

    #[test]
    fn debug_output_hides_connection_string() {
        let cfg = AppConfig::merge(
            Args::default(),
            env_of(&[("RETAIL_STORAGE_CONNECTION_STRING", "Root=/secret")]),
        )
        .unwrap();
        assert!(!format!("{cfg:?}").contains("/secret"));
    }
}
