//! Runtime configuration.
//!
//! Loaded from `~/.contactd/config.toml` (or `--config PATH`), then overridden
//! by `CONTACTD_*` environment variables. A missing default file yields the
//! built-in defaults.

pub mod schema;

pub use schema::{
    AuthConfig, Config, GatewayConfig, RevocationBackendKind, RevocationConfig, StorageConfig,
};

use crate::auth::store::PasswordPolicy;
use crate::auth::token::{TokenIssuer, RECOMMENDED_SECRET_BYTES};
use anyhow::{bail, Context, Result};
use directories::UserDirs;
use std::path::{Path, PathBuf};

pub const ENV_HOST: &str = "CONTACTD_HOST";
pub const ENV_PORT: &str = "CONTACTD_PORT";
pub const ENV_DATABASE_PATH: &str = "CONTACTD_DATABASE_PATH";
pub const ENV_TOKEN_SECRET: &str = "CONTACTD_TOKEN_SECRET";

/// `~/.contactd`, or `./.contactd` when no home directory is known.
pub fn data_dir() -> PathBuf {
    UserDirs::new()
        .map(|dirs| dirs.home_dir().join(".contactd"))
        .unwrap_or_else(|| PathBuf::from(".contactd"))
}

pub fn default_config_path() -> PathBuf {
    data_dir().join("config.toml")
}

impl Config {
    /// Load configuration and apply environment overrides.
    ///
    /// An explicit `path` must exist; the default path may be absent.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let path = default_config_path();
                if path.exists() {
                    Self::from_file(&path)?
                } else {
                    tracing::debug!(path = %path.display(), "No config file, using defaults");
                    Self::default()
                }
            }
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        Self::from_toml_str(&contents)
            .with_context(|| format!("Failed to parse config: {}", path.display()))
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Apply `CONTACTD_*` overrides. `lookup` is `std::env::var` outside tests.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(host) = get(ENV_HOST) {
            self.gateway.host = host.trim().to_owned();
        }
        if let Some(port) = get(ENV_PORT) {
            self.gateway.port = port
                .trim()
                .parse()
                .with_context(|| format!("{ENV_PORT} is not a valid port: {port}"))?;
        }
        if let Some(path) = get(ENV_DATABASE_PATH) {
            self.storage.database_path = PathBuf::from(path);
        }
        if let Some(secret) = get(ENV_TOKEN_SECRET) {
            self.auth.token_secret = Some(secret);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.gateway.host.trim().is_empty() {
            bail!("gateway.host must not be empty");
        }
        if self.gateway.request_timeout_secs == 0 {
            bail!("gateway.request_timeout_secs must be greater than 0");
        }
        if self.gateway.max_body_bytes == 0 {
            bail!("gateway.max_body_bytes must be greater than 0");
        }
        if self.storage.pool_size == 0 {
            bail!("storage.pool_size must be greater than 0");
        }
        if self.auth.token_ttl_secs == 0 {
            bail!("auth.token_ttl_secs must be greater than 0");
        }
        if self.auth.password_hash_rounds == 0 {
            bail!("auth.password_hash_rounds must be greater than 0");
        }
        if self.auth.min_password_len == 0 {
            bail!("auth.min_password_len must be greater than 0");
        }
        if self.revocation.sweep_interval_secs == 0 {
            bail!("revocation.sweep_interval_secs must be greater than 0");
        }
        Ok(())
    }

    /// Write this config to `path`, refusing to overwrite an existing file.
    pub fn write_new(&self, path: &Path) -> Result<()> {
        if path.exists() {
            bail!("Config already exists: {}", path.display());
        }
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        Ok(())
    }
}

impl AuthConfig {
    pub fn password_policy(&self) -> PasswordPolicy {
        PasswordPolicy {
            hash_rounds: self.password_hash_rounds,
            min_password_len: self.min_password_len,
        }
    }

    /// Build the token issuer, falling back to a per-process random secret.
    pub fn token_issuer(&self) -> TokenIssuer {
        match self.token_secret.as_deref().filter(|s| !s.is_empty()) {
            Some(secret) => {
                if secret.len() < RECOMMENDED_SECRET_BYTES {
                    tracing::warn!(
                        len = secret.len(),
                        recommended = RECOMMENDED_SECRET_BYTES,
                        "Token secret is shorter than recommended"
                    );
                }
                TokenIssuer::new(secret, self.token_ttl_secs)
            }
            None => {
                tracing::warn!(
                    "No token secret configured; using a random one. \
                     Sessions will not survive a restart. Set {ENV_TOKEN_SECRET} or auth.token_secret."
                );
                TokenIssuer::with_random_secret(self.token_ttl_secs)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn empty_file_yields_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.gateway.port, schema::DEFAULT_PORT);
        assert_eq!(config.revocation.backend, RevocationBackendKind::Memory);
        assert!(config.auth.token_secret.is_none());
        config.validate().unwrap();
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = Config::from_toml_str(
            r#"
            [gateway]
            port = 8080

            [auth]
            token_ttl_secs = 600
            token_secret = "file-secret"

            [revocation]
            backend = "sqlite"
            "#,
        )
        .unwrap();
        assert_eq!(config.gateway.port, 8080);
        assert_eq!(config.gateway.host, "127.0.0.1");
        assert_eq!(config.auth.token_ttl_secs, 600);
        assert_eq!(config.auth.token_secret.as_deref(), Some("file-secret"));
        assert_eq!(config.auth.min_password_len, 6);
        assert_eq!(config.revocation.backend, RevocationBackendKind::Sqlite);
    }

    #[test]
    fn unknown_backend_is_rejected() {
        assert!(Config::from_toml_str("[revocation]\nbackend = \"redis\"").is_err());
    }

    #[test]
    fn env_overrides_take_priority() {
        let mut config = Config::from_toml_str("[gateway]\nport = 8080").unwrap();
        config
            .apply_env_overrides(env(&[
                (ENV_HOST, "0.0.0.0"),
                (ENV_PORT, " 9090 "),
                (ENV_DATABASE_PATH, "/tmp/c.db"),
                (ENV_TOKEN_SECRET, "env-secret"),
            ]))
            .unwrap();
        assert_eq!(config.gateway.host, "0.0.0.0");
        assert_eq!(config.gateway.port, 9090);
        assert_eq!(config.storage.database_path, PathBuf::from("/tmp/c.db"));
        assert_eq!(config.auth.token_secret.as_deref(), Some("env-secret"));
    }

    #[test]
    fn blank_env_values_are_ignored() {
        let mut config = Config::default();
        config
            .apply_env_overrides(env(&[(ENV_HOST, "  "), (ENV_TOKEN_SECRET, "")]))
            .unwrap();
        assert_eq!(config.gateway.host, "127.0.0.1");
        assert!(config.auth.token_secret.is_none());
    }

    #[test]
    fn bad_port_override_fails() {
        let mut config = Config::default();
        let err = config
            .apply_env_overrides(env(&[(ENV_PORT, "http")]))
            .unwrap_err();
        assert!(err.to_string().contains(ENV_PORT));
    }

    #[test]
    fn validate_rejects_zero_values() {
        let mut config = Config::default();
        config.auth.token_ttl_secs = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.storage.pool_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_explicit_path_must_exist() {
        let tmp = tempfile::TempDir::new().unwrap();
        assert!(Config::load(Some(&tmp.path().join("missing.toml"))).is_err());
    }

    #[test]
    fn write_new_round_trips_and_refuses_overwrite() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.gateway.port = 4321;
        config.write_new(&path).unwrap();
        assert_eq!(Config::from_file(&path).unwrap(), config);
        assert!(config.write_new(&path).is_err());
    }

    #[test]
    fn debug_redacts_secret() {
        let auth = AuthConfig {
            token_secret: Some("super-secret-value".into()),
            ..AuthConfig::default()
        };
        assert!(!format!("{auth:?}").contains("super-secret-value"));
    }

    #[test]
    fn token_issuer_uses_configured_secret() {
        let auth = AuthConfig {
            token_secret: Some("a-configured-secret-of-decent-length!!".into()),
            token_ttl_secs: 120,
            ..AuthConfig::default()
        };
        let a = auth.token_issuer();
        let b = auth.token_issuer();
        assert_eq!(a.ttl_secs(), 120);
        let issued = a.issue(1);
        assert_eq!(b.verify(&issued.token).unwrap().sub, 1);

        // Random fallback secrets differ between issuers.
        let random = AuthConfig::default();
        let token = random.token_issuer().issue(1).token;
        assert!(random.token_issuer().verify(&token).is_err());
    }
}
