use crate::config::AppConfig;
use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    value::UncasedStr,
    Figment,
};
use std::path::Path;

pub const DEFAULT_CONFIG_PATH: &str = "config/Config.toml";
pub const ENV_PREFIX: &str = "POSITION_ALERT_";

/// String-valued settings, with the flat environment name existing
/// deployments use for them.
///
/// Environment values for these keys are taken verbatim, so numeric-looking
/// ids and passwords keep their exact text.
const STRING_SETTINGS: &[(&str, Option<&str>)] = &[
    ("monitor.address", Some("TARGET_ADDRESS")),
    ("hyperliquid.api_url", None),
    ("store.endpoint", Some("APPWRITE_ENDPOINT")),
    ("store.project_id", Some("APPWRITE_PROJECT_ID")),
    ("store.api_key", Some("APPWRITE_API_KEY")),
    ("store.database_id", Some("APPWRITE_DATABASE_ID")),
    ("store.collection_id", Some("APPWRITE_COLLECTION_ID")),
    ("store.path", None),
    ("email.smtp_host", None),
    ("email.sender", Some("SENDER_EMAIL")),
    ("email.password", Some("APP_PASSWORD")),
    ("email.receiver", Some("RECEIVER_EMAIL")),
    ("email.sender_name", None),
];

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads configuration from [`DEFAULT_CONFIG_PATH`] and the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be read or parsed.
    pub fn load() -> Result<AppConfig> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Loads configuration by merging defaults, a TOML file, prefixed
    /// environment variables and the legacy flat environment names.
    ///
    /// A missing TOML file is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be read or parsed.
    pub fn load_from(path: impl AsRef<Path>) -> Result<AppConfig> {
        let config: AppConfig = Self::figment(path).extract()?;

        Ok(config)
    }

    /// The provider chain behind [`ConfigLoader::load_from`]; later providers win.
    pub fn figment(path: impl AsRef<Path>) -> Figment {
        let figment = Figment::new().merge(Toml::file(path.as_ref())).merge(
            Env::prefixed(ENV_PREFIX)
                .split("__")
                .filter(|key| !is_string_setting(key)),
        );

        let figment = STRING_SETTINGS.iter().fold(figment, |figment, (key, _)| {
            merge_string_var(figment, key, &prefixed_name(key))
        });

        STRING_SETTINGS
            .iter()
            .fold(figment, |figment, (key, legacy)| match legacy {
                Some(name) => merge_string_var(figment, key, name),
                None => figment,
            })
    }
}

/// Merges the environment variable `name` at `key` as a plain string.
fn merge_string_var(figment: Figment, key: &str, name: &str) -> Figment {
    match std::env::var(name) {
        Ok(value) => figment.merge(Serialized::default(key, value)),
        Err(_) => figment,
    }
}

/// `store.project_id` -> `POSITION_ALERT_STORE__PROJECT_ID`.
fn prefixed_name(key: &str) -> String {
    format!("{ENV_PREFIX}{}", key.replace('.', "__")).to_uppercase()
}

fn is_string_setting(key: &UncasedStr) -> bool {
    STRING_SETTINGS
        .iter()
        .any(|(setting, _)| key.as_str().eq_ignore_ascii_case(setting))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreBackend;
    use crate::monitor::DeliveryMode;
    use figment::Jail;
    use rust_decimal_macros::dec;

    #[test]
    fn test_missing_file_yields_defaults() {
        Jail::expect_with(|_jail| {
            let config: AppConfig = ConfigLoader::figment("Config.toml").extract()?;

            assert_eq!(config.hyperliquid.api_url, "https://api.hyperliquid.xyz");
            assert_eq!(config.email.smtp_port, 465);
            Ok(())
        });
    }

    #[test]
    fn test_toml_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "Config.toml",
                r#"
                [monitor]
                address = "0x5B5d51203a0F9079f8AEB098A6523A13F298C060"
                delivery = "per_event"
                epsilon = "0.001"
                dry_run = true

                [store]
                backend = "file"
                path = "state/positions.json"
                "#,
            )?;

            let config: AppConfig = ConfigLoader::figment("Config.toml").extract()?;

            assert_eq!(
                config.monitor.address,
                "0x5B5d51203a0F9079f8AEB098A6523A13F298C060"
            );
            assert_eq!(config.monitor.delivery, DeliveryMode::PerEvent);
            assert_eq!(config.monitor.epsilon, dec!(0.001));
            assert!(config.monitor.dry_run);
            assert_eq!(config.store.backend, StoreBackend::File);
            assert_eq!(config.store.path.to_str(), Some("state/positions.json"));
            Ok(())
        });
    }

    #[test]
    fn test_legacy_env_names() {
        Jail::expect_with(|jail| {
            jail.set_env("TARGET_ADDRESS", "0xabc");
            jail.set_env("SENDER_EMAIL", "alerts@example.com");
            jail.set_env("APP_PASSWORD", "abcd efgh ijkl mnop");
            jail.set_env("APPWRITE_COLLECTION_ID", "positions");

            let config: AppConfig = ConfigLoader::figment("Config.toml").extract()?;

            assert_eq!(config.monitor.address, "0xabc");
            assert_eq!(config.email.sender, "alerts@example.com");
            assert_eq!(config.email.password, "abcd efgh ijkl mnop");
            assert_eq!(config.store.collection_id, "positions");
            Ok(())
        });
    }

    #[test]
    fn test_prefixed_env_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "Config.toml",
                r#"
                [email]
                receiver = "file@example.com"
                "#,
            )?;
            jail.set_env("POSITION_ALERT_EMAIL__RECEIVER", "env@example.com");
            jail.set_env("POSITION_ALERT_HYPERLIQUID__API_URL", "http://localhost:9999");

            let config: AppConfig = ConfigLoader::figment("Config.toml").extract()?;

            assert_eq!(config.email.receiver, "env@example.com");
            assert_eq!(config.hyperliquid.api_url, "http://localhost:9999");
            Ok(())
        });
    }

    #[test]
    fn test_legacy_name_wins_over_prefixed() {
        Jail::expect_with(|jail| {
            jail.set_env("POSITION_ALERT_MONITOR__ADDRESS", "0xprefixed");
            jail.set_env("TARGET_ADDRESS", "0xlegacy");

            let config: AppConfig = ConfigLoader::figment("Config.toml").extract()?;

            assert_eq!(config.monitor.address, "0xlegacy");
            Ok(())
        });
    }

    #[test]
    fn test_numeric_looking_values_stay_strings() {
        Jail::expect_with(|jail| {
            jail.set_env("APPWRITE_PROJECT_ID", "123456");
            jail.set_env("APPWRITE_DATABASE_ID", "0042");
            jail.set_env("APP_PASSWORD", "12345678");
            jail.set_env("POSITION_ALERT_STORE__COLLECTION_ID", "987654321");
            jail.set_env("POSITION_ALERT_EMAIL__SMTP_PORT", "587");
            jail.set_env("POSITION_ALERT_MONITOR__TIMEOUT_SECS", "5");

            let config: AppConfig = ConfigLoader::figment("Config.toml").extract()?;

            assert_eq!(config.store.project_id, "123456");
            assert_eq!(config.store.database_id, "0042");
            assert_eq!(config.email.password, "12345678");
            assert_eq!(config.store.collection_id, "987654321");
            assert_eq!(config.email.smtp_port, 587);
            assert_eq!(config.monitor.timeout_secs, 5);
            Ok(())
        });
    }

    #[test]
    fn test_prefixed_names_for_string_settings() {
        assert_eq!(prefixed_name("monitor.address"), "POSITION_ALERT_MONITOR__ADDRESS");
        assert_eq!(prefixed_name("store.api_key"), "POSITION_ALERT_STORE__API_KEY");
        assert!(is_string_setting(UncasedStr::new("EMAIL.PASSWORD")));
        assert!(!is_string_setting(UncasedStr::new("email.smtp_port")));
    }
}
