use std::env;

/// Store configuration.
///
/// The composer never reads the environment itself; binaries call
/// [`StoreConfig::from_env`] at startup and pass the result down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreConfig {
    /// Debug-build diagnostics: reducers are run twice and compared, and
    /// published snapshots are sealed against writes.
    pub strict: bool,

    /// Install a tracing middleware that logs every dispatched action.
    pub log_actions: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            strict: cfg!(debug_assertions),
            log_actions: false,
        }
    }
}

impl StoreConfig {
    /// Strict mode regardless of build profile. Used by tests.
    pub fn strict() -> Self {
        Self {
            strict: true,
            ..Self::default()
        }
    }

    pub fn production() -> Self {
        Self {
            strict: false,
            ..Self::default()
        }
    }

    /// Load configuration from environment variables.
    ///
    /// `ANNOTATOR_ENV=production` turns strict mode off, any other value
    /// turns it on, and an unset variable falls back to the build profile.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let strict = match lookup("ANNOTATOR_ENV") {
            Some(mode) => !mode.trim().eq_ignore_ascii_case("production"),
            None => defaults.strict,
        };
        let log_actions = lookup("ANNOTATOR_LOG_ACTIONS")
            .map(|v| flag(&v))
            .unwrap_or(defaults.log_actions);

        Self {
            strict,
            log_actions,
        }
    }
}

fn flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn production_env_disables_strict_mode() {
        let config = StoreConfig::from_lookup(lookup(&[("ANNOTATOR_ENV", "Production")]));
        assert!(!config.strict);
    }

    #[test]
    fn any_other_env_enables_strict_mode() {
        let config = StoreConfig::from_lookup(lookup(&[("ANNOTATOR_ENV", "development")]));
        assert!(config.strict);
    }

    #[test]
    fn unset_env_follows_build_profile() {
        let config = StoreConfig::from_lookup(lookup(&[]));
        assert_eq!(config, StoreConfig::default());
        assert_eq!(config.strict, cfg!(debug_assertions));
    }

    #[test]
    fn log_actions_accepts_common_truthy_values() {
        for value in ["1", "true", "YES", " on "] {
            let config = StoreConfig::from_lookup(lookup(&[("ANNOTATOR_LOG_ACTIONS", value)]));
            assert!(config.log_actions, "{value} should enable logging");
        }
        let config = StoreConfig::from_lookup(lookup(&[("ANNOTATOR_LOG_ACTIONS", "0")]));
        assert!(!config.log_actions);
    }
}
