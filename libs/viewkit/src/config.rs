use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Factory tuning, usually read from the `factory` section of the app config.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FactoryConfig {
    /// Upper bound for every awaited factory, deferred import and platform
    /// hook. Unbounded when absent. Requires a tokio runtime with time
    /// enabled.
    #[serde(default, with = "humantime_serde")]
    pub resolve_timeout: Option<Duration>,

    /// Log each component's dependency map at debug level while creating.
    #[serde(default)]
    pub log_dependency_maps: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn humantime_timeout_parses() {
        let cfg: FactoryConfig =
            serde_json::from_str(r#"{"resolve_timeout":"250ms","log_dependency_maps":true}"#)
                .unwrap();
        assert_eq!(cfg.resolve_timeout, Some(Duration::from_millis(250)));
        assert!(cfg.log_dependency_maps);

        let empty: FactoryConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(empty, FactoryConfig::default());
    }

    #[test]
    fn unknown_fields_rejected() {
        assert!(serde_json::from_str::<FactoryConfig>(r#"{"timeout":"1s"}"#).is_err());
    }
}
