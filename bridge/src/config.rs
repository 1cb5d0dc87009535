use crate::net::injector::DEFAULT_HANDLER_NAME;
use crate::net::pipeline::HOST_PACKET_HANDLER;

/// Bridge configuration
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Version string reported by the host (e.g. `1.21.4-R0.1-SNAPSHOT`)
    pub host_version: Option<String>,
    /// Pipeline name of the interceptor stage
    pub interceptor_name: String,
    /// Host stage the interceptor is inserted before
    pub pipeline_anchor: String,
    /// Port for the metrics endpoint
    pub metrics_port: u16,
    /// Default log filter when RUST_LOG is unset
    pub log_level: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            host_version: None,
            interceptor_name: DEFAULT_HANDLER_NAME.to_string(),
            pipeline_anchor: HOST_PACKET_HANDLER.to_string(),
            metrics_port: 9091,
            log_level: "info".to_string(),
        }
    }
}

impl BridgeConfig {
    /// Load config from environment or use defaults
    pub fn load_or_default() -> Self {
        let mut config = Self::default();

        if let Ok(version) = std::env::var("HOST_VERSION") {
            let version = version.trim();
            if version.is_empty() {
                tracing::warn!("HOST_VERSION is empty, ignoring");
            } else {
                config.host_version = Some(version.to_string());
            }
        }

        if let Ok(name) = std::env::var("INTERCEPTOR_NAME") {
            if is_valid_handler_name(&name) {
                config.interceptor_name = name;
            } else {
                tracing::warn!("Invalid INTERCEPTOR_NAME '{}', using default", name);
            }
        }

        if let Ok(anchor) = std::env::var("PIPELINE_ANCHOR") {
            if is_valid_handler_name(&anchor) {
                config.pipeline_anchor = anchor;
            } else {
                tracing::warn!("Invalid PIPELINE_ANCHOR '{}', using default", anchor);
            }
        }

        if let Ok(port) = std::env::var("METRICS_PORT") {
            if let Ok(parsed) = port.parse::<u16>() {
                if parsed > 0 {
                    config.metrics_port = parsed;
                } else {
                    tracing::warn!("METRICS_PORT must be > 0, using default");
                }
            } else {
                tracing::warn!("Invalid METRICS_PORT '{}', using default", port);
            }
        }

        if let Ok(level) = std::env::var("LOG_LEVEL") {
            match level.to_ascii_lowercase().as_str() {
                "trace" | "debug" | "info" | "warn" | "error" => config.log_level = level.to_ascii_lowercase(),
                _ => tracing::warn!("Invalid LOG_LEVEL '{}', using default", level),
            }
        }

        config
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), String> {
        if !is_valid_handler_name(&self.interceptor_name) {
            return Err("interceptor_name cannot be empty or contain whitespace".to_string());
        }
        if !is_valid_handler_name(&self.pipeline_anchor) {
            return Err("pipeline_anchor cannot be empty or contain whitespace".to_string());
        }
        if self.interceptor_name == self.pipeline_anchor {
            return Err("interceptor_name must differ from pipeline_anchor".to_string());
        }
        if self.metrics_port == 0 {
            return Err("metrics_port cannot be 0".to_string());
        }
        Ok(())
    }
}

fn is_valid_handler_name(name: &str) -> bool {
    !name.is_empty() && !name.chars().any(char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BridgeConfig::default();
        assert_eq!(config.interceptor_name, "entity_bridge_listener");
        assert_eq!(config.pipeline_anchor, "packet_handler");
        assert_eq!(config.metrics_port, 9091);
        assert!(config.host_version.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_or_default() {
        let config = BridgeConfig::load_or_default();
        assert!(config.metrics_port > 0);
    }

    #[test]
    fn test_validate_rejects_bad_names() {
        let mut config = BridgeConfig::default();
        config.interceptor_name = String::new();
        assert!(config.validate().is_err());

        let mut config = BridgeConfig::default();
        config.pipeline_anchor = "packet handler".to_string();
        assert!(config.validate().is_err());

        let mut config = BridgeConfig::default();
        config.interceptor_name = config.pipeline_anchor.clone();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_port() {
        let config = BridgeConfig {
            metrics_port: 0,
            ..BridgeConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
