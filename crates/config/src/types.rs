use serde::Deserialize;
use std::{collections::HashMap, env, path::PathBuf};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub agent: AgentConfig,
    pub interaction_log: InteractionLogConfig,
    pub query: QueryConfig,
}

impl ApiConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, String> {
        Ok(Self {
            server: ServerConfig::from_env()?,
            logging: LoggingConfig::from_env()?,
            agent: AgentConfig::from_env()?,
            interaction_log: InteractionLogConfig::from_env()?,
            query: QueryConfig::from_env()?,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    /// Load from environment variables
    pub fn from_env() -> Result<Self, String> {
        Ok(Self {
            host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| "SERVER_PORT must be a valid port number")?,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

/// Upstream agent endpoint
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    /// Treat this many seconds without an upstream event as a client disconnect.
    /// Disabled when unset.
    pub idle_timeout_secs: Option<u64>,
}

impl AgentConfig {
    /// Load from environment variables
    pub fn from_env() -> Result<Self, String> {
        Ok(Self {
            base_url: env::var("AGENT_BASE_URL").map_err(|_| "AGENT_BASE_URL not set")?,
            api_key: env::var("AGENT_API_KEY").ok(),
            timeout_secs: env::var("AGENT_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(300), // 5 minutes
            idle_timeout_secs: env::var("AGENT_IDLE_TIMEOUT_SECS")
                .ok()
                .map(|s| {
                    s.parse()
                        .map_err(|_| "AGENT_IDLE_TIMEOUT_SECS must be a number of seconds")
                })
                .transpose()?,
        })
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8787".to_string(),
            api_key: None,
            timeout_secs: 300,
            idle_timeout_secs: None,
        }
    }
}

/// Where finalized interaction records are appended
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InteractionLogConfig {
    pub path: PathBuf,
}

impl InteractionLogConfig {
    /// Load from environment variables
    pub fn from_env() -> Result<Self, String> {
        Ok(Self {
            path: env::var("INTERACTION_LOG_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| Self::default().path),
        })
    }
}

impl Default for InteractionLogConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("logs/interactions.log"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    pub max_history_turns: usize,
    pub default_library_id: String,
}

impl QueryConfig {
    /// Load from environment variables
    pub fn from_env() -> Result<Self, String> {
        Ok(Self {
            max_history_turns: env::var("MAX_HISTORY_TURNS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .map_err(|_| "MAX_HISTORY_TURNS must be a valid number")?,
            default_library_id: env::var("DEFAULT_LIBRARY_ID")
                .unwrap_or_else(|_| "mina-rees".to_string()),
        })
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            max_history_turns: 20,
            default_library_id: "mina-rees".to_string(),
        }
    }
}

/// Logging Configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    pub modules: HashMap<String, String>,
}

impl LoggingConfig {
    /// Load from environment variables
    pub fn from_env() -> Result<Self, String> {
        let mut modules = HashMap::new();

        // Load module-specific log levels
        if let Ok(level) = env::var("LOG_MODULE_API") {
            modules.insert("api".to_string(), level);
        }
        if let Ok(level) = env::var("LOG_MODULE_SERVICES") {
            modules.insert("services".to_string(), level);
        }
        if let Ok(level) = env::var("LOG_MODULE_AGENT_PROVIDERS") {
            modules.insert("agent_providers".to_string(), level);
        }

        Ok(Self {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string()),
            modules,
        })
    }

    /// Build an `EnvFilter` directive string, e.g. `info,services=debug`
    pub fn filter_directives(&self) -> String {
        let mut filter = self.level.clone();
        let mut modules: Vec<_> = self.modules.iter().collect();
        modules.sort();
        for (module, level) in modules {
            filter.push_str(&format!(",{}={}", module, level));
        }
        filter
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            modules: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_directives_sorted_by_module() {
        let mut modules = HashMap::new();
        modules.insert("services".to_string(), "debug".to_string());
        modules.insert("api".to_string(), "trace".to_string());
        let config = LoggingConfig {
            level: "warn".to_string(),
            format: "json".to_string(),
            modules,
        };

        assert_eq!(config.filter_directives(), "warn,api=trace,services=debug");
    }

    #[test]
    fn test_filter_directives_without_modules() {
        assert_eq!(LoggingConfig::default().filter_directives(), "info");
    }

    #[test]
    fn test_bind_address() {
        let server = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 4000,
        };
        assert_eq!(server.bind_address(), "127.0.0.1:4000");
    }
}
