use std::env;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl LogConfig {
    pub fn from_env() -> Self {
        Self::from_vars(|name| env::var(name).ok())
    }

    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(level) = var("RUST_LOG").or_else(|| var("FEXPR_LOG_LEVEL")) {
            config.level = level;
        }

        if let Some(format) = var("FEXPR_LOG_FORMAT") {
            config.format = match format.to_lowercase().as_str() {
                "text" | "plain" => LogFormat::Text,
                "json" => LogFormat::Json,
                _ => {
                    eprintln!(
                        "Warning: Invalid FEXPR_LOG_FORMAT value '{}', using default text",
                        format
                    );
                    LogFormat::Text
                }
            };
        }

        config
    }
}

/// Installs the global subscriber. Logs go to stderr so stdout only carries results.
pub fn init_tracing(config: &LogConfig) {
    let env_filter = EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("warn"));

    match config.format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::defaults(&[], LogConfig::default())]
    #[case::rust_log_wins(&[("RUST_LOG", "debug"), ("FEXPR_LOG_LEVEL", "info")],
        LogConfig { level: "debug".to_string(), format: LogFormat::Text })]
    #[case::fexpr_level(&[("FEXPR_LOG_LEVEL", "fexpr_resolve=trace")],
        LogConfig { level: "fexpr_resolve=trace".to_string(), format: LogFormat::Text })]
    #[case::json(&[("FEXPR_LOG_FORMAT", "JSON")],
        LogConfig { level: "warn".to_string(), format: LogFormat::Json })]
    #[case::invalid_format(&[("FEXPR_LOG_FORMAT", "xml")], LogConfig::default())]
    fn test_from_vars(#[case] vars: &[(&str, &str)], #[case] expected: LogConfig) {
        let config = LogConfig::from_vars(|name| {
            vars.iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| value.to_string())
        });
        assert_eq!(config, expected);
    }
}
