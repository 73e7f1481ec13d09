use std::env;

/// Variable holding the `tracing` filter directives, e.g. `MINISH_LOG=debug`.
pub const LOG_ENV: &str = "MINISH_LOG";

/// Settings of one interactive session.
///
/// The shell takes no flags and reads no config file; the only knob outside
/// the code is [`LOG_ENV`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellConfig {
    /// Printed before every read.
    pub prompt: String,
    /// Lines kept in the in-memory history.
    pub history_size: usize,
    /// `tracing_subscriber::EnvFilter` directives.
    pub log_filter: String,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            prompt: "> ".to_string(),
            history_size: 1000,
            log_filter: "warn".to_string(),
        }
    }
}

impl ShellConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(filter) = env::var(LOG_ENV) {
            if !filter.trim().is_empty() {
                config.log_filter = filter;
            }
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ShellConfig::default();
        assert_eq!(config.prompt, "> ");
        assert_eq!(config.history_size, 1000);
        assert_eq!(config.log_filter, "warn");
    }
}
