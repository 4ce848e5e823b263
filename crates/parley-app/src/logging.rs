//! Tracing setup for the binary. Logs go to stderr so they never mix with
//! the rendered history on stdout.

use tracing_subscriber::filter::ParseError;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber.
///
/// `RUST_LOG` wins when it parses; otherwise the configured directives are
/// used and must parse.
pub fn init(configured: &str) -> Result<(), ParseError> {
    let filter = log_filter(std::env::var("RUST_LOG").ok(), configured)?;
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();
    Ok(())
}

fn log_filter(env: Option<String>, configured: &str) -> Result<EnvFilter, ParseError> {
    if let Some(directives) = env.filter(|d| !d.trim().is_empty()) {
        if let Ok(filter) = EnvFilter::try_new(directives) {
            return Ok(filter);
        }
    }
    EnvFilter::try_new(configured.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_any_env_filter_syntax() {
        for directives in ["info", "off", "INFO", "parley_chat=debug", "parley_chat=debug,warn"] {
            assert!(log_filter(None, directives).is_ok(), "rejected {}", directives);
        }
    }

    #[test]
    fn test_rejects_bad_level() {
        assert!(log_filter(None, "parley_chat=loudest").is_err());
    }

    #[test]
    fn test_rust_log_takes_priority() {
        assert!(log_filter(Some("debug".to_string()), "parley_chat=loudest").is_ok());
    }

    #[test]
    fn test_bad_rust_log_falls_back_to_configured() {
        assert!(log_filter(Some("parley_chat=loudest".to_string()), "warn").is_ok());
        assert!(log_filter(Some("  ".to_string()), "warn").is_ok());
    }
}
