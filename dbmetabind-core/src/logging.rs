//! Stderr logging for the collector.
//!
//! Verbosity flags raise the level of the `dbmetabind_*` crates only; driver
//! chatter from sqlx stays at `warn` unless `RUST_LOG` says otherwise.

use tracing_subscriber::EnvFilter;

use crate::error::MetabindError;
use crate::Result;

const OWN_TARGETS: [&str; 2] = ["dbmetabind_core", "dbmetabind_collect"];

/// Level applied to our own targets. `quiet` beats any number of `-v`.
pub fn level_for(verbose: u8, quiet: bool) -> tracing::Level {
    match (quiet, verbose) {
        (true, _) => tracing::Level::ERROR,
        (false, 0) => tracing::Level::INFO,
        (false, 1) => tracing::Level::DEBUG,
        (false, _) => tracing::Level::TRACE,
    }
}

/// Filter directives used when `RUST_LOG` is unset.
pub fn filter_directives(verbose: u8, quiet: bool) -> String {
    let level = level_for(verbose, quiet).as_str().to_ascii_lowercase();
    let floor = if quiet { "error" } else { "warn" };
    let mut directives = floor.to_string();
    for target in OWN_TARGETS {
        directives.push_str(&format!(",{target}={level}"));
    }
    directives
}

/// Installs the global subscriber. A non-empty `RUST_LOG` replaces the
/// flag-derived filter entirely.
///
/// ```rust,no_run
/// dbmetabind_core::logging::init_logging(1, false).expect("logging");
/// ```
///
/// # Errors
/// Fails if a subscriber is already installed or `RUST_LOG` does not parse.
pub fn init_logging(verbose: u8, quiet: bool) -> Result<()> {
    let filter = match std::env::var("RUST_LOG") {
        Ok(spec) if !spec.trim().is_empty() => EnvFilter::try_new(spec),
        _ => EnvFilter::try_new(filter_directives(verbose, quiet)),
    }
    .map_err(|e| MetabindError::configuration(format!("Invalid log filter: {e}")))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| MetabindError::configuration(format!("Failed to initialize logging: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_levels() {
        let test_cases = [
            ((true, 0), tracing::Level::ERROR),
            ((true, 5), tracing::Level::ERROR),
            ((false, 0), tracing::Level::INFO),
            ((false, 1), tracing::Level::DEBUG),
            ((false, 2), tracing::Level::TRACE),
            ((false, 10), tracing::Level::TRACE),
        ];

        for ((quiet, verbose), expected) in test_cases {
            assert_eq!(
                level_for(verbose, quiet),
                expected,
                "Failed for quiet={}, verbose={}",
                quiet,
                verbose
            );
        }
    }

    #[test]
    fn test_directives_scope_verbosity_to_own_crates() {
        assert_eq!(
            filter_directives(1, false),
            "warn,dbmetabind_core=debug,dbmetabind_collect=debug"
        );
        assert_eq!(
            filter_directives(3, true),
            "error,dbmetabind_core=error,dbmetabind_collect=error"
        );
        assert!(EnvFilter::try_new(filter_directives(2, false)).is_ok());
    }
}
