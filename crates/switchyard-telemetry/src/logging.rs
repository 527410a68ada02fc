use std::str::FromStr;

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Parse a level name such as `info` or `DEBUG`.
pub fn parse_level(name: &str) -> Option<Level> {
    Level::from_str(name.trim()).ok()
}

/// Render the default filter directive: the base level followed by
/// per-module overrides, e.g. `info,switchyard_server=debug`.
pub fn filter_directive(level: Level, module_levels: &[(String, Level)]) -> String {
    let mut directive = level.to_string().to_lowercase();
    for (module, level) in module_levels {
        directive.push_str(&format!(",{}={}", module, level.to_string().to_lowercase()));
    }
    directive
}

/// `RUST_LOG` when set, otherwise the configured directive.
pub(crate) fn env_filter(directive: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive))
}
