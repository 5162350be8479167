use scope_guard_config::log::LogLevel;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Builds the event filter: a custom directive wins over the plain level.
/// An unparsable directive falls back to the level, with a warning on stderr
/// since no subscriber exists yet.
pub fn create_filter(level: LogLevel, directive: Option<&str>) -> EnvFilter {
    let builder = || EnvFilter::builder().with_default_directive(LevelFilter::from(level).into());

    let Some(directive) = directive else {
        return builder().parse_lossy("");
    };

    builder().parse(directive).unwrap_or_else(|err| {
        eprintln!(
            "invalid log filter '{}', falling back to '{}': {}",
            directive,
            level.as_str(),
            err
        );
        builder().parse_lossy("")
    })
}

#[cfg(test)]
mod tests {
    use super::create_filter;
    use scope_guard_config::log::LogLevel;

    #[test]
    fn level_becomes_the_default_directive() {
        let filter = create_filter(LogLevel::Warn, None);
        assert_eq!(filter.to_string().to_lowercase(), "warn");
    }

    #[test]
    fn directive_is_used_when_valid() {
        let filter = create_filter(LogLevel::Info, Some("scope_guard=trace"));
        assert!(filter.to_string().contains("scope_guard=trace"));
    }

    #[test]
    fn invalid_directive_falls_back_to_the_level() {
        let filter = create_filter(LogLevel::Error, Some("scope_guard=loud"));
        assert_eq!(filter.to_string().to_lowercase(), "error");
    }
}
