use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const DEFAULT_DIRECTIVES: &str = "apicr=warn";

/// Filter for a `-v` count. Without `-v`, `RUST_LOG` wins over the default.
pub fn filter(verbose: u8) -> EnvFilter {
    match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_DIRECTIVES.into()),
        1 => EnvFilter::new("apicr=debug"),
        _ => EnvFilter::new("apicr=trace"),
    }
}

/// Installs the stderr subscriber. Stdout is reserved for command output.
pub fn init(verbose: u8) {
    let fmt = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    // A second init (e.g. from tests) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(filter(verbose))
        .with(fmt)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(filter(1).to_string(), "apicr=debug");
        assert_eq!(filter(2).to_string(), "apicr=trace");
        assert_eq!(filter(5).to_string(), "apicr=trace");
    }

    #[test]
    fn test_init_twice_is_harmless() {
        init(0);
        init(1);
    }
}
