//! Log output to stderr
//!
//! `RUST_LOG` takes precedence over the `--verbose` and `--debug` flags.

use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::prelude::*;

fn default_filter(verbose: bool, debug: bool) -> &'static str {
    match (debug, verbose) {
        (true, _) => "appcat=debug,appcat_package=debug,appcat_config=debug,warn",
        (false, true) => "appcat=info,appcat_package=info,warn",
        (false, false) => "warn",
    }
}

pub fn init_logger(verbose: bool, debug: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose, debug)));

    let fmt = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(debug);

    // A second init (tests) keeps the first subscriber
    let _ = tracing_subscriber::registry()
        .with(fmt.with_filter(filter))
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_levels() {
        assert_eq!(default_filter(false, false), "warn");
        assert!(default_filter(true, false).contains("appcat_package=debug"));
        assert!(default_filter(false, true).contains("appcat_package=info"));
    }

    #[test]
    fn test_filters_parse() {
        for (verbose, debug) in [(false, false), (true, false), (false, true)] {
            assert!(EnvFilter::try_new(default_filter(verbose, debug)).is_ok());
        }
    }
}
