use once_cell::sync::OnceCell;
use tracing_subscriber::{
    fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
    EnvFilter,
};

static INSTALLED: OnceCell<bool> = OnceCell::new();

/// Install the global subscriber: `RUST_LOG` filter (default `info`), JSON lines when
/// `STRATA_LOG_JSON=1`. Safe to call repeatedly; only the first call has an effect.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    install(filter);
}

/// Like [`init`] but with an explicit filter directive, ignoring `RUST_LOG`.
pub fn init_with_filter(directives: &str) {
    install(EnvFilter::new(directives));
}

/// Whether a subscriber was installed by this crate.
pub fn is_installed() -> bool {
    INSTALLED.get().copied().unwrap_or(false)
}

fn json_requested() -> bool {
    std::env::var("STRATA_LOG_JSON").ok().as_deref() == Some("1")
}

fn install(filter: EnvFilter) {
    INSTALLED.get_or_init(|| {
        let result = if json_requested() {
            tracing_subscriber::registry()
                .with(fmt::layer().json().with_filter(filter))
                .try_init()
        } else {
            tracing_subscriber::registry()
                .with(fmt::layer().with_filter(filter))
                .try_init()
        };
        result.is_ok()
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn init_is_idempotent() {
        init();
        let first = is_installed();
        init_with_filter("debug");
        init();
        assert_eq!(is_installed(), first);
        tracing::info!(target: "strata.test", "subscriber ready");
    }

    #[test]
    #[serial]
    fn json_flag_is_read_from_env() {
        std::env::set_var("STRATA_LOG_JSON", "1");
        assert!(json_requested());
        std::env::remove_var("STRATA_LOG_JSON");
        assert!(!json_requested());
    }
}
