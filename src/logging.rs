use anyhow::Result;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Installs the global `tracing` subscriber. `RUST_LOG` wins over
/// `default_filter` when set. Fails if a subscriber is already installed.
pub fn init_logging(default_filter: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let subscriber = FmtSubscriber::builder().with_env_filter(filter).with_target(true).finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_init_logging_only_once() {
        // Another test binary may already own the global subscriber; either
        // way a second call in this process must fail.
        let _ = init_logging("info,multiwallet_core=debug");
        assert!(init_logging("info").is_err());
    }
}
