use tracing_subscriber::EnvFilter;

/// Per-test tracing guard: installs a thread-default fmt subscriber that
/// honors `RUST_LOG` and writes through the test harness capture.
pub struct TestTracing {
    _guard: tracing::subscriber::DefaultGuard,
}

impl TestTracing {
    pub fn init() -> Self {
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .finish();
        Self {
            _guard: tracing::subscriber::set_default(subscriber),
        }
    }
}
