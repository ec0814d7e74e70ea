//! Test helpers shared by the cooperative client crates.

pub mod test_json;

#[doc(hidden)]
pub mod __macro_support {
    pub use ctor;
    pub use tracing_subscriber;
}

/// Install a `tracing` subscriber for the whole test binary.
///
/// The filter is read from `RUST_LOG` and defaults to `info`. Output goes
/// through the test writer, so it is only shown for failing tests.
#[macro_export]
macro_rules! init_tracing_for_tests {
    () => {
        #[$crate::__macro_support::ctor::ctor]
        fn init_logging() {
            use $crate::__macro_support::tracing_subscriber::{
                fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
            };

            let _ = $crate::__macro_support::tracing_subscriber::registry()
                .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
                .with(fmt::layer().with_test_writer())
                .try_init();
        }
    };
}
