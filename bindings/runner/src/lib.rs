mod app;
mod config;

pub mod prelude {
    pub use crate::app::run_kasm_stress_test;
    pub use crate::config::{default_config_path, Config, ConfigError, ConfigSource};

    /// Re-export of the `session_stress_runner` prelude.
    ///
    /// This is for convenience so that you can depend on a single crate to run a stress test.
    pub use session_stress_runner::prelude::*;

    /// Re-export of the instrumented client for convenience.
    pub use kasm_client_instrumented::prelude::*;
}
