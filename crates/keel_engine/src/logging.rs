//! Logging subsystem.
//!
//! A two-phase wrapper that installs the global `env_logger` logger when the
//! subsystem commits, so logging comes up in boot order like everything
//! else. Severity mapping from the classic engine ladder: FATAL conditions
//! log at `error!` and additionally surface as `Result` errors; ERROR
//! through TRACE map one-to-one onto `log` levels.

use log::LevelFilter;

use crate::memory::{Subsystem, SubsystemError};

/// Owns (or observes) the process-global logger.
pub struct LoggingSystem {
    installed: bool,
}

impl LoggingSystem {
    /// Whether this instance installed the global logger.
    ///
    /// A second engine in one process finds the logger already in place and
    /// reuses it; only the first installer reports `true`.
    pub fn owns_global_logger(&self) -> bool {
        self.installed
    }
}

impl Subsystem for LoggingSystem {
    const NAME: &'static str = "logging system";

    type Args<'a> = ();

    fn initialize(_args: ()) -> Result<Self, SubsystemError> {
        let installed = env_logger::Builder::from_default_env()
            .filter_level(LevelFilter::Info)
            .try_init()
            .is_ok();

        if !installed {
            log::debug!("global logger already installed; reusing it");
        }

        Ok(Self { installed })
    }

    fn shutdown(&mut self) {
        if self.installed {
            log::logger().flush();
        }
        self.installed = false;
    }
}
