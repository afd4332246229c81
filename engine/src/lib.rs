//! Dependent switch engine.
//!
//! Switches are boolean entities that persist their state in a
//! [`toggle_store::StateStore`] and mirror it on a [`Host`]. A switch may list
//! other switches it depends on for ON and for OFF; when one of those changes,
//! the engine re-evaluates every dependent and cascades the change to those
//! whose dependencies now all agree.

/// Per-switch diagnostics: `info` when the switch has `debug` set, `debug` otherwise.
macro_rules! diag {
    ($verbose:expr, $($arg:tt)+) => {
        if $verbose {
            tracing::info!($($arg)+);
        } else {
            tracing::debug!($($arg)+);
        }
    };
}

mod engine;
mod host;
mod propagation;
mod registry;
mod scheduler;
mod switch;

pub use engine::{Engine, EngineOptions};
pub use host::{ChannelHost, Host, HostSignal, NullHost, SIGNAL_CHANNEL_CAPACITY};
pub use propagation::{PropagationError, satisfied};
pub use registry::{Registry, RegistryError};
pub use scheduler::{ResyncKind, ResyncScheduler};
pub use switch::{Switch, SwitchError, Transition};

pub use toggle_store::{StateStore, StoreError};
pub use toggle_types::{HostValue, ServiceKind, SwitchConfig, SwitchName};
