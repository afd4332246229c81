//! Host capability handle.
//!
//! The engine never talks to a transport. It pushes [`HostSignal`]s into a
//! [`Host`] injected per switch, and the host decides how to surface them.

use tokio::sync::mpsc;
use toggle_types::{HostValue, SwitchName};

/// Channel capacity for [`ChannelHost`].
pub const SIGNAL_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostSignal {
    /// Reflect a state the engine already applied. Must not echo a set request.
    Update { name: SwitchName, value: HostValue },
    /// Force the representation. The host may deliver a set request back.
    Resync { name: SwitchName, value: HostValue },
}

impl HostSignal {
    #[must_use]
    pub fn name(&self) -> &SwitchName {
        match self {
            Self::Update { name, .. } | Self::Resync { name, .. } => name,
        }
    }

    #[must_use]
    pub fn value(&self) -> HostValue {
        match self {
            Self::Update { value, .. } | Self::Resync { value, .. } => *value,
        }
    }
}

pub trait Host: Send + Sync {
    fn signal(&self, signal: HostSignal);
}

/// Discards every signal. For headless engines.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullHost;

impl Host for NullHost {
    fn signal(&self, _signal: HostSignal) {}
}

/// Forwards signals over a bounded channel.
///
/// A full or closed channel drops the signal with a warning; the engine never
/// waits on the host.
#[derive(Debug, Clone)]
pub struct ChannelHost {
    tx: mpsc::Sender<HostSignal>,
}

impl ChannelHost {
    #[must_use]
    pub fn new() -> (Self, mpsc::Receiver<HostSignal>) {
        let (tx, rx) = mpsc::channel(SIGNAL_CHANNEL_CAPACITY);
        (Self { tx }, rx)
    }
}

impl Host for ChannelHost {
    fn signal(&self, signal: HostSignal) {
        if let Err(e) = self.tx.try_send(signal) {
            match e {
                mpsc::error::TrySendError::Full(signal) => {
                    tracing::warn!(switch = %signal.name(), "Host signal channel full, dropping signal");
                }
                mpsc::error::TrySendError::Closed(signal) => {
                    tracing::debug!(switch = %signal.name(), "Host signal channel closed");
                }
            }
        }
    }
}
