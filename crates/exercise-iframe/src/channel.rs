use log::error;

use crate::platform::HostPlatform;
use crate::TransportError;

/// A dedicated host/guest channel.
///
/// `local` (port A) stays with the host. `remote` (port B) is handed to the
/// guest exactly once and is `None` afterwards.
#[derive(Debug)]
pub struct Channel<P> {
    local: P,
    remote: Option<P>,
}

impl<P> Channel<P> {
    /// The host's end.
    pub fn local(&self) -> &P {
        &self.local
    }

    /// Whether port B is still waiting to be transferred.
    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    /// Take port B for transfer.
    pub fn take_remote(&mut self) -> Option<P> {
        self.remote.take()
    }
}

/// Allocate a fresh channel.
pub fn create_channel<H: HostPlatform>(platform: &H) -> Result<Channel<H::Port>, TransportError> {
    let (local, remote) = platform.create_channel().map_err(|e| {
        error!("[exercise-frame] Failed to create message channel: {}", e);
        e
    })?;
    Ok(Channel {
        local,
        remote: Some(remote),
    })
}
