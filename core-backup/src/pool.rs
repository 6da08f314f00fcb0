//! # Client Pool
//!
//! Round-robin selection over the bot identities configured at startup.
//!
//! Every identity gets an equal share of requests: over `k * n` calls to
//! [`ClientPool::next`] each of the `n` identities is returned exactly `k`
//! times. Liveness is recorded by [`ClientPool::probe_all`] for reporting only
//! and never changes the rotation.

use crate::{BackupError, Result};
use bridge_traits::ChatTransport;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// One authenticated client.
pub struct ClientIdentity {
    label: String,
    transport: Arc<dyn ChatTransport>,
    live: AtomicBool,
}

impl ClientIdentity {
    pub fn new(transport: Arc<dyn ChatTransport>) -> Self {
        Self {
            label: transport.label().to_string(),
            transport,
            live: AtomicBool::new(true),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn transport(&self) -> &Arc<dyn ChatTransport> {
        &self.transport
    }

    /// Result of the last probe; `true` until probed.
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientIdentity")
            .field("label", &self.label)
            .field("live", &self.is_live())
            .finish()
    }
}

/// Fixed set of identities handed out in strict rotation.
#[derive(Debug)]
pub struct ClientPool {
    identities: Vec<Arc<ClientIdentity>>,
    cursor: AtomicUsize,
}

impl ClientPool {
    /// Build a pool from transports, in order.
    ///
    /// # Errors
    ///
    /// Returns [`BackupError::EmptyClientPool`] when `transports` is empty.
    pub fn new(transports: Vec<Arc<dyn ChatTransport>>) -> Result<Self> {
        if transports.is_empty() {
            return Err(BackupError::EmptyClientPool);
        }

        let identities = transports
            .into_iter()
            .map(|transport| Arc::new(ClientIdentity::new(transport)))
            .collect();

        Ok(Self {
            identities,
            cursor: AtomicUsize::new(0),
        })
    }

    /// Next identity in rotation. Never blocks.
    pub fn next(&self) -> Arc<ClientIdentity> {
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % self.identities.len();
        Arc::clone(&self.identities[index])
    }

    /// First configured identity, used for admin reports.
    pub fn primary(&self) -> Arc<ClientIdentity> {
        Arc::clone(&self.identities[0])
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }

    pub fn identities(&self) -> &[Arc<ClientIdentity>] {
        &self.identities
    }

    /// Verify every identity and record liveness. Returns the live count.
    #[instrument(skip(self), fields(identities = self.identities.len()))]
    pub async fn probe_all(&self) -> usize {
        let mut live = 0;

        for identity in &self.identities {
            match identity.transport.verify().await {
                Ok(username) => {
                    identity.live.store(true, Ordering::Relaxed);
                    live += 1;
                    info!(identity = %identity.label, username = %username, "Identity verified");
                }
                Err(e) => {
                    identity.live.store(false, Ordering::Relaxed);
                    warn!(identity = %identity.label, error = %e, "Identity probe failed");
                }
            }
        }

        live
    }
}
