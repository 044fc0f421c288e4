//! Active transfer registry
//!
//! Transfers are keyed by the client's (address, port) pair, the transfer
//! identifier. An identity can own at most one transfer at a time. The entry lives
//! as long as the [`Registration`] handed out by [`SessionRegistry::register`], so a
//! transfer that ends for any reason (including a panic in its task) deregisters
//! itself.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::RegistryError;
use crate::observer::TransferInfo;

#[derive(Debug, Clone)]
pub struct SessionRegistry {
    sessions: Arc<Mutex<HashMap<SocketAddr, TransferInfo>>>,
    max_sessions: usize,
}

impl SessionRegistry {
    pub fn new(max_sessions: usize) -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            max_sessions,
        }
    }

    /// Claim `info.client` for a new transfer.
    pub fn register(&self, info: TransferInfo) -> Result<Registration, RegistryError> {
        let mut sessions = self.lock();

        if sessions.contains_key(&info.client) {
            return Err(RegistryError::AlreadyActive);
        }
        if sessions.len() >= self.max_sessions {
            return Err(RegistryError::AtCapacity(self.max_sessions));
        }

        let client = info.client;
        sessions.insert(client, info);

        Ok(Registration {
            registry: self.clone(),
            client,
        })
    }

    pub fn contains(&self, client: &SocketAddr) -> bool {
        self.lock().contains_key(client)
    }

    pub fn get(&self, client: &SocketAddr) -> Option<TransferInfo> {
        self.lock().get(client).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.len() >= self.max_sessions
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SocketAddr, TransferInfo>> {
        // Entries are inserted and removed whole, so a poisoned map is still consistent.
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Ownership of one registry entry. Dropping it deregisters the transfer.
#[derive(Debug)]
pub struct Registration {
    registry: SessionRegistry,
    client: SocketAddr,
}

impl Registration {
    pub fn client(&self) -> SocketAddr {
        self.client
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.registry.lock().remove(&self.client);
        tracing::debug!("Deregistered transfer for {}", self.client);
    }
}
