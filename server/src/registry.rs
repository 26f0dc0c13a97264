//! Session identities and the registry of active ones.
//!
//! Clients are created and deleted in a durable [`ClientStore`]. The shared
//! cache holds a copy of the active token set plus one entity blob per token;
//! [`ClientRegistry::refresh`] reconciles the cached copy with the store.
//!
//! The registry is only reconciled when a session is created or killed, so a
//! token deleted from the store by other means stays visible in the cache until
//! the next such event.

use crate::cache::Cache;
use crate::error::SessionError;
use log::{debug, info, warn};
use rand::Rng;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

/// Cache key holding the set of active tokens.
pub const CLIENTS_KEY: &str = "clients";
const CLIENT_PREFIX: &str = "client_";

/// Cache key holding the entity blob of one session.
pub fn client_key(token: &str) -> String {
    format!("{}{}", CLIENT_PREFIX, token)
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("client store unavailable: {0}")]
    Unavailable(String),
}

/// One session identity: an opaque random token.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Client {
    pub token: String,
}

impl Client {
    /// Creates a client with a fresh 128-bit token in hex.
    pub fn generate() -> Self {
        let bits: u128 = rand::thread_rng().gen();
        Self {
            token: format!("{:032x}", bits),
        }
    }
}

/// Durable record of which clients exist.
pub trait ClientStore: Send + Sync {
    fn create(&self) -> Result<Client, StoreError>;

    fn delete(&self, token: &str) -> Result<bool, StoreError>;

    fn tokens(&self) -> Result<BTreeSet<String>, StoreError>;
}

#[derive(Debug, Default)]
pub struct MemoryClientStore {
    tokens: Mutex<BTreeSet<String>>,
}

impl MemoryClientStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tokens_mut(&self) -> MutexGuard<'_, BTreeSet<String>> {
        self.tokens.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl ClientStore for MemoryClientStore {
    fn create(&self) -> Result<Client, StoreError> {
        let mut tokens = self.tokens_mut();
        loop {
            let client = Client::generate();
            if tokens.insert(client.token.clone()) {
                return Ok(client);
            }
        }
    }

    fn delete(&self, token: &str) -> Result<bool, StoreError> {
        Ok(self.tokens_mut().remove(token))
    }

    fn tokens(&self) -> Result<BTreeSet<String>, StoreError> {
        Ok(self.tokens_mut().clone())
    }
}

/// Cached view of the active sessions.
pub struct ClientRegistry<'a> {
    cache: &'a dyn Cache,
    store: &'a dyn ClientStore,
}

impl<'a> ClientRegistry<'a> {
    pub fn new(cache: &'a dyn Cache, store: &'a dyn ClientStore) -> Self {
        Self { cache, store }
    }

    /// Tokens currently listed in the cache. An evicted list reads as empty.
    pub fn active_tokens(&self) -> Result<BTreeSet<String>, SessionError> {
        let tokens = match self.cache.get(CLIENTS_KEY)? {
            Some(bytes) => bincode::deserialize(&bytes).unwrap_or_else(|e| {
                warn!("discarding unreadable client list: {}", e);
                BTreeSet::new()
            }),
            None => BTreeSet::new(),
        };
        Ok(tokens)
    }

    /// Entity blobs of every listed token that is still in the cache.
    pub fn session_blobs(
        &self,
        tokens: &BTreeSet<String>,
    ) -> Result<HashMap<String, Vec<u8>>, SessionError> {
        let keys: Vec<String> = tokens.iter().map(|t| client_key(t)).collect();
        let mut found = self.cache.get_multi(&keys)?;
        Ok(tokens
            .iter()
            .filter_map(|token| {
                found
                    .remove(&client_key(token))
                    .map(|blob| (token.clone(), blob))
            })
            .collect())
    }

    /// Creates a new durable client and reconciles the cache with it. The
    /// client is deleted again when the cache cannot be reconciled.
    pub fn create_client(&self) -> Result<Client, SessionError> {
        let client = self.store.create()?;
        if let Err(e) = self.refresh() {
            if let Err(undo) = self.store.delete(&client.token) {
                warn!("could not drop unlisted client {}: {}", client.token, undo);
            }
            return Err(e);
        }
        info!("client {} created", client.token);
        Ok(client)
    }

    /// Deletes a client and reconciles the cache, dropping its entities.
    pub fn kill_client(&self, token: &str) -> Result<bool, SessionError> {
        let existed = self.store.delete(token)?;
        if existed {
            info!("client {} killed", token);
        }
        self.refresh()?;
        Ok(existed)
    }

    /// Rewrites the cached token set from the store. Entries of tokens that
    /// left are deleted; new tokens get an empty placeholder.
    pub fn refresh(&self) -> Result<(), SessionError> {
        let current = self.store.tokens()?;
        let cached = self.active_tokens()?;

        let removed: Vec<String> = cached.difference(&current).map(|t| client_key(t)).collect();
        let added: Vec<(String, Vec<u8>)> = current
            .difference(&cached)
            .map(|t| (client_key(t), Vec::new()))
            .collect();

        debug!(
            "registry refresh: {} active, {} removed, {} added",
            current.len(),
            removed.len(),
            added.len()
        );

        // A set of strings always encodes.
        let encoded = bincode::serialize(&current).unwrap_or_default();
        self.cache.set(CLIENTS_KEY, encoded)?;
        self.cache.delete_multi(&removed)?;
        self.cache.add_multi(added)?;
        Ok(())
    }
}
