//! Per-request session state.
//!
//! Nothing survives between requests in process memory. A [`Session`] is
//! rebuilt from the shared cache on every request: the caller's own entities
//! (which it may change) and every other session's entities (which it only
//! shows). At the end of the request the own entities are written back.
//!
//! The load/modify/store cycle is not atomic. Two requests carrying the same
//! token at the same time both load the same entities and the one that
//! persists last overwrites the other's work.

use crate::cache::Cache;
use crate::entity::{CommandEffect, Entity};
use crate::error::SessionError;
use crate::registry::{client_key, ClientRegistry, ClientStore};
use log::{debug, info, warn};
use shared::{Command, EntityId, EntitySnapshot};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

/// Cache key of the process-wide entity id counter.
pub const NEXT_ID_KEY: &str = "next_id";

/// Allocations tried before giving up on an id counter that keeps colliding.
const MAX_ID_ATTEMPTS: usize = 4;

type EntityMap = BTreeMap<EntityId, Entity>;

fn decode_entities(blob: &[u8]) -> Result<EntityMap, bincode::Error> {
    // An empty blob is the registry's placeholder for "no entities yet".
    if blob.is_empty() {
        Ok(EntityMap::new())
    } else {
        bincode::deserialize(blob)
    }
}

pub struct Session<'a> {
    cache: &'a dyn Cache,
    registry: ClientRegistry<'a>,
    now: f64,
    auth: Option<String>,
    /// Entities this session owns and persists.
    owned: EntityMap,
    /// Entities of every other active session, read-only.
    others: EntityMap,
    player_id: Option<EntityId>,
}

impl<'a> Session<'a> {
    /// An unauthenticated session with no entities.
    pub fn new(cache: &'a dyn Cache, store: &'a dyn ClientStore, now: f64) -> Self {
        Self {
            cache,
            registry: ClientRegistry::new(cache, store),
            now,
            auth: None,
            owned: EntityMap::new(),
            others: EntityMap::new(),
            player_id: None,
        }
    }

    /// Loads the session for `auth`, or starts a new one with a fresh client
    /// and player when the token is empty, unknown or evicted.
    pub fn resolve(
        cache: &'a dyn Cache,
        store: &'a dyn ClientStore,
        auth: &str,
        now: f64,
    ) -> Result<Self, SessionError> {
        let mut session = Session::new(cache, store, now);

        let tokens = session.registry.active_tokens()?;
        if !tokens.is_empty() {
            for (token, blob) in session.registry.session_blobs(&tokens)? {
                let entities = decode_entities(&blob).unwrap_or_else(|e| {
                    warn!("discarding unreadable entities of client {}: {}", token, e);
                    EntityMap::new()
                });

                if !auth.is_empty() && token == auth {
                    session.auth = Some(token);
                    session.owned = entities;
                } else {
                    session.others.extend(entities);
                }
            }

            session.player_id = session
                .owned
                .values()
                .find(|entity| entity.as_player().is_some())
                .map(|entity| entity.id);
        }

        if session.auth.is_none() {
            // The id comes first: once the client is listed nothing may fail.
            let player_id = session.next_id()?;
            let client = session.registry.create_client()?;
            session.auth = Some(client.token);
            session.owned.insert(player_id, Entity::player(player_id, now));
            session.player_id = Some(player_id);
            info!("new session with player {}", player_id);
        } else {
            debug!(
                "resumed session, {} owned and {} foreign entities",
                session.owned.len(),
                session.others.len()
            );
        }

        Ok(session)
    }

    pub fn auth(&self) -> Option<&str> {
        self.auth.as_deref()
    }

    pub fn now(&self) -> f64 {
        self.now
    }

    pub fn player_id(&self) -> Option<EntityId> {
        self.player_id
    }

    pub fn player(&self) -> Option<&Entity> {
        self.player_id.and_then(|id| self.owned.get(&id))
    }

    pub fn owned(&self) -> &BTreeMap<EntityId, Entity> {
        &self.owned
    }

    /// Every entity the client gets to see: its own plus everybody else's.
    pub fn visible_entities(&self) -> BTreeMap<EntityId, &Entity> {
        self.others
            .iter()
            .chain(self.owned.iter())
            .map(|(id, entity)| (*id, entity))
            .collect()
    }

    pub fn snapshot_entities(&self) -> BTreeMap<EntityId, EntitySnapshot> {
        self.visible_entities()
            .into_iter()
            .map(|(id, entity)| (id, entity.snapshot()))
            .collect()
    }

    fn is_taken(&self, id: EntityId) -> bool {
        self.owned.contains_key(&id) || self.others.contains_key(&id)
    }

    /// Draws the next id from the shared counter. An evicted counter restarts
    /// at 1, so an id that is already visible moves the counter past the
    /// highest visible id and draws again.
    fn next_id(&self) -> Result<EntityId, SessionError> {
        let mut id = self.cache.incr(NEXT_ID_KEY)?;
        for _ in 1..MAX_ID_ATTEMPTS {
            if !self.is_taken(id) {
                return Ok(id);
            }
            let highest = self
                .owned
                .keys()
                .chain(self.others.keys())
                .copied()
                .max()
                .unwrap_or(0)
                .max(id);
            warn!("entity id {} already in use, moving counter past {}", id, highest);
            self.cache.set(NEXT_ID_KEY, highest.to_le_bytes().to_vec())?;
            id = self.cache.incr(NEXT_ID_KEY)?;
        }
        if self.is_taken(id) {
            return Err(SessionError::IdInUse { id });
        }
        Ok(id)
    }

    fn allocate_id(&self) -> Result<EntityId, SessionError> {
        if self.auth.is_none() {
            return Err(SessionError::NotAuthenticated);
        }
        self.next_id()
    }

    /// Adds an owned entity. Existing entities are never replaced.
    fn insert(&mut self, entity: Entity) -> Result<EntityId, SessionError> {
        match self.owned.entry(entity.id) {
            Entry::Occupied(_) => Err(SessionError::IdInUse { id: entity.id }),
            Entry::Vacant(slot) => Ok(slot.insert(entity).id),
        }
    }

    /// Creates this session's player at the spawn point.
    pub fn spawn_player(&mut self) -> Result<EntityId, SessionError> {
        let id = self.allocate_id()?;
        self.insert(Entity::player(id, self.now))?;
        self.player_id = Some(id);
        Ok(id)
    }

    /// Fires a projectile from the player's position along its facing.
    pub fn spawn_projectile(&mut self) -> Result<EntityId, SessionError> {
        let (owner, origin, direction) = {
            let player = self.player().ok_or(SessionError::PlayerNotFound)?;
            let state = player.as_player().ok_or(SessionError::PlayerNotFound)?;
            (player.id, player.position, state.direction)
        };

        let id = self.allocate_id()?;
        self.insert(Entity::projectile(id, owner, origin, direction, self.now))
    }

    /// Routes a raw command code to this session's player. Unknown codes only
    /// update packet bookkeeping.
    pub fn dispatch(&mut self, code: i32, packet_id: u64) -> Result<(), SessionError> {
        let now = self.now;
        let command = Command::from_code(code);
        if command.is_none() {
            debug!("unknown command {} in packet {}", code, packet_id);
        }

        let player = self
            .player_id
            .and_then(|id| self.owned.get_mut(&id))
            .and_then(Entity::as_player_mut)
            .ok_or(SessionError::PlayerNotFound)?;

        match player.handle_command(command, packet_id, now) {
            CommandEffect::SpawnProjectile => {
                let id = self.spawn_projectile()?;
                debug!("packet {} fired projectile {}", packet_id, id);
            }
            CommandEffect::None => {}
        }
        Ok(())
    }

    /// Steps every owned entity to `now`. A failing entity is left unchanged
    /// and does not stop the others. Returns how many failed.
    pub fn refresh_all(&mut self) -> usize {
        let now = self.now;
        let mut failures = 0;
        for entity in self.owned.values_mut() {
            if let Err(e) = entity.refresh(now) {
                warn!("{}", e);
                failures += 1;
            }
        }
        failures
    }

    /// Writes the owned entities back under this session's token. Without a
    /// token there is nothing to write.
    pub fn persist(&self) -> Result<(), SessionError> {
        let Some(auth) = &self.auth else {
            debug!("skipping persist of unauthenticated session");
            return Ok(());
        };
        let blob = bincode::serialize(&self.owned)?;
        self.cache.set(&client_key(auth), blob)?;
        Ok(())
    }

    pub fn update(&mut self) -> Result<(), SessionError> {
        let failures = self.refresh_all();
        if failures > 0 {
            debug!("{} of {} entities kept their previous state", failures, self.owned.len());
        }
        self.persist()
    }

    /// Ends the session: deletes its client and drops its cached entities.
    pub fn kill(self) -> Result<bool, SessionError> {
        match &self.auth {
            Some(auth) => self.registry.kill_client(auth),
            None => Ok(false),
        }
    }
}
