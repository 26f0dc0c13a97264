use crate::cache::{Cache, MemoryCache};
use crate::error::SessionError;
use crate::registry::{ClientRegistry, ClientStore, MemoryClientStore};
use crate::session::Session;
use log::{debug, info, warn};
use shared::{RequestParams, Snapshot};
use std::sync::Arc;

/// Entry point for one poll request. Holds only handles to shared storage;
/// all game state lives in the cache between requests.
#[derive(Clone)]
pub struct Game {
    cache: Arc<dyn Cache>,
    store: Arc<dyn ClientStore>,
}

impl Game {
    pub fn new(cache: Arc<dyn Cache>, store: Arc<dyn ClientStore>) -> Self {
        Self { cache, store }
    }

    /// A game backed by process-local storage.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryCache::new()), Arc::new(MemoryClientStore::new()))
    }

    /// Runs one request at time `now` and returns the snapshot to send back.
    ///
    /// The command is only applied when the submitted token named a live
    /// session that still has a player. Otherwise the response is a welcome
    /// carrying the token and a freshly spawned player.
    pub fn handle(&self, params: &RequestParams, now: f64) -> Result<Snapshot, SessionError> {
        let mut session =
            Session::resolve(self.cache.as_ref(), self.store.as_ref(), &params.auth, now)?;
        let mut resumed =
            !params.auth.is_empty() && session.auth() == Some(params.auth.as_str());

        if resumed && session.player().is_none() {
            let player_id = session.spawn_player()?;
            info!("session without a player, respawned as player {}", player_id);
            resumed = false;
        }

        if resumed {
            if let Err(e) = session.dispatch(params.command, params.packet_id) {
                warn!("command {} (packet {}) dropped: {}", params.command, params.packet_id, e);
            }
        }

        session.update()?;
        let entities = session.snapshot_entities();
        debug!(
            "packet {} at {:.3}: {} visible entities",
            params.packet_id,
            now,
            entities.len()
        );

        if resumed {
            return Ok(Snapshot::world(entities));
        }

        let player_id = session.player_id().ok_or(SessionError::PlayerNotFound)?;
        let auth = session.auth().ok_or(SessionError::NotAuthenticated)?;
        Ok(Snapshot::welcome(player_id, auth.to_string(), entities))
    }

    /// Removes a client and everything it owns. Returns whether it existed.
    pub fn end_session(&self, auth: &str) -> Result<bool, SessionError> {
        ClientRegistry::new(self.cache.as_ref(), self.store.as_ref()).kill_client(auth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::CLIENTS_KEY;
    use crate::session::NEXT_ID_KEY;
    use assert_approx_eq::assert_approx_eq;
    use shared::{Command, EntityType, PROJECTILE_SPEED};

    const T0: f64 = 1_700_000_000.0;

    fn poll(game: &Game, auth: &str, command: Command, packet_id: u64, now: f64) -> Snapshot {
        game.handle(&RequestParams::new(auth, command, packet_id, 0), now)
            .unwrap()
    }

    #[test]
    fn test_first_contact_gets_welcome() {
        let game = Game::in_memory();
        let snapshot = poll(&game, "", Command::Refresh, 0, T0);

        assert!(snapshot.is_welcome());
        let player_id = snapshot.player_id.unwrap();
        let player = &snapshot.entities[&player_id];
        assert_eq!(player.kind, EntityType::Player);
        assert_eq!((player.position_x, player.position_y), (500.0, 300.0));
        assert_eq!(player.timestamp, T0);
    }

    #[test]
    fn test_first_contact_ignores_command() {
        let game = Game::in_memory();
        let snapshot = poll(&game, "", Command::Shoot, 1, T0);
        assert_eq!(snapshot.entities.len(), 1);
    }

    #[test]
    fn test_resumed_request_gets_world_snapshot() {
        let game = Game::in_memory();
        let welcome = poll(&game, "", Command::Refresh, 0, T0);
        let token = welcome.auth.unwrap();

        let snapshot = poll(&game, &token, Command::Refresh, 1, T0 + 1.0);
        assert!(!snapshot.is_welcome());
        assert!(snapshot.entities.contains_key(&welcome.player_id.unwrap()));
    }

    #[test]
    fn test_accelerate_then_refresh_moves_player() {
        let game = Game::in_memory();
        let welcome = poll(&game, "", Command::Refresh, 0, T0);
        let token = welcome.auth.unwrap();
        let id = welcome.player_id.unwrap();

        poll(&game, &token, Command::Accelerate, 1, T0);
        let snapshot = poll(&game, &token, Command::Refresh, 2, T0 + 1.0);
        let player = &snapshot.entities[&id];
        assert_approx_eq!(player.velocity_x, 15.0, 1e-9);
        assert_approx_eq!(player.position_x, 508.25, 1e-6);
        assert_eq!(player.timestamp, T0 + 1.0);
    }

    #[test]
    fn test_shoot_adds_projectile() {
        let game = Game::in_memory();
        let token = poll(&game, "", Command::Refresh, 0, T0).auth.unwrap();

        let snapshot = poll(&game, &token, Command::Shoot, 1, T0 + 0.5);
        let projectiles: Vec<_> = snapshot
            .entities
            .values()
            .filter(|e| e.kind == EntityType::Projectile)
            .collect();
        assert_eq!(projectiles.len(), 1);
        assert_approx_eq!(projectiles[0].velocity_x, PROJECTILE_SPEED, 1e-9);
    }

    #[test]
    fn test_ping_round_trip() {
        let game = Game::in_memory();
        let welcome = poll(&game, "", Command::Refresh, 0, T0);
        let token = welcome.auth.unwrap();
        let id = welcome.player_id.unwrap();

        poll(&game, &token, Command::PingRequest, 1, T0 + 1.0);
        let snapshot = poll(&game, &token, Command::Pong, 2, T0 + 1.25);
        assert_eq!(snapshot.entities[&id].ping, Some(250.0));
    }

    #[test]
    fn test_sessions_see_each_other() {
        let game = Game::in_memory();
        let first = poll(&game, "", Command::Refresh, 0, T0);
        let second = poll(&game, "", Command::Refresh, 0, T0);

        let snapshot = poll(&game, &first.auth.unwrap(), Command::Refresh, 1, T0);
        assert!(snapshot.entities.contains_key(&first.player_id.unwrap()));
        assert!(snapshot.entities.contains_key(&second.player_id.unwrap()));
    }

    #[test]
    fn test_session_without_player_respawns() {
        let game = Game::in_memory();
        let client = ClientRegistry::new(game.cache.as_ref(), game.store.as_ref())
            .create_client()
            .unwrap();

        let snapshot = poll(&game, &client.token, Command::Shoot, 1, T0);
        assert!(snapshot.is_welcome());
        assert_eq!(snapshot.auth.as_deref(), Some(client.token.as_str()));
        let player_id = snapshot.player_id.unwrap();
        assert_eq!(snapshot.entities.len(), 1);
        assert_eq!(snapshot.entities[&player_id].kind, EntityType::Player);

        let next = poll(&game, &client.token, Command::Shoot, 2, T0 + 0.5);
        assert!(!next.is_welcome());
        assert_eq!(next.entities.len(), 2);
    }

    #[test]
    fn test_lost_player_respawns_after_counter_eviction() {
        let cache = Arc::new(MemoryCache::new());
        let game = Game::new(cache.clone(), Arc::new(MemoryClientStore::new()));
        let welcome = poll(&game, "", Command::Refresh, 0, T0);
        let token = welcome.auth.unwrap();
        let player_id = welcome.player_id.unwrap();

        cache.evict(NEXT_ID_KEY);
        let snapshot = poll(&game, &token, Command::Shoot, 1, T0 + 1.0);
        assert!(!snapshot.is_welcome());
        assert_eq!(snapshot.entities[&player_id].kind, EntityType::Player);
        assert_eq!(snapshot.entities.len(), 2);

        let snapshot = poll(&game, &token, Command::Accelerate, 2, T0 + 2.0);
        assert!(!snapshot.is_welcome());
    }

    #[test]
    fn test_end_session_removes_player() {
        let game = Game::in_memory();
        let first = poll(&game, "", Command::Refresh, 0, T0);
        let second = poll(&game, "", Command::Refresh, 0, T0);
        let token = first.auth.unwrap();

        assert!(game.end_session(&token).unwrap());
        assert!(!game.end_session(&token).unwrap());

        let snapshot = poll(&game, &second.auth.unwrap(), Command::Refresh, 1, T0);
        assert!(!snapshot.entities.contains_key(&first.player_id.unwrap()));

        // A killed token starts over.
        let again = poll(&game, &token, Command::Refresh, 2, T0);
        assert!(again.is_welcome());
    }

    #[test]
    fn test_recovers_after_client_list_eviction() {
        let cache = Arc::new(MemoryCache::new());
        let game = Game::new(cache.clone(), Arc::new(MemoryClientStore::new()));
        let token = poll(&game, "", Command::Refresh, 0, T0).auth.unwrap();

        cache.evict(CLIENTS_KEY);
        let snapshot = poll(&game, &token, Command::Refresh, 1, T0);
        assert!(snapshot.is_welcome());
        assert_ne!(snapshot.auth.as_deref(), Some(token.as_str()));
    }
}
