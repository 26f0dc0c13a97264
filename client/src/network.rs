use crate::game::ClientGameState;
use log::{debug, info, warn};
use shared::{Command, RequestParams, Snapshot, SnapshotError};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server answered with status {0}")]
    Status(u16),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

fn timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as u64
}

/// Polling client holding the session identity and a mirror of the world.
pub struct Client {
    http: reqwest::Client,
    url: String,
    auth: String,
    next_packet: u64,
    sent_packets: u64,
    round_trip_ms: Option<f64>,
    pub game_state: ClientGameState,
}

impl Client {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: url.into(),
            auth: String::new(),
            next_packet: 0,
            sent_packets: 0,
            round_trip_ms: None,
            game_state: ClientGameState::new(),
        }
    }

    /// Session token, empty until the server hands one out.
    pub fn auth(&self) -> &str {
        &self.auth
    }

    pub fn is_connected(&self) -> bool {
        !self.auth.is_empty()
    }

    pub fn round_trip_ms(&self) -> Option<f64> {
        self.round_trip_ms
    }

    pub fn sent_packets(&self) -> u64 {
        self.sent_packets
    }

    /// Sends one command and merges the response into the local mirror.
    pub async fn send(&mut self, command: Command) -> Result<Snapshot, ClientError> {
        let packet_id = self.next_packet;
        self.next_packet += 1;
        let params = RequestParams::new(self.auth.clone(), command, packet_id, timestamp_ms());

        if self.is_connected() {
            self.game_state.apply_command(command);
        }

        let started = Instant::now();
        let response = self.http.get(&self.url).query(&params).send().await?;
        self.sent_packets += 1;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status(status.as_u16()));
        }
        let body = response.text().await?;
        let snapshot = Snapshot::decode(&body)?;

        let round_trip = started.elapsed().as_secs_f64() * 1000.0;
        self.round_trip_ms = Some(round_trip);
        debug!(
            "{} (packet {}) answered in {:.1}ms with {} entities",
            command.name(),
            packet_id,
            round_trip,
            snapshot.entities.len()
        );

        if let (Some(player_id), Some(auth)) = (snapshot.player_id, &snapshot.auth) {
            if *auth == self.auth {
                warn!("player lost, respawned as player {}", player_id);
            } else if self.is_connected() {
                warn!("session expired, now player {}", player_id);
            } else {
                info!("joined as player {}", player_id);
            }
            self.auth = auth.clone();
        }

        self.game_state
            .apply_snapshot(&snapshot, packet_id, self.round_trip_ms);
        Ok(snapshot)
    }

    /// Asks the server to time a round trip: a ping request immediately
    /// followed by the pong.
    pub async fn ping(&mut self) -> Result<Option<f64>, ClientError> {
        self.send(Command::PingRequest).await?;
        self.send(Command::Pong).await?;
        Ok(self.game_state.player().and_then(|player| player.ping))
    }

    /// Human-readable connection summary.
    pub fn status(&self) -> String {
        let local = self
            .round_trip_ms
            .map_or("?".to_string(), |ms| format!("{:.0}ms", ms));
        let server = self
            .game_state
            .player()
            .and_then(|player| player.ping)
            .map_or("?".to_string(), |ms| format!("{:.0}ms", ms));

        let mut status = format!(
            "Local/server ping: {} / {}, packets sent: {}, entities: {}",
            local,
            server,
            self.sent_packets,
            self.game_state.entities.len()
        );
        if let (Some(id), Some(player)) = (self.game_state.player_id, self.game_state.player()) {
            status.push_str(&format!(
                ", player {} at ({:.1}, {:.1}) facing {:.2}",
                id, player.x, player.y, player.direction
            ));
        }
        status
    }
}
