//! Wire protocol shared by the poll server and its clients.
//!
//! Clients talk to the server with one stateless request per poll. Each request
//! carries the client's session token, a command code and a packet id; each
//! response carries the full visible world as a compact snapshot. The snapshot
//! is written by hand so the same world state always produces the same bytes,
//! and it happens to be valid JSON, so it is read back with `serde_json`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write;
use thiserror::Error;

pub const DIMENSION_X: f64 = 5000.0;
pub const DIMENSION_Y: f64 = 5000.0;
pub const PLAYER_SPAWN: (f64, f64) = (500.0, 300.0);

pub const ACCELERATION_RATE: f64 = 15.0;
pub const TURN_RATE: f64 = 0.8;
pub const MAX_SPEED: f64 = 40.0;
pub const PROJECTILE_SPEED: f64 = 75.0;

/// Players refreshed more recently than this are left alone.
pub const MIN_REFRESH_INTERVAL: f64 = 0.1;
/// Longest sub-step while a player is thrusting or turning.
pub const CONTROLLED_STEP: f64 = 0.1;
/// Longest sub-step while a player is drifting.
pub const DRIFT_STEP: f64 = 1.0;

pub type EntityId = u64;

/// Discrete client commands. The numeric codes are part of the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Command {
    Refresh = 0,
    Pong = 1,
    Accelerate = 2,
    Decelerate = 3,
    Stop = 4,
    TurnLeft = 5,
    TurnRight = 6,
    TurnStop = 7,
    Shoot = 8,
    PingRequest = 9,
}

impl Command {
    pub const ALL: [Command; 10] = [
        Command::Refresh,
        Command::Pong,
        Command::Accelerate,
        Command::Decelerate,
        Command::Stop,
        Command::TurnLeft,
        Command::TurnRight,
        Command::TurnStop,
        Command::Shoot,
        Command::PingRequest,
    ];

    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.code() == code)
    }

    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn name(self) -> &'static str {
        match self {
            Command::Refresh => "refresh",
            Command::Pong => "pong",
            Command::Accelerate => "accelerate",
            Command::Decelerate => "decelerate",
            Command::Stop => "stop",
            Command::TurnLeft => "turn_left",
            Command::TurnRight => "turn_right",
            Command::TurnStop => "turn_stop",
            Command::Shoot => "shoot",
            Command::PingRequest => "ping_request",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.name() == name)
    }
}

/// Parameters of a single poll request.
///
/// The short keys are what clients send; the long names are accepted too.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestParams {
    /// Session token, empty on first contact.
    #[serde(rename = "a", alias = "auth", default)]
    pub auth: String,
    #[serde(rename = "c", alias = "command")]
    pub command: i32,
    #[serde(rename = "q", alias = "packet_id")]
    pub packet_id: u64,
    /// Client clock in milliseconds. Informational only.
    #[serde(rename = "s", alias = "timestamp")]
    pub timestamp: u64,
}

impl RequestParams {
    pub fn new(auth: impl Into<String>, command: Command, packet_id: u64, timestamp: u64) -> Self {
        Self {
            auth: auth.into(),
            command: command.code(),
            packet_id,
            timestamp,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum EntityType {
    Player = 0,
    Projectile = 1,
}

impl TryFrom<u8> for EntityType {
    type Error = String;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        match tag {
            0 => Ok(EntityType::Player),
            1 => Ok(EntityType::Projectile),
            other => Err(format!("unknown entity type {}", other)),
        }
    }
}

impl From<EntityType> for u8 {
    fn from(kind: EntityType) -> u8 {
        kind as u8
    }
}

/// Public state of one entity as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    #[serde(rename = "t")]
    pub kind: EntityType,
    #[serde(rename = "x")]
    pub position_x: f64,
    #[serde(rename = "y")]
    pub position_y: f64,
    #[serde(rename = "u")]
    pub velocity_x: f64,
    #[serde(rename = "v")]
    pub velocity_y: f64,
    /// Facing in radians, players only.
    #[serde(rename = "d", default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<f64>,
    /// Measured round trip in milliseconds, players only.
    #[serde(rename = "p", default, skip_serializing_if = "Option::is_none")]
    pub ping: Option<f64>,
    /// Server time of the last physics step applied.
    #[serde(rename = "s")]
    pub timestamp: f64,
}

impl EntitySnapshot {
    fn write_to(&self, out: &mut String) {
        let _ = write!(
            out,
            "{{\"t\":{},\"x\":{:.6},\"y\":{:.6},\"u\":{:.6},\"v\":{:.6}",
            u8::from(self.kind),
            self.position_x,
            self.position_y,
            self.velocity_x,
            self.velocity_y
        );
        if self.kind == EntityType::Player {
            let _ = write!(
                out,
                ",\"d\":{:.6},\"p\":{}",
                self.direction.unwrap_or(0.0),
                self.ping.unwrap_or(0.0).trunc() as i64
            );
        }
        let _ = write!(out, ",\"s\":{:.6}}}", self.timestamp);
    }
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("malformed snapshot: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("welcome snapshot must carry both a player id and a token")]
    IncompleteWelcome,
}

/// A full poll response.
///
/// `player_id` and `auth` are only present when the server handed out a new
/// identity; the client is expected to adopt both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(rename = "j", default, skip_serializing_if = "Option::is_none")]
    pub player_id: Option<EntityId>,
    #[serde(rename = "a", default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<String>,
    #[serde(rename = "e")]
    pub entities: BTreeMap<EntityId, EntitySnapshot>,
}

impl Snapshot {
    pub fn world(entities: BTreeMap<EntityId, EntitySnapshot>) -> Self {
        Self {
            player_id: None,
            auth: None,
            entities,
        }
    }

    pub fn welcome(
        player_id: EntityId,
        auth: impl Into<String>,
        entities: BTreeMap<EntityId, EntitySnapshot>,
    ) -> Self {
        Self {
            player_id: Some(player_id),
            auth: Some(auth.into()),
            entities,
        }
    }

    pub fn is_welcome(&self) -> bool {
        self.player_id.is_some()
    }

    /// Writes the compact response body.
    pub fn encode(&self) -> String {
        let mut out = String::with_capacity(32 + self.entities.len() * 112);
        out.push('{');
        if let (Some(player_id), Some(auth)) = (self.player_id, &self.auth) {
            // Tokens are hex, so no escaping is needed.
            let _ = write!(out, "\"j\":{},\"a\":\"{}\",", player_id, auth);
        }
        out.push_str("\"e\":{");
        for (i, (id, entity)) in self.entities.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            let _ = write!(out, "\"{}\":", id);
            entity.write_to(&mut out);
        }
        out.push_str("}}");
        out
    }

    pub fn decode(body: &str) -> Result<Self, SnapshotError> {
        let snapshot: Snapshot = serde_json::from_str(body)?;
        if snapshot.player_id.is_some() != snapshot.auth.is_some() {
            return Err(SnapshotError::IncompleteWelcome);
        }
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn player_snapshot() -> EntitySnapshot {
        EntitySnapshot {
            kind: EntityType::Player,
            position_x: 500.0,
            position_y: 300.0,
            velocity_x: 1.5,
            velocity_y: -2.25,
            direction: Some(1.0),
            ping: Some(42.9),
            timestamp: 1000.5,
        }
    }

    fn projectile_snapshot() -> EntitySnapshot {
        EntitySnapshot {
            kind: EntityType::Projectile,
            position_x: 10.0,
            position_y: 20.0,
            velocity_x: 75.0,
            velocity_y: 0.0,
            direction: None,
            ping: None,
            timestamp: 1000.5,
        }
    }

    #[test]
    fn test_command_codes() {
        assert_eq!(Command::from_code(0), Some(Command::Refresh));
        assert_eq!(Command::from_code(8), Some(Command::Shoot));
        assert_eq!(Command::from_code(9), Some(Command::PingRequest));
        assert_eq!(Command::from_code(10), None);
        assert_eq!(Command::from_code(-1), None);

        for command in Command::ALL {
            assert_eq!(Command::from_code(command.code()), Some(command));
            assert_eq!(Command::from_name(command.name()), Some(command));
        }
    }

    #[test]
    fn test_world_encoding_is_literal() {
        let mut entities = BTreeMap::new();
        entities.insert(7, projectile_snapshot());
        entities.insert(3, player_snapshot());

        let body = Snapshot::world(entities).encode();
        assert_eq!(
            body,
            "{\"e\":{\"3\":{\"t\":0,\"x\":500.000000,\"y\":300.000000,\"u\":1.500000,\
             \"v\":-2.250000,\"d\":1.000000,\"p\":42,\"s\":1000.500000},\
             \"7\":{\"t\":1,\"x\":10.000000,\"y\":20.000000,\"u\":75.000000,\
             \"v\":0.000000,\"s\":1000.500000}}}"
        );
    }

    #[test]
    fn test_welcome_encoding_leads_with_identity() {
        let mut entities = BTreeMap::new();
        entities.insert(1, player_snapshot());

        let body = Snapshot::welcome(1, "abc123", entities).encode();
        assert!(body.starts_with("{\"j\":1,\"a\":\"abc123\",\"e\":{\"1\":{\"t\":0,"));
        assert!(body.ends_with("}}}"));
    }

    #[test]
    fn test_empty_world() {
        let body = Snapshot::world(BTreeMap::new()).encode();
        assert_eq!(body, "{\"e\":{}}");
        let decoded = Snapshot::decode(&body).unwrap();
        assert!(decoded.entities.is_empty());
        assert!(!decoded.is_welcome());
    }

    #[test]
    fn test_decode_restores_fields() {
        let mut entities = BTreeMap::new();
        entities.insert(3, player_snapshot());
        entities.insert(4, projectile_snapshot());

        let decoded = Snapshot::decode(&Snapshot::welcome(3, "feed", entities).encode()).unwrap();
        assert_eq!(decoded.player_id, Some(3));
        assert_eq!(decoded.auth.as_deref(), Some("feed"));

        let player = &decoded.entities[&3];
        assert_eq!(player.kind, EntityType::Player);
        assert_approx_eq!(player.position_x, 500.0, 1e-6);
        assert_approx_eq!(player.velocity_y, -2.25, 1e-6);
        assert_approx_eq!(player.direction.unwrap(), 1.0, 1e-6);
        // Ping goes over the wire as whole milliseconds.
        assert_approx_eq!(player.ping.unwrap(), 42.0, 1e-6);

        let projectile = &decoded.entities[&4];
        assert_eq!(projectile.kind, EntityType::Projectile);
        assert_eq!(projectile.direction, None);
        assert_approx_eq!(projectile.velocity_x, 75.0, 1e-6);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(Snapshot::decode("not a snapshot").is_err());
        assert!(Snapshot::decode("{\"e\":{\"1\":{\"t\":5,\"x\":0,\"y\":0,\"u\":0,\"v\":0,\"s\":0}}}").is_err());
        assert!(matches!(
            Snapshot::decode("{\"j\":1,\"e\":{}}"),
            Err(SnapshotError::IncompleteWelcome)
        ));
    }

    #[test]
    fn test_request_params_accept_both_key_styles() {
        let short: RequestParams =
            serde_json::from_str("{\"a\":\"tok\",\"c\":2,\"q\":5,\"s\":99}").unwrap();
        let long: RequestParams =
            serde_json::from_str("{\"auth\":\"tok\",\"command\":2,\"packet_id\":5,\"timestamp\":99}")
                .unwrap();
        assert_eq!(short, long);
        assert_eq!(short, RequestParams::new("tok", Command::Accelerate, 5, 99));

        let first_contact: RequestParams =
            serde_json::from_str("{\"c\":0,\"q\":0,\"s\":0}").unwrap();
        assert!(first_contact.auth.is_empty());
    }
}
