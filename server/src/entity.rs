//! Simulated entities: players steered by commands and projectiles that drift.
//!
//! Both kinds share position, velocity and the time of their last physics step.
//! A projectile simply moves by `velocity * dt`. A player replaces that with a
//! sub-stepped integration of its thrust and turn intent.

use crate::error::SimulationError;
use crate::physics::{advance, Vector2};
use log::debug;
use serde::{Deserialize, Serialize};
use shared::{
    Command, EntityId, EntitySnapshot, EntityType, ACCELERATION_RATE, CONTROLLED_STEP,
    DRIFT_STEP, MAX_SPEED, MIN_REFRESH_INTERVAL, PLAYER_SPAWN, PROJECTILE_SPEED, TURN_RATE,
};
use std::f64::consts::TAU;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Thrust {
    Backward,
    #[default]
    Idle,
    Forward,
}

impl Thrust {
    pub fn factor(self) -> f64 {
        match self {
            Thrust::Backward => -1.0,
            Thrust::Idle => 0.0,
            Thrust::Forward => 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Turn {
    Left,
    #[default]
    Straight,
    Right,
}

impl Turn {
    pub fn factor(self) -> f64 {
        match self {
            Turn::Left => -1.0,
            Turn::Straight => 0.0,
            Turn::Right => 1.0,
        }
    }
}

/// State only a player carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    /// Facing in radians, always within `[0, 2π)`.
    pub direction: f64,
    pub thrust: Thrust,
    pub turn: Turn,
    pub last_packet_id: Option<u64>,
    pub last_packet_time: f64,
    /// Last measured round trip in milliseconds.
    pub ping: f64,
    /// When the last ping request arrived.
    pub ping_time: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Projectile {
    /// Player that fired it.
    pub owner: EntityId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EntityKind {
    Player(Player),
    Projectile(Projectile),
}

/// What the session has to do after a player handled a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandEffect {
    None,
    SpawnProjectile,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub position: Vector2,
    pub velocity: Vector2,
    pub last_refresh: f64,
    pub kind: EntityKind,
}

impl Entity {
    /// A fresh player at the spawn point, at rest and facing along +x.
    pub fn player(id: EntityId, now: f64) -> Self {
        Entity {
            id,
            position: Vector2::new(PLAYER_SPAWN.0, PLAYER_SPAWN.1),
            velocity: Vector2::ZERO,
            last_refresh: now,
            kind: EntityKind::Player(Player {
                direction: 0.0,
                thrust: Thrust::Idle,
                turn: Turn::Straight,
                last_packet_id: None,
                last_packet_time: now,
                ping: 0.0,
                ping_time: None,
            }),
        }
    }

    /// A projectile leaving `origin` along `direction` at fixed speed.
    pub fn projectile(
        id: EntityId,
        owner: EntityId,
        origin: Vector2,
        direction: f64,
        now: f64,
    ) -> Self {
        Entity {
            id,
            position: origin,
            velocity: Vector2::from_angle(direction).scale(PROJECTILE_SPEED),
            last_refresh: now,
            kind: EntityKind::Projectile(Projectile { owner }),
        }
    }

    pub fn entity_type(&self) -> EntityType {
        match self.kind {
            EntityKind::Player(_) => EntityType::Player,
            EntityKind::Projectile(_) => EntityType::Projectile,
        }
    }

    pub fn as_player(&self) -> Option<&Player> {
        match &self.kind {
            EntityKind::Player(player) => Some(player),
            EntityKind::Projectile(_) => None,
        }
    }

    pub fn as_player_mut(&mut self) -> Option<&mut Player> {
        match &mut self.kind {
            EntityKind::Player(player) => Some(player),
            EntityKind::Projectile(_) => None,
        }
    }

    /// Advances the entity to `now`.
    ///
    /// If the step produces a non-finite position or velocity the entity is
    /// restored to its previous state and an error is returned.
    pub fn refresh(&mut self, now: f64) -> Result<(), SimulationError> {
        let before = self.clone();

        let Entity {
            position,
            velocity,
            last_refresh,
            kind,
            ..
        } = self;
        match kind {
            EntityKind::Player(player) => player.refresh(position, velocity, last_refresh, now),
            EntityKind::Projectile(_) => {
                advance(position, velocity, now - *last_refresh);
                *last_refresh = now;
            }
        }

        if self.position.is_finite() && self.velocity.is_finite() {
            Ok(())
        } else {
            let id = self.id;
            *self = before;
            Err(SimulationError::NonFinite { id })
        }
    }

    pub fn snapshot(&self) -> EntitySnapshot {
        let (direction, ping) = match &self.kind {
            EntityKind::Player(player) => (Some(player.direction), Some(player.ping)),
            EntityKind::Projectile(_) => (None, None),
        };
        EntitySnapshot {
            kind: self.entity_type(),
            position_x: self.position.x,
            position_y: self.position.y,
            velocity_x: self.velocity.x,
            velocity_y: self.velocity.y,
            direction,
            ping,
            timestamp: self.last_refresh,
        }
    }
}

fn normalize_angle(angle: f64) -> f64 {
    let normalized = angle.rem_euclid(TAU);
    if normalized >= TAU {
        0.0
    } else {
        normalized
    }
}

impl Player {
    pub fn is_steering(&self) -> bool {
        self.thrust != Thrust::Idle || self.turn != Turn::Straight
    }

    /// Applies one client command. Packet bookkeeping is updated for every
    /// command, including unrecognized ones.
    pub fn handle_command(
        &mut self,
        command: Option<Command>,
        packet_id: u64,
        now: f64,
    ) -> CommandEffect {
        let mut effect = CommandEffect::None;
        match command {
            Some(Command::Pong) => match self.ping_time {
                Some(requested) => self.ping = (now - requested) * 1000.0,
                None => debug!("pong without a prior ping request, packet {}", packet_id),
            },
            Some(Command::Accelerate) => self.thrust = Thrust::Forward,
            Some(Command::Decelerate) => self.thrust = Thrust::Backward,
            Some(Command::Stop) => self.thrust = Thrust::Idle,
            Some(Command::TurnLeft) => self.turn = Turn::Left,
            Some(Command::TurnRight) => self.turn = Turn::Right,
            Some(Command::TurnStop) => self.turn = Turn::Straight,
            Some(Command::Shoot) => effect = CommandEffect::SpawnProjectile,
            Some(Command::PingRequest) => self.ping_time = Some(now),
            Some(Command::Refresh) | None => {}
        }

        self.last_packet_id = Some(packet_id);
        self.last_packet_time = now;
        effect
    }

    fn refresh(
        &mut self,
        position: &mut Vector2,
        velocity: &mut Vector2,
        last_refresh: &mut f64,
        now: f64,
    ) {
        let elapsed = now - *last_refresh;
        if elapsed < MIN_REFRESH_INTERVAL {
            return;
        }

        let steps = if self.is_steering() {
            (elapsed / CONTROLLED_STEP).ceil()
        } else if elapsed > DRIFT_STEP {
            (elapsed / DRIFT_STEP).ceil()
        } else {
            1.0
        };
        let dt = elapsed / steps;

        for _ in 0..steps as u64 {
            if self.turn != Turn::Straight {
                self.direction = normalize_angle(self.direction + TURN_RATE * self.turn.factor() * dt);
            }

            if self.thrust != Thrust::Idle {
                let thrust = ACCELERATION_RATE * self.thrust.factor() * dt;
                *velocity = velocity
                    .add(&Vector2::from_angle(self.direction).scale(thrust))
                    .clamp_magnitude(MAX_SPEED);
            }

            advance(position, velocity, dt);
        }

        *last_refresh = now;
    }
}
