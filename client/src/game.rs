//! Local mirror of the server world.
//!
//! Snapshots are authoritative for every entity except our own player, which
//! is predicted locally from the commands we send and only snapped back to the
//! server state on every tenth packet.

use shared::{
    Command, EntityId, EntitySnapshot, EntityType, Snapshot, ACCELERATION_RATE, DIMENSION_X,
    DIMENSION_Y, MAX_SPEED, TURN_RATE,
};
use std::collections::BTreeMap;

/// Own-player corrections are taken from every n-th packet.
pub const CORRECTION_INTERVAL: u64 = 10;

fn wrap(value: f64, dimension: f64) -> f64 {
    let wrapped = value.rem_euclid(dimension);
    if wrapped >= dimension {
        0.0
    } else {
        wrapped
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MirrorEntity {
    pub kind: EntityType,
    pub x: f64,
    pub y: f64,
    pub velocity_x: f64,
    pub velocity_y: f64,
    pub direction: f64,
    /// Server-measured round trip, players only.
    pub ping: Option<f64>,
    /// Server timestamp of the state we hold. `None` until the first update.
    pub last_update: Option<f64>,
}

impl MirrorEntity {
    fn new(kind: EntityType) -> Self {
        Self {
            kind,
            x: 0.0,
            y: 0.0,
            velocity_x: 0.0,
            velocity_y: 0.0,
            direction: 0.0,
            ping: None,
            last_update: None,
        }
    }

    fn is_older_than(&self, timestamp: f64) -> bool {
        self.last_update.map_or(true, |seen| seen < timestamp)
    }

    fn take(&mut self, data: &EntitySnapshot, lead_seconds: Option<f64>) {
        self.x = data.position_x;
        self.y = data.position_y;
        self.velocity_x = data.velocity_x;
        self.velocity_y = data.velocity_y;
        if let Some(direction) = data.direction {
            self.direction = direction;
        }
        self.last_update = Some(data.timestamp);

        if let Some(lead) = lead_seconds {
            self.drift(lead);
        }
    }

    fn drift(&mut self, dt: f64) {
        self.x = wrap(self.x + self.velocity_x * dt, DIMENSION_X);
        self.y = wrap(self.y + self.velocity_y * dt, DIMENSION_Y);
    }
}

/// Thrust and turn intent of our own player, as last commanded.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Steering {
    pub thrust: f64,
    pub turn: f64,
}

impl Steering {
    pub fn apply(&mut self, command: Command) {
        match command {
            Command::Accelerate => self.thrust = 1.0,
            Command::Decelerate => self.thrust = -1.0,
            Command::Stop => self.thrust = 0.0,
            Command::TurnLeft => self.turn = -1.0,
            Command::TurnRight => self.turn = 1.0,
            Command::TurnStop => self.turn = 0.0,
            _ => {}
        }
    }
}

#[derive(Debug, Default)]
pub struct ClientGameState {
    pub player_id: Option<EntityId>,
    pub entities: BTreeMap<EntityId, MirrorEntity>,
    pub steering: Steering,
}

impl ClientGameState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn player(&self) -> Option<&MirrorEntity> {
        self.player_id.and_then(|id| self.entities.get(&id))
    }

    /// Merges one poll response.
    ///
    /// `packet_id` is the id of the request the response answers and
    /// `round_trip_ms` the locally measured time for it, used to push
    /// positions forward to "now".
    pub fn apply_snapshot(
        &mut self,
        snapshot: &Snapshot,
        packet_id: u64,
        round_trip_ms: Option<f64>,
    ) {
        // A welcome always carries a freshly spawned player.
        if let Some(player_id) = snapshot.player_id {
            self.player_id = Some(player_id);
            self.steering = Steering::default();
        }

        self.entities
            .retain(|id, _| snapshot.entities.contains_key(id));

        let lead = round_trip_ms.map(|ms| ms / 1000.0);
        let correct_own = packet_id % CORRECTION_INTERVAL == 0;

        for (id, data) in &snapshot.entities {
            let entity = self
                .entities
                .entry(*id)
                .or_insert_with(|| MirrorEntity::new(data.kind));
            entity.kind = data.kind;
            if data.ping.is_some() {
                entity.ping = data.ping;
            }

            let own = Some(*id) == self.player_id;
            let first_sight = entity.last_update.is_none();
            if (first_sight || !own || correct_own) && entity.is_older_than(data.timestamp) {
                entity.take(data, lead);
            }
        }
    }

    /// Records a command we just sent so prediction follows it.
    pub fn apply_command(&mut self, command: Command) {
        self.steering.apply(command);
    }

    /// Advances the local view by `dt` seconds.
    pub fn step(&mut self, dt: f64) {
        let own = self.player_id;
        let steering = self.steering;
        for (id, entity) in self.entities.iter_mut() {
            if Some(*id) == own {
                entity.direction += TURN_RATE * steering.turn * dt;
                let thrust = ACCELERATION_RATE * steering.thrust * dt;
                entity.velocity_x += entity.direction.cos() * thrust;
                entity.velocity_y += entity.direction.sin() * thrust;

                let speed = entity.velocity_x.hypot(entity.velocity_y);
                if speed > MAX_SPEED {
                    let factor = MAX_SPEED / speed;
                    entity.velocity_x *= factor;
                    entity.velocity_y *= factor;
                }
            }
            entity.drift(dt);
        }
    }
}
