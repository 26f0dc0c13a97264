//! Performance benchmarks for the per-request hot paths

use rand::Rng;
use server::entity::Entity;
use server::game::Game;
use server::physics::Vector2;
use shared::{Command, EntityId, RequestParams, Snapshot};
use std::collections::BTreeMap;
use std::time::Instant;

const T0: f64 = 1_700_000_000.0;

fn random_projectiles(count: u64) -> Vec<Entity> {
    let mut rng = rand::thread_rng();
    (0..count)
        .map(|id| {
            Entity::projectile(
                id,
                0,
                Vector2::new(rng.gen_range(0.0..5000.0), rng.gen_range(0.0..5000.0)),
                rng.gen_range(0.0..std::f64::consts::TAU),
                T0,
            )
        })
        .collect()
}

/// Benchmarks a steered player catching up on a long gap
#[test]
fn benchmark_player_refresh() {
    let iterations = 10_000;
    let start = Instant::now();

    for i in 0..iterations {
        let mut entity = Entity::player(i, T0);
        if let Some(player) = entity.as_player_mut() {
            player.handle_command(Some(Command::Accelerate), 1, T0);
            player.handle_command(Some(Command::TurnLeft), 2, T0);
        }
        // Ten seconds of steering is a hundred sub-steps.
        entity.refresh(T0 + 10.0).unwrap();
    }

    let duration = start.elapsed();
    println!(
        "Player refresh: {} iterations in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    // Should complete in under 3 seconds even unoptimized
    assert!(duration.as_millis() < 3000);
}

/// Benchmarks snapshot encoding of a crowded world
#[test]
fn benchmark_snapshot_encoding() {
    let entities: BTreeMap<EntityId, _> = random_projectiles(1_000)
        .iter()
        .map(|e| (e.id, e.snapshot()))
        .collect();
    let snapshot = Snapshot::world(entities);

    let iterations = 100;
    let start = Instant::now();
    let mut bytes = 0;

    for _ in 0..iterations {
        bytes += snapshot.encode().len();
    }

    let duration = start.elapsed();
    println!(
        "Snapshot encoding: {} iterations in {:?} ({} bytes total)",
        iterations, duration, bytes
    );

    assert!(duration.as_millis() < 2000);
    assert_eq!(Snapshot::decode(&snapshot.encode()).unwrap().entities.len(), 1_000);
}

/// Benchmarks full requests against the in-memory backend
#[test]
fn benchmark_request_handling() {
    let game = Game::in_memory();
    let tokens: Vec<String> = (0..20)
        .filter_map(|_| {
            game.handle(&RequestParams::new("", Command::Refresh, 0, 0), T0)
                .ok()
                .and_then(|snapshot| snapshot.auth)
        })
        .collect();
    assert_eq!(tokens.len(), 20);

    let iterations = 2_000;
    let start = Instant::now();

    for i in 0..iterations {
        let token = &tokens[i % tokens.len()];
        let now = T0 + i as f64 * 0.01;
        let snapshot = game
            .handle(&RequestParams::new(token.as_str(), Command::Refresh, i as u64, 0), now)
            .unwrap();
        assert!(!snapshot.is_welcome());
    }

    let duration = start.elapsed();
    println!(
        "Request handling: {} iterations in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert!(duration.as_millis() < 5000);
}
