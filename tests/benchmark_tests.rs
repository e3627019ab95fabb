//! Performance benchmarks for critical game systems

use client::{ClientConfig, ClientWorld};
use shared::packet::{self, MAX_DATAGRAM_SIZE};
use shared::pathfinding::{astar, find_path};
use shared::{
    BuiltinLevels, CharacterType, ConnectedPlayer, Enemy, LevelId, LevelSource, Modifiers,
    ObstacleGrid, Packet, Payload, Position, Tile, TILE_SIZE,
};
use std::net::SocketAddr;
use std::time::Instant;

fn player_addr(i: u16) -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 10_000 + i))
}

/// Benchmarks A* across an open grid
#[test]
fn benchmark_astar_open_grid() {
    let grid = ObstacleGrid::open(64, 64);
    let start_tile = Tile::new(0, 0);
    let goal = Tile::new(63, 63);

    let iterations = 100;
    let start = Instant::now();

    for _ in 0..iterations {
        let path = astar(start_tile, goal, &grid).unwrap();
        assert_eq!(path.len(), 126);
    }

    let duration = start.elapsed();
    println!(
        "A* 64x64: {} iterations in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    // Should complete in under 5 seconds
    assert!(duration.as_millis() < 5000);
}

/// Benchmarks path-finding through a walled arena
#[test]
fn benchmark_find_path_in_arena() {
    let level = BuiltinLevels.load(LevelId::Arena(1)).unwrap();
    let from = Position::new(TILE_SIZE, TILE_SIZE);
    let to = Position::new(
        level.pixel_width() - 2.0 * TILE_SIZE,
        level.pixel_height() - 2.0 * TILE_SIZE,
    );

    let iterations = 1_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let _ = find_path(from, to, &level.obstacles);
    }

    let duration = start.elapsed();
    println!(
        "Arena path-finding: {} iterations in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    // Should complete in under 5 seconds
    assert!(duration.as_millis() < 5000);
}

/// Benchmarks framing and decoding a full player list
#[test]
fn benchmark_player_list_codec() {
    let players: Vec<ConnectedPlayer> = (0..20)
        .map(|i| ConnectedPlayer::new(u32::from(i), player_addr(i), 0))
        .collect();
    let payload = Payload::UpdatePlayers(players);

    let iterations = 10_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let bytes = packet::encode(&payload).unwrap();
        assert!(bytes.len() <= MAX_DATAGRAM_SIZE);
        let decoded = Packet::decode(&bytes).unwrap();
        assert_eq!(decoded.payload.packet_type(), payload.packet_type());
    }

    let duration = start.elapsed();
    println!(
        "Player list codec: {} iterations in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    // Should complete in under 2 seconds
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks client frames with a crowd of enemies path-finding
#[test]
fn benchmark_client_frame_with_enemies() {
    let mut world = ClientWorld::new(Box::new(BuiltinLevels), &ClientConfig::default()).unwrap();
    let target = player_addr(0);
    world.self_addr = Some(target);

    let spawn = world.level.spawn;
    for i in 0..30 {
        let position = Position::new(spawn.x + f64::from(i % 5) * TILE_SIZE, spawn.y + 3.0 * TILE_SIZE);
        world.enemies.push(Enemy::spawn(
            CharacterType::Zombie,
            position,
            target,
            &Modifiers::default(),
        ));
    }

    let iterations = 300;
    let start = Instant::now();

    for _ in 0..iterations {
        world.frame();
    }

    let duration = start.elapsed();
    println!(
        "Client frame, {} enemies: {} frames in {:?} ({:.2} μs/frame)",
        world.enemies.len(),
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    // Should complete in under 5 seconds
    assert!(duration.as_millis() < 5000);
}

/// Benchmarks framed packets over loopback
#[test]
fn benchmark_loopback_roundtrip() {
    tokio_test::block_on(async {
        let sender = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let receiver = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let to = receiver.local_addr().unwrap();
        let data = packet::encode(&Payload::KeepAlive).unwrap();

        let iterations = 1_000;
        let mut buffer = [0u8; MAX_DATAGRAM_SIZE];
        let start = Instant::now();

        for _ in 0..iterations {
            sender.send_to(&data, to).await.unwrap();
            let (len, _) = receiver.recv_from(&mut buffer).await.unwrap();
            assert_eq!(Packet::decode(&buffer[..len]).unwrap().payload, Payload::KeepAlive);
        }

        let duration = start.elapsed();
        println!(
            "Loopback roundtrip: {} packets in {:?} ({:.2} μs/packet)",
            iterations,
            duration,
            duration.as_micros() as f64 / iterations as f64
        );

        // Should complete in under 2 seconds
        assert!(duration.as_millis() < 2000);
    });
}
