//! Wire protocol: fixed big-endian header followed by a bincode payload.
//!
//! ```text
//! type:1 | headerSize:4 | magic:4 | timestamp:8 | payloadSize:4 | totalSize:4 | payload...
//! ```
//!
//! The header is written field by field so its layout never depends on the
//! payload codec. The payload shape is selected by the header's type tag.

use bytes::{Buf, BufMut, BytesMut};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use thiserror::Error;

use crate::enemy::Enemy;
use crate::level::LevelId;
use crate::modifier::Modifiers;
use crate::player::ConnectedPlayer;
use crate::round::RoundState;
use crate::weapon::{Bullet, WeaponType};
use crate::{get_timestamp, Position};

/// Sentinel every valid packet carries.
pub const MAGIC: u32 = 73_458_339;

/// `1 + 4 + 4 + 8 + 4 + 4`
pub const HEADER_SIZE: u32 = 25;

/// Receive buffer size used by every socket loop.
pub const MAX_DATAGRAM_SIZE: usize = 2048;

#[derive(Debug, Error)]
pub enum PacketError {
    #[error("packet truncated: got {0} bytes")]
    Truncated(usize),
    #[error("packet has invalid magic bytes {0:#x}")]
    InvalidMagic(u32),
    #[error("packet has invalid sizes: header {header} + payload {payload} != total {total}")]
    InvalidSize { header: u32, payload: u32, total: u32 },
    #[error("unknown packet type tag {0}")]
    UnknownType(u8),
    #[error("payload codec error: {0}")]
    Payload(#[from] bincode::Error),
}

/// Packet type tags. The numeric values are part of the wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketType {
    MatchFind = 1,
    MatchHost,
    MatchStart,
    MatchConnect,
    Negotiate,
    KeepAlive,
    Disconnect,
    UpdateCurrentPlayer,
    UpdatePlayers,
    BulletStart,
    PlayerHit,
    ServerEvent,
    ClientToggleReady,
    ServerStateChanged,
    PlayerRoll,
    ModifiersUpdated,
    ModifierChosen,
}

impl PacketType {
    pub const ALL: [PacketType; 17] = [
        PacketType::MatchFind,
        PacketType::MatchHost,
        PacketType::MatchStart,
        PacketType::MatchConnect,
        PacketType::Negotiate,
        PacketType::KeepAlive,
        PacketType::Disconnect,
        PacketType::UpdateCurrentPlayer,
        PacketType::UpdatePlayers,
        PacketType::BulletStart,
        PacketType::PlayerHit,
        PacketType::ServerEvent,
        PacketType::ClientToggleReady,
        PacketType::ServerStateChanged,
        PacketType::PlayerRoll,
        PacketType::ModifiersUpdated,
        PacketType::ModifierChosen,
    ];

    pub fn from_tag(tag: u8) -> Option<Self> {
        tag.checked_sub(1)
            .and_then(|index| Self::ALL.get(index as usize).copied())
    }

    pub fn tag(self) -> u8 {
        self as u8
    }
}

/// Decoded fixed header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub packet_type: PacketType,
    pub header_size: u32,
    pub magic: u32,
    /// Sender's wall clock in milliseconds since the unix epoch.
    pub timestamp: u64,
    pub payload_size: u32,
    pub total_size: u32,
}

/// Join keyword exchanged with the mediation service.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Rendezvous {
    pub keyword: String,
}

impl Rendezvous {
    pub fn new(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
        }
    }
}

/// Negotiate payload. Clients send [`Handshake::hello`]; the server answers
/// with the id it assigned and the address it sees the client at.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Handshake {
    pub player_id: u32,
    pub observed_addr: Option<SocketAddr>,
}

impl Handshake {
    pub fn hello() -> Self {
        Self {
            player_id: 0,
            observed_addr: None,
        }
    }
}

/// Client's own view of itself, sent a few times per second.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PlayerUpdate {
    pub position: Position,
    pub rotation: f64,
    pub weapon: WeaponType,
    pub rolling: bool,
    pub life: i32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct HitInfo {
    pub player: SocketAddr,
    pub damage: i32,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    NewLevel,
    SpawnEnemies,
    SpawnBoon,
    PrepareNewLevel,
    PlayerDied,
    GameOver,
}

/// Server event. Only the fields relevant to `kind` are populated.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Event {
    pub kind: EventKind,
    pub enemies: Vec<Enemy>,
    pub level: LevelId,
    pub modifiers: Vec<Modifiers>,
}

impl Event {
    pub fn spawn_enemies(enemies: Vec<Enemy>) -> Self {
        Self {
            kind: EventKind::SpawnEnemies,
            enemies,
            level: LevelId::Lobby,
            modifiers: Vec::new(),
        }
    }
}

/// Typed payload; the variant determines the header's type tag.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    MatchFind(Rendezvous),
    MatchHost(Rendezvous),
    MatchStart(Rendezvous),
    MatchConnect(SocketAddr),
    Negotiate(Handshake),
    KeepAlive,
    Disconnect,
    UpdateCurrentPlayer(PlayerUpdate),
    UpdatePlayers(Vec<ConnectedPlayer>),
    BulletStart(Bullet),
    PlayerHit(HitInfo),
    ServerEvent(Event),
    ClientToggleReady,
    ServerStateChanged(RoundState),
    PlayerRoll,
    ModifiersUpdated(Modifiers),
    ModifierChosen(Modifiers),
}

fn body<T: DeserializeOwned>(raw: &[u8]) -> Result<T, PacketError> {
    Ok(bincode::deserialize(raw)?)
}

impl Payload {
    pub fn packet_type(&self) -> PacketType {
        match self {
            Payload::MatchFind(_) => PacketType::MatchFind,
            Payload::MatchHost(_) => PacketType::MatchHost,
            Payload::MatchStart(_) => PacketType::MatchStart,
            Payload::MatchConnect(_) => PacketType::MatchConnect,
            Payload::Negotiate(_) => PacketType::Negotiate,
            Payload::KeepAlive => PacketType::KeepAlive,
            Payload::Disconnect => PacketType::Disconnect,
            Payload::UpdateCurrentPlayer(_) => PacketType::UpdateCurrentPlayer,
            Payload::UpdatePlayers(_) => PacketType::UpdatePlayers,
            Payload::BulletStart(_) => PacketType::BulletStart,
            Payload::PlayerHit(_) => PacketType::PlayerHit,
            Payload::ServerEvent(_) => PacketType::ServerEvent,
            Payload::ClientToggleReady => PacketType::ClientToggleReady,
            Payload::ServerStateChanged(_) => PacketType::ServerStateChanged,
            Payload::PlayerRoll => PacketType::PlayerRoll,
            Payload::ModifiersUpdated(_) => PacketType::ModifiersUpdated,
            Payload::ModifierChosen(_) => PacketType::ModifierChosen,
        }
    }

    /// Serializes only the inner record; unit variants have an empty body.
    fn encode_body(&self) -> Result<Vec<u8>, PacketError> {
        let bytes = match self {
            Payload::MatchFind(r) | Payload::MatchHost(r) | Payload::MatchStart(r) => {
                bincode::serialize(r)?
            }
            Payload::MatchConnect(addr) => bincode::serialize(addr)?,
            Payload::Negotiate(handshake) => bincode::serialize(handshake)?,
            Payload::UpdateCurrentPlayer(update) => bincode::serialize(update)?,
            Payload::UpdatePlayers(players) => bincode::serialize(players)?,
            Payload::BulletStart(bullet) => bincode::serialize(bullet)?,
            Payload::PlayerHit(hit) => bincode::serialize(hit)?,
            Payload::ServerEvent(event) => bincode::serialize(event)?,
            Payload::ServerStateChanged(state) => bincode::serialize(state)?,
            Payload::ModifiersUpdated(m) | Payload::ModifierChosen(m) => bincode::serialize(m)?,
            Payload::KeepAlive
            | Payload::Disconnect
            | Payload::ClientToggleReady
            | Payload::PlayerRoll => Vec::new(),
        };
        Ok(bytes)
    }

    /// One decoder per tag. Adding a packet type means adding one arm here,
    /// one in [`Payload::packet_type`] and one in `encode_body`.
    pub fn decode(packet_type: PacketType, raw: &[u8]) -> Result<Self, PacketError> {
        let payload = match packet_type {
            PacketType::MatchFind => Payload::MatchFind(body(raw)?),
            PacketType::MatchHost => Payload::MatchHost(body(raw)?),
            PacketType::MatchStart => Payload::MatchStart(body(raw)?),
            PacketType::MatchConnect => Payload::MatchConnect(body(raw)?),
            PacketType::Negotiate => Payload::Negotiate(body(raw)?),
            PacketType::KeepAlive => Payload::KeepAlive,
            PacketType::Disconnect => Payload::Disconnect,
            PacketType::UpdateCurrentPlayer => Payload::UpdateCurrentPlayer(body(raw)?),
            PacketType::UpdatePlayers => Payload::UpdatePlayers(body(raw)?),
            PacketType::BulletStart => Payload::BulletStart(body(raw)?),
            PacketType::PlayerHit => Payload::PlayerHit(body(raw)?),
            PacketType::ServerEvent => Payload::ServerEvent(body(raw)?),
            PacketType::ClientToggleReady => Payload::ClientToggleReady,
            PacketType::ServerStateChanged => Payload::ServerStateChanged(body(raw)?),
            PacketType::PlayerRoll => Payload::PlayerRoll,
            PacketType::ModifiersUpdated => Payload::ModifiersUpdated(body(raw)?),
            PacketType::ModifierChosen => Payload::ModifierChosen(body(raw)?),
        };
        Ok(payload)
    }
}

/// Frames `payload` with a header stamped with the current time.
pub fn encode(payload: &Payload) -> Result<Vec<u8>, PacketError> {
    encode_at(payload, get_timestamp())
}

pub fn encode_at(payload: &Payload, timestamp: u64) -> Result<Vec<u8>, PacketError> {
    let body = payload.encode_body()?;
    let payload_size = body.len() as u32;

    let mut buf = BytesMut::with_capacity(HEADER_SIZE as usize + body.len());
    buf.put_u8(payload.packet_type().tag());
    buf.put_u32(HEADER_SIZE);
    buf.put_u32(MAGIC);
    buf.put_u64(timestamp);
    buf.put_u32(payload_size);
    buf.put_u32(HEADER_SIZE + payload_size);
    buf.extend_from_slice(&body);

    Ok(buf.to_vec())
}

/// Reads and validates the header, returning it with the raw payload slice.
pub fn decode(bytes: &[u8]) -> Result<(PacketHeader, &[u8]), PacketError> {
    if bytes.len() < HEADER_SIZE as usize {
        return Err(PacketError::Truncated(bytes.len()));
    }

    let mut reader = bytes;
    let tag = reader.get_u8();
    let header_size = reader.get_u32();
    let magic = reader.get_u32();
    let timestamp = reader.get_u64();
    let payload_size = reader.get_u32();
    let total_size = reader.get_u32();

    if magic != MAGIC {
        return Err(PacketError::InvalidMagic(magic));
    }

    let sizes_agree = header_size
        .checked_add(payload_size)
        .map_or(false, |sum| sum == total_size);
    if !sizes_agree || header_size < HEADER_SIZE {
        return Err(PacketError::InvalidSize {
            header: header_size,
            payload: payload_size,
            total: total_size,
        });
    }

    if total_size as usize > bytes.len() {
        return Err(PacketError::Truncated(bytes.len()));
    }

    let packet_type = PacketType::from_tag(tag).ok_or(PacketError::UnknownType(tag))?;
    let header = PacketHeader {
        packet_type,
        header_size,
        magic,
        timestamp,
        payload_size,
        total_size,
    };

    Ok((header, &bytes[header_size as usize..total_size as usize]))
}

/// A fully decoded packet.
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    pub header: PacketHeader,
    pub payload: Payload,
}

impl Packet {
    pub fn decode(bytes: &[u8]) -> Result<Self, PacketError> {
        let (header, raw) = decode(bytes)?;
        let payload = Payload::decode(header.packet_type, raw)?;
        Ok(Self { header, payload })
    }
}
