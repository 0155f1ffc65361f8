//! Matchmaking handshake: wire constants and the blocking client side
//!
//! Integers are big-endian. The client opens with its mode as an `i32`.
//! Hosts get a room id back (`-1` when the server is out of rooms), joiners
//! send a room id and get one status byte. A client that has to wait for a
//! partner sees `PROBE` bytes while it waits; `PAIRED` followed by the
//! shared `u64` seed starts the match.

use crate::error::HandshakeError;
use crate::ruleset::RulesetKind;
use std::io::{self, ErrorKind, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;
use tracing::{debug, info};

pub const MODE_QUICK_NES: i32 = 0;
pub const MODE_QUICK_MODERN: i32 = 1;
pub const MODE_HOST: i32 = 2;
pub const MODE_JOIN: i32 = 3;

/// Liveness probe sent to waiting clients, skipped by them
pub const PROBE: u8 = 0x00;
/// Pairing announcement, followed by the seed. Also the join success byte.
pub const PAIRED: u8 = 0x01;
/// Join reply when the room does not exist
pub const NO_SUCH_ROOM: u8 = 0x00;
/// Host reply when no room id is free
pub const LOBBY_FULL: i32 = -1;

pub const ROOM_ID_MIN: i32 = 1000;
pub const ROOM_ID_MAX: i32 = 9999;

pub const DEFAULT_PORT: u16 = 7070;

/// The two quick-play queues
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuickPlay {
    Nes,
    Modern,
}

impl QuickPlay {
    pub fn mode(self) -> i32 {
        match self {
            QuickPlay::Nes => MODE_QUICK_NES,
            QuickPlay::Modern => MODE_QUICK_MODERN,
        }
    }

    pub fn from_mode(mode: i32) -> Option<Self> {
        match mode {
            MODE_QUICK_NES => Some(QuickPlay::Nes),
            MODE_QUICK_MODERN => Some(QuickPlay::Modern),
            _ => None,
        }
    }

    pub fn ruleset(self) -> RulesetKind {
        match self {
            QuickPlay::Nes => RulesetKind::Nes,
            QuickPlay::Modern => RulesetKind::Modern,
        }
    }

    /// Slot index on the server
    pub fn index(self) -> usize {
        match self {
            QuickPlay::Nes => 0,
            QuickPlay::Modern => 1,
        }
    }
}

/// A finished handshake
#[derive(Debug)]
pub struct Pairing {
    pub stream: TcpStream,
    pub seed: u64,
    /// Room id when we hosted
    pub room: Option<i32>,
}

/// A fresh connection to the relay
#[derive(Debug)]
pub struct Negotiation {
    stream: TcpStream,
}

impl Negotiation {
    pub fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self, HandshakeError> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        debug!("connected to relay at {:?}", stream.peer_addr().ok());
        Ok(Self { stream })
    }

    /// Enter a quick-play queue
    pub fn quick_play(mut self, queue: QuickPlay) -> Result<Waiting, HandshakeError> {
        write_i32(&mut self.stream, queue.mode())?;
        info!(?queue, "queued for quick play");
        Ok(Waiting {
            stream: self.stream,
            room: None,
        })
    }

    /// Ask for a private room
    pub fn host(mut self) -> Result<Waiting, HandshakeError> {
        write_i32(&mut self.stream, MODE_HOST)?;
        let room = read_i32(&mut self.stream)?;
        if room == LOBBY_FULL {
            return Err(HandshakeError::LobbyFull);
        }
        info!(room, "hosting room");
        Ok(Waiting {
            stream: self.stream,
            room: Some(room),
        })
    }

    /// Join a room someone else is hosting
    pub fn join(mut self, room: i32) -> Result<Pairing, HandshakeError> {
        write_i32(&mut self.stream, MODE_JOIN)?;
        write_i32(&mut self.stream, room)?;
        match read_u8(&mut self.stream)? {
            PAIRED => {
                let seed = read_u64(&mut self.stream)?;
                info!(room, "joined room");
                Ok(Pairing {
                    stream: self.stream,
                    seed,
                    room: None,
                })
            }
            NO_SUCH_ROOM => Err(HandshakeError::RoomNotFound(room)),
            other => Err(HandshakeError::UnexpectedReply(other)),
        }
    }
}

/// Waiting in a queue or in a hosted room for the server to pair us
#[derive(Debug)]
pub struct Waiting {
    stream: TcpStream,
    room: Option<i32>,
}

impl Waiting {
    pub fn room(&self) -> Option<i32> {
        self.room
    }

    /// Wait up to `timeout` for the pairing announcement. Returns the seed
    /// once paired.
    pub fn poll(&mut self, timeout: Duration) -> Result<Option<u64>, HandshakeError> {
        self.stream.set_read_timeout(Some(timeout.max(Duration::from_millis(1))))?;
        loop {
            let mut byte = [0u8; 1];
            match self.stream.read(&mut byte) {
                Ok(0) => return Err(HandshakeError::ServerClosed),
                Ok(_) => match byte[0] {
                    PROBE => continue,
                    PAIRED => {
                        self.stream.set_read_timeout(None)?;
                        let seed = read_u64(&mut self.stream)?;
                        return Ok(Some(seed));
                    }
                    other => return Err(HandshakeError::UnexpectedReply(other)),
                },
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    return Ok(None);
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Block until paired
    pub fn wait(mut self) -> Result<Pairing, HandshakeError> {
        loop {
            if let Some(seed) = self.poll(Duration::from_secs(1))? {
                return Ok(self.into_pairing(seed));
            }
        }
    }

    pub fn into_pairing(self, seed: u64) -> Pairing {
        info!(room = ?self.room, "paired");
        Pairing {
            stream: self.stream,
            seed,
            room: self.room,
        }
    }
}

fn map_eof(e: io::Error) -> HandshakeError {
    if e.kind() == ErrorKind::UnexpectedEof {
        HandshakeError::ServerClosed
    } else {
        HandshakeError::Io(e)
    }
}

fn write_i32(stream: &mut TcpStream, value: i32) -> Result<(), HandshakeError> {
    stream.write_all(&value.to_be_bytes())?;
    stream.flush()?;
    Ok(())
}

fn read_i32(stream: &mut TcpStream) -> Result<i32, HandshakeError> {
    let mut buf = [0u8; 4];
    stream.read_exact(&mut buf).map_err(map_eof)?;
    Ok(i32::from_be_bytes(buf))
}

fn read_u8(stream: &mut TcpStream) -> Result<u8, HandshakeError> {
    let mut buf = [0u8; 1];
    stream.read_exact(&mut buf).map_err(map_eof)?;
    Ok(buf[0])
}

fn read_u64(stream: &mut TcpStream) -> Result<u64, HandshakeError> {
    let mut buf = [0u8; 8];
    stream.read_exact(&mut buf).map_err(map_eof)?;
    Ok(u64::from_be_bytes(buf))
}
