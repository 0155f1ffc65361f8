//! Matchmaking relay server
//!
//! Pairs strangers through one waiting slot per quick-play queue, or friends
//! through numbered rooms, then copies bytes between the two sockets until
//! both sides are done. The relay never looks inside the match traffic.

use crate::matchmaking::{
    LOBBY_FULL, MODE_HOST, MODE_JOIN, NO_SUCH_ROOM, PAIRED, PROBE, QuickPlay, ROOM_ID_MAX,
    ROOM_ID_MIN,
};
use rand::Rng;
use std::collections::HashMap;
use std::io::{self, ErrorKind};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Rooms that may be open at once
    pub max_rooms: usize,
    /// How often waiting sockets are checked for disconnects
    pub probe_interval: Duration,
    /// Time a client gets to send its mode and room id
    pub handshake_timeout: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            max_rooms: 1000,
            probe_interval: Duration::from_secs(5),
            handshake_timeout: Duration::from_secs(10),
        }
    }
}

/// Who is waiting for a partner
#[derive(Debug, Default)]
struct Pairings {
    quick: [Option<TcpStream>; 2],
    rooms: HashMap<i32, TcpStream>,
}

/// Byte counts of a finished match, one per direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayStats {
    pub first_to_second: u64,
    pub second_to_first: u64,
}

/// The relay's state
///
/// Every pairing decision runs under the one `pairings` lock, from looking a
/// peer up until its liveness is confirmed, so a room id can never be freed
/// and handed out again halfway through a join.
#[derive(Debug)]
pub struct Relay {
    config: RelayConfig,
    pairings: Mutex<Pairings>,
}

impl Relay {
    pub fn new(config: RelayConfig) -> Arc<Self> {
        let max_rooms = config
            .max_rooms
            .min((ROOM_ID_MAX - ROOM_ID_MIN + 1) as usize);
        Arc::new(Self {
            config: RelayConfig {
                max_rooms,
                ..config
            },
            pairings: Mutex::new(Pairings::default()),
        })
    }

    /// Accept clients until the listener fails
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> io::Result<()> {
        info!("relay listening on {}", listener.local_addr()?);

        let reaper = Arc::clone(&self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(reaper.config.probe_interval);
            interval.tick().await;
            loop {
                interval.tick().await;
                let evicted = reaper.reap().await;
                if evicted > 0 {
                    info!(evicted, "evicted dead waiting clients");
                }
            }
        });

        loop {
            let (stream, addr) = listener.accept().await?;
            let relay = Arc::clone(&self);
            tokio::spawn(async move {
                if let Err(e) = relay.handle_client(stream, addr).await {
                    debug!(%addr, "client dropped during handshake: {e}");
                }
            });
        }
    }

    /// Number of clients waiting in quick play and in rooms
    pub async fn waiting(&self) -> (usize, usize) {
        let pairings = self.pairings.lock().await;
        let quick = pairings.quick.iter().filter(|slot| slot.is_some()).count();
        (quick, pairings.rooms.len())
    }

    /// Probe every waiting client and drop the dead ones. Returns how many
    /// were dropped.
    pub async fn reap(&self) -> usize {
        let mut pairings = self.pairings.lock().await;
        let mut evicted = 0;

        for slot in pairings.quick.iter_mut() {
            let dead = match slot.as_mut() {
                Some(stream) => !probe(stream, true, self.config.handshake_timeout).await,
                None => false,
            };
            if dead {
                *slot = None;
                evicted += 1;
            }
        }

        let mut dead_rooms = Vec::new();
        for (&id, stream) in pairings.rooms.iter_mut() {
            if !probe(stream, true, self.config.handshake_timeout).await {
                dead_rooms.push(id);
            }
        }
        for id in dead_rooms {
            pairings.rooms.remove(&id);
            debug!(room = id, "room holder gone");
            evicted += 1;
        }
        evicted
    }

    async fn handle_client(&self, mut stream: TcpStream, addr: SocketAddr) -> io::Result<()> {
        stream.set_nodelay(true)?;
        let mode = self.read_handshake_i32(&mut stream).await?;
        debug!(%addr, mode, "client negotiating");

        if let Some(queue) = QuickPlay::from_mode(mode) {
            self.quick_play(queue, stream).await
        } else if mode == MODE_HOST {
            self.host(stream).await
        } else if mode == MODE_JOIN {
            let room = self.read_handshake_i32(&mut stream).await?;
            self.join(room, stream).await
        } else {
            warn!(%addr, mode, "unknown mode");
            Ok(())
        }
    }

    async fn read_handshake_i32(&self, stream: &mut TcpStream) -> io::Result<i32> {
        tokio::time::timeout(self.config.handshake_timeout, stream.read_i32())
            .await
            .map_err(|_| io::Error::new(ErrorKind::TimedOut, "handshake timed out"))?
    }

    async fn quick_play(&self, queue: QuickPlay, mut stream: TcpStream) -> io::Result<()> {
        let mut pairings = self.pairings.lock().await;
        loop {
            let Some(mut waiting) = pairings.quick[queue.index()].take() else {
                pairings.quick[queue.index()] = Some(stream);
                info!(?queue, "client waiting for quick play");
                return Ok(());
            };

            if !probe(&mut waiting, true, self.config.handshake_timeout).await {
                debug!(?queue, "discarding dead waiting client");
                continue;
            }
            if !probe(&mut stream, true, self.config.handshake_timeout).await {
                pairings.quick[queue.index()] = Some(waiting);
                debug!(?queue, "newcomer left before pairing");
                return Ok(());
            }

            drop(pairings);
            info!(?queue, "quick play paired");
            start_match(waiting, stream).await;
            return Ok(());
        }
    }

    async fn host(&self, mut stream: TcpStream) -> io::Result<()> {
        let mut pairings = self.pairings.lock().await;
        if pairings.rooms.len() >= self.config.max_rooms {
            warn!("no free rooms");
            stream.write_i32(LOBBY_FULL).await?;
            return Ok(());
        }

        let room = {
            let mut rng = rand::thread_rng();
            loop {
                let id = rng.gen_range(ROOM_ID_MIN..=ROOM_ID_MAX);
                if !pairings.rooms.contains_key(&id) {
                    break id;
                }
            }
        };
        stream.write_i32(room).await?;
        pairings.rooms.insert(room, stream);
        info!(room, "room opened");
        Ok(())
    }

    async fn join(&self, room: i32, mut stream: TcpStream) -> io::Result<()> {
        let mut pairings = self.pairings.lock().await;
        let Some(mut host) = pairings.rooms.remove(&room) else {
            debug!(room, "join for unknown room");
            stream.write_u8(NO_SUCH_ROOM).await?;
            return Ok(());
        };

        if !probe(&mut host, true, self.config.handshake_timeout).await {
            debug!(room, "room holder gone");
            stream.write_u8(NO_SUCH_ROOM).await?;
            return Ok(());
        }
        // The joiner is reading a status byte, so it only gets the silent check
        if !probe(&mut stream, false, self.config.handshake_timeout).await {
            pairings.rooms.insert(room, host);
            debug!(room, "joiner left before pairing");
            return Ok(());
        }

        drop(pairings);
        info!(room, "room paired");
        start_match(host, stream).await;
        Ok(())
    }
}

/// Check a waiting socket: a pending EOF or error means it is gone. With
/// `write` set, a probe byte is also sent, and a client that will not take
/// it within `limit` counts as gone.
async fn probe(stream: &mut TcpStream, write: bool, limit: Duration) -> bool {
    let mut scratch = [0u8; 64];
    loop {
        match stream.try_read(&mut scratch) {
            Ok(0) => return false,
            // Waiting clients have nothing to say; drop it
            Ok(_) => continue,
            Err(e) if e.kind() == ErrorKind::WouldBlock => break,
            Err(_) => return false,
        }
    }
    if !write {
        return true;
    }
    let sent = tokio::time::timeout(limit, async {
        stream.write_all(&[PROBE]).await?;
        stream.flush().await
    })
    .await;
    matches!(sent, Ok(Ok(())))
}

async fn announce(stream: &mut TcpStream, seed: u64) -> io::Result<()> {
    let mut buf = [0u8; 9];
    buf[0] = PAIRED;
    buf[1..].copy_from_slice(&seed.to_be_bytes());
    stream.write_all(&buf).await?;
    stream.flush().await
}

async fn start_match(mut first: TcpStream, mut second: TcpStream) {
    let seed: u64 = rand::random();
    if let Err(e) = announce(&mut first, seed).await {
        warn!("pairing announcement failed: {e}");
        return;
    }
    if let Err(e) = announce(&mut second, seed).await {
        warn!("pairing announcement failed: {e}");
        return;
    }
    match relay(first, second).await {
        Ok(stats) => info!(
            first_to_second = stats.first_to_second,
            second_to_first = stats.second_to_first,
            "match finished"
        ),
        Err(e) => warn!("match link broken: {e}"),
    }
}

/// Copy bytes both ways until each side has closed its output
///
/// When one side's input ends, the other side's output is half-closed so it
/// sees the same clean end of stream. If either direction fails, both
/// sockets are reset instead, so the survivor sees a broken link rather than
/// a finished opponent.
pub async fn relay(mut first: TcpStream, mut second: TcpStream) -> io::Result<RelayStats> {
    let copied = {
        let (mut first_read, mut first_write) = first.split();
        let (mut second_read, mut second_write) = second.split();
        tokio::try_join!(
            pipe(&mut first_read, &mut second_write),
            pipe(&mut second_read, &mut first_write)
        )
    };

    match copied {
        Ok((first_to_second, second_to_first)) => Ok(RelayStats {
            first_to_second,
            second_to_first,
        }),
        Err(e) => {
            abort(&first);
            abort(&second);
            Err(e)
        }
    }
}

/// Copy until end of stream, then pass the end on
async fn pipe<R, W>(reader: &mut R, writer: &mut W) -> io::Result<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let copied = tokio::io::copy(reader, writer).await?;
    if let Err(e) = writer.shutdown().await {
        debug!("half-close failed: {e}");
    }
    Ok(copied)
}

/// Make the coming drop send a reset instead of a clean close
#[allow(deprecated)]
fn abort(stream: &TcpStream) {
    if let Err(e) = stream.set_linger(Some(Duration::ZERO)) {
        debug!("could not arm reset: {e}");
    }
}
