//! One client's side of a match: sender, receiver loop and link state
//!
//! The tick loop owns the local board and writes through a `Sender`. A
//! dedicated thread runs the receiver loop and feeds decoded messages to a
//! `MessageHandler`, normally a `MatchLink` driving the puppet board.

use crate::board::{Board, BoardEvent};
use crate::error::ProtocolError;
use crate::garbage::GarbageQueue;
use crate::protocol::Message;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// Lock a mutex, recovering the data if a panicking thread poisoned it
pub fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// How the link to the opponent stands, as shown to the player
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    Connected,
    /// The opponent closed their side normally
    PeerFinished,
    /// Reading or writing failed
    ConnectionLost,
    /// We closed the link ourselves
    Closed,
}

#[derive(Debug, Default)]
struct SessionState {
    connection_lost: bool,
    peer_finished: bool,
    finished: bool,
    closed: bool,
}

/// Link flags shared by the tick loop and the receiver thread
///
/// All flags live under one mutex, and the socket is only shut down while
/// holding it, so the two threads can never both close it or miss a close.
#[derive(Debug)]
pub struct Session {
    state: Mutex<SessionState>,
    stream: Option<TcpStream>,
}

impl Session {
    pub fn new(stream: &TcpStream) -> io::Result<Self> {
        Ok(Self {
            state: Mutex::new(SessionState::default()),
            stream: Some(stream.try_clone()?),
        })
    }

    /// A session with no socket behind it
    pub fn detached() -> Self {
        Self {
            state: Mutex::new(SessionState::default()),
            stream: None,
        }
    }

    /// Record a failed read or write. Returns true the first time.
    pub fn mark_dead(&self) -> bool {
        let mut state = lock(&self.state);
        let first = !state.connection_lost;
        state.connection_lost = true;
        first
    }

    pub fn mark_peer_finished(&self) {
        lock(&self.state).peer_finished = true;
    }

    pub fn is_connection_lost(&self) -> bool {
        lock(&self.state).connection_lost
    }

    pub fn is_peer_finished(&self) -> bool {
        lock(&self.state).peer_finished
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.state).closed
    }

    /// Whether our write side is shut, by `finish` or `close`
    pub fn is_write_shut(&self) -> bool {
        let state = lock(&self.state);
        state.finished || state.closed
    }

    pub fn status(&self) -> LinkStatus {
        let state = lock(&self.state);
        if state.closed {
            LinkStatus::Closed
        } else if state.connection_lost {
            LinkStatus::ConnectionLost
        } else if state.peer_finished {
            LinkStatus::PeerFinished
        } else {
            LinkStatus::Connected
        }
    }

    /// Tell the opponent we are done sending, keep reading what they send
    pub fn finish(&self) {
        let mut state = lock(&self.state);
        if state.finished || state.closed {
            return;
        }
        state.finished = true;
        if let Some(stream) = &self.stream {
            if let Err(e) = stream.shutdown(Shutdown::Write) {
                debug!("half-close failed: {e}");
            }
        }
    }

    /// Close both directions, which also unblocks the receiver thread
    pub fn close(&self) {
        let mut state = lock(&self.state);
        if state.closed {
            return;
        }
        state.closed = true;
        if let Some(stream) = &self.stream {
            if let Err(e) = stream.shutdown(Shutdown::Both) {
                debug!("shutdown failed: {e}");
            }
        }
        info!("session closed");
    }
}

/// How the match ended for us
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchResult {
    Won,
    Lost,
    /// Both sides went out on the same tick
    Draw,
}

/// Decides the match from both boards and the link
///
/// The first side to go out decides the result, which never changes after
/// that. The opponent counts as out once their puppet tops out or they close
/// their side of the link.
#[derive(Debug, Default)]
pub struct Referee {
    result: Option<MatchResult>,
    over: bool,
}

impl Referee {
    pub fn observe(&mut self, local_alive: bool, opponent_out: bool) -> Option<MatchResult> {
        if self.result.is_none() {
            self.result = match (local_alive, opponent_out) {
                (true, false) => None,
                (true, true) => Some(MatchResult::Won),
                (false, false) => Some(MatchResult::Lost),
                (false, true) => Some(MatchResult::Draw),
            };
        }
        self.over = !local_alive && opponent_out;
        self.result
    }

    pub fn result(&self) -> Option<MatchResult> {
        self.result
    }

    /// Both sides are out, nothing is left to play or watch
    pub fn is_over(&self) -> bool {
        self.over
    }
}

#[derive(Debug)]
struct SenderInner<W> {
    writer: W,
    dead: bool,
}

/// Writes messages to the opponent
///
/// Each message is written and flushed as a unit. After the first failure
/// the sender is dead and every later send quietly does nothing, so the
/// local game keeps running after the opponent is gone. Once the session
/// has shut our write side, sends are dropped without touching the link
/// status.
#[derive(Debug)]
pub struct Sender<W: Write> {
    inner: Mutex<SenderInner<W>>,
    session: Arc<Session>,
}

/// Sender over a TCP socket
pub type NetSender = Sender<BufWriter<TcpStream>>;

impl<W: Write> Sender<W> {
    pub fn new(writer: W, session: Arc<Session>) -> Self {
        Self {
            inner: Mutex::new(SenderInner {
                writer,
                dead: false,
            }),
            session,
        }
    }

    /// Returns false if nothing was written
    pub fn send(&self, message: Message) -> bool {
        let mut inner = lock(&self.inner);
        if inner.dead || self.session.is_write_shut() {
            return false;
        }

        let (buf, len) = message.encode();
        let writer = &mut inner.writer;
        let result = writer.write_all(&buf[..len]).and_then(|()| writer.flush());
        if let Err(e) = result {
            inner.dead = true;
            // Shut down under our feet, not a broken link
            if self.session.is_write_shut() {
                debug!("send after shutdown on tag {}: {e}", message.tag());
            } else if self.session.mark_dead() {
                warn!("sender died on tag {}: {e}", message.tag());
            }
            return false;
        }
        true
    }

    /// Announce a board event, returns false if nothing was written
    pub fn send_event(&self, event: &BoardEvent) -> bool {
        match Message::from_event(event) {
            Some(message) => self.send(message),
            None => false,
        }
    }

    pub fn is_dead(&self) -> bool {
        lock(&self.inner).dead
    }
}

impl NetSender {
    pub fn connect(stream: &TcpStream, session: Arc<Session>) -> io::Result<Self> {
        Ok(Self::new(BufWriter::new(stream.try_clone()?), session))
    }
}

/// Callbacks from the receiver loop
pub trait MessageHandler: Send + 'static {
    fn on_message(&mut self, message: Message);
    /// The stream ended between two messages
    fn on_peer_finished(&mut self);
    /// The stream failed or carried something undecodable
    fn on_connection_lost(&mut self, error: &ProtocolError);
}

/// Read and dispatch until the stream ends
pub fn run_receiver<R: Read, H: MessageHandler>(reader: R, handler: &mut H) {
    let mut reader = BufReader::new(reader);
    loop {
        match Message::read_from(&mut reader) {
            Ok(Some(message)) => handler.on_message(message),
            Ok(None) => {
                handler.on_peer_finished();
                return;
            }
            Err(e) => {
                handler.on_connection_lost(&e);
                return;
            }
        }
    }
}

/// Run the receiver loop on its own thread
pub fn spawn_receiver<R, H>(reader: R, mut handler: H) -> io::Result<JoinHandle<()>>
where
    R: Read + Send + 'static,
    H: MessageHandler,
{
    thread::Builder::new()
        .name("receiver".into())
        .spawn(move || run_receiver(reader, &mut handler))
}

/// Drives the puppet board from the opponent's messages
pub struct MatchLink<W: Write> {
    puppet: Arc<Mutex<Board>>,
    puppet_garbage: Arc<GarbageQueue>,
    local_garbage: Arc<GarbageQueue>,
    sender: Arc<Sender<W>>,
    session: Arc<Session>,
}

impl<W: Write> MatchLink<W> {
    pub fn new(
        puppet: Arc<Mutex<Board>>,
        local_garbage: Arc<GarbageQueue>,
        sender: Arc<Sender<W>>,
        session: Arc<Session>,
    ) -> Self {
        let puppet_garbage = lock(&puppet).garbage_queue();
        Self {
            puppet,
            puppet_garbage,
            local_garbage,
            sender,
            session,
        }
    }
}

/// Wire row count and hole column as queue values. A hole outside the grid
/// leaves the rows solid.
fn attack_from_wire(rows: i8, empty_column: i8) -> Option<(usize, usize)> {
    let rows = usize::try_from(rows).ok().filter(|&rows| rows > 0)?;
    Some((rows, usize::try_from(empty_column).unwrap_or(usize::MAX)))
}

impl<W: Write + Send + 'static> MessageHandler for MatchLink<W> {
    fn on_message(&mut self, message: Message) {
        match message {
            Message::SendGarbageRows { rows, empty_column } => {
                if let Some((count, hole)) = attack_from_wire(rows, empty_column) {
                    debug!(rows = count, hole, "garbage received");
                    self.local_garbage.add_garbage(count, hole);
                    self.sender
                        .send(Message::UpdateGarbagePending { rows, empty_column });
                }
            }
            Message::UpdateGarbagePending { rows, empty_column } => {
                if let Some((count, hole)) = attack_from_wire(rows, empty_column) {
                    self.puppet_garbage.add_garbage(count, hole);
                }
            }
            Message::UpdateHold => lock(&self.puppet).puppet_hold(),
            Message::UpdateFallingPiece {
                x,
                y,
                rotation,
                locked,
            } => lock(&self.puppet).set_falling_state(x as i32, y as i32, rotation, locked),
        }
    }

    fn on_peer_finished(&mut self) {
        info!("opponent finished");
        self.session.mark_peer_finished();
    }

    fn on_connection_lost(&mut self, error: &ProtocolError) {
        if self.session.is_closed() {
            debug!("receiver stopped after close: {error}");
            return;
        }
        if self.session.mark_dead() {
            warn!("connection lost: {error}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Handling;
    use crate::ruleset::Ruleset;
    use crate::tetromino::Rotation;
    use std::io::Cursor;
    use std::net::TcpListener;

    /// Writer whose bytes stay readable after it is moved into a sender
    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            lock(&self.0).extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct FailingWriter {
        attempts: Arc<Mutex<usize>>,
    }

    impl Write for FailingWriter {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            *lock(&self.attempts) += 1;
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "gone"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct Recorder {
        messages: Vec<Message>,
        finished: bool,
        lost: Option<String>,
    }

    impl MessageHandler for Recorder {
        fn on_message(&mut self, message: Message) {
            self.messages.push(message);
        }

        fn on_peer_finished(&mut self) {
            self.finished = true;
        }

        fn on_connection_lost(&mut self, error: &ProtocolError) {
            self.lost = Some(error.to_string());
        }
    }

    #[test]
    fn test_sender_writes_whole_messages() {
        let buf = SharedBuf::default();
        let sender = Sender::new(buf.clone(), Arc::new(Session::detached()));
        assert!(sender.send(Message::UpdateHold));
        assert!(sender.send(Message::falling_piece(3, 4, Rotation::East, false)));
        assert_eq!(*lock(&buf.0), vec![5, 4, 3, 4, 1, 0]);
    }

    #[test]
    fn test_sender_goes_quiet_after_failure() {
        let attempts = Arc::new(Mutex::new(0));
        let session = Arc::new(Session::detached());
        let sender = Sender::new(
            FailingWriter {
                attempts: Arc::clone(&attempts),
            },
            Arc::clone(&session),
        );
        assert!(!sender.send(Message::UpdateHold));
        assert!(sender.is_dead());
        assert!(session.is_connection_lost());
        assert_eq!(session.status(), LinkStatus::ConnectionLost);

        assert!(!sender.send(Message::UpdateHold));
        assert_eq!(*lock(&attempts), 1);
    }

    #[test]
    fn test_receiver_reports_clean_end() {
        let mut stream = Vec::new();
        Message::UpdateHold.write_to(&mut stream).unwrap();
        Message::garbage_rows(2, 3).write_to(&mut stream).unwrap();

        let mut recorder = Recorder::default();
        run_receiver(Cursor::new(stream), &mut recorder);
        assert_eq!(recorder.messages.len(), 2);
        assert!(recorder.finished);
        assert!(recorder.lost.is_none());
    }

    #[test]
    fn test_receiver_reports_broken_stream() {
        let mut stream = Vec::new();
        Message::UpdateHold.write_to(&mut stream).unwrap();
        stream.extend_from_slice(&[0, 1]);

        let mut recorder = Recorder::default();
        run_receiver(Cursor::new(stream), &mut recorder);
        assert_eq!(recorder.messages, vec![Message::UpdateHold]);
        assert!(!recorder.finished);
        assert!(recorder.lost.is_some());
    }

    fn link() -> (MatchLink<SharedBuf>, Arc<Mutex<Board>>, Arc<GarbageQueue>, SharedBuf) {
        let local = Board::local(Ruleset::modern(), 9, Handling::default());
        let local_garbage = local.garbage_queue();
        let puppet = Arc::new(Mutex::new(Board::puppet(Ruleset::modern(), 9, 1)));
        let session = Arc::new(Session::detached());
        let buf = SharedBuf::default();
        let sender = Arc::new(Sender::new(buf.clone(), Arc::clone(&session)));
        let link = MatchLink::new(Arc::clone(&puppet), Arc::clone(&local_garbage), sender, session);
        (link, puppet, local_garbage, buf)
    }

    #[test]
    fn test_incoming_attack_is_queued_and_echoed() {
        let (mut link, puppet, local_garbage, buf) = link();
        link.on_message(Message::garbage_rows(2, 6));
        assert_eq!(local_garbage.pending_rows(), 2);
        assert_eq!(*lock(&buf.0), vec![6, 2, 6]);
        assert!(lock(&puppet).garbage_queue().is_empty());
    }

    #[test]
    fn test_pending_garbage_goes_to_puppet() {
        let (mut link, puppet, local_garbage, _) = link();
        link.on_message(Message::garbage_pending(3, 1));
        assert!(local_garbage.is_empty());
        assert_eq!(lock(&puppet).garbage_queue().pending_rows(), 3);
    }

    #[test]
    fn test_locked_update_locks_puppet_on_next_tick() {
        let (mut link, puppet, _, _) = link();
        let bottom = lock(&puppet).grid().rows() as i32;
        link.on_message(Message::falling_piece(3, bottom - 3, Rotation::North, true));
        assert!(lock(&puppet).is_falling_tetromino_locked());
        lock(&puppet).update();
        assert_eq!(lock(&puppet).grid().filled_count(), 4);
    }

    #[test]
    fn test_echo_after_finish_keeps_link_healthy() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (_server, _) = listener.accept().unwrap();

        let session = Arc::new(Session::new(&client).unwrap());
        let sender = Arc::new(NetSender::connect(&client, Arc::clone(&session)).unwrap());
        let local = Board::local(Ruleset::modern(), 9, Handling::default());
        let local_garbage = local.garbage_queue();
        let puppet = Arc::new(Mutex::new(Board::puppet(Ruleset::modern(), 9, 1)));
        let mut link = MatchLink::new(
            puppet,
            Arc::clone(&local_garbage),
            Arc::clone(&sender),
            Arc::clone(&session),
        );

        session.finish();
        link.on_message(Message::garbage_rows(2, 3));
        assert_eq!(local_garbage.pending_rows(), 2);
        assert!(!session.is_connection_lost());
        assert_eq!(session.status(), LinkStatus::Connected);

        link.on_peer_finished();
        assert_eq!(session.status(), LinkStatus::PeerFinished);
    }

    #[test]
    fn test_sends_after_finish_are_dropped() {
        let buf = SharedBuf::default();
        let session = Arc::new(Session::detached());
        let sender = Sender::new(buf.clone(), Arc::clone(&session));
        session.finish();
        assert!(!sender.send(Message::UpdateHold));
        assert!(lock(&buf.0).is_empty());
        assert_eq!(session.status(), LinkStatus::Connected);
    }

    #[test]
    fn test_first_side_out_decides_the_match() {
        let mut referee = Referee::default();
        assert_eq!(referee.observe(true, false), None);
        assert_eq!(referee.observe(false, false), Some(MatchResult::Lost));
        assert!(!referee.is_over());

        // The opponent going out later does not turn it into a draw
        assert_eq!(referee.observe(false, true), Some(MatchResult::Lost));
        assert!(referee.is_over());

        let mut referee = Referee::default();
        assert_eq!(referee.observe(true, true), Some(MatchResult::Won));
        assert!(!referee.is_over());

        let mut referee = Referee::default();
        assert_eq!(referee.observe(false, true), Some(MatchResult::Draw));
        assert!(referee.is_over());
    }

    #[test]
    fn test_close_is_idempotent() {
        let session = Session::detached();
        session.finish();
        session.close();
        session.close();
        assert!(session.is_closed());
        assert_eq!(session.status(), LinkStatus::Closed);
    }

    #[test]
    fn test_half_close_is_seen_as_peer_finished() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).unwrap();
        let (server, _) = listener.accept().unwrap();

        let session = Arc::new(Session::new(&client).unwrap());
        let sender = NetSender::connect(&client, Arc::clone(&session)).unwrap();
        sender.send(Message::UpdateHold);
        sender.send(Message::garbage_rows(1, 0));
        session.finish();

        let mut recorder = Recorder::default();
        run_receiver(server, &mut recorder);
        assert_eq!(
            recorder.messages,
            vec![Message::UpdateHold, Message::garbage_rows(1, 0)]
        );
        assert!(recorder.finished);
    }
}
