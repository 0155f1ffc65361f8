//! In-match wire messages
//!
//! Every message is a 1-byte tag followed by a fixed payload of signed bytes.
//! There is no length prefix and no version field, so the layout below is
//! the whole contract between two clients.

use crate::board::BoardEvent;
use crate::error::ProtocolError;
use crate::tetromino::Rotation;
use std::io::{self, ErrorKind, Read, Write};

pub const SEND_GARBAGE_ROWS: u8 = 0;
pub const UPDATE_FALLING_PIECE: u8 = 4;
pub const UPDATE_HOLD: u8 = 5;
pub const UPDATE_GARBAGE_PENDING: u8 = 6;

/// Longest encoded message: tag plus four payload bytes
pub const MAX_MESSAGE_LEN: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    /// Garbage the sender is attacking the receiver with
    SendGarbageRows { rows: i8, empty_column: i8 },
    /// The sender's falling piece this tick
    UpdateFallingPiece {
        x: i8,
        y: i8,
        rotation: Rotation,
        locked: bool,
    },
    /// The sender used hold
    UpdateHold,
    /// Garbage now queued on the sender's own board
    UpdateGarbagePending { rows: i8, empty_column: i8 },
}

fn to_wire(value: i32) -> i8 {
    value.clamp(i8::MIN as i32, i8::MAX as i32) as i8
}

fn count_to_wire(value: usize) -> i8 {
    value.min(i8::MAX as usize) as i8
}

impl Message {
    pub fn tag(&self) -> u8 {
        match self {
            Message::SendGarbageRows { .. } => SEND_GARBAGE_ROWS,
            Message::UpdateFallingPiece { .. } => UPDATE_FALLING_PIECE,
            Message::UpdateHold => UPDATE_HOLD,
            Message::UpdateGarbagePending { .. } => UPDATE_GARBAGE_PENDING,
        }
    }

    pub fn falling_piece(x: i32, y: i32, rotation: Rotation, locked: bool) -> Self {
        Message::UpdateFallingPiece {
            x: to_wire(x),
            y: to_wire(y),
            rotation,
            locked,
        }
    }

    pub fn garbage_rows(rows: usize, empty_column: usize) -> Self {
        Message::SendGarbageRows {
            rows: count_to_wire(rows),
            empty_column: count_to_wire(empty_column),
        }
    }

    pub fn garbage_pending(rows: usize, empty_column: usize) -> Self {
        Message::UpdateGarbagePending {
            rows: count_to_wire(rows),
            empty_column: count_to_wire(empty_column),
        }
    }

    /// The message a board event is announced with, if any
    pub fn from_event(event: &BoardEvent) -> Option<Self> {
        match *event {
            BoardEvent::PieceUpdate {
                x,
                y,
                rotation,
                locked,
            } => Some(Message::falling_piece(x, y, rotation, locked)),
            BoardEvent::Hold => Some(Message::UpdateHold),
            BoardEvent::Attack { rows, empty_column } => {
                Some(Message::garbage_rows(rows, empty_column))
            }
            BoardEvent::ToppedOut => None,
        }
    }

    /// Encode into a stack buffer, returns the buffer and the used length
    pub fn encode(&self) -> ([u8; MAX_MESSAGE_LEN], usize) {
        let mut buf = [0u8; MAX_MESSAGE_LEN];
        buf[0] = self.tag();
        let len = match *self {
            Message::SendGarbageRows { rows, empty_column }
            | Message::UpdateGarbagePending { rows, empty_column } => {
                buf[1] = rows as u8;
                buf[2] = empty_column as u8;
                3
            }
            Message::UpdateFallingPiece {
                x,
                y,
                rotation,
                locked,
            } => {
                buf[1] = x as u8;
                buf[2] = y as u8;
                buf[3] = rotation.index() as u8;
                buf[4] = locked as u8;
                5
            }
            Message::UpdateHold => 1,
        };
        (buf, len)
    }

    /// Write the whole message in one call
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        let (buf, len) = self.encode();
        writer.write_all(&buf[..len])
    }

    /// Read the next message. `Ok(None)` means the stream ended cleanly
    /// between two messages.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Option<Self>, ProtocolError> {
        let mut tag = [0u8; 1];
        loop {
            match reader.read(&mut tag) {
                Ok(0) => return Ok(None),
                Ok(_) => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        let tag = tag[0];

        let message = match tag {
            SEND_GARBAGE_ROWS | UPDATE_GARBAGE_PENDING => {
                let [rows, empty_column] = read_payload::<_, 2>(reader, tag)?;
                let (rows, empty_column) = (rows as i8, empty_column as i8);
                if tag == SEND_GARBAGE_ROWS {
                    Message::SendGarbageRows { rows, empty_column }
                } else {
                    Message::UpdateGarbagePending { rows, empty_column }
                }
            }
            UPDATE_FALLING_PIECE => {
                let [x, y, rotation, locked] = read_payload::<_, 4>(reader, tag)?;
                let rotation = Rotation::from_index(rotation as i8)
                    .ok_or(ProtocolError::InvalidRotation(rotation as i8))?;
                Message::UpdateFallingPiece {
                    x: x as i8,
                    y: y as i8,
                    rotation,
                    locked: locked != 0,
                }
            }
            UPDATE_HOLD => Message::UpdateHold,
            other => return Err(ProtocolError::UnknownTag(other)),
        };
        Ok(Some(message))
    }
}

fn read_payload<R: Read, const N: usize>(reader: &mut R, tag: u8) -> Result<[u8; N], ProtocolError> {
    let mut payload = [0u8; N];
    reader.read_exact(&mut payload).map_err(|e| {
        if e.kind() == ErrorKind::UnexpectedEof {
            ProtocolError::Truncated(tag)
        } else {
            ProtocolError::Io(e)
        }
    })?;
    Ok(payload)
}
