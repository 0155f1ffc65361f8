//! Error types shared by the protocol, handshake and settings layers

use std::io;
use thiserror::Error;

/// Errors raised while decoding the in-match byte stream.
///
/// Any of these ends the receiver loop and is reported to the session as an
/// abnormal disconnect.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Unknown message tag: {0}")]
    UnknownTag(u8),

    #[error("Truncated payload for tag {0}")]
    Truncated(u8),

    #[error("Invalid rotation index: {0}")]
    InvalidRotation(i8),
}

/// Errors raised by the client side of the matchmaking handshake
#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Room {0} does not exist")]
    RoomNotFound(i32),

    #[error("Server has no free rooms")]
    LobbyFull,

    #[error("Unexpected reply byte: {0:#04x}")]
    UnexpectedReply(u8),

    #[error("Server closed the connection during negotiation")]
    ServerClosed,
}

/// Errors raised while loading or saving the settings file
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to parse settings: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),
}
