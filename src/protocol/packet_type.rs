//! Vocabulary of packet `type` strings.
//!
//! Dispatch routes on raw strings, so this enum documents the packet types the
//! coordinator and its shards exchange rather than restricting them. Only
//! `auth`, `auth-response` and `disconnect` have meaning inside the protocol
//! core; `missing-packet` names the fallback handler slot.

use std::fmt;
use std::str::FromStr;

use crate::error::ProtocolError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketType {
    /// Client -> server, first packet on a connection
    Auth,
    /// Server -> client, carries `success`
    AuthResponse,
    /// Client -> server, ends the connection without a reply
    Disconnect,
    /// Registry key of the fallback handler
    MissingPacket,
    ShardReady,
    ShardDisconnect,
    Eval,
    EvalResponse,
    Exec,
    ExecResponse,
    BroadcastRequest,
    BroadcastResponse,
    Cooldown,
    CooldownAdd,
    CooldownReset,
    CooldownInfo,
    DmMessage,
    DmMessageRequest,
    MineCommand,
    ConcurrencyCheck,
    ConcurrencyAcquire,
    ConcurrencyRelease,
    CommandRan,
}

impl PacketType {
    pub const ALL: [PacketType; 23] = [
        PacketType::Auth,
        PacketType::AuthResponse,
        PacketType::Disconnect,
        PacketType::MissingPacket,
        PacketType::ShardReady,
        PacketType::ShardDisconnect,
        PacketType::Eval,
        PacketType::EvalResponse,
        PacketType::Exec,
        PacketType::ExecResponse,
        PacketType::BroadcastRequest,
        PacketType::BroadcastResponse,
        PacketType::Cooldown,
        PacketType::CooldownAdd,
        PacketType::CooldownReset,
        PacketType::CooldownInfo,
        PacketType::DmMessage,
        PacketType::DmMessageRequest,
        PacketType::MineCommand,
        PacketType::ConcurrencyCheck,
        PacketType::ConcurrencyAcquire,
        PacketType::ConcurrencyRelease,
        PacketType::CommandRan,
    ];

    /// Wire form of the type tag
    pub const fn as_str(self) -> &'static str {
        match self {
            PacketType::Auth => "auth",
            PacketType::AuthResponse => "auth-response",
            PacketType::Disconnect => "disconnect",
            PacketType::MissingPacket => "missing-packet",
            PacketType::ShardReady => "shard-ready",
            PacketType::ShardDisconnect => "shard-disconnect",
            PacketType::Eval => "eval",
            PacketType::EvalResponse => "eval-response",
            PacketType::Exec => "exec",
            PacketType::ExecResponse => "exec-response",
            PacketType::BroadcastRequest => "broadcast-request",
            PacketType::BroadcastResponse => "broadcast-response",
            PacketType::Cooldown => "cooldown",
            PacketType::CooldownAdd => "cooldown-add",
            PacketType::CooldownReset => "cooldown-reset",
            PacketType::CooldownInfo => "cooldown-info",
            PacketType::DmMessage => "dm-message",
            PacketType::DmMessageRequest => "dm-message-request",
            PacketType::MineCommand => "mine-command",
            PacketType::ConcurrencyCheck => "concurrency-check",
            PacketType::ConcurrencyAcquire => "concurrency-acquire",
            PacketType::ConcurrencyRelease => "concurrency-release",
            PacketType::CommandRan => "command-ran",
        }
    }
}

impl fmt::Display for PacketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PacketType {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PacketType::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ProtocolError::Custom(format!("Unknown packet type: {s}")))
    }
}

impl From<PacketType> for String {
    fn from(kind: PacketType) -> Self {
        kind.as_str().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_type_parses_back() {
        for kind in PacketType::ALL {
            assert_eq!(kind.as_str().parse::<PacketType>().unwrap(), kind);
        }
    }

    #[test]
    fn test_unknown_type_is_error() {
        assert!("nonexistent-type".parse::<PacketType>().is_err());
    }

    #[test]
    fn test_reserved_names() {
        assert_eq!(PacketType::AuthResponse.to_string(), "auth-response");
        assert_eq!(PacketType::MissingPacket.as_str(), "missing-packet");
    }
}
