//! Shared-secret authentication handshake.
//!
//! The client's first packet is a request of type `auth` carrying the
//! credential in the `auth` field. The server answers with `auth-response`,
//! echoing the request id, with `success` set to whether the credential
//! matched its configured secret. A refused connection is closed by the server
//! right after the response.

use tracing::{debug, warn};

use crate::core::packet::Packet;
use crate::error::{ProtocolError, Result};
use crate::protocol::packet_type::PacketType;

/// Field of `auth-response` carrying the verdict
pub const SUCCESS_KEY: &str = "success";

/// Build the client's opening packet. The correlator assigns its id.
pub fn client_auth_request(credential: &str) -> Packet {
    Packet::new(PacketType::Auth).with_auth(credential)
}

/// Check the credential on a connection's first packet.
pub fn verify_credential(packet: &Packet, secret: &str) -> bool {
    match packet.auth.as_deref() {
        Some(credential) => credential == secret,
        None => {
            debug!(packet = %packet, "First packet carries no credential");
            false
        }
    }
}

/// Build the server's verdict, echoing the request id.
pub fn server_auth_response(request: &Packet, success: bool) -> Packet {
    let mut response = Packet::new(PacketType::AuthResponse).with(SUCCESS_KEY, success);
    response.id = request.id.clone();
    response
}

/// Interpret the server's verdict on the client side.
///
/// # Errors
/// `AuthFailed` unless the response is an `auth-response` with `success: true`.
pub fn client_auth_verify(response: &Packet) -> Result<()> {
    if !response.is_type(PacketType::AuthResponse.as_str()) {
        warn!(packet = %response, "Unexpected reply to auth request");
        return Err(ProtocolError::AuthFailed);
    }

    match response.get_bool(SUCCESS_KEY) {
        Some(true) => Ok(()),
        _ => Err(ProtocolError::AuthFailed),
    }
}
