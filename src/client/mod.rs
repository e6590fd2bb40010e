//! Messaging client seam.
//!
//! The bot never speaks the messaging protocol itself. Everything it needs
//! from an authenticated account goes through [`WaClient`], one instance per
//! connected session. Replies are always routed back through the client that
//! received the event.
//!
//! ## Implementations
//!
//! - [`gateway::GatewayClient`] - REST gateway with webhook delivery
//! - `mock::MockClient` - recording client for tests

pub mod gateway;
mod types;

#[cfg(test)]
pub mod mock;

use async_trait::async_trait;
use thiserror::Error;

use crate::utils::jid::JidError;

pub use gateway::{parse_webhook, Gateway};
pub use types::*;

/// Errors returned by a messaging client.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("gateway request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("gateway returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected gateway response: {0}")]
    Decode(String),

    #[error("session is not connected")]
    NotConnected,

    #[error("message carries no downloadable media")]
    NoMedia,

    #[error(transparent)]
    Jid(#[from] JidError),
}

/// Connection handle for one authenticated account.
#[async_trait]
pub trait WaClient: Send + Sync {
    /// Stable identifier of the session this client serves.
    fn session_id(&self) -> &str;

    /// How the service addresses this account.
    fn identity(&self) -> AccountIdentity;

    /// Record the account identity once the service reports it.
    fn set_identity(&self, identity: AccountIdentity);

    /// Whether a message id was produced by this client's own `send`.
    fn is_echo(&self, message_id: &str) -> bool;

    /// Send a message, returning the id the service assigned to it.
    async fn send(&self, chat: &Jid, message: OutgoingMessage) -> Result<String, ClientError>;

    async fn mark_read(&self, chat: &Jid, sender: &Jid, ids: &[String]) -> Result<(), ClientError>;

    async fn send_presence(&self, available: bool) -> Result<(), ClientError>;

    async fn group_info(&self, group: &Jid) -> Result<GroupInfo, ClientError>;

    async fn update_participants(
        &self,
        group: &Jid,
        participants: &[Jid],
        action: ParticipantAction,
    ) -> Result<(), ClientError>;

    /// Restrict (`true`) or open (`false`) sending to admins only.
    async fn set_announce(&self, group: &Jid, announce: bool) -> Result<(), ClientError>;

    /// Delete a message for everyone.
    async fn revoke(&self, chat: &Jid, sender: &Jid, message_id: &str) -> Result<(), ClientError>;

    /// Download the media of a message, or of the message it quotes.
    async fn download_media(&self, event: &MessageEvent, quoted: bool) -> Result<Vec<u8>, ClientError>;

    async fn disconnect(&self);
}
