//! Recording client for tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};

use super::{
    AccountIdentity, ClientError, GroupInfo, Jid, MessageEvent, OutgoingMessage, Participant,
    ParticipantAction, WaClient,
};

#[derive(Default)]
pub struct MockClient {
    pub session: String,
    identity: RwLock<AccountIdentity>,
    pub sent: Mutex<Vec<(Jid, OutgoingMessage)>>,
    pub participant_updates: Mutex<Vec<(Jid, Vec<Jid>, ParticipantAction)>>,
    pub revoked: Mutex<Vec<String>>,
    pub read: Mutex<Vec<String>>,
    pub presence: Mutex<Vec<bool>>,
    pub announce: Mutex<Vec<bool>>,
    pub groups: DashMap<Jid, GroupInfo>,
    pub group_info_calls: AtomicUsize,
    pub fail_group_info: AtomicBool,
    pub media: Mutex<Option<Vec<u8>>>,
    pub disconnected: AtomicBool,
}

impl MockClient {
    pub fn new(session: &str, phone: &str) -> Self {
        Self {
            session: session.to_string(),
            identity: RwLock::new(AccountIdentity {
                phone: Some(phone.to_string()),
                lid: None,
            }),
            ..Default::default()
        }
    }

    /// Register a group where the given numbers are admins.
    pub fn with_group(self, group: &Jid, members: &[&str], admins: &[&str]) -> Self {
        let participants = members
            .iter()
            .map(|m| Participant {
                jid: Jid::user_jid(m),
                phone: None,
                is_admin: admins.contains(m),
                is_super_admin: false,
            })
            .collect();

        self.groups.insert(group.clone(), GroupInfo { participants });
        self
    }

    /// Texts sent so far, in order.
    pub fn sent_texts(&self) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .filter_map(|(_, msg)| match msg {
                OutgoingMessage::Text { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().len()
    }
}

#[async_trait]
impl WaClient for MockClient {
    fn session_id(&self) -> &str {
        &self.session
    }

    fn identity(&self) -> AccountIdentity {
        self.identity.read().clone()
    }

    fn set_identity(&self, identity: AccountIdentity) {
        *self.identity.write() = identity;
    }

    fn is_echo(&self, message_id: &str) -> bool {
        message_id.starts_with("sent-")
    }

    async fn send(&self, chat: &Jid, message: OutgoingMessage) -> Result<String, ClientError> {
        let mut sent = self.sent.lock();
        sent.push((chat.clone(), message));
        Ok(format!("sent-{}", sent.len()))
    }

    async fn mark_read(&self, _chat: &Jid, _sender: &Jid, ids: &[String]) -> Result<(), ClientError> {
        self.read.lock().extend(ids.iter().cloned());
        Ok(())
    }

    async fn send_presence(&self, available: bool) -> Result<(), ClientError> {
        self.presence.lock().push(available);
        Ok(())
    }

    async fn group_info(&self, group: &Jid) -> Result<GroupInfo, ClientError> {
        self.group_info_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_group_info.load(Ordering::SeqCst) {
            return Err(ClientError::NotConnected);
        }
        self.groups
            .get(group)
            .map(|g| g.clone())
            .ok_or_else(|| ClientError::Status {
                status: 404,
                body: "group not found".into(),
            })
    }

    async fn update_participants(
        &self,
        group: &Jid,
        participants: &[Jid],
        action: ParticipantAction,
    ) -> Result<(), ClientError> {
        self.participant_updates
            .lock()
            .push((group.clone(), participants.to_vec(), action));
        Ok(())
    }

    async fn set_announce(&self, _group: &Jid, announce: bool) -> Result<(), ClientError> {
        self.announce.lock().push(announce);
        Ok(())
    }

    async fn revoke(&self, _chat: &Jid, _sender: &Jid, message_id: &str) -> Result<(), ClientError> {
        self.revoked.lock().push(message_id.to_string());
        Ok(())
    }

    async fn download_media(&self, _event: &MessageEvent, _quoted: bool) -> Result<Vec<u8>, ClientError> {
        self.media.lock().clone().ok_or(ClientError::NoMedia)
    }

    async fn disconnect(&self) {
        self.disconnected.store(true, Ordering::SeqCst);
    }
}
