//! Permission checker with cached group lookups.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::cache::{CacheConfig, CacheRegistry, TypedCache};
use crate::client::{GroupInfo, Jid, MessageEvent, WaClient};
use crate::database::{Mode, SettingsStore};
use crate::utils::jid::clean_id;

/// Who may run a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Everyone,
    /// Group chats only; group admins and owners.
    GroupAdmin,
    Owner,
}

/// Cache key for group lookups: (session, group jid).
type GroupCacheKey = (String, String);

/// Permission checker.
///
/// Owners (the paired account itself plus `OWNER_NUMBERS`) bypass every
/// check. Admin status comes from the group's participant list, fetched
/// through the session's client and cached briefly.
#[derive(Clone)]
pub struct Permissions {
    groups: TypedCache<GroupCacheKey, Arc<GroupInfo>>,
    owner_numbers: Arc<Vec<String>>,
    settings: SettingsStore,
}

impl Permissions {
    pub fn new(cache_registry: &CacheRegistry, owner_numbers: Vec<String>, settings: SettingsStore) -> Self {
        let groups = cache_registry.get_or_create("group_metadata", CacheConfig::group_metadata());

        Self {
            groups,
            owner_numbers: Arc::new(owner_numbers),
            settings,
        }
    }

    /// Whether `sender` is the account behind `client` (by number or LID)
    /// or a configured extra owner.
    pub fn is_owner(&self, client: &dyn WaClient, sender: &Jid) -> bool {
        let sender = sender.clean();
        if sender.is_empty() {
            return false;
        }

        let identity = client.identity();
        let own = [identity.phone.as_deref(), identity.lid.as_deref()]
            .into_iter()
            .flatten()
            .map(clean_id)
            .any(|id| !id.is_empty() && id == sender);

        own || self.owner_numbers.iter().any(|n| *n == sender)
    }

    /// Group metadata, cached. `None` when the lookup fails.
    pub async fn group_info(&self, client: &dyn WaClient, group: &Jid) -> Option<Arc<GroupInfo>> {
        let key = (client.session_id().to_string(), group.to_non_device().to_string());

        if let Some(cached) = self.groups.get(&key) {
            debug!("Group cache hit for {}", group);
            return Some(cached);
        }

        debug!("Group cache miss for {}", group);

        match client.group_info(group).await {
            Ok(info) => {
                let info = Arc::new(info);
                self.groups.insert(key, Arc::clone(&info));
                Some(info)
            }
            Err(e) => {
                warn!("Failed to fetch group info for {}: {}", group, e);
                None
            }
        }
    }

    /// Whether `sender` is an admin of `group`. Lookup failures count as
    /// not admin.
    pub async fn is_admin(&self, client: &dyn WaClient, group: &Jid, sender: &Jid) -> bool {
        let sender = sender.clean();
        if sender.is_empty() {
            return false;
        }

        match self.group_info(client, group).await {
            Some(info) => info
                .participants
                .iter()
                .any(|p| p.matches(&sender) && (p.is_admin || p.is_super_admin)),
            None => false,
        }
    }

    /// Whether the bot account itself can administer `group`.
    pub async fn bot_is_admin(&self, client: &dyn WaClient, group: &Jid) -> bool {
        let identity = client.identity();
        let Some(info) = self.group_info(client, group).await else {
            return false;
        };

        [identity.phone, identity.lid]
            .into_iter()
            .flatten()
            .map(|id| clean_id(&id))
            .any(|id| {
                info.participants
                    .iter()
                    .any(|p| p.matches(&id) && (p.is_admin || p.is_super_admin))
            })
    }

    /// Chat mode policy: may this sender run commands here at all?
    pub async fn can_execute(&self, client: &dyn WaClient, event: &MessageEvent) -> bool {
        if self.is_owner(client, &event.sender) {
            return true;
        }
        if !event.is_group() {
            return true;
        }

        match self.settings.get(&event.chat.to_string()).mode {
            Mode::Private => false,
            Mode::Admin => self.is_admin(client, &event.chat, &event.sender).await,
            Mode::Public => true,
        }
    }

    /// Mode policy plus the command's own access level.
    pub async fn authorize(&self, access: Access, client: &dyn WaClient, event: &MessageEvent) -> bool {
        if !self.can_execute(client, event).await {
            debug!("Mode policy denied {} in {}", event.sender, event.chat);
            return false;
        }

        let allowed = match access {
            Access::Everyone => true,
            Access::Owner => self.is_owner(client, &event.sender),
            Access::GroupAdmin => {
                event.is_group()
                    && (self.is_owner(client, &event.sender)
                        || self.is_admin(client, &event.chat, &event.sender).await)
            }
        };

        if !allowed {
            debug!("{:?} access denied for {} in {}", access, event.sender, event.chat);
        }
        allowed
    }

    /// Forget cached metadata for a group (all sessions).
    pub fn invalidate(&self, group: &Jid) {
        let group = group.to_non_device().to_string();
        self.groups.invalidate_where(|(_, g), _| *g == group);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::client::mock::MockClient;

    const BOT: &str = "923000000001";
    const ADMIN: &str = "923000000002";
    const MEMBER: &str = "923000000003";

    fn group() -> Jid {
        "120363000000000001@g.us".parse().unwrap()
    }

    fn event(chat: &Jid, sender: &str) -> MessageEvent {
        MessageEvent {
            session: "s1".into(),
            id: "M1".into(),
            chat: chat.clone(),
            sender: format!("{sender}:7@s.whatsapp.net").parse().unwrap(),
            from_me: false,
            text: "#ping".into(),
            media: None,
            quoted: None,
            mentions: Vec::new(),
        }
    }

    fn setup(mode: Mode) -> (Permissions, MockClient) {
        let settings = SettingsStore::new();
        settings.update(&group().to_string(), |s| s.mode = mode);
        let perms = Permissions::new(&CacheRegistry::new(), vec!["447700900000".into()], settings);
        let client = MockClient::new("s1", BOT).with_group(&group(), &[BOT, ADMIN, MEMBER], &[BOT, ADMIN]);
        (perms, client)
    }

    #[tokio::test]
    async fn test_owner_always_passes() {
        for mode in [Mode::Public, Mode::Admin, Mode::Private] {
            let (perms, client) = setup(mode);
            client.fail_group_info.store(true, Ordering::SeqCst);
            assert!(perms.can_execute(&client, &event(&group(), BOT)).await);
            assert!(perms.can_execute(&client, &event(&Jid::user_jid(MEMBER), BOT)).await);
            assert!(perms.can_execute(&client, &event(&group(), "447700900000")).await);
        }
    }

    #[tokio::test]
    async fn test_owner_matches_linked_identifier() {
        let (perms, client) = setup(Mode::Private);
        client.set_identity(crate::client::AccountIdentity {
            phone: Some(BOT.into()),
            lid: Some("99887766:3@lid".into()),
        });
        let sender: Jid = "99887766@lid".parse().unwrap();
        assert!(perms.is_owner(&client, &sender));
    }

    #[tokio::test]
    async fn test_private_mode_rejects_group_admins() {
        let (perms, client) = setup(Mode::Private);
        assert!(!perms.can_execute(&client, &event(&group(), ADMIN)).await);
        assert!(!perms.can_execute(&client, &event(&group(), MEMBER)).await);
    }

    #[tokio::test]
    async fn test_admin_mode_requires_admin_flag() {
        let (perms, client) = setup(Mode::Admin);
        assert!(perms.can_execute(&client, &event(&group(), ADMIN)).await);
        assert!(!perms.can_execute(&client, &event(&group(), MEMBER)).await);
        assert!(!perms.can_execute(&client, &event(&group(), "111111111")).await);
    }

    #[tokio::test]
    async fn test_admin_lookup_fails_closed() {
        let (perms, client) = setup(Mode::Admin);
        client.fail_group_info.store(true, Ordering::SeqCst);
        assert!(!perms.can_execute(&client, &event(&group(), ADMIN)).await);
    }

    #[tokio::test]
    async fn test_non_group_chats_pass() {
        let (perms, client) = setup(Mode::Private);
        assert!(perms.can_execute(&client, &event(&Jid::user_jid(MEMBER), MEMBER)).await);
    }

    #[tokio::test]
    async fn test_group_info_is_cached_until_invalidated() {
        let (perms, client) = setup(Mode::Admin);
        assert!(perms.is_admin(&client, &group(), &Jid::user_jid(ADMIN)).await);
        assert!(perms.is_admin(&client, &group(), &Jid::user_jid(ADMIN)).await);
        assert_eq!(client.group_info_calls.load(Ordering::SeqCst), 1);

        perms.invalidate(&group());
        assert!(perms.bot_is_admin(&client, &group()).await);
        assert_eq!(client.group_info_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_authorize_access_levels() {
        let (perms, client) = setup(Mode::Public);
        let member = event(&group(), MEMBER);
        let admin = event(&group(), ADMIN);
        let dm = event(&Jid::user_jid(ADMIN), ADMIN);

        assert!(perms.authorize(Access::Everyone, &client, &member).await);
        assert!(!perms.authorize(Access::GroupAdmin, &client, &member).await);
        assert!(perms.authorize(Access::GroupAdmin, &client, &admin).await);
        assert!(!perms.authorize(Access::GroupAdmin, &client, &dm).await);
        assert!(!perms.authorize(Access::Owner, &client, &admin).await);
        assert!(perms.authorize(Access::Owner, &client, &event(&group(), BOT)).await);
    }
}
