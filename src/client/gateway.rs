//! REST gateway client.
//!
//! Talks to a multi-device WhatsApp gateway (Evolution API compatible).
//! Each paired account is one gateway *instance*, named after the session
//! id. Outbound actions are REST calls; inbound events are POSTed by the
//! gateway to `/webhook/{session}` and decoded by [`parse_webhook`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use parking_lot::RwLock;
use reqwest::{Method, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use url::Url;

use super::{
    AccountIdentity, ClientError, Event, GroupInfo, GroupUpdateEvent, Jid, MediaKind,
    MessageEvent, OutgoingMessage, Participant, ParticipantAction, QuoteRef, QuotedContext,
    WaClient,
};
use crate::cache::{CacheConfig, CacheRegistry, TypedCache};

/// Webhook events the bot subscribes to when creating an instance.
const WEBHOOK_EVENTS: &[&str] = &[
    "MESSAGES_UPSERT",
    "CONNECTION_UPDATE",
    "GROUP_UPDATE",
    "GROUP_PARTICIPANTS_UPDATE",
];

/// Header carrying the shared webhook secret.
pub const WEBHOOK_SECRET_HEADER: &str = "x-webhook-secret";

/// Connector for the gateway: instance management and client construction.
#[derive(Clone)]
pub struct Gateway {
    http: reqwest::Client,
    base: Url,
    api_key: Option<String>,
    webhook_base: String,
    webhook_secret: Option<String>,
    cache: CacheRegistry,
}

impl Gateway {
    pub fn new(
        http: reqwest::Client,
        base: Url,
        api_key: Option<String>,
        webhook_base: String,
        webhook_secret: Option<String>,
        cache: CacheRegistry,
    ) -> Self {
        Self {
            http,
            base,
            api_key,
            webhook_base: webhook_base.trim_end_matches('/').to_string(),
            webhook_secret,
            cache,
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.base.as_str().trim_end_matches('/'), path);
        let builder = self.http.request(method, url);
        match &self.api_key {
            Some(key) => builder.header("apikey", key),
            None => builder,
        }
    }

    async fn call(&self, builder: RequestBuilder) -> Result<Value, ClientError> {
        let resp = builder.send().await?;
        read_json(resp).await
    }

    /// Create a gateway instance for a new session, pointing its webhook at us.
    pub async fn create_instance(&self, instance: &str, number: &str) -> Result<(), ClientError> {
        let mut webhook = json!({
            "url": format!("{}/webhook/{}", self.webhook_base, instance),
            "byEvents": false,
            "base64": true,
            "events": WEBHOOK_EVENTS,
        });
        if let Some(secret) = &self.webhook_secret {
            webhook["headers"] = json!({ WEBHOOK_SECRET_HEADER: secret });
        }

        let body = json!({
            "instanceName": instance,
            "integration": "WHATSAPP-BAILEYS",
            "qrcode": false,
            "number": number,
            "webhook": webhook,
        });

        self.call(self.request(Method::POST, "instance/create").json(&body))
            .await?;
        info!("Created gateway instance {}", instance);
        Ok(())
    }

    /// Ask the service for a phone pairing code for an instance.
    pub async fn request_pairing_code(
        &self,
        instance: &str,
        number: &str,
    ) -> Result<String, ClientError> {
        let value = self
            .call(
                self.request(Method::GET, &format!("instance/connect/{instance}"))
                    .query(&[("number", number)]),
            )
            .await?;

        value["pairingCode"]
            .as_str()
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .ok_or_else(|| ClientError::Decode("no pairingCode in connect response".into()))
    }

    /// Current connection state of an instance (`open`, `connecting`, `close`).
    pub async fn connection_state(&self, instance: &str) -> Result<String, ClientError> {
        let value = self
            .call(self.request(
                Method::GET,
                &format!("instance/connectionState/{instance}"),
            ))
            .await?;

        Ok(value["instance"]["state"]
            .as_str()
            .or_else(|| value["state"].as_str())
            .unwrap_or("close")
            .to_string())
    }

    /// Remove an instance (used when pairing never completes).
    pub async fn delete_instance(&self, instance: &str) -> Result<(), ClientError> {
        self.call(self.request(Method::DELETE, &format!("instance/delete/{instance}")))
            .await?;
        Ok(())
    }

    /// Build a client handle for an instance.
    pub fn client(&self, instance: &str, identity: AccountIdentity) -> GatewayClient {
        let sent = self.cache.get_or_create(
            &format!("sent_ids:{instance}"),
            CacheConfig::with_capacity(2_000).ttl(Duration::from_secs(600)),
        );

        GatewayClient {
            gateway: self.clone(),
            instance: instance.to_string(),
            identity: RwLock::new(identity),
            sent,
            connected: AtomicBool::new(true),
        }
    }

    /// Drop the echo cache of an instance that will not come back.
    pub fn forget(&self, instance: &str) {
        if self.cache.remove(&format!("sent_ids:{instance}")) {
            debug!("Released caches of {} ({} left)", instance, self.cache.len());
        }
    }
}

/// Client handle for one gateway instance.
pub struct GatewayClient {
    gateway: Gateway,
    instance: String,
    identity: RwLock<AccountIdentity>,
    /// Ids of messages we sent, to drop their webhook echo.
    sent: TypedCache<String, ()>,
    connected: AtomicBool,
}

impl GatewayClient {
    fn path(&self, action: &str) -> String {
        format!("{action}/{}", self.instance)
    }

    async fn post(&self, action: &str, body: Value) -> Result<Value, ClientError> {
        if !self.connected.load(Ordering::Relaxed) {
            return Err(ClientError::NotConnected);
        }
        self.gateway
            .call(self.gateway.request(Method::POST, &self.path(action)).json(&body))
            .await
    }

    async fn group_post(
        &self,
        action: &str,
        group: &Jid,
        body: Value,
    ) -> Result<Value, ClientError> {
        if !self.connected.load(Ordering::Relaxed) {
            return Err(ClientError::NotConnected);
        }
        let group = group.to_string();
        self.gateway
            .call(
                self.gateway
                    .request(Method::POST, &self.path(action))
                    .query(&[("groupJid", group.as_str())])
                    .json(&body),
            )
            .await
    }
}

#[async_trait]
impl WaClient for GatewayClient {
    fn session_id(&self) -> &str {
        &self.instance
    }

    fn identity(&self) -> AccountIdentity {
        self.identity.read().clone()
    }

    fn set_identity(&self, identity: AccountIdentity) {
        *self.identity.write() = identity;
    }

    fn is_echo(&self, message_id: &str) -> bool {
        self.sent.contains(&message_id.to_string())
    }

    async fn send(&self, chat: &Jid, message: OutgoingMessage) -> Result<String, ClientError> {
        let kind = message.kind();
        let (action, body) = outgoing_body(chat, message);
        let value = self.post(action, body).await?;

        let id = value["key"]["id"].as_str().unwrap_or_default().to_string();
        if !id.is_empty() {
            self.sent.insert(id.clone(), ());
        }
        debug!("Sent {} to {} via {} ({})", kind, chat, self.instance, id);
        Ok(id)
    }

    async fn mark_read(&self, chat: &Jid, sender: &Jid, ids: &[String]) -> Result<(), ClientError> {
        let messages: Vec<Value> = ids
            .iter()
            .map(|id| {
                json!({
                    "remoteJid": chat.to_string(),
                    "participant": sender.to_string(),
                    "fromMe": false,
                    "id": id,
                })
            })
            .collect();

        self.post("chat/markMessageAsRead", json!({ "readMessages": messages }))
            .await?;
        Ok(())
    }

    async fn send_presence(&self, available: bool) -> Result<(), ClientError> {
        let presence = if available { "available" } else { "unavailable" };
        self.post("instance/setPresence", json!({ "presence": presence }))
            .await?;
        Ok(())
    }

    async fn group_info(&self, group: &Jid) -> Result<GroupInfo, ClientError> {
        if !self.connected.load(Ordering::Relaxed) {
            return Err(ClientError::NotConnected);
        }
        let group_str = group.to_string();
        let value = self
            .gateway
            .call(
                self.gateway
                    .request(Method::GET, &self.path("group/findGroupInfos"))
                    .query(&[("groupJid", group_str.as_str())]),
            )
            .await?;

        parse_group_info(value)
    }

    async fn update_participants(
        &self,
        group: &Jid,
        participants: &[Jid],
        action: ParticipantAction,
    ) -> Result<(), ClientError> {
        let participants: Vec<String> = participants.iter().map(Jid::to_string).collect();
        self.group_post(
            "group/updateParticipant",
            group,
            json!({ "action": action.as_str(), "participants": participants }),
        )
        .await?;
        Ok(())
    }

    async fn set_announce(&self, group: &Jid, announce: bool) -> Result<(), ClientError> {
        let action = if announce { "announcement" } else { "not_announcement" };
        self.group_post("group/updateSetting", group, json!({ "action": action }))
            .await?;
        Ok(())
    }

    async fn revoke(&self, chat: &Jid, sender: &Jid, message_id: &str) -> Result<(), ClientError> {
        let own = self.identity();
        let from_me = own
            .phone
            .as_deref()
            .is_some_and(|phone| crate::utils::jid::same_identity(phone, &sender.user));

        let body = json!({
            "id": message_id,
            "remoteJid": chat.to_string(),
            "fromMe": from_me,
            "participant": sender.to_string(),
        });

        self.gateway
            .call(
                self.gateway
                    .request(Method::DELETE, &self.path("chat/deleteMessageForEveryone"))
                    .json(&body),
            )
            .await?;
        Ok(())
    }

    async fn download_media(&self, event: &MessageEvent, quoted: bool) -> Result<Vec<u8>, ClientError> {
        let message = if quoted {
            let quoted = event.quoted.as_ref().ok_or(ClientError::NoMedia)?;
            if quoted.media.is_none() {
                return Err(ClientError::NoMedia);
            }
            json!({
                "key": {
                    "id": quoted.message_id,
                    "remoteJid": event.chat.to_string(),
                    "participant": quoted.participant.as_ref().map(Jid::to_string),
                },
                "message": quoted.raw,
            })
        } else {
            if event.media.is_none() {
                return Err(ClientError::NoMedia);
            }
            json!({ "key": { "id": event.id, "remoteJid": event.chat.to_string() } })
        };

        let value = self
            .post(
                "chat/getBase64FromMediaMessage",
                json!({ "message": message, "convertToMp4": false }),
            )
            .await?;

        let encoded = value["base64"]
            .as_str()
            .ok_or_else(|| ClientError::Decode("no base64 in media response".into()))?;

        BASE64
            .decode(encoded)
            .map_err(|e| ClientError::Decode(format!("bad base64 media: {e}")))
    }

    async fn disconnect(&self) {
        self.connected.store(false, Ordering::Relaxed);
        info!("Disconnected session {}", self.instance);
    }
}

async fn read_json(resp: Response) -> Result<Value, ClientError> {
    let status = resp.status();
    let text = resp.text().await?;

    if !status.is_success() {
        return Err(ClientError::Status {
            status: status.as_u16(),
            body: text,
        });
    }

    if text.trim().is_empty() {
        return Ok(Value::Null);
    }

    serde_json::from_str(&text).map_err(|e| ClientError::Decode(e.to_string()))
}

fn quoted_json(chat: &Jid, quoted: &QuoteRef) -> Value {
    json!({
        "key": {
            "id": quoted.message_id,
            "remoteJid": chat.to_string(),
            "participant": quoted.sender.to_string(),
        },
        "message": { "conversation": quoted.text },
    })
}

/// Map an outgoing message to its gateway action and request body.
fn outgoing_body(chat: &Jid, message: OutgoingMessage) -> (&'static str, Value) {
    let number = chat.to_string();

    match message {
        OutgoingMessage::Text {
            text,
            quoted,
            mentions,
        } => {
            let mut body = json!({ "number": number, "text": text });
            if let Some(q) = &quoted {
                body["quoted"] = quoted_json(chat, q);
            }
            if !mentions.is_empty() {
                let mentioned: Vec<String> = mentions.iter().map(Jid::to_string).collect();
                body["mentioned"] = json!(mentioned);
            }
            ("message/sendText", body)
        }
        OutgoingMessage::Reaction {
            target_id,
            target_sender,
            from_me,
            emoji,
        } => (
            "message/sendReaction",
            json!({
                "key": {
                    "remoteJid": number,
                    "fromMe": from_me,
                    "id": target_id,
                    "participant": target_sender.to_string(),
                },
                "reaction": emoji,
            }),
        ),
        OutgoingMessage::Contact {
            display_name,
            phone,
        } => (
            "message/sendContact",
            json!({
                "number": number,
                "contact": [{
                    "fullName": display_name,
                    "wuid": phone,
                    "phoneNumber": format!("+{phone}"),
                }],
            }),
        ),
        OutgoingMessage::List {
            title,
            description,
            button_text,
            footer,
            sections,
        } => {
            let sections: Vec<Value> = sections
                .into_iter()
                .map(|s| {
                    let rows: Vec<Value> = s
                        .rows
                        .into_iter()
                        .map(|r| json!({ "rowId": r.id, "title": r.title, "description": r.description }))
                        .collect();
                    json!({ "title": s.title, "rows": rows })
                })
                .collect();
            (
                "message/sendList",
                json!({
                    "number": number,
                    "title": title,
                    "description": description,
                    "buttonText": button_text,
                    "footerText": footer,
                    "sections": sections,
                }),
            )
        }
        OutgoingMessage::Media {
            kind,
            data,
            mimetype,
            caption,
            file_name,
            quoted,
        } => {
            let encoded = BASE64.encode(&data);
            let mut body = match kind {
                MediaKind::Sticker => ("message/sendSticker", json!({ "number": number, "sticker": encoded })),
                MediaKind::Audio if file_name.is_none() => (
                    "message/sendWhatsAppAudio",
                    json!({ "number": number, "audio": encoded }),
                ),
                _ => (
                    "message/sendMedia",
                    json!({
                        "number": number,
                        "mediatype": if kind == MediaKind::Audio { "document" } else { kind.as_str() },
                        "mimetype": mimetype.unwrap_or_else(|| kind.default_mimetype().to_string()),
                        "caption": caption.unwrap_or_default(),
                        "media": encoded,
                        "fileName": file_name.unwrap_or_else(|| format!("file.{}", extension(kind))),
                    }),
                ),
            };
            if let Some(q) = &quoted {
                body.1["quoted"] = quoted_json(chat, q);
            }
            body
        }
    }
}

fn extension(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Image => "jpg",
        MediaKind::Video => "mp4",
        MediaKind::Audio => "mp3",
        MediaKind::Sticker => "webp",
        MediaKind::Document => "bin",
    }
}

#[derive(Debug, Deserialize)]
struct RawParticipant {
    id: String,
    #[serde(default, rename = "phoneNumber")]
    phone_number: Option<String>,
    #[serde(default)]
    admin: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawGroupInfo {
    #[serde(default)]
    participants: Vec<RawParticipant>,
}

fn parse_group_info(value: Value) -> Result<GroupInfo, ClientError> {
    let raw: RawGroupInfo =
        serde_json::from_value(value).map_err(|e| ClientError::Decode(e.to_string()))?;

    let participants = raw
        .participants
        .into_iter()
        .filter_map(|p| {
            let jid = p.id.parse::<Jid>().ok()?;
            let phone = p.phone_number.and_then(|n| n.parse::<Jid>().ok());
            let admin = p.admin.as_deref();
            Some(Participant {
                jid,
                phone,
                is_admin: matches!(admin, Some("admin") | Some("superadmin")),
                is_super_admin: admin == Some("superadmin"),
            })
        })
        .collect();

    Ok(GroupInfo { participants })
}

// ── Webhook decoding ───────────────────────────────────────────────────

/// Decode a gateway webhook payload into events for a session.
///
/// Unknown events and undecodable messages are skipped.
pub fn parse_webhook(session: &str, payload: &Value) -> Vec<Event> {
    let event = payload["event"]
        .as_str()
        .unwrap_or_default()
        .to_lowercase()
        .replace(['_', '-'], ".");
    let data = &payload["data"];

    match event.as_str() {
        "messages.upsert" => as_items(data)
            .filter_map(|item| parse_message(session, item))
            .map(|msg| Event::Message(Box::new(msg)))
            .collect(),
        "connection.update" => match data["state"].as_str().unwrap_or_default() {
            "open" => vec![Event::Connected {
                session: session.to_string(),
                phone: data["wuid"].as_str().map(crate::utils::jid::clean_id),
                lid: data["lid"].as_str().map(crate::utils::jid::clean_id),
            }],
            "close" => vec![Event::Disconnected {
                session: session.to_string(),
            }],
            _ => Vec::new(),
        },
        "group.update" | "groups.update" | "group.participants.update" | "groups.upsert" => as_items(data)
            .filter_map(|item| {
                let group = item["id"].as_str()?.parse::<Jid>().ok()?;
                let participants = item["participants"]
                    .as_array()
                    .map(|list| {
                        list.iter()
                            .filter_map(|p| p.as_str().or_else(|| p["id"].as_str()))
                            .filter_map(|p| p.parse::<Jid>().ok())
                            .collect()
                    })
                    .unwrap_or_default();
                Some(Event::GroupUpdate(GroupUpdateEvent {
                    session: session.to_string(),
                    group,
                    action: item["action"].as_str().and_then(ParticipantAction::parse),
                    participants,
                }))
            })
            .collect(),
        other => {
            debug!("Ignoring webhook event '{}' for {}", other, session);
            Vec::new()
        }
    }
}

fn as_items(data: &Value) -> Box<dyn Iterator<Item = &Value> + '_> {
    match data.as_array() {
        Some(items) => Box::new(items.iter()),
        None => Box::new(std::iter::once(data)),
    }
}

/// Message keys that may carry text, media or a context block.
const CONTENT_KEYS: &[&str] = &[
    "extendedTextMessage",
    "imageMessage",
    "videoMessage",
    "audioMessage",
    "stickerMessage",
    "documentMessage",
];

/// Strip wrapper messages, reporting whether a view-once wrapper was present.
fn unwrap_message(message: &Value) -> (&Value, bool) {
    let mut current = message;
    let mut view_once = false;

    for _ in 0..4 {
        let inner = ["ephemeralMessage", "viewOnceMessage", "viewOnceMessageV2", "documentWithCaptionMessage"]
            .iter()
            .find_map(|key| {
                let inner = &current[*key]["message"];
                (!inner.is_null()).then_some((*key, inner))
            });

        match inner {
            Some((key, inner)) => {
                if key.starts_with("viewOnce") {
                    view_once = true;
                }
                current = inner;
            }
            None => break,
        }
    }

    let flagged = CONTENT_KEYS
        .iter()
        .any(|key| current[*key]["viewOnce"].as_bool().unwrap_or(false));

    (current, view_once || flagged)
}

fn media_kind(message: &Value) -> Option<MediaKind> {
    [
        ("imageMessage", MediaKind::Image),
        ("videoMessage", MediaKind::Video),
        ("audioMessage", MediaKind::Audio),
        ("stickerMessage", MediaKind::Sticker),
        ("documentMessage", MediaKind::Document),
    ]
    .into_iter()
    .find(|(key, _)| message[*key].is_object())
    .map(|(_, kind)| kind)
}

fn message_text(message: &Value) -> Option<String> {
    message["conversation"]
        .as_str()
        .or_else(|| message["extendedTextMessage"]["text"].as_str())
        .or_else(|| message["imageMessage"]["caption"].as_str())
        .or_else(|| message["videoMessage"]["caption"].as_str())
        .or_else(|| message["documentMessage"]["caption"].as_str())
        .map(str::to_string)
}

fn context_info<'a>(item: &'a Value, message: &'a Value) -> Option<&'a Value> {
    CONTENT_KEYS
        .iter()
        .map(|key| &message[*key]["contextInfo"])
        .chain(std::iter::once(&item["contextInfo"]))
        .find(|ctx| ctx.is_object())
}

fn parse_message(session: &str, item: &Value) -> Option<MessageEvent> {
    let key = &item["key"];
    let chat: Jid = match key["remoteJid"].as_str()?.parse() {
        Ok(jid) => jid,
        Err(e) => {
            warn!("Dropping message with bad chat id: {}", e);
            return None;
        }
    };

    let sender: Jid = key["participant"]
        .as_str()
        .filter(|p| !p.is_empty())
        .and_then(|p| p.parse().ok())
        .unwrap_or_else(|| chat.clone());

    let (message, _) = unwrap_message(&item["message"]);

    let quoted = context_info(item, message).and_then(|ctx| {
        let quoted_id = ctx["stanzaId"].as_str()?;
        let (quoted_msg, quoted_view_once) = unwrap_message(&ctx["quotedMessage"]);
        Some(QuotedContext {
            message_id: quoted_id.to_string(),
            participant: ctx["participant"].as_str().and_then(|p| p.parse().ok()),
            text: message_text(quoted_msg),
            media: media_kind(quoted_msg),
            view_once: quoted_view_once,
            raw: ctx["quotedMessage"].clone(),
        })
    });

    let mentions = context_info(item, message)
        .and_then(|ctx| ctx["mentionedJid"].as_array())
        .map(|list| {
            list.iter()
                .filter_map(Value::as_str)
                .filter_map(|j| j.parse().ok())
                .collect()
        })
        .unwrap_or_default();

    Some(MessageEvent {
        session: session.to_string(),
        id: key["id"].as_str().unwrap_or_default().to_string(),
        chat,
        sender,
        from_me: key["fromMe"].as_bool().unwrap_or(false),
        text: message_text(message).unwrap_or_default(),
        media: media_kind(message),
        quoted,
        mentions,
    })
}
