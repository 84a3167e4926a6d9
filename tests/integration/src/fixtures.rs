//! Service payload builders
//!
//! JSON shaped the way the gateway delivers it, so tests exercise the real
//! decoding path.

use chrono::{DateTime, Utc};
use kook_core::MessageId;
use serde_json::{json, Value};

pub fn user_json(id: u64, username: &str) -> Value {
    json!({
        "id": id.to_string(),
        "username": username,
        "identify_num": "0001",
        "avatar": null,
        "bot": false,
        "online": true,
    })
}

pub fn text_channel_json(id: u64, guild_id: u64, name: &str) -> Value {
    json!({
        "id": id.to_string(),
        "type": 1,
        "guild_id": guild_id.to_string(),
        "name": name,
        "level": 0,
    })
}

pub fn member_json(guild_id: u64, user_id: u64, nickname: Option<&str>) -> Value {
    json!({
        "guild_id": guild_id.to_string(),
        "user": user_json(user_id, &format!("user{user_id}")),
        "nickname": nickname,
        "roles": [],
    })
}

/// Guild with one text channel (`guild_id * 10`) and the given members
pub fn guild_json(guild_id: u64, owner_id: u64, member_ids: &[u64]) -> Value {
    let members: Vec<Value> = member_ids
        .iter()
        .map(|id| member_json(guild_id, *id, None))
        .collect();
    json!({
        "id": guild_id.to_string(),
        "name": format!("guild{guild_id}"),
        "user_id": owner_id.to_string(),
        "channels": [text_channel_json(guild_id * 10, guild_id, "general")],
        "members": members,
    })
}

pub fn ready_json(session_id: &str, user_id: u64, guilds: Vec<Value>) -> Value {
    json!({
        "session_id": session_id,
        "user": user_json(user_id, "me"),
        "guilds": guilds,
    })
}

/// Timestamp `offset_ms` after a fixed origin
pub fn at(offset_ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(1_700_000_000_000 + offset_ms).unwrap_or_default()
}

pub fn message_json(id: MessageId, channel_id: u64, author_id: u64, content: &str, sent_at: DateTime<Utc>) -> Value {
    json!({
        "msg_id": id.to_string(),
        "target_id": channel_id.to_string(),
        "author_id": author_id.to_string(),
        "type": 1,
        "content": content,
        "msg_timestamp": sent_at.timestamp_millis(),
    })
}

pub fn message_update_json(id: MessageId, channel_id: u64, content: &str, updated_at: DateTime<Utc>) -> Value {
    json!({
        "msg_id": id.to_string(),
        "target_id": channel_id.to_string(),
        "content": content,
        "updated_at": updated_at.timestamp_millis(),
    })
}

pub fn message_delete_json(id: MessageId, channel_id: u64) -> Value {
    json!({
        "msg_id": id.to_string(),
        "target_id": channel_id.to_string(),
    })
}
