//! Group conversation context: shared history/roster stores and the
//! effective-body builder.
//!
//! The history store is keyed by group conversation id. Entries accumulate
//! in chronological order while a group is idle and are cleared in full
//! once a reply has been delivered. Access is serialized per key: two
//! concurrent events for the same group can never observe a half-applied
//! mutation.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex as StdMutex},
};

use {
    serde::{Deserialize, Serialize},
    tokio::sync::Mutex,
};

use magpie_common::types::{ChatType, InboundMsg};

use crate::envelope::{build_inbound_line, format_agent_envelope};

/// Literal two-character marker (backslash + `n`) the agent sees between
/// folded lines. This is the wire format group agents already parse; it is
/// not a real newline.
pub const LINE_BREAK: &str = "\\n";

// ── History entries ─────────────────────────────────────────────────────────

/// One prior message in a group conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupHistoryEntry {
    pub sender: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_jid: Option<String>,
}

impl GroupHistoryEntry {
    pub fn new(sender: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            body: body.into(),
            timestamp: None,
            id: None,
            sender_jid: None,
        }
    }
}

// ── Shared stores ───────────────────────────────────────────────────────────

type KeyedHistory = Arc<Mutex<Vec<GroupHistoryEntry>>>;

/// Shared group history, serialized per conversation key.
#[derive(Debug, Clone, Default)]
pub struct GroupHistoryStore {
    inner: Arc<StdMutex<HashMap<String, KeyedHistory>>>,
}

impl GroupHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: &str) -> KeyedHistory {
        let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(map.entry(key.to_string()).or_default())
    }

    /// Append one entry, keeping at most `cap` entries (oldest dropped).
    pub async fn append(&self, key: &str, entry: GroupHistoryEntry, cap: usize) {
        let slot = self.slot(key);
        let mut entries = slot.lock().await;
        entries.push(entry);
        if cap > 0 && entries.len() > cap {
            let excess = entries.len() - cap;
            entries.drain(..excess);
        }
    }

    /// Full copy of the current entries, taken under the key's lock.
    pub async fn snapshot(&self, key: &str) -> Vec<GroupHistoryEntry> {
        let slot = self.slot(key);
        let entries = slot.lock().await;
        entries.clone()
    }

    /// Clear all entries for a key. Clearing is always all-or-nothing.
    pub async fn clear(&self, key: &str) {
        let slot = self.slot(key);
        slot.lock().await.clear();
    }

    pub async fn len(&self, key: &str) -> usize {
        let slot = self.slot(key);
        slot.lock().await.len()
    }
}

/// Per-group member-name roster (channel-native id → display name).
///
/// Mutated by the channel's presence/metadata events, read here when
/// rendering the participant list.
#[derive(Debug, Clone, Default)]
pub struct GroupRosterStore {
    inner: Arc<StdMutex<HashMap<String, HashMap<String, String>>>>,
}

impl GroupRosterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, group_key: &str, member_id: impl Into<String>, name: impl Into<String>) {
        let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        map.entry(group_key.to_string())
            .or_default()
            .insert(member_id.into(), name.into());
    }

    pub fn roster(&self, group_key: &str) -> Option<HashMap<String, String>> {
        let map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        map.get(group_key).cloned()
    }
}

// ── Effective body ──────────────────────────────────────────────────────────

/// The text handed to the reply resolver, plus the clearing decision made
/// while building it.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveBody {
    pub text: String,
    /// True for group events whose clearing was not suppressed by the
    /// caller; acted on only after a reply is actually delivered.
    pub should_clear_history: bool,
}

fn sender_label(msg: &InboundMsg) -> String {
    match (msg.sender_name.as_deref(), msg.sender_e164.as_deref()) {
        (Some(name), Some(id)) if !name.is_empty() && !id.is_empty() => {
            format!("{name} ({id})")
        },
        (Some(name), _) if !name.is_empty() => name.to_string(),
        (_, Some(id)) if !id.is_empty() => id.to_string(),
        _ => "Unknown".to_string(),
    }
}

/// Build the effective body for one inbound event.
///
/// Direct chats get the plain envelope line. Group chats fold prior history
/// (excluding the entry for the current event itself, which is always the
/// last one) and always append a `[from: ...]` trailer so the resolver can
/// attribute the triggering message even when no history was folded.
pub fn build_effective_body(
    channel: &str,
    msg: &InboundMsg,
    history: &[GroupHistoryEntry],
    suppress_history_clear: bool,
) -> EffectiveBody {
    let mut text = build_inbound_line(channel, msg);

    if msg.chat_type != ChatType::Group {
        return EffectiveBody {
            text,
            should_clear_history: false,
        };
    }

    let conversation = msg.conversation();
    // The current event's own entry, if present, is the last one; drop it so
    // the triggering message never appears twice.
    let prior = if history.is_empty() {
        history
    } else {
        &history[..history.len() - 1]
    };
    if !prior.is_empty() {
        let folded: Vec<String> = prior
            .iter()
            .map(|entry| {
                let body_with_id = match entry.id.as_deref() {
                    Some(id) => format!("{}\n[message_id: {id}]", entry.body),
                    None => entry.body.clone(),
                };
                format_agent_envelope(
                    channel,
                    conversation,
                    entry.timestamp,
                    &format!("{}: {body_with_id}", entry.sender),
                )
            })
            .collect();
        text = format!("{}{LINE_BREAK}{text}", folded.join(LINE_BREAK));
    }

    text = format!("{text}{LINE_BREAK}[from: {}]", sender_label(msg));

    EffectiveBody {
        text,
        should_clear_history: !suppress_history_clear,
    }
}
