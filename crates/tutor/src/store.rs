//! Local key-value persistence for conversations and practice statistics.
//!
//! The whole store is one JSON object on disk. It is read once when opened
//! and rewritten after every mutation; concurrent writers race and the last
//! one wins.
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::StoreError;
use crate::models::message::ConversationMessage;
use crate::models::role::Role;

pub const CONVERSATIONS_KEY: &str = "conversations";
pub const PRACTICE_STATS_KEY: &str = "practice_stats";

const TITLE_LENGTH: usize = 40;

#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: Map<String, Value>,
}

impl JsonFileStore {
    /// Load the store at `path`; a missing file is an empty store
    pub fn open<P: Into<PathBuf>>(path: P) -> Result<Self, StoreError> {
        let path = path.into();
        let entries = if path.exists() {
            let content = fs::read_to_string(&path)?;
            if content.trim().is_empty() {
                Map::new()
            } else {
                serde_json::from_str(&content)?
            }
        } else {
            Map::new()
        };
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        self.entries
            .get(key)
            .map(|value| serde_json::from_value(value.clone()))
            .transpose()
            .map_err(StoreError::from)
    }

    pub fn set<T: Serialize>(&mut self, key: &str, value: &T) -> Result<(), StoreError> {
        self.entries
            .insert(key.to_string(), serde_json::to_value(value)?);
        self.save()
    }

    fn save(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(&self.entries)?;
        fs::write(&self.path, content)?;
        Ok(())
    }

    pub fn conversations(&self) -> Result<Vec<SavedConversation>, StoreError> {
        Ok(self.get(CONVERSATIONS_KEY)?.unwrap_or_default())
    }

    /// Insert or replace a conversation by id
    pub fn save_conversation(&mut self, conversation: &SavedConversation) -> Result<(), StoreError> {
        let mut conversations = self.conversations()?;
        match conversations.iter_mut().find(|saved| saved.id == conversation.id) {
            Some(saved) => *saved = conversation.clone(),
            None => conversations.push(conversation.clone()),
        }
        self.set(CONVERSATIONS_KEY, &conversations)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedConversation {
    pub id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub messages: Vec<ConversationMessage>,
}

impl SavedConversation {
    pub fn new() -> Self {
        let now = Utc::now();
        SavedConversation {
            id: uuid::Uuid::new_v4().to_string(),
            title: title_for(&[]),
            created_at: now,
            updated_at: now,
            messages: Vec::new(),
        }
    }

    pub fn update(&mut self, messages: &[ConversationMessage]) {
        self.messages = messages.to_vec();
        self.title = title_for(messages);
        self.updated_at = Utc::now();
    }
}

impl Default for SavedConversation {
    fn default() -> Self {
        Self::new()
    }
}

/// The first user message, shortened to fit a list entry
pub fn title_for(messages: &[ConversationMessage]) -> String {
    let text = messages
        .iter()
        .find(|message| message.role == Role::User)
        .map(|message| message.text.trim())
        .unwrap_or("");

    if text.is_empty() {
        return "New conversation".to_string();
    }
    if text.chars().count() <= TITLE_LENGTH {
        return text.to_string();
    }
    let short: String = text.chars().take(TITLE_LENGTH).collect();
    format!("{}...", short.trim_end())
}
