//! Family chats
//!
//! Every family head owns one chat. Players read every chat they have been
//! part of and write to the chat of the family they belong to now.

use std::collections::HashMap;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use web_time::SystemTime;

use crate::{
    TruncatedVec,
    constants::chat as limits,
    names::{self, clean_text},
    watcher::Id,
};

/// One message in a family chat
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// When it was sent
    pub sent: SystemTime,
    /// The text
    pub message: String,
    /// Real name of the sender
    pub sender: String,
    /// Family head owning the chat
    pub chat: Id,
    /// Display name of the chat at the time of sending
    pub chat_name: String,
}

/// Display name of the chat owned by a family head
pub fn chat_name(head_name: &str) -> String {
    format!("{head_name}'s family")
}

/// All chats of a game, keyed by family head
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Chats {
    logs: HashMap<Id, Vec<ChatMessage>>,
}

impl Chats {
    /// Appends a message to a chat
    ///
    /// # Errors
    ///
    /// * `names::Error::Empty` - Nothing but whitespace was typed
    /// * `names::Error::TooLong` - The message is over the length limit
    pub fn send(
        &mut self,
        chat: Id,
        chat_name: String,
        sender: String,
        text: &str,
    ) -> Result<ChatMessage, names::Error> {
        let message = ChatMessage {
            sent: SystemTime::now(),
            message: clean_text(text, limits::MAX_MESSAGE_LENGTH)?,
            sender,
            chat,
            chat_name,
        };
        self.logs.entry(chat).or_default().push(message.clone());
        Ok(message)
    }

    /// Number of messages in one chat
    pub fn len(&self, chat: Id) -> usize {
        self.logs.get(&chat).map_or(0, Vec::len)
    }

    /// Whether no chat has any message
    pub fn is_empty(&self) -> bool {
        self.logs.values().all(Vec::is_empty)
    }

    /// Messages of the subscribed chats merged together, newest first
    pub fn view(&self, subscriptions: &[Id]) -> TruncatedVec<ChatMessage> {
        let logs = subscriptions
            .iter()
            .unique()
            .filter_map(|chat| self.logs.get(chat))
            .collect_vec();
        let total = logs.iter().map(|log| log.len()).sum();

        TruncatedVec::new(
            logs.into_iter()
                .map(|log| log.iter().rev())
                .kmerge_by(|a, b| a.sent > b.sent)
                .cloned(),
            limits::VIEW_LIMIT,
            total,
        )
    }
}
