//! The owned conversation store.
//!
//! Every mutation the chat flow needs is an explicit method here, and each
//! one checks the store invariants: a single streaming message per
//! conversation, unique message ids, sealed messages never change, and
//! `updated_at` only moves forward.

use crate::error::StoreError;
use crate::models::chat::{
    derive_title,
    ChatTurn,
    Conversation,
    ConversationId,
    Message,
    MessageId,
};
use serde::{ Deserialize, Serialize };
use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<Conversation>", into = "Vec<Conversation>")]
pub struct ConversationCollection {
    conversations: HashMap<ConversationId, Conversation>,
}

impl From<Vec<Conversation>> for ConversationCollection {
    fn from(list: Vec<Conversation>) -> Self {
        Self {
            conversations: list
                .into_iter()
                .map(|c| (c.id, c))
                .collect(),
        }
    }
}

impl From<ConversationCollection> for Vec<Conversation> {
    fn from(collection: ConversationCollection) -> Self {
        let mut list: Vec<Conversation> = collection.conversations.into_values().collect();
        list.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        list
    }
}

impl ConversationCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }

    pub fn get(&self, id: &ConversationId) -> Option<&Conversation> {
        self.conversations.get(id)
    }

    pub fn contains(&self, id: &ConversationId) -> bool {
        self.conversations.contains_key(id)
    }

    /// Conversations, most recently updated first.
    pub fn by_recency(&self) -> Vec<&Conversation> {
        let mut list: Vec<&Conversation> = self.conversations.values().collect();
        list.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(b.created_at.cmp(&a.created_at)));
        list
    }

    pub fn most_recent(&self) -> Option<&Conversation> {
        self.by_recency().into_iter().next()
    }

    pub fn create_conversation(&mut self) -> ConversationId {
        let conversation = Conversation::new();
        let id = conversation.id;
        self.conversations.insert(id, conversation);
        id
    }

    pub fn remove(&mut self, id: &ConversationId) -> Option<Conversation> {
        self.conversations.remove(id)
    }

    /// Appends a message and bumps the conversation's `updated_at`.
    pub fn append_message(
        &mut self,
        conversation_id: &ConversationId,
        message: Message
    ) -> Result<(), StoreError> {
        if self.message_id_in_use(&message.id) {
            return Err(StoreError::DuplicateMessageId(message.id.to_string()));
        }
        let conversation = self.conversation_mut(conversation_id)?;
        if message.is_streaming && conversation.streaming_message().is_some() {
            return Err(StoreError::AlreadyStreaming(conversation_id.to_string()));
        }
        conversation.messages.push(message);
        conversation.touch();
        Ok(())
    }

    /// Starts one exchange: the user's message plus an empty streaming
    /// assistant message. The first user input also names the conversation.
    pub fn begin_exchange(
        &mut self,
        conversation_id: &ConversationId,
        input: &str
    ) -> Result<(MessageId, MessageId), StoreError> {
        let conversation = self.conversation_mut(conversation_id)?;
        if conversation.streaming_message().is_some() {
            return Err(StoreError::AlreadyStreaming(conversation_id.to_string()));
        }
        let first_input = !conversation.has_user_message();

        let user = Message::user(input);
        let placeholder = Message::placeholder();
        let ids = (user.id, placeholder.id);

        self.append_message(conversation_id, user)?;
        self.append_message(conversation_id, placeholder)?;

        if first_input {
            let conversation = self.conversation_mut(conversation_id)?;
            conversation.title = derive_title(input);
        }
        Ok(ids)
    }

    pub fn append_content(
        &mut self,
        conversation_id: &ConversationId,
        message_id: &MessageId,
        fragment: &str
    ) -> Result<(), StoreError> {
        let message = self.streaming_mut(conversation_id, message_id)?;
        message.content.push_str(fragment);
        Ok(())
    }

    pub fn finalize_message(
        &mut self,
        conversation_id: &ConversationId,
        message_id: &MessageId
    ) -> Result<(), StoreError> {
        let message = self.streaming_mut(conversation_id, message_id)?;
        message.is_streaming = false;
        Ok(())
    }

    /// Replaces the streamed content with `notice` and seals the message as failed.
    pub fn fail_message(
        &mut self,
        conversation_id: &ConversationId,
        message_id: &MessageId,
        notice: &str
    ) -> Result<(), StoreError> {
        let message = self.streaming_mut(conversation_id, message_id)?;
        message.content = notice.to_string();
        message.is_streaming = false;
        message.failed = true;
        Ok(())
    }

    /// What the relay should see: every non-streaming message as a `{role, content}` pair.
    pub fn context_for(&self, conversation_id: &ConversationId) -> Result<Vec<ChatTurn>, StoreError> {
        let conversation = self.conversations
            .get(conversation_id)
            .ok_or_else(|| StoreError::ConversationNotFound(conversation_id.to_string()))?;
        Ok(
            conversation.messages
                .iter()
                .filter(|m| !m.is_streaming)
                .map(Message::as_turn)
                .collect()
        )
    }

    /// Seals messages left streaming by a process that exited mid-reply.
    /// Returns how many were sealed.
    pub fn seal_interrupted(&mut self, notice: &str) -> usize {
        let mut sealed = 0;
        for conversation in self.conversations.values_mut() {
            for message in conversation.messages.iter_mut().filter(|m| m.is_streaming) {
                message.content = notice.to_string();
                message.is_streaming = false;
                message.failed = true;
                sealed += 1;
            }
        }
        sealed
    }

    fn message_id_in_use(&self, id: &MessageId) -> bool {
        self.conversations.values().any(|c| c.messages.iter().any(|m| &m.id == id))
    }

    fn conversation_mut(&mut self, id: &ConversationId) -> Result<&mut Conversation, StoreError> {
        self.conversations
            .get_mut(id)
            .ok_or_else(|| StoreError::ConversationNotFound(id.to_string()))
    }

    fn streaming_mut(
        &mut self,
        conversation_id: &ConversationId,
        message_id: &MessageId
    ) -> Result<&mut Message, StoreError> {
        let message = self
            .conversation_mut(conversation_id)?
            .messages.iter_mut()
            .find(|m| &m.id == message_id)
            .ok_or_else(|| StoreError::MessageNotFound(message_id.to_string()))?;
        if !message.is_streaming {
            return Err(StoreError::MessageSealed(message_id.to_string()));
        }
        Ok(message)
    }
}
