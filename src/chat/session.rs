use crate::chat::collection::ConversationCollection;
use crate::chat::transport::RelayTransport;
use crate::codec::SseDecoder;
use crate::error::{ ChatError, HistoryError };
use crate::history::HistoryStore;
use crate::models::chat::{ ChatRequest, Conversation, ConversationId, MessageId };
use crate::models::relay::RelayFrame;
use futures::StreamExt;
use log::{ debug, error, info, warn };
use std::sync::Arc;

/// Shown in place of a reply that could not be completed.
pub const FAILED_REPLY: &str = "Sorry, I encountered an error while processing your request.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Nothing was sent: empty input, no selection, or a request already in flight.
    Rejected,
    Finalized {
        conversation_id: ConversationId,
        message_id: MessageId,
    },
    Failed {
        conversation_id: ConversationId,
        message_id: MessageId,
    },
}

enum Step {
    Continue,
    Done,
}

/// Client-side chat state: the conversations, the selection, and one
/// streaming exchange at a time. Every mutation is persisted.
pub struct ChatSession {
    chats: ConversationCollection,
    active: Option<ConversationId>,
    in_flight: bool,
    history: Arc<dyn HistoryStore>,
    transport: Arc<dyn RelayTransport>,
}

impl ChatSession {
    /// Loads persisted conversations and selects the most recently updated
    /// one, creating a conversation if there are none. Corrupt history is
    /// discarded.
    pub async fn open(
        history: Arc<dyn HistoryStore>,
        transport: Arc<dyn RelayTransport>
    ) -> Result<Self, HistoryError> {
        let mut chats = match history.load().await {
            Ok(Some(chats)) => chats,
            Ok(None) => ConversationCollection::new(),
            Err(HistoryError::Corrupt(e)) => {
                error!("Error parsing saved chats, discarding them: {}", e);
                history.clear().await?;
                ConversationCollection::new()
            }
            Err(e) => {
                return Err(e);
            }
        };

        let sealed = chats.seal_interrupted(FAILED_REPLY);
        if sealed > 0 {
            warn!("Sealed {} reply(ies) interrupted by a previous exit", sealed);
        }

        let active = chats.most_recent().map(|c| c.id);
        info!("Loaded {} conversation(s)", chats.len());

        let mut session = Self { chats, active, in_flight: false, history, transport };
        if session.active.is_none() {
            session.new_conversation().await;
        } else if sealed > 0 {
            session.persist().await;
        }
        Ok(session)
    }

    pub fn chats(&self) -> &ConversationCollection {
        &self.chats
    }

    /// Conversations, most recently updated first.
    pub fn conversations(&self) -> Vec<&Conversation> {
        self.chats.by_recency()
    }

    pub fn active_id(&self) -> Option<ConversationId> {
        self.active
    }

    pub fn active(&self) -> Option<&Conversation> {
        self.active.as_ref().and_then(|id| self.chats.get(id))
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    pub async fn new_conversation(&mut self) -> ConversationId {
        let id = self.chats.create_conversation();
        self.active = Some(id);
        self.persist().await;
        id
    }

    /// Selects an existing conversation. Returns false if it does not exist.
    pub fn select(&mut self, id: &ConversationId) -> bool {
        if self.chats.contains(id) {
            self.active = Some(*id);
            true
        } else {
            false
        }
    }

    /// Removes a conversation. If it was selected, the most recently updated
    /// remaining one is selected instead, or a fresh one is created.
    pub async fn delete_conversation(&mut self, id: &ConversationId) -> bool {
        if self.chats.remove(id).is_none() {
            return false;
        }
        if self.active == Some(*id) {
            match self.chats.most_recent().map(|c| c.id) {
                Some(next) => {
                    self.active = Some(next);
                }
                None => {
                    self.new_conversation().await;
                    return true;
                }
            }
        }
        self.persist().await;
        true
    }

    pub async fn submit(&mut self, input: &str) -> SubmitOutcome {
        self.submit_with(input, |_| {}).await
    }

    /// Sends `input` in the active conversation and streams the reply into
    /// a placeholder message. `on_token` sees each fragment as it lands.
    pub async fn submit_with<F>(&mut self, input: &str, mut on_token: F) -> SubmitOutcome
        where F: FnMut(&str) + Send
    {
        if input.trim().is_empty() || self.in_flight {
            return SubmitOutcome::Rejected;
        }
        let Some(conversation_id) = self.active.filter(|id| self.chats.contains(id)) else {
            return SubmitOutcome::Rejected;
        };

        self.in_flight = true;
        let outcome = self.exchange(conversation_id, input, &mut on_token).await;
        self.in_flight = false;
        outcome
    }

    async fn exchange(
        &mut self,
        conversation_id: ConversationId,
        input: &str,
        on_token: &mut (dyn FnMut(&str) + Send)
    ) -> SubmitOutcome {
        let message_id = match self.chats.begin_exchange(&conversation_id, input) {
            Ok((_, placeholder)) => placeholder,
            Err(e) => {
                warn!("Cannot start exchange: {}", e);
                return SubmitOutcome::Rejected;
            }
        };
        self.persist().await;

        match self.stream_reply(conversation_id, message_id, on_token).await {
            Ok(()) => SubmitOutcome::Finalized { conversation_id, message_id },
            Err(e) => {
                error!("Reply failed: {}", e);
                if let Err(e) = self.chats.fail_message(&conversation_id, &message_id, FAILED_REPLY) {
                    error!("Could not mark reply as failed: {}", e);
                }
                self.persist().await;
                SubmitOutcome::Failed { conversation_id, message_id }
            }
        }
    }

    async fn stream_reply(
        &mut self,
        conversation_id: ConversationId,
        message_id: MessageId,
        on_token: &mut (dyn FnMut(&str) + Send)
    ) -> Result<(), ChatError> {
        let request = ChatRequest { messages: self.chats.context_for(&conversation_id)? };
        debug!("Sending {} message(s) to the relay", request.messages.len());

        let mut body = self.transport.open(&request).await?;
        let mut decoder = SseDecoder::new();

        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            for payload in decoder.push(&chunk) {
                if let Step::Done = self.apply(conversation_id, message_id, &payload, on_token).await? {
                    return Ok(());
                }
            }
        }
        if let Some(payload) = decoder.finish() {
            if let Step::Done = self.apply(conversation_id, message_id, &payload, on_token).await? {
                return Ok(());
            }
        }
        Err(ChatError::Incomplete)
    }

    async fn apply(
        &mut self,
        conversation_id: ConversationId,
        message_id: MessageId,
        payload: &str,
        on_token: &mut (dyn FnMut(&str) + Send)
    ) -> Result<Step, ChatError> {
        let frame = match serde_json::from_str::<RelayFrame>(payload) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Skipping unparseable relay frame {:?}: {}", payload, e);
                return Ok(Step::Continue);
            }
        };

        if let Some(token) = frame.token.as_deref().filter(|t| !t.is_empty()) {
            self.chats.append_content(&conversation_id, &message_id, token)?;
            self.persist().await;
            on_token(token);
        }
        if frame.done == Some(true) {
            self.chats.finalize_message(&conversation_id, &message_id)?;
            self.persist().await;
            return Ok(Step::Done);
        }
        if let Some(message) = frame.error {
            return Err(ChatError::Relay(message));
        }
        Ok(Step::Continue)
    }

    async fn persist(&self) {
        if let Err(e) = self.history.save(&self.chats).await {
            error!("Failed to save chats: {}", e);
        }
    }
}
