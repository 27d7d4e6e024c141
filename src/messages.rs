//! Direct messages between members. Membership lives in
//! `conversation_participants`, messages in `messages`; new messages are
//! delivered through the backend's change feed.

use crate::auth::User;
use crate::backend::{
    Backend, BackendError, BackendResult, ChangeKind, Collection, Query, Record, Subscription,
};
use chrono::{SecondsFormat, Utc};
use log::{debug, info, warn};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

const UNKNOWN_NAME: &str = "Unknown User";

#[derive(Debug, Error)]
pub enum MessageError {
    #[error("Message cannot be empty")]
    EmptyMessage,
    #[error("Not a participant of this conversation")]
    NotParticipant,
    #[error("Unknown recipient")]
    UnknownRecipient,
    #[error("Cannot start a conversation with yourself")]
    SelfConversation,
    #[error(transparent)]
    Backend(#[from] BackendError),
}

pub type MessageResult<T> = Result<T, MessageError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Participant {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub sender: Participant,
    pub content: String,
    pub timestamp: String,
    /// Sent by the member viewing it.
    pub mine: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LastMessage {
    pub content: String,
    pub timestamp: String,
}

/// A conversation as one member sees it: the other side and the latest
/// message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conversation {
    pub id: String,
    pub participant: Participant,
    pub last_message: Option<LastMessage>,
}

fn text(record: &Record, field: &str) -> Option<String> {
    match record.get(field)? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Messaging over a [`Backend`].
pub struct Messenger {
    backend: Arc<dyn Backend>,
}

impl Messenger {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// Display name from `profiles`, or a placeholder when the profile is
    /// missing.
    async fn name_of(&self, user_id: &str) -> BackendResult<String> {
        let rows = self
            .backend
            .query(Collection::Profiles, &Query::all().eq("id", user_id).limit(1))
            .await?;
        Ok(rows
            .first()
            .and_then(|p| text(p, "name").or_else(|| text(p, "full_name")))
            .unwrap_or_else(|| UNKNOWN_NAME.to_string()))
    }

    async fn participant(&self, user_id: &str) -> BackendResult<Participant> {
        Ok(Participant {
            id: user_id.to_owned(),
            name: self.name_of(user_id).await?,
        })
    }

    async fn members(&self, conversation_id: &str) -> BackendResult<Vec<String>> {
        let rows = self
            .backend
            .query(
                Collection::ConversationParticipants,
                &Query::all().eq("conversation_id", conversation_id),
            )
            .await?;
        Ok(rows.iter().filter_map(|r| text(r, "user_id")).collect())
    }

    async fn conversation_ids(&self, user_id: &str) -> BackendResult<Vec<String>> {
        let rows = self
            .backend
            .query(
                Collection::ConversationParticipants,
                &Query::all().eq("user_id", user_id),
            )
            .await?;
        Ok(rows.iter().filter_map(|r| text(r, "conversation_id")).collect())
    }

    async fn ensure_member(&self, user: &User, conversation_id: &str) -> MessageResult<()> {
        let me = user.id.to_string();
        if self.members(conversation_id).await?.contains(&me) {
            Ok(())
        } else {
            Err(MessageError::NotParticipant)
        }
    }

    /// Messages of a conversation in sending order.
    async fn stored(&self, conversation_id: &str) -> BackendResult<Vec<Record>> {
        let mut rows = self
            .backend
            .query(
                Collection::Messages,
                &Query::all().eq("conversation_id", conversation_id),
            )
            .await?;
        rows.sort_by_key(|r| text(r, "created_at"));
        Ok(rows)
    }

    async fn decode(&self, record: &Record, viewer: &str) -> BackendResult<Message> {
        let field = |name: &str| {
            text(record, name)
                .ok_or_else(|| BackendError::Decode(format!("message field `{name}` missing")))
        };
        let sender_id = field("sender_id")?;

        Ok(Message {
            id: field("id")?,
            conversation_id: field("conversation_id")?,
            mine: sender_id == viewer,
            sender: self.participant(&sender_id).await?,
            content: field("content")?,
            timestamp: text(record, "created_at").unwrap_or_default(),
        })
    }

    /// Every conversation `user` takes part in, most recently active first.
    pub async fn conversations(&self, user: &User) -> MessageResult<Vec<Conversation>> {
        let me = user.id.to_string();
        let mut conversations = Vec::new();

        for id in self.conversation_ids(&me).await? {
            let other = self
                .members(&id)
                .await?
                .into_iter()
                .find(|m| *m != me)
                .unwrap_or_else(|| me.clone());
            let last_message = self.stored(&id).await?.last().map(|r| LastMessage {
                content: text(r, "content").unwrap_or_default(),
                timestamp: text(r, "created_at").unwrap_or_default(),
            });

            conversations.push(Conversation {
                participant: self.participant(&other).await?,
                id,
                last_message,
            });
        }

        conversations.sort_by(|a, b| {
            let at = |c: &Conversation| c.last_message.as_ref().map(|m| m.timestamp.clone());
            at(b).cmp(&at(a))
        });
        Ok(conversations)
    }

    /// The conversation between `user` and `with`, created when they have
    /// none yet.
    pub async fn open(&self, user: &User, with: &str) -> MessageResult<Conversation> {
        let me = user.id.to_string();
        if with == me {
            return Err(MessageError::SelfConversation);
        }
        let recipient = self
            .backend
            .query(Collection::Profiles, &Query::all().eq("id", with).limit(1))
            .await?;
        if recipient.is_empty() {
            return Err(MessageError::UnknownRecipient);
        }

        for id in self.conversation_ids(&me).await? {
            if self.members(&id).await?.iter().any(|m| m == with) {
                debug!("reusing conversation {} between {} and {}", id, me, with);
                return Ok(Conversation {
                    participant: self.participant(with).await?,
                    last_message: None,
                    id,
                });
            }
        }

        let id = Uuid::new_v4().to_string();
        for member in [me.as_str(), with] {
            let mut row = Record::new();
            row.insert("conversation_id".into(), id.clone().into());
            row.insert("user_id".into(), member.into());
            self.backend
                .insert(Collection::ConversationParticipants, row)
                .await?;
        }
        info!("{} opened conversation {} with {}", user.email, id, with);

        Ok(Conversation {
            participant: self.participant(with).await?,
            id,
            last_message: None,
        })
    }

    /// Messages of a conversation `user` belongs to, oldest first. With
    /// `after`, only messages sent later than that timestamp.
    pub async fn history(
        &self,
        user: &User,
        conversation_id: &str,
        after: Option<&str>,
    ) -> MessageResult<Vec<Message>> {
        self.ensure_member(user, conversation_id).await?;
        let me = user.id.to_string();

        let mut messages = Vec::new();
        for record in self.stored(conversation_id).await? {
            let newer = match after {
                Some(after) => text(&record, "created_at").is_some_and(|at| at.as_str() > after),
                None => true,
            };
            if !newer {
                continue;
            }
            match self.decode(&record, &me).await {
                Ok(message) => messages.push(message),
                Err(BackendError::Decode(e)) => warn!("skipping message row: {}", e),
                Err(e) => return Err(e.into()),
            }
        }
        Ok(messages)
    }

    pub async fn send(&self, user: &User, conversation_id: &str, content: &str) -> MessageResult<Message> {
        if content.trim().is_empty() {
            return Err(MessageError::EmptyMessage);
        }
        self.ensure_member(user, conversation_id).await?;
        let me = user.id.to_string();

        let mut row = Record::new();
        row.insert("conversation_id".into(), conversation_id.into());
        row.insert("sender_id".into(), me.clone().into());
        row.insert("content".into(), content.into());
        row.insert("created_at".into(), now().into());

        let stored = self.backend.insert(Collection::Messages, row).await?;
        Ok(self.decode(&stored, &me).await?)
    }

    /// Live feed of messages inserted into `conversation_id` from now on.
    pub async fn watch(&self, user: &User, conversation_id: &str) -> MessageResult<MessageFeed<'_>> {
        self.ensure_member(user, conversation_id).await?;
        let changes = self.backend.subscribe(
            Collection::Messages,
            Query::all().eq("conversation_id", conversation_id),
        );
        Ok(MessageFeed {
            messenger: self,
            changes,
            viewer: user.id.to_string(),
        })
    }
}

pub struct MessageFeed<'a> {
    messenger: &'a Messenger,
    changes: Subscription,
    viewer: String,
}

impl MessageFeed<'_> {
    /// The next newly sent message. `None` once the feed is closed.
    pub async fn next(&mut self) -> Option<Message> {
        while let Some(change) = self.changes.next().await {
            if change.kind != ChangeKind::Insert {
                continue;
            }
            match self.messenger.decode(&change.record, &self.viewer).await {
                Ok(message) => return Some(message),
                Err(e) => warn!("dropping undecodable message change: {}", e),
            }
        }
        None
    }
}
