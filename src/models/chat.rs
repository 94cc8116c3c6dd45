use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub enum Sender {
    User,
    Bot,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub sender: Sender,
    pub message: String,
}

/// A scripted conversation owned by a user. Read-only from this service's
/// perspective; the chat collaborator appends to it.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user_id: ObjectId,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

impl Chat {
    /// User-authored messages joined with ". ", used as the AI prompt.
    pub fn user_transcript(&self) -> String {
        self.messages
            .iter()
            .filter(|m| m.sender == Sender::User)
            .map(|m| m.message.as_str())
            .collect::<Vec<_>>()
            .join(". ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transcript_joins_only_user_messages() {
        let chat = Chat {
            id: None,
            user_id: ObjectId::new(),
            messages: vec![
                ChatMessage {
                    sender: Sender::Bot,
                    message: "Hi, I am Velzy. How can I assist you today?".to_string(),
                },
                ChatMessage {
                    sender: Sender::User,
                    message: "I want to go to Europe".to_string(),
                },
                ChatMessage {
                    sender: Sender::Bot,
                    message: "How many days are you planning for your trip?".to_string(),
                },
                ChatMessage {
                    sender: Sender::User,
                    message: "3 days".to_string(),
                },
            ],
        };

        assert_eq!(chat.user_transcript(), "I want to go to Europe. 3 days");
    }

    #[test]
    fn transcript_of_bot_only_chat_is_empty() {
        let chat = Chat {
            id: None,
            user_id: ObjectId::new(),
            messages: vec![ChatMessage {
                sender: Sender::Bot,
                message: "Hello".to_string(),
            }],
        };

        assert_eq!(chat.user_transcript(), "");
    }
}
