//! Free-text chat passthrough to the vision model.

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::traits::VisionModel;

pub const EMPTY_MESSAGE_REPLY: &str = "Please enter a message.";
pub const FAILURE_REPLY: &str = "Something went wrong.";

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ChatReply {
    pub reply: String,
}

/// Sends a trimmed message to the model. Never fails; errors become
/// [`FAILURE_REPLY`].
pub async fn reply(model: &dyn VisionModel, message: &str) -> ChatReply {
    let message = message.trim();
    if message.is_empty() {
        return ChatReply {
            reply: EMPTY_MESSAGE_REPLY.to_string(),
        };
    }

    match model.complete(message).await {
        Ok(text) => {
            let reply = text.trim().to_string();
            info!(model = model.model_name(), chars = reply.len(), "chat reply");
            ChatReply { reply }
        }
        Err(e) => {
            error!(error = %e, "chat request failed");
            ChatReply {
                reply: FAILURE_REPLY.to_string(),
            }
        }
    }
}
