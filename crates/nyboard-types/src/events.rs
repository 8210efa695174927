use serde::{Deserialize, Serialize};

use crate::models::{Entry, Message};

/// Events pushed over the WebSocket gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Server accepted the connection
    Ready,

    /// A participant claimed a rank
    EntryCreate { entry: Entry },

    /// A participant posted a message
    MessageCreate { message: Message },
}
