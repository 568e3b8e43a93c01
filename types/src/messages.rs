mod inbound;
mod outbound;
mod payloads;

pub use inbound::{InboundMessageType, RtviMessageInbound};
pub use outbound::{OutboundMessageType, RtviMessageOutbound};
pub use payloads::*;

/// Label carried by every RTVI control message.
pub const MESSAGE_LABEL: &str = "rtvi-ai";

/// Generates the short random token used as a message id.
pub fn generate_message_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id
}
