//! Outbound chat message port.
//!
//! Implemented by `kfbridge_infra::wecom::WeComClient`.

use kfbridge_types::error::ChatApiError;

/// Sends a text message to a chat-platform user.
pub trait MessageSender: Send + Sync {
    fn send_text(
        &self,
        external_user_id: &str,
        content: &str,
    ) -> impl std::future::Future<Output = Result<(), ChatApiError>> + Send;
}
