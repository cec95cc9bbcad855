//! Workflow gateway ports.
//!
//! Implemented by `kfbridge_infra::coze::CozeWorkflowClient`. Conversation
//! creation is its own trait so the [`ContextStore`](crate::context::store::ContextStore)
//! only depends on what it uses.

use std::pin::Pin;

use futures_util::Stream;

use kfbridge_types::error::WorkflowError;
use kfbridge_types::workflow::WorkflowResult;

/// Lazy, finite, non-restartable stream of reply chunks.
pub type WorkflowStream = Pin<Box<dyn Stream<Item = Result<String, WorkflowError>> + Send + 'static>>;

/// Opens new conversations on the workflow engine.
pub trait ConversationCreator: Send + Sync {
    /// Create a conversation and return its opaque id. Not retried.
    fn create_conversation(
        &self,
    ) -> impl std::future::Future<Output = Result<String, WorkflowError>> + Send;
}

/// Executes the configured workflow for one user turn.
pub trait WorkflowGateway: Send + Sync {
    /// Run the workflow to completion, retrying transient failures.
    fn execute_workflow(
        &self,
        input: &str,
        context_id: &str,
    ) -> impl std::future::Future<Output = Result<WorkflowResult, WorkflowError>> + Send;

    /// Run the workflow in streaming mode, yielding content chunks.
    ///
    /// Returns a boxed stream (not RPITIT) so callers can hold it across
    /// awaits without naming the implementation type.
    fn execute_workflow_stream(&self, input: &str, context_id: &str) -> WorkflowStream;
}
