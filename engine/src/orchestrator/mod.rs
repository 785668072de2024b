//! Multi-agent orchestration
//!
//! A [`Workflow`] takes a task and streams [`WorkflowEvent`]s until it
//! finishes, fails or is cancelled. The HTTP layer and the CLI only depend
//! on this seam; [`WorkflowBuilder`] assembles the shipped implementation,
//! a team of [`ChatAgent`](crate::agent::ChatAgent)s driven by the
//! ledger-based [`StandardManager`].

pub mod builder;
pub mod manager;

pub use builder::{session_workflow, TeamWorkflow, WorkflowBuilder};
pub use manager::{ManagerLimits, StandardManager};

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

/// Source name used for manager messages
pub const ORCHESTRATOR_SOURCE: &str = "MagenticOneOrchestrator";

/// Source name used for run-level events
pub const WORKFLOW_SOURCE: &str = "workflow";

/// Buffered events between a running workflow and its consumer
const EVENT_BUFFER: usize = 64;

/// Everything a running workflow reports
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowEvent {
    /// Plans, instructions and progress notes from the manager
    OrchestratorMessage(String),

    /// Intermediate output from an agent that is still working
    AgentDelta { agent_id: String, text: String },

    /// A finished agent turn; `None` when the agent produced no message
    AgentMessage {
        agent_id: String,
        text: Option<String>,
    },

    /// The manager's answer to the task
    FinalResult(Option<String>),

    /// The run's output value
    WorkflowOutput(String),

    /// The run ended without producing a separate output
    WorkflowCompleted(String),

    /// The run stopped on an error
    Failed(String),

    /// The run observed its cancellation token
    Cancelled,
}

impl WorkflowEvent {
    /// Whether nothing meaningful follows this event
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WorkflowEvent::FinalResult(_)
                | WorkflowEvent::WorkflowOutput(_)
                | WorkflowEvent::WorkflowCompleted(_)
                | WorkflowEvent::Failed(_)
                | WorkflowEvent::Cancelled
        )
    }
}

/// Sending half of a workflow's event stream
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::Sender<WorkflowEvent>,
}

impl EventSink {
    /// Create a sink and the stream that receives from it
    pub fn channel() -> (Self, ReceiverStream<WorkflowEvent>) {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        (Self { tx }, ReceiverStream::new(rx))
    }

    /// Deliver an event. Returns false once the consumer has gone away.
    pub async fn emit(&self, event: WorkflowEvent) -> bool {
        self.tx.send(event).await.is_ok()
    }

    /// Whether the consumer has dropped the stream
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// A runnable multi-agent workflow
pub trait Workflow: Send + Sync {
    /// Start the run in the background and return its event stream.
    ///
    /// The stream ends after one terminal event. Cancelling `cancel` makes
    /// the run emit [`WorkflowEvent::Cancelled`] at its next await point.
    fn run_stream(&self, task: &str, cancel: CancellationToken) -> ReceiverStream<WorkflowEvent>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_stream::StreamExt;

    #[test]
    fn test_terminal_events() {
        assert!(!WorkflowEvent::OrchestratorMessage("plan".into()).is_terminal());
        assert!(!WorkflowEvent::AgentMessage {
            agent_id: "CoderAgent".into(),
            text: None
        }
        .is_terminal());
        assert!(WorkflowEvent::FinalResult(None).is_terminal());
        assert!(WorkflowEvent::Cancelled.is_terminal());
        assert!(WorkflowEvent::Failed("x".into()).is_terminal());
    }

    #[tokio::test]
    async fn test_sink_reports_dropped_consumer() {
        let (sink, mut stream) = EventSink::channel();
        assert!(sink.emit(WorkflowEvent::OrchestratorMessage("a".into())).await);
        assert_eq!(
            stream.next().await,
            Some(WorkflowEvent::OrchestratorMessage("a".into()))
        );

        drop(stream);
        assert!(sink.is_closed());
        assert!(!sink.emit(WorkflowEvent::Cancelled).await);
    }
}
