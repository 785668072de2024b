use std::sync::Arc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, Instrument};

use super::manager::ManagerLimits;
use super::{EventSink, StandardManager, Workflow, WorkflowEvent};
use crate::agent::{setup_agents, AgentContext, ChatAgent};
use crate::config::Config;
use crate::llm::LLMProvider;
use sdk::errors::EngineError;
use sdk::types::AgentConfig;

/// Assembles a [`TeamWorkflow`] from participants and a manager
#[derive(Default)]
pub struct WorkflowBuilder {
    participants: Vec<ChatAgent>,
    manager: Option<StandardManager>,
}

impl WorkflowBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn participants(mut self, agents: Vec<ChatAgent>) -> Self {
        self.participants = agents;
        self
    }

    pub fn with_standard_manager(
        mut self,
        client: Arc<dyn LLMProvider>,
        limits: ManagerLimits,
    ) -> Self {
        self.manager = Some(StandardManager::new(client, limits));
        self
    }

    pub fn build(self) -> Result<TeamWorkflow, EngineError> {
        if self.participants.is_empty() {
            return Err(EngineError::Workflow(
                "a workflow needs at least one participant".to_string(),
            ));
        }
        let manager = self
            .manager
            .ok_or_else(|| EngineError::Workflow("no manager configured".to_string()))?;

        Ok(TeamWorkflow {
            participants: Arc::new(self.participants),
            manager,
        })
    }
}

/// Build the workflow for one session from its agent configurations.
///
/// Participants and the manager share `client`; limits come from the
/// `[orchestrator]` config section.
pub fn session_workflow(
    config: &Config,
    client: Arc<dyn LLMProvider>,
    agents: &[AgentConfig],
    user_id: &str,
    session_id: &str,
) -> Result<TeamWorkflow, EngineError> {
    let limits = ManagerLimits::from(&config.orchestrator);
    let ctx = AgentContext {
        user_id: user_id.to_string(),
        session_id: session_id.to_string(),
        tools: config.tools.clone(),
        client: Arc::clone(&client),
        llm_timeout: limits.llm_timeout,
    };

    WorkflowBuilder::new()
        .participants(setup_agents(agents, &ctx)?)
        .with_standard_manager(client, limits)
        .build()
}

/// A team of agents run by a [`StandardManager`]
#[derive(Clone)]
pub struct TeamWorkflow {
    participants: Arc<Vec<ChatAgent>>,
    manager: StandardManager,
}

impl TeamWorkflow {
    pub fn participants(&self) -> &[ChatAgent] {
        &self.participants
    }
}

impl Workflow for TeamWorkflow {
    fn run_stream(&self, task: &str, cancel: CancellationToken) -> ReceiverStream<WorkflowEvent> {
        let (events, stream) = EventSink::channel();
        let participants = Arc::clone(&self.participants);
        let manager = self.manager.clone();
        let task = task.to_string();

        let span = tracing::info_span!("workflow", agents = participants.len());
        tokio::spawn(
            async move {
                info!("Workflow started");
                match manager.run(&task, &participants, &events, &cancel).await {
                    Ok(answer) => {
                        events
                            .emit(WorkflowEvent::FinalResult(Some(answer.clone())))
                            .await;
                        events.emit(WorkflowEvent::WorkflowOutput(answer)).await;
                        info!("Workflow completed");
                    }
                    Err(EngineError::Cancelled(reason)) => {
                        info!("Workflow cancelled: {}", reason);
                        events.emit(WorkflowEvent::Cancelled).await;
                    }
                    Err(e) => {
                        error!("Workflow failed: {}", e);
                        events.emit(WorkflowEvent::Failed(e.to_string())).await;
                    }
                }
            }
            .instrument(span),
        );

        stream
    }
}
