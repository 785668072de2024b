//! End-to-end orchestration tests
//!
//! A session workflow is built from agent configurations, run against a
//! scripted model, and every event is relayed into a temporary store the
//! way the API and CLI do it.

use async_trait::async_trait;
use dreamteam_engine::config::Config;
use dreamteam_engine::db::conversations::NewConversation;
use dreamteam_engine::db::Database;
use dreamteam_engine::llm::{LLMProvider, Message, Result as LLMResult};
use dreamteam_engine::orchestrator::{session_workflow, Workflow, WorkflowEvent};
use dreamteam_engine::relay::Relay;
use sdk::types::{AgentConfig, AgentType, ConversationMessage, UserMessage};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;

/// Replays replies in order and records every prompt it was sent
struct ScriptedModel {
    replies: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedModel {
    fn new(replies: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn prompts(&self) -> Vec<Vec<Message>> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LLMProvider for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-1"
    }

    async fn complete(&self, messages: &[Message]) -> LLMResult<String> {
        self.prompts.lock().unwrap().push(messages.to_vec());
        Ok(self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| "out of script".to_string()))
    }
}

fn test_config(dir: &TempDir) -> Config {
    let toml = format!(
        r#"
[core]
data_dir = "{root}/data"

[llm]
provider = "openai"

[orchestrator]
max_rounds = 5

[tools]
work_dir = "{root}/logs"
knowledge_dir = "{root}/knowledge"
"#,
        root = dir.path().display()
    );
    Config::from_toml_str(&toml).unwrap()
}

const LEDGER_ASK_POLICY: &str = r#"{
    "is_request_satisfied": {"reason": "nothing looked up yet", "answer": false},
    "is_in_loop": {"reason": "first turn", "answer": false},
    "is_progress_being_made": {"reason": "starting", "answer": true},
    "next_speaker": {"reason": "knows the policies", "answer": "PolicyAgent"},
    "instruction": {"reason": "", "answer": "Find the annual leave allowance."}
}"#;

const LEDGER_DONE: &str = r#"{"is_request_satisfied": true, "is_in_loop": false,
    "is_progress_being_made": true, "next_speaker": "PolicyAgent", "instruction": ""}"#;

#[tokio::test]
async fn test_rag_session_is_relayed_to_store() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    std::fs::write(
        config.tools.knowledge_dir.join("handbook.md"),
        "# Handbook\n\nEmployees get 25 days of annual leave.\n\nExpenses are paid monthly.",
    )
    .unwrap();

    let model = ScriptedModel::new(&[
        "- PolicyAgent looks up the leave policy",
        LEDGER_ASK_POLICY,
        r#"{"function": "search_knowledge_base", "arguments": {"query": "annual leave"}}"#,
        "Employees get 25 days of annual leave.",
        LEDGER_DONE,
        "You get 25 days of annual leave per year.",
    ]);

    let agents = vec![AgentConfig::new("0100", AgentType::Rag, "Policy", "📚")];
    let workflow = session_workflow(&config, model.clone(), &agents, "alice", "calm-lake-1234")
        .unwrap();
    assert_eq!(workflow.participants()[0].name, "PolicyAgent");

    let db = Database::new(&config.database_path()).await.unwrap();
    let conversations = db.conversations();
    conversations
        .save_message(
            "alice",
            "calm-lake-1234",
            &UserMessage::new("How much annual leave do I get?").into(),
            NewConversation {
                agents: Some(agents.clone()),
                timestamp: "2026-01-01 09:00:00".to_string(),
                ..NewConversation::default()
            },
        )
        .await
        .unwrap();

    let relay = Relay::new(conversations.clone(), "calm-lake-1234", "alice");
    let mut events = workflow.run_stream("How much annual leave do I get?", CancellationToken::new());
    let mut records = Vec::new();
    while let Some(event) = events.next().await {
        if let Some(record) = relay.forward(event).await {
            records.push(record);
        }
    }

    let types: Vec<_> = records.iter().map(|r| r.event_type.as_str()).collect();
    assert_eq!(
        types,
        vec![
            "orchestrator",
            "orchestrator",
            "agent_delta",
            "agent_delta",
            "agent_message",
            "final_result",
            "workflow_output",
        ]
    );
    assert_eq!(records[1].content, "Find the annual leave allowance.");
    assert!(records[2].content.starts_with("Calling search_knowledge_base"));
    assert!(records[3].content.contains("25 days"));
    assert_eq!(records[4].source, "PolicyAgent");
    assert_eq!(records[5].content, "You get 25 days of annual leave per year.");
    assert!(records[5].is_completed());

    // The agent saw the tool output before answering
    let prompts = model.prompts();
    let agent_second_call = &prompts[3];
    assert!(agent_second_call
        .iter()
        .any(|m| m.content.contains("Employees get 25 days")));

    let stored = conversations
        .get_conversation("alice", "calm-lake-1234")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.messages.len(), 1 + records.len());
    assert!(matches!(stored.messages[0], ConversationMessage::User(_)));
    match stored.messages.last().unwrap() {
        ConversationMessage::Event(e) => assert_eq!(e.event_type, "workflow_output"),
        other => panic!("expected an event, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unknown_speaker_falls_back_to_first_agent() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let model = ScriptedModel::new(&[
        "plan",
        r#"{"is_request_satisfied": false, "is_in_loop": false, "is_progress_being_made": true,
            "next_speaker": "NobodyAgent", "instruction": "Say hi"}"#,
        "hi",
        LEDGER_DONE,
        "done",
    ]);
    let agents = vec![
        AgentConfig::new("0100", AgentType::Custom, "Greeter", "🤖"),
        AgentConfig::new("0101", AgentType::Custom, "Critic", "🤖"),
    ];
    let workflow = session_workflow(&config, model, &agents, "alice", "s").unwrap();

    let events: Vec<_> = workflow
        .run_stream("greet", CancellationToken::new())
        .collect()
        .await;
    assert!(events.contains(&WorkflowEvent::AgentMessage {
        agent_id: "GreeterAgent".into(),
        text: Some("hi".into()),
    }));
}

#[tokio::test]
async fn test_cancelled_session_records_cancellation() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let model = ScriptedModel::new(&["plan"]);
    let agents = vec![AgentConfig::new("0100", AgentType::Custom, "Idle", "🤖")];
    let workflow = session_workflow(&config, model, &agents, "alice", "stopped-run-0001").unwrap();

    let db = Database::new(&config.database_path()).await.unwrap();
    let relay = Relay::new(db.conversations(), "stopped-run-0001", "alice");

    let cancel = CancellationToken::new();
    cancel.cancel();
    let mut events = workflow.run_stream("anything", cancel);
    let mut last = None;
    while let Some(event) = events.next().await {
        last = relay.forward(event).await;
    }

    let last = last.unwrap();
    assert_eq!(last.event_type, "cancelled");
    assert_eq!(last.stop_reason.as_deref(), Some("cancelled"));
    assert_eq!(last.content, "Session stopped-run-0001 was cancelled.");
}

#[tokio::test]
async fn test_session_without_usable_agents_fails_to_build() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let model = ScriptedModel::new(&[]);
    let agents = vec![AgentConfig::new("0100", AgentType::MagenticOne, "Painter", "🎨")];

    assert!(session_workflow(&config, model, &agents, "alice", "s").is_err());
}
