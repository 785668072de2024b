//! Ledger-driven team manager
//!
//! The manager plans once, then runs rounds. Each round it asks the model
//! for a progress ledger (a small JSON object), picks the next speaker and
//! hands it an instruction. Too many stalled rounds trigger a replan; too
//! many replans, the round limit or the time limit end the run early. The
//! run always closes with a synthesized final answer.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{EventSink, WorkflowEvent, ORCHESTRATOR_SOURCE};
use crate::agent::{ChatAgent, TranscriptEntry};
use crate::config::OrchestratorConfig;
use crate::llm::{extract_json_object, LLMProvider, Message};
use sdk::errors::EngineError;

/// Run limits for one workflow
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerLimits {
    pub max_round_count: usize,
    pub max_stall_count: usize,
    pub max_reset_count: usize,
    pub max_time: Duration,
    pub llm_timeout: Duration,
}

impl Default for ManagerLimits {
    fn default() -> Self {
        Self {
            max_round_count: 20,
            max_stall_count: 3,
            max_reset_count: 2,
            max_time: Duration::from_secs(25 * 60),
            llm_timeout: Duration::from_secs(300),
        }
    }
}

impl From<&OrchestratorConfig> for ManagerLimits {
    fn from(config: &OrchestratorConfig) -> Self {
        Self {
            max_round_count: config.max_rounds as usize,
            max_stall_count: config.max_stalls_before_replan as usize,
            max_reset_count: config.max_reset_count as usize,
            max_time: config.max_time(),
            llm_timeout: config.llm_timeout(),
        }
    }
}

/// What the manager thinks of the run after a round
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressLedger {
    pub is_request_satisfied: bool,
    pub is_in_loop: bool,
    pub is_progress_being_made: bool,
    pub next_speaker: String,
    pub instruction: String,
}

impl ProgressLedger {
    /// Parse the model's ledger reply.
    ///
    /// Each key may hold a bare value or `{"reason": ..., "answer": ...}`.
    /// Returns `None` when no JSON object with `is_request_satisfied` is found.
    pub fn parse(reply: &str) -> Option<Self> {
        let value = extract_json_object(reply)?;
        value.get("is_request_satisfied")?;

        let answer = |key: &str| -> Option<&serde_json::Value> {
            let v = value.get(key)?;
            Some(v.get("answer").unwrap_or(v))
        };
        let flag = |key: &str| -> bool {
            match answer(key) {
                Some(serde_json::Value::Bool(b)) => *b,
                Some(serde_json::Value::String(s)) => s.eq_ignore_ascii_case("true"),
                _ => false,
            }
        };
        let text = |key: &str| -> Option<String> {
            answer(key)
                .and_then(|v| v.as_str())
                .map(|s| s.trim().to_string())
        };

        let next_speaker = text("next_speaker").unwrap_or_default();
        let instruction = text("instruction")
            .or_else(|| text("instruction_or_question"))
            .unwrap_or_default();

        Some(Self {
            is_request_satisfied: flag("is_request_satisfied"),
            is_in_loop: flag("is_in_loop"),
            is_progress_being_made: flag("is_progress_being_made"),
            next_speaker,
            instruction,
        })
    }

    fn is_stalled(&self) -> bool {
        self.is_in_loop || !self.is_progress_being_made
    }
}

/// Drives a team of [`ChatAgent`]s toward an answer
#[derive(Clone)]
pub struct StandardManager {
    client: Arc<dyn LLMProvider>,
    limits: ManagerLimits,
}

impl StandardManager {
    pub fn new(client: Arc<dyn LLMProvider>, limits: ManagerLimits) -> Self {
        Self { client, limits }
    }

    pub fn limits(&self) -> &ManagerLimits {
        &self.limits
    }

    /// Run the task to completion and return the final answer.
    ///
    /// Progress is reported on `events`; the caller emits the terminal
    /// events from the returned value.
    pub async fn run(
        &self,
        task: &str,
        agents: &[ChatAgent],
        events: &EventSink,
        cancel: &CancellationToken,
    ) -> Result<String, EngineError> {
        if agents.is_empty() {
            return Err(EngineError::Workflow("no participants".to_string()));
        }

        let started = Instant::now();
        let team = team_description(agents);
        let mut transcript = vec![TranscriptEntry::new("user", task)];

        let mut plan = self.plan(task, &team, &[], cancel).await?;
        events
            .emit(WorkflowEvent::OrchestratorMessage(format!(
                "We are working to address the following user request:\n\n{}\n\n\
                 To answer this request we have assembled the following team:\n\n{}\n\n\
                 Here is the plan to follow as best as possible:\n\n{}",
                task, team, plan
            )))
            .await;

        let mut stalls = 0usize;
        let mut resets = 0usize;

        for round in 1..=self.limits.max_round_count {
            if cancel.is_cancelled() || events.is_closed() {
                return Err(EngineError::Cancelled("stopped between rounds".to_string()));
            }
            if started.elapsed() >= self.limits.max_time {
                warn!("Time limit of {:?} reached after {} rounds", self.limits.max_time, round - 1);
                break;
            }

            debug!("Round {}/{}", round, self.limits.max_round_count);
            let reply = self
                .ask(ledger_prompt(task, &team, &plan, &transcript, agents), cancel)
                .await?;

            let ledger = ProgressLedger::parse(&reply);
            match &ledger {
                None => {
                    warn!("Unreadable progress ledger in round {}", round);
                    stalls += 1;
                }
                Some(ledger) if ledger.is_request_satisfied => {
                    info!("Request satisfied after {} rounds", round);
                    break;
                }
                Some(ledger) if ledger.is_stalled() => stalls += 1,
                Some(_) => stalls = stalls.saturating_sub(1),
            }

            if stalls > self.limits.max_stall_count {
                resets += 1;
                if resets > self.limits.max_reset_count {
                    warn!("Reset limit of {} reached, wrapping up", self.limits.max_reset_count);
                    break;
                }
                info!("Stalled {} times, replanning (reset {})", stalls, resets);
                stalls = 0;
                plan = self.plan(task, &team, &transcript, cancel).await?;
                events
                    .emit(WorkflowEvent::OrchestratorMessage(format!(
                        "Progress stalled. Here is the revised plan:\n\n{}",
                        plan
                    )))
                    .await;
                continue;
            }

            // An unreadable ledger names no speaker
            let Some(ledger) = ledger else {
                continue;
            };

            let agent = select_speaker(agents, &ledger.next_speaker);
            let instruction = if ledger.instruction.is_empty() {
                format!("Continue working on the task: {}", task)
            } else {
                ledger.instruction
            };

            events
                .emit(WorkflowEvent::OrchestratorMessage(instruction.clone()))
                .await;
            transcript.push(TranscriptEntry::new(ORCHESTRATOR_SOURCE, &instruction));

            let reply = match agent.run(&transcript, &instruction, events, cancel).await {
                Ok(reply) => reply,
                Err(e @ EngineError::Cancelled(_)) => return Err(e),
                Err(e) => {
                    warn!("{} failed: {}", agent.name, e);
                    stalls += 1;
                    format!("ERROR: {}", e)
                }
            };

            let text = Some(reply.clone()).filter(|r| !r.trim().is_empty());
            events
                .emit(WorkflowEvent::AgentMessage {
                    agent_id: agent.name.clone(),
                    text,
                })
                .await;
            transcript.push(TranscriptEntry::new(&agent.name, reply));
        }

        self.ask(final_answer_prompt(task, &transcript), cancel).await
    }

    async fn plan(
        &self,
        task: &str,
        team: &str,
        transcript: &[TranscriptEntry],
        cancel: &CancellationToken,
    ) -> Result<String, EngineError> {
        let mut prompt = format!(
            "Task:\n{}\n\nTeam:\n{}\n\n",
            task, team
        );
        if !transcript.is_empty() {
            prompt.push_str("The previous attempt stalled. What happened so far:\n\n");
            prompt.push_str(&render_transcript(transcript));
            prompt.push_str("\n\n");
        }
        prompt.push_str(
            "Write a short bullet-point plan for addressing the task with this team. \
             Only name team members who are needed.",
        );

        self.ask(
            vec![Message::system(MANAGER_PROMPT), Message::user(prompt)],
            cancel,
        )
        .await
    }

    /// One manager model call, bounded by the per-call timeout and `cancel`
    async fn ask(
        &self,
        messages: Vec<Message>,
        cancel: &CancellationToken,
    ) -> Result<String, EngineError> {
        tokio::select! {
            _ = cancel.cancelled() => {
                Err(EngineError::Cancelled("manager interrupted".to_string()))
            }
            result = timeout(self.limits.llm_timeout, self.client.complete(&messages)) => {
                match result {
                    Ok(reply) => Ok(reply?),
                    Err(_) => {
                        warn!("Manager LLM call timed out after {:?}", self.limits.llm_timeout);
                        Err(EngineError::LLMTimeout)
                    }
                }
            }
        }
    }
}

const MANAGER_PROMPT: &str = "You are the manager of a team of agents. You plan the work, \
choose which team member speaks next and decide when the user's request has been satisfied.";

fn team_description(agents: &[ChatAgent]) -> String {
    agents
        .iter()
        .map(|a| format!("{}: {}", a.name, a.description))
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_transcript(transcript: &[TranscriptEntry]) -> String {
    transcript
        .iter()
        .map(|e| format!("[{}]\n{}", e.speaker, e.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn ledger_prompt(
    task: &str,
    team: &str,
    plan: &str,
    transcript: &[TranscriptEntry],
    agents: &[ChatAgent],
) -> Vec<Message> {
    let names = agents
        .iter()
        .map(|a| a.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let prompt = format!(
        "Task:\n{task}\n\nTeam:\n{team}\n\nPlan:\n{plan}\n\nConversation so far:\n\n{history}\n\n\
         Answer the following questions about the current state of the work:\n\
         - is_request_satisfied: has the task been fully addressed?\n\
         - is_in_loop: are we repeating the same requests or responses?\n\
         - is_progress_being_made: did the last turns add something new?\n\
         - next_speaker: who should speak next? One of: {names}\n\
         - instruction: what should the next speaker do? Address them directly.\n\n\
         Reply with ONLY a JSON object of this form:\n\
         {{\"is_request_satisfied\": {{\"reason\": \"...\", \"answer\": false}}, \
         \"is_in_loop\": {{\"reason\": \"...\", \"answer\": false}}, \
         \"is_progress_being_made\": {{\"reason\": \"...\", \"answer\": true}}, \
         \"next_speaker\": {{\"reason\": \"...\", \"answer\": \"name\"}}, \
         \"instruction\": {{\"reason\": \"...\", \"answer\": \"...\"}}}}",
        history = render_transcript(transcript),
    );
    vec![Message::system(MANAGER_PROMPT), Message::user(prompt)]
}

fn final_answer_prompt(task: &str, transcript: &[TranscriptEntry]) -> Vec<Message> {
    let prompt = format!(
        "Task:\n{}\n\nConversation:\n\n{}\n\n\
         The work on this task is over. Write the final answer for the user based on the \
         conversation. If the task could not be completed, say what was found and what is missing.",
        task,
        render_transcript(transcript)
    );
    vec![Message::system(MANAGER_PROMPT), Message::user(prompt)]
}

/// Case-insensitive name match; unknown names fall back to the first agent
fn select_speaker<'a>(agents: &'a [ChatAgent], name: &str) -> &'a ChatAgent {
    let wanted = name.trim();
    agents
        .iter()
        .find(|a| a.name.eq_ignore_ascii_case(wanted))
        .unwrap_or_else(|| {
            warn!("Unknown speaker '{}', falling back to {}", wanted, agents[0].name);
            &agents[0]
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Result as LLMResult;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tokio_stream::StreamExt;

    struct Scripted {
        replies: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn new(replies: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.iter().rev().map(|s| s.to_string()).collect()),
            })
        }
    }

    #[async_trait]
    impl LLMProvider for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }
        fn model(&self) -> &str {
            "test"
        }
        async fn complete(&self, _messages: &[Message]) -> LLMResult<String> {
            let mut replies = self.replies.lock().unwrap();
            if replies.len() > 1 {
                Ok(replies.pop().unwrap())
            } else {
                Ok(replies.first().cloned().unwrap_or_default())
            }
        }
    }

    const STALLED: &str = r#"{"is_request_satisfied": false, "is_in_loop": true,
        "is_progress_being_made": false, "next_speaker": "CoderAgent", "instruction": "again"}"#;

    #[test]
    fn test_parse_ledger_with_reasons() {
        let ledger = ProgressLedger::parse(
            r#"Here you go:
```json
{"is_request_satisfied": {"reason": "not yet", "answer": false},
 "is_in_loop": {"reason": "no", "answer": false},
 "is_progress_being_made": {"reason": "yes", "answer": true},
 "next_speaker": {"reason": "needs code", "answer": "CoderAgent"},
 "instruction_or_question": {"reason": "", "answer": "Compute 2+2"}}
```"#,
        )
        .unwrap();
        assert!(!ledger.is_request_satisfied);
        assert!(!ledger.is_stalled());
        assert_eq!(ledger.next_speaker, "CoderAgent");
        assert_eq!(ledger.instruction, "Compute 2+2");
    }

    #[test]
    fn test_parse_ledger_bare_values() {
        let ledger = ProgressLedger::parse(STALLED).unwrap();
        assert!(ledger.is_in_loop);
        assert!(ledger.is_stalled());
        assert_eq!(ledger.instruction, "again");

        assert!(ProgressLedger::parse("no json here").is_none());
        assert!(ProgressLedger::parse(r#"{"next_speaker": "CoderAgent"}"#).is_none());

        let done = ProgressLedger::parse(r#"{"is_request_satisfied": "True"}"#).unwrap();
        assert!(done.is_request_satisfied);
        assert!(done.next_speaker.is_empty());
    }

    #[test]
    fn test_select_speaker() {
        let client = Scripted::new(&["x"]);
        let agents = vec![
            ChatAgent::new("CoderAgent", "codes", "i", client.clone()),
            ChatAgent::new("WebSurferAgent", "browses", "i", client),
        ];
        assert_eq!(select_speaker(&agents, "websurferagent").name, "WebSurferAgent");
        assert_eq!(select_speaker(&agents, "Nobody").name, "CoderAgent");
    }

    #[test]
    fn test_limits_from_config() {
        let config = OrchestratorConfig {
            max_rounds: 5,
            max_time_secs: 60,
            max_stalls_before_replan: 1,
            max_reset_count: 0,
            llm_timeout_secs: 10,
        };
        let limits = ManagerLimits::from(&config);
        assert_eq!(limits.max_round_count, 5);
        assert_eq!(limits.max_time, Duration::from_secs(60));
        assert_eq!(limits.llm_timeout, Duration::from_secs(10));
        assert_eq!(ManagerLimits::default().max_time, Duration::from_secs(1500));
    }

    #[tokio::test]
    async fn test_run_until_satisfied() {
        let client = Scripted::new(&[
            "- CoderAgent computes",
            r#"{"is_request_satisfied": false, "is_in_loop": false, "is_progress_being_made": true,
                "next_speaker": "CoderAgent", "instruction": "Compute 2+2"}"#,
            "The answer is 4",
            r#"{"is_request_satisfied": true, "is_in_loop": false, "is_progress_being_made": true,
                "next_speaker": "CoderAgent", "instruction": ""}"#,
            "2+2 = 4",
        ]);
        let agents = vec![ChatAgent::new("CoderAgent", "codes", "i", client.clone())];
        let manager = StandardManager::new(client, ManagerLimits::default());
        let (sink, stream) = EventSink::channel();

        let answer = manager
            .run("What is 2+2?", &agents, &sink, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(answer, "2+2 = 4");
        drop(sink);

        let events: Vec<_> = stream.collect().await;
        assert_eq!(events.len(), 3);
        assert!(matches!(&events[0], WorkflowEvent::OrchestratorMessage(m) if m.contains("- CoderAgent computes")));
        assert_eq!(events[1], WorkflowEvent::OrchestratorMessage("Compute 2+2".into()));
        assert_eq!(
            events[2],
            WorkflowEvent::AgentMessage {
                agent_id: "CoderAgent".into(),
                text: Some("The answer is 4".into())
            }
        );
    }

    #[tokio::test]
    async fn test_stalls_exhaust_resets() {
        // Plan, then every ledger reports a stall and every agent turn repeats
        let client = Scripted::new(&["plan", STALLED]);
        let agents = vec![ChatAgent::new("CoderAgent", "codes", "i", client.clone())];
        let limits = ManagerLimits {
            max_round_count: 50,
            max_stall_count: 0,
            max_reset_count: 1,
            ..ManagerLimits::default()
        };
        let manager = StandardManager::new(client, limits);
        let (sink, stream) = EventSink::channel();

        let answer = manager
            .run("loop", &agents, &sink, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(answer, STALLED);
        drop(sink);

        let replans = stream
            .filter(|e| matches!(e, WorkflowEvent::OrchestratorMessage(m) if m.starts_with("Progress stalled")))
            .collect::<Vec<_>>()
            .await;
        assert_eq!(replans.len(), 1);
    }

    #[tokio::test]
    async fn test_unreadable_ledgers_trigger_replan() {
        let client = Scripted::new(&["plan", "not a ledger"]);
        let agents = vec![ChatAgent::new("CoderAgent", "codes", "i", client.clone())];
        let limits = ManagerLimits {
            max_round_count: 50,
            max_stall_count: 1,
            max_reset_count: 1,
            ..ManagerLimits::default()
        };
        let manager = StandardManager::new(client, limits);
        let (sink, stream) = EventSink::channel();

        let answer = manager
            .run("task", &agents, &sink, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(answer, "not a ledger");
        drop(sink);

        let events: Vec<_> = stream.collect().await;
        let replans = events
            .iter()
            .filter(|e| matches!(e, WorkflowEvent::OrchestratorMessage(m) if m.starts_with("Progress stalled")))
            .count();
        assert_eq!(replans, 1);
        assert!(!events
            .iter()
            .any(|e| matches!(e, WorkflowEvent::AgentMessage { .. })));
    }

    #[tokio::test]
    async fn test_round_limit() {
        let client = Scripted::new(&[
            "plan",
            r#"{"is_request_satisfied": false, "is_in_loop": false, "is_progress_being_made": true,
                "next_speaker": "CoderAgent", "instruction": "keep going"}"#,
        ]);
        let agents = vec![ChatAgent::new("CoderAgent", "codes", "i", client.clone())];
        let limits = ManagerLimits {
            max_round_count: 2,
            ..ManagerLimits::default()
        };
        let manager = StandardManager::new(client, limits);
        let (sink, stream) = EventSink::channel();

        manager
            .run("task", &agents, &sink, &CancellationToken::new())
            .await
            .unwrap();
        drop(sink);

        let turns = stream
            .filter(|e| matches!(e, WorkflowEvent::AgentMessage { .. }))
            .collect::<Vec<_>>()
            .await;
        assert_eq!(turns.len(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_run() {
        let client = Scripted::new(&["plan"]);
        let agents = vec![ChatAgent::new("CoderAgent", "codes", "i", client.clone())];
        let manager = StandardManager::new(client, ManagerLimits::default());
        let (sink, _stream) = EventSink::channel();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = manager.run("task", &agents, &sink, &cancel).await.unwrap_err();
        assert!(matches!(err, EngineError::Cancelled(_)));
    }

    #[tokio::test]
    async fn test_no_participants() {
        let manager = StandardManager::new(Scripted::new(&["x"]), ManagerLimits::default());
        let (sink, _stream) = EventSink::channel();
        let err = manager
            .run("task", &[], &sink, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Workflow(_)));
    }
}
