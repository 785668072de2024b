use proptest::prelude::*;
use sdk::errors::{EngineError, ErrorExt};
use sdk::types::{AgentConfig, AgentType, ConversationMessage, StreamingEvent};

// User hints must never be empty and never echo the wrapped detail.
proptest! {
    #[test]
    fn test_error_user_hint_completeness(error_str in "[a-z]{12,40}") {
        let errs = vec![
            EngineError::Config(error_str.clone()),
            EngineError::Database(error_str.clone()),
            EngineError::LLMProvider(error_str.clone()),
            EngineError::Workflow(error_str.clone()),
            EngineError::ToolNotFound(error_str.clone()),
            EngineError::ToolError(error_str.clone()),
            EngineError::NotFound(error_str.clone()),
            EngineError::PathDenied(std::path::PathBuf::from(&error_str)),
        ];

        for err in errs {
            let hint = err.user_hint();
            prop_assert!(!hint.is_empty());
            prop_assert!(!hint.contains(&error_str));
        }
    }
}

// Any agent name and prompt text survives the wire format unchanged.
proptest! {
    #[test]
    fn test_agent_config_text_preserved(
        name in "\\PC{1,30}",
        system_message in "\\PC{0,200}",
        kind in prop_oneof![
            Just(AgentType::MagenticOne),
            Just(AgentType::Custom),
            Just(AgentType::CustomMcp),
            Just(AgentType::Rag),
        ],
    ) {
        let mut cfg = AgentConfig::new("0042", kind, name.clone(), "🤖");
        cfg.system_message = system_message.clone();

        let json = serde_json::to_string(&cfg).unwrap();
        let parsed: AgentConfig = serde_json::from_str(&json).unwrap();

        prop_assert_eq!(parsed.name, name);
        prop_assert_eq!(parsed.system_message, system_message);
        prop_assert_eq!(parsed.agent_type, kind);
    }
}

// Stored event records are always read back as events, never as user messages.
proptest! {
    #[test]
    fn test_event_records_stay_events(content in "\\PC{0,100}", source in "[A-Za-z]{1,20}") {
        let event = StreamingEvent {
            time: "2024-05-01 12:00:00".to_string(),
            event_type: "agent_message".to_string(),
            source,
            content: content.clone(),
            stop_reason: None,
            models_usage: None,
            content_image: None,
            session_id: "lunar-probe-4242".to_string(),
            session_user: "user123".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        let parsed: ConversationMessage = serde_json::from_str(&json).unwrap();
        match parsed {
            ConversationMessage::Event(e) => prop_assert_eq!(e.content, content),
            ConversationMessage::User(_) => prop_assert!(false, "event parsed as user message"),
        }
    }
}
