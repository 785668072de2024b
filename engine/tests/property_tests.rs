use dreamteam_engine::llm::parse_tool_calls;
use dreamteam_engine::orchestrator::manager::ProgressLedger;
use dreamteam_engine::orchestrator::WorkflowEvent;
use dreamteam_engine::relay::to_record;
use dreamteam_engine::session::generate_session_name;
use proptest::prelude::*;
use serde_json::json;

fn wrapped(value: serde_json::Value, with_reasons: bool) -> serde_json::Value {
    if with_reasons {
        json!({"reason": "because", "answer": value})
    } else {
        value
    }
}

fn workflow_event() -> impl Strategy<Value = WorkflowEvent> {
    prop_oneof![
        ".*".prop_map(WorkflowEvent::OrchestratorMessage),
        (".*", ".*").prop_map(|(agent_id, text)| WorkflowEvent::AgentDelta { agent_id, text }),
        (".*", proptest::option::of(".*"))
            .prop_map(|(agent_id, text)| WorkflowEvent::AgentMessage { agent_id, text }),
        proptest::option::of(".*").prop_map(WorkflowEvent::FinalResult),
        ".*".prop_map(WorkflowEvent::WorkflowOutput),
        ".*".prop_map(WorkflowEvent::WorkflowCompleted),
        ".*".prop_map(WorkflowEvent::Failed),
        Just(WorkflowEvent::Cancelled),
    ]
}

proptest! {
    // Ledgers parse the same with or without {reason, answer} wrappers and
    // with prose around the object
    #[test]
    fn test_ledger_parse_preserves_answers(
        satisfied in any::<bool>(),
        in_loop in any::<bool>(),
        progress in any::<bool>(),
        speaker in "[A-Za-z]{1,12}Agent",
        instruction in "[A-Za-z0-9 ,.?]{0,40}",
        with_reasons in any::<bool>(),
        prose in "[A-Za-z ]{0,20}",
    ) {
        let object = json!({
            "is_request_satisfied": wrapped(json!(satisfied), with_reasons),
            "is_in_loop": wrapped(json!(in_loop), with_reasons),
            "is_progress_being_made": wrapped(json!(progress), with_reasons),
            "next_speaker": wrapped(json!(speaker), with_reasons),
            "instruction": wrapped(json!(instruction), with_reasons),
        });
        let reply = format!("{}\n{}", prose, object);

        let ledger = ProgressLedger::parse(&reply).unwrap();
        prop_assert_eq!(ledger.is_request_satisfied, satisfied);
        prop_assert_eq!(ledger.is_in_loop, in_loop);
        prop_assert_eq!(ledger.is_progress_being_made, progress);
        prop_assert_eq!(ledger.next_speaker, speaker);
        prop_assert_eq!(ledger.instruction, instruction.trim().to_string());
    }

    #[test]
    fn test_ledger_parse_never_panics(reply in ".*") {
        let _ = ProgressLedger::parse(&reply);
    }

    #[test]
    fn test_tool_call_parse_never_panics(reply in ".*") {
        let _ = parse_tool_calls(&reply);
    }

    #[test]
    fn test_tool_call_found_in_prose(
        name in "[a-z_]{1,20}",
        query in "[A-Za-z0-9 ]{0,30}",
        before in "[A-Za-z .]{0,30}",
    ) {
        let reply = format!(
            r#"{} {{"function": "{}", "arguments": {{"query": "{}"}}}}"#,
            before, name, query
        );
        let call = parse_tool_calls(&reply).unwrap();
        prop_assert_eq!(call.name, name);
        let args: serde_json::Value = serde_json::from_str(&call.arguments).unwrap();
        prop_assert_eq!(args["query"].as_str(), Some(query.as_str()));
    }

    // Only ending events carry a stop reason, and every record is stamped
    // with its session
    #[test]
    fn test_records_carry_session_and_stop_reason(
        event in workflow_event(),
        session in "[a-z]{1,10}-[a-z]{1,10}-[0-9]{4}",
        user in "[a-z0-9@.]{1,20}",
    ) {
        let terminal = event.is_terminal();
        if let Some(record) = to_record(event, &session, &user) {
            prop_assert_eq!(record.is_terminal(), terminal);
            prop_assert_eq!(&record.session_id, &session);
            prop_assert_eq!(&record.session_user, &user);
            prop_assert!(!record.time.is_empty());
        }
    }
}

#[test]
fn test_session_names_are_slugs() {
    for _ in 0..500 {
        let name = generate_session_name();
        let (words, number) = name.rsplit_once('-').unwrap();
        let number: u16 = number.parse().unwrap();
        assert!((1000..=9999).contains(&number), "{}", name);
        assert!(words.contains('-'), "{}", name);
        assert!(
            words.chars().all(|c| c.is_ascii_lowercase() || c == '-'),
            "{}",
            name
        );
    }
}
