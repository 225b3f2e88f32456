//! Integration tests for event line classification

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

use squad_rcon::protocol::classifier::{capture, RegexRule};
use squad_rcon::{classify, Classifier, TypedEvent};

const EOS: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";

#[test]
fn test_kick_line_extracts_all_ids() {
    let line = format!("Kicked player 3. [Online IDs= EOS: {EOS} steam: 76500000000000001] Bob");

    let event = classify(&line);

    assert_eq!(
        event,
        TypedEvent::PlayerKicked {
            player_id: "3".into(),
            eos_id: EOS.into(),
            steam_id: Some("76500000000000001".into()),
            player_name: "Bob".into(),
            raw: line.clone(),
        }
    );
    assert_eq!(event, classify(&line));
    assert_eq!(event.name(), "PLAYER_KICKED");
}

#[test]
fn test_unmatched_line_is_raw_data() {
    let event = classify("xyz not a real log line");

    assert_eq!(
        event,
        TypedEvent::RawData {
            body: "xyz not a real log line".into()
        }
    );
    assert_eq!(event.name(), "DATA");
}

#[test]
fn test_empty_line_is_raw_data() {
    assert_eq!(classify(""), TypedEvent::RawData { body: String::new() });
}

#[test]
fn test_warning_message_keeps_quotes_content() {
    let event = classify(r#"Remote admin has warned player Charlie. Message was "Stop teamkilling""#);

    match event {
        TypedEvent::PlayerWarned {
            player_name,
            reason,
            ..
        } => {
            assert_eq!(player_name, "Charlie");
            assert_eq!(reason, "Stop teamkilling");
        }
        other => panic!("Expected PlayerWarned, got {other:?}"),
    }
}

#[test]
fn test_unpossess_is_not_possess() {
    let line = format!("[Online IDs:EOS: {EOS} steam: 76500000000000001] Admin has unpossessed admin camera.");

    assert_eq!(classify(&line).name(), "UNPOSSESSED_ADMIN_CAMERA");
}

#[test]
fn test_body_with_several_lines_yields_one_event_each() {
    let body = format!(
        "[ChatTeam] [Online IDs:EOS: {EOS}] Delta : rally up\r\n\
         \r\n\
         Kicked player 7. [Online IDs= EOS: {EOS}] Echo\n\
         something else\0"
    );

    let names: Vec<_> = Classifier::new()
        .classify_body(&body)
        .iter()
        .map(TypedEvent::name)
        .collect();

    assert_eq!(names, vec!["CHAT_MESSAGE", "PLAYER_KICKED", "DATA"]);
}

#[test]
fn test_custom_rule_runs_after_builtins() {
    let rule = RegexRule::new("map_vote", r"^Vote started for (\w+)$", |caps, line| {
        Some(TypedEvent::RawData {
            body: format!("vote:{}:{}", capture(caps, 1), line.len()),
        })
    })
    .expect("valid pattern");
    let classifier = Classifier::new().with_rule(rule);

    assert_eq!(
        classifier.classify("Vote started for Narva"),
        TypedEvent::RawData {
            body: "vote:Narva:22".into()
        }
    );
    assert_eq!(classifier.rule_names().last().copied(), Some("map_vote"));
}

#[test]
fn test_events_serialize_with_type_tag() {
    let line = format!("Kicked player 3. [Online IDs= EOS: {EOS}] Bob");

    let json = serde_json::to_value(classify(&line)).expect("Failed to serialize");

    assert_eq!(json["type"], "player_kicked");
    assert_eq!(json["player_name"], "Bob");
    assert!(json["steam_id"].is_null());
}
