use super::*;
use serde_json::json;

// =========================================================================
// id precedence
// =========================================================================

#[test]
fn id_prefers_id_over_aliases() {
    let m = normalize_message(&json!({"id": 3, "message_id": 4, "pk": 5, "text": "x"})).unwrap();
    assert_eq!(m.id, 3);
}

#[test]
fn id_falls_back_to_message_id_then_pk() {
    let m = normalize_message(&json!({"message_id": 4, "pk": 5, "text": "x"})).unwrap();
    assert_eq!(m.id, 4);
    let m = normalize_message(&json!({"pk": 5, "text": "x"})).unwrap();
    assert_eq!(m.id, 5);
}

#[test]
fn non_numeric_id_becomes_zero() {
    let m = normalize_message(&json!({"id": "abc", "text": "x"})).unwrap();
    assert_eq!(m.id, 0);
    let m = normalize_message(&json!({"text": "x"})).unwrap();
    assert_eq!(m.id, 0);
}

#[test]
fn numeric_string_id_parses() {
    let m = normalize_message(&json!({"id": "42", "text": "x"})).unwrap();
    assert_eq!(m.id, 42);
}

#[test]
fn null_id_falls_through_to_alias() {
    let m = normalize_message(&json!({"id": null, "message_id": 9, "text": "x"})).unwrap();
    assert_eq!(m.id, 9);
}

// =========================================================================
// text precedence
// =========================================================================

#[test]
fn text_prefers_text_then_content_then_message() {
    let m = normalize_message(&json!({"text": "a", "content": "b", "message": "c"})).unwrap();
    assert_eq!(m.text, "a");
    let m = normalize_message(&json!({"content": "b", "message": "c"})).unwrap();
    assert_eq!(m.text, "b");
    let m = normalize_message(&json!({"message": "c"})).unwrap();
    assert_eq!(m.text, "c");
}

#[test]
fn missing_text_is_empty_not_none() {
    let m = normalize_message(&json!({"id": 1})).unwrap();
    assert_eq!(m.text, "");
}

// =========================================================================
// sender resolution
// =========================================================================

#[test]
fn explicit_sender_wins_over_role() {
    let m = normalize_message(&json!({"sender": "system", "role": "user", "text": "x"})).unwrap();
    assert_eq!(m.sender, Sender::System);
}

#[test]
fn role_maps_user_assistant_system() {
    let m = normalize_message(&json!({"role": "user", "text": "x"})).unwrap();
    assert_eq!(m.sender, Sender::Visitor);
    let m = normalize_message(&json!({"role": "assistant", "text": "x"})).unwrap();
    assert_eq!(m.sender, Sender::Operator);
    let m = normalize_message(&json!({"role": "system", "text": "x"})).unwrap();
    assert_eq!(m.sender, Sender::System);
}

#[test]
fn unlabeled_sender_defaults_to_operator() {
    // Never default to system: an unlabeled payload on the messages
    // channel is an operator reply.
    let m = normalize_message(&json!({"text": "x"})).unwrap();
    assert_eq!(m.sender, Sender::Operator);
}

#[test]
fn unknown_explicit_sender_falls_back_to_role() {
    let m = normalize_message(&json!({"sender": "robot", "role": "user", "text": "x"})).unwrap();
    assert_eq!(m.sender, Sender::Visitor);
}

#[test]
fn sender_is_case_insensitive() {
    let m = normalize_message(&json!({"sender": "Visitor", "text": "x"})).unwrap();
    assert_eq!(m.sender, Sender::Visitor);
}

// =========================================================================
// author + created_at
// =========================================================================

#[test]
fn author_prefers_author_then_username_then_sender_label() {
    let m = normalize_message(&json!({"author": "A", "username": "B", "text": "x"})).unwrap();
    assert_eq!(m.author, "A");
    let m = normalize_message(&json!({"username": "B", "text": "x"})).unwrap();
    assert_eq!(m.author, "B");
    let m = normalize_message(&json!({"role": "user", "text": "x"})).unwrap();
    assert_eq!(m.author, "Visitor");
}

#[test]
fn empty_author_uses_sender_label() {
    let m = normalize_message(&json!({"author": "", "text": "x"})).unwrap();
    assert_eq!(m.author, "Operator");
}

#[test]
fn created_at_aliases() {
    let m = normalize_message(&json!({"created_at": "2025-01-01T10:00:00Z", "text": "x"})).unwrap();
    assert_eq!(m.created_at.as_deref(), Some("2025-01-01T10:00:00Z"));
    let m = normalize_message(&json!({"createdAt": "t", "text": "x"})).unwrap();
    assert_eq!(m.created_at.as_deref(), Some("t"));
    let m = normalize_message(&json!({"created": 1700000000, "text": "x"})).unwrap();
    assert_eq!(m.created_at.as_deref(), Some("1700000000"));
    let m = normalize_message(&json!({"text": "x"})).unwrap();
    assert!(m.created_at.is_none());
}

#[test]
fn message_serializes_in_canonical_form() {
    let m = normalize_message(&json!({"id": 2, "role": "assistant", "text": "x"})).unwrap();
    let v = serde_json::to_value(&m).unwrap();
    assert_eq!(v.get("sender"), Some(&json!("operator")));
    assert_eq!(v.get("author"), Some(&json!("Operator")));
    assert!(v.get("created_at").is_none(), "absent timestamp is omitted, not null");
}

#[test]
fn non_object_payload_is_rejected() {
    assert!(normalize_message(&json!("hello")).is_none());
    assert!(normalize_message(&json!(null)).is_none());
    assert!(normalize_message(&json!([1, 2])).is_none());
}
