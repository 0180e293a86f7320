//! Integration tests for prompt normalization

mod common;

use common::{ChatMlTemplate, FailingTemplate, PanickingTemplate};
use localchat_core::prompt::{MessageNormalizer, ASSISTANT_CUE, DEFAULT_PROMPT};
use localchat_core::protocol::{Conversation, Message};
use proptest::prelude::*;
use serde_json::json;
use std::collections::HashMap;
use test_case::test_case;

fn normalize_json(value: serde_json::Value) -> String {
    let conversation = Conversation::from(value);
    MessageNormalizer::new().normalize(&conversation, None)
}

proptest! {
    #[test]
    fn prop_bare_prompt_is_framed(s in any::<String>()) {
        let prompt = MessageNormalizer::new().normalize(&Conversation::from(s.clone()), None);
        prop_assert_eq!(prompt, format!("User: {}\nAssistant: ", s));
    }

    #[test]
    fn prop_fallback_always_ends_with_cue(
        turns in proptest::collection::vec(("[a-z-]{0,12}", ".*"), 0..6)
    ) {
        let messages: Vec<Message> = turns
            .iter()
            .map(|(role, content)| Message::new(role.as_str(), content.as_str()))
            .collect();
        let prompt = MessageNormalizer::new().normalize(&Conversation::from(messages), None);
        prop_assert!(prompt.ends_with(ASSISTANT_CUE));
    }
}

#[test_case(
    json!([{"role": "user", "content": "hi"}]),
    "User: hi\nAssistant: "
    ; "single user turn"
)]
#[test_case(
    json!({"role": "user", "content": "hi"}),
    "User: hi\nAssistant: "
    ; "lone message object"
)]
#[test_case(json!([]), "Assistant: " ; "empty list")]
#[test_case(json!([{"role": "user"}]), "User: \nAssistant: " ; "missing content")]
#[test_case(json!([{"content": "x"}]), "User: x\nAssistant: " ; "missing role")]
#[test_case(
    json!([{"role": "user", "content": [{"text": "a"}, "b"]}]),
    "User: a\nb\nAssistant: "
    ; "fragment list"
)]
#[test_case(
    json!([{"role": "SYSTEM", "content": "s"}, {"role": "assistant", "content": "a"}]),
    "System: s\nAssistant: a\nAssistant: "
    ; "roles are capitalized"
)]
#[test_case(json!(42), DEFAULT_PROMPT ; "number")]
#[test_case(json!(null), DEFAULT_PROMPT ; "null")]
#[test_case(json!(true), DEFAULT_PROMPT ; "boolean")]
#[test_case(json!([{"content": "x"}, 7]), DEFAULT_PROMPT ; "list with a number")]
fn test_fallback_prompts(input: serde_json::Value, expected: &str) {
    assert_eq!(normalize_json(input), expected);
}

#[test]
fn test_chat_template_is_used() {
    let conversation = Conversation::from(vec![
        Message::system("Be brief."),
        Message::user("Hi"),
    ]);
    let prompt = MessageNormalizer::new().normalize(&conversation, Some(&ChatMlTemplate));
    assert_eq!(
        prompt,
        "<|im_start|>system\nBe brief.<|im_end|>\n\
         <|im_start|>user\nHi<|im_end|>\n\
         <|im_start|>assistant\n"
    );
}

#[test]
fn test_bare_prompt_skips_template() {
    let normalizer = MessageNormalizer::new();
    let prompt = normalizer.normalize(&Conversation::from("hi"), Some(&ChatMlTemplate));
    assert_eq!(prompt, "User: hi\nAssistant: ");
}

#[test_case(&FailingTemplate ; "template error")]
#[test_case(&PanickingTemplate ; "template panic")]
fn test_template_failure_falls_back(template: &dyn localchat_core::backend::ChatTemplate) {
    let conversation = Conversation::from(vec![Message::user("Hello")]);
    let prompt = MessageNormalizer::new().normalize(&conversation, Some(template));
    assert_eq!(prompt, "User: Hello\nAssistant: ");
}

#[test]
fn test_role_conversions_reach_template() {
    let conversions = HashMap::from([("tool-response".to_string(), "user".to_string())]);
    let normalizer = MessageNormalizer::with_role_conversions(conversions);
    let conversation = Conversation::from(vec![Message::new("tool-response", "42")]);

    let prompt = normalizer.normalize(&conversation, Some(&ChatMlTemplate));
    assert_eq!(prompt, "<|im_start|>user\n42<|im_end|>\n<|im_start|>assistant\n");
}
