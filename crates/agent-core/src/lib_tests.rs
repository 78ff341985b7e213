#[cfg(test)]
mod tests {
    use crate::agent::types::RETRY_SUFFIX;
    use crate::agent::{AgentError, AgentEvent, Conversation, Message, Role};
    use crate::tools::{ToolCall, ToolError, ToolOutput};

    #[test]
    fn test_conversation_start_seeds_system_and_user_turns() {
        let conversation = Conversation::start(Some("Answer in Japanese."), "Weather in Kobe?");

        assert!(!conversation.id.is_empty());
        assert_eq!(conversation.len(), 2);
        assert_eq!(conversation.messages()[0].role, Role::System);
        assert_eq!(conversation.messages()[1].role, Role::User);
        assert_eq!(conversation.messages()[1].content, "Weather in Kobe?");
    }

    #[test]
    fn test_conversation_start_skips_blank_system_prompt() {
        let conversation = Conversation::start(Some("   "), "hello");

        assert_eq!(conversation.len(), 1);
        assert_eq!(conversation.last().map(|m| m.role.clone()), Some(Role::User));
    }

    #[test]
    fn test_conversation_appends_in_order() {
        let mut conversation = Conversation::new("run-1");
        conversation.add_message(Message::user("first"));
        conversation.add_message(Message::assistant("second", None));
        conversation.add_message(Message::tool_result("call_1", "third"));

        let contents: Vec<&str> = conversation
            .messages()
            .iter()
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(contents, vec!["first", "second", "third"]);
        assert!(conversation.updated_at >= conversation.created_at);
    }

    #[test]
    fn test_retry_prompt_is_a_flagged_tool_result() {
        let msg = Message::retry_prompt("call_1", "Could not find the location.");

        assert_eq!(msg.role, Role::Tool);
        assert!(msg.retry);
        assert_eq!(msg.tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(
            msg.content,
            format!("Could not find the location.\n\n{RETRY_SUFFIX}")
        );
    }

    #[test]
    fn test_retry_count_counts_only_corrective_turns() {
        let mut conversation = Conversation::new("run-1");
        conversation.add_message(Message::user("q"));
        conversation.add_message(Message::retry_prompt("call_1", "nope"));
        conversation.add_message(Message::tool_result("call_2", "ok"));
        conversation.add_message(Message::user_retry_prompt("Plain text"));

        assert_eq!(conversation.retry_count(), 2);
    }

    #[test]
    fn test_tool_message_serialization() {
        let msg = Message::tool_result("call_yyaeEH9yC4MEL0kc5fWJwOZv", "[]");
        let parsed = serde_json::to_value(&msg).unwrap();

        assert_eq!(parsed["role"], "tool");
        assert_eq!(parsed["content"], "[]");
        assert_eq!(parsed["tool_call_id"], "call_yyaeEH9yC4MEL0kc5fWJwOZv");
        assert!(parsed.get("retry").is_none(), "retry is only written when set");
    }

    #[test]
    fn test_assistant_with_tool_calls_serialization() {
        let tool_calls = vec![ToolCall::function(
            "call_1",
            "get_lat_lon",
            r#"{"city_name": "Kobe"}"#,
        )];

        let msg = Message::assistant("", Some(tool_calls));
        let parsed = serde_json::to_value(&msg).unwrap();

        assert_eq!(parsed["role"], "assistant");
        assert_eq!(parsed["tool_calls"][0]["type"], "function");
        assert_eq!(parsed["tool_calls"][0]["function"]["name"], "get_lat_lon");
    }

    #[test]
    fn test_tool_output_message_content() {
        assert_eq!(ToolOutput::text("plain").to_message_content(), "plain");
        assert_eq!(
            ToolOutput::new(serde_json::json!([{"lat": 1.5}])).to_message_content(),
            r#"[{"lat":1.5}]"#
        );
    }

    #[test]
    fn test_agent_error_from_tool_error() {
        let contract = AgentError::from_tool_error(
            "get_lat_lon",
            ToolError::InvalidArguments("missing required parameter 'city_name'".to_string()),
        );
        assert!(matches!(contract, AgentError::ContractViolation(ref m) if m.starts_with("get_lat_lon:")));

        let external = AgentError::from_tool_error(
            "get_weather_forecast",
            ToolError::HttpStatus {
                status: 401,
                message: "Invalid API key".to_string(),
            },
        );
        assert!(matches!(external, AgentError::External(ref m) if m.contains("HTTP 401")));
    }

    #[test]
    fn test_retry_budget_error_message() {
        let error = AgentError::RetryBudgetExceeded {
            attempts: 2,
            reason: "Could not find the location.".to_string(),
        };

        assert!(error.is_retry_budget_exceeded());
        assert_eq!(
            error.to_string(),
            "Gave up after 2 attempts: Could not find the location."
        );
    }

    #[test]
    fn test_agent_event_serialization_is_tagged() {
        let event = AgentEvent::ToolRetry {
            tool_call_id: "call_1".to_string(),
            tool_name: "get_lat_lon".to_string(),
            reason: "Could not find the location.".to_string(),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "tool_retry");
        assert_eq!(json["tool_name"], "get_lat_lon");
    }
}
