//! Capability selection with validation and bounded retry.
//!
//! One attempt runs Propose, Parse, SchemaValidate in order; a rejection
//! builds a corrective prompt and tries again. The attempt budget is fixed
//! up front and every failed attempt consumes one unit whatever the cause,
//! backend outages included. Exhaustion is the ordinary
//! [`SelectionOutcome::Abandoned`] value, not an error.

pub mod feedback;
pub mod intent;
pub mod parser;
pub mod schema;
pub mod types;

pub use intent::{classify_intent, SelectionIntent};
pub use types::{
    ResourceChoice, ResourceSelection, SelectionError, SelectionOutcome, ToolChoice, ToolSelection,
};

use crate::mcp::snapshot::ProviderSnapshot;
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

/// Default attempt budget for one selection.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

const TOOL_PROMPT_HEADER: &str = "Select one tool for the request. Reply \
with a single JSON object {\"serverName\", \"toolName\", \"arguments\"} or \
{\"noToolAvailable\": true}.";

const RESOURCE_PROMPT_HEADER: &str = "Select one resource for the request. \
Reply with a single JSON object {\"serverName\", \"uri\"} or \
{\"noResourceAvailable\": true}.";

/// The external model call. Implementations receive the full prompt text and
/// return the raw model output.
#[async_trait]
pub trait SelectionBackend: Send {
    async fn propose(&mut self, prompt: &str) -> Result<String, String>;
}

/// Runs the bounded tool-selection loop against `backend`.
pub async fn select_tool(
    backend: &mut dyn SelectionBackend,
    request: &str,
    snapshot: &ProviderSnapshot,
    max_attempts: u32,
) -> SelectionOutcome<ToolSelection> {
    let snapshot_text = snapshot.tool_text();
    let prompt = initial_prompt(TOOL_PROMPT_HEADER, request, &snapshot_text);
    run_selection(
        backend,
        request,
        &snapshot_text,
        prompt,
        max_attempts,
        parser::extract_tool_json,
        tool_choice,
    )
    .await
}

/// Runs the bounded resource-selection loop against `backend`.
pub async fn select_resource(
    backend: &mut dyn SelectionBackend,
    request: &str,
    snapshot: &ProviderSnapshot,
    max_attempts: u32,
) -> SelectionOutcome<ResourceSelection> {
    let snapshot_text = snapshot.resource_text();
    let prompt = initial_prompt(RESOURCE_PROMPT_HEADER, request, &snapshot_text);
    run_selection(
        backend,
        request,
        &snapshot_text,
        prompt,
        max_attempts,
        parser::extract_resource_json,
        resource_choice,
    )
    .await
}

enum Choice<T> {
    Selected(T),
    NoneAvailable { reasoning: Option<String> },
}

fn tool_choice(value: &Value) -> Result<Choice<ToolSelection>, SelectionError> {
    schema::validate_tool_selection(value).map(|choice| match choice {
        ToolChoice::Tool(selection) => Choice::Selected(selection),
        ToolChoice::NoneAvailable { reasoning } => Choice::NoneAvailable { reasoning },
    })
}

fn resource_choice(value: &Value) -> Result<Choice<ResourceSelection>, SelectionError> {
    schema::validate_resource_selection(value).map(|choice| match choice {
        ResourceChoice::Resource(selection) => Choice::Selected(selection),
        ResourceChoice::NoneAvailable { reasoning } => Choice::NoneAvailable { reasoning },
    })
}

fn initial_prompt(header: &str, request: &str, snapshot_text: &str) -> String {
    format!(
        "{}\n\nRequest:\n{}\n\nAvailable capabilities:\n{}",
        header, request, snapshot_text
    )
}

async fn run_selection<T>(
    backend: &mut dyn SelectionBackend,
    request: &str,
    snapshot_text: &str,
    initial_prompt: String,
    max_attempts: u32,
    extract: fn(&str) -> Result<Value, SelectionError>,
    validate: fn(&Value) -> Result<Choice<T>, SelectionError>,
) -> SelectionOutcome<T> {
    let mut prompt = initial_prompt;
    let mut last_errors: Vec<String> = Vec::new();

    for attempt in 1..=max_attempts {
        let response = match backend.propose(&prompt).await {
            Ok(response) => response,
            Err(message) => {
                let error = SelectionError::Backend(message);
                debug!(attempt, error = %error, "Selection backend call failed");
                last_errors = error_strings(&error);
                prompt = feedback::corrective_prompt(request, "", &error, snapshot_text);
                continue;
            }
        };

        let rejection = match extract(&response).and_then(|value| validate(&value)) {
            Ok(Choice::Selected(selection)) => {
                debug!(attempt, "Selection accepted");
                return SelectionOutcome::Selected(selection);
            }
            Ok(Choice::NoneAvailable { reasoning }) => {
                debug!(attempt, "Backend reported no suitable capability");
                return SelectionOutcome::NoneAvailable { reasoning };
            }
            Err(error) => error,
        };

        debug!(attempt, error = %rejection, "Selection attempt rejected");
        last_errors = error_strings(&rejection);
        prompt = feedback::corrective_prompt(request, &response, &rejection, snapshot_text);
    }

    SelectionOutcome::Abandoned {
        attempts: max_attempts,
        last_errors,
    }
}

fn error_strings(error: &SelectionError) -> Vec<String> {
    match error {
        SelectionError::SchemaValidation(errors) => errors.clone(),
        other => vec![other.to_string()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    struct ScriptedBackend {
        replies: VecDeque<Result<String, String>>,
        prompts: Vec<String>,
    }

    impl ScriptedBackend {
        fn new(replies: Vec<Result<String, String>>) -> Self {
            ScriptedBackend {
                replies: replies.into(),
                prompts: Vec::new(),
            }
        }
    }

    #[async_trait]
    impl SelectionBackend for ScriptedBackend {
        async fn propose(&mut self, prompt: &str) -> Result<String, String> {
            self.prompts.push(prompt.to_string());
            self.replies
                .pop_front()
                .unwrap_or_else(|| Err("script exhausted".to_string()))
        }
    }

    fn valid_tool_reply() -> String {
        "```json\n{\"serverName\": \"n8n\", \"toolName\": \"calculator\", \"arguments\": {\"input\": \"2+2\"}}\n```".to_string()
    }

    #[tokio::test]
    async fn a_valid_first_reply_is_selected() {
        let mut backend = ScriptedBackend::new(vec![Ok(valid_tool_reply())]);
        let snapshot = ProviderSnapshot::default();

        let outcome = select_tool(&mut backend, "what is 2+2?", &snapshot, 3).await;
        match outcome {
            SelectionOutcome::Selected(selection) => {
                assert_eq!(selection.server_name, "n8n");
                assert_eq!(selection.tool_name, "calculator");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(backend.prompts.len(), 1);
        assert!(backend.prompts[0].contains("what is 2+2?"));
    }

    #[tokio::test]
    async fn rejections_produce_corrective_prompts() {
        let mut backend = ScriptedBackend::new(vec![
            Ok("{\"serverName\": \"n8n\"}".to_string()),
            Ok(valid_tool_reply()),
        ]);
        let snapshot = ProviderSnapshot::default();

        let outcome = select_tool(&mut backend, "what is 2+2?", &snapshot, 3).await;
        assert!(matches!(outcome, SelectionOutcome::Selected(_)));
        assert_eq!(backend.prompts.len(), 2);
        let retry = &backend.prompts[1];
        assert!(retry.contains("Problems:"));
        assert!(retry.contains("toolName"));
        assert!(retry.contains("what is 2+2?"));
    }

    #[tokio::test]
    async fn an_always_rejecting_backend_exhausts_the_budget() {
        let mut backend = ScriptedBackend::new(vec![
            Ok("no json here".to_string()),
            Ok("still no json".to_string()),
            Ok("nope".to_string()),
        ]);
        let snapshot = ProviderSnapshot::default();

        let outcome = select_tool(&mut backend, "anything", &snapshot, 3).await;
        match outcome {
            SelectionOutcome::Abandoned {
                attempts,
                last_errors,
            } => {
                assert_eq!(attempts, 3);
                assert!(!last_errors.is_empty());
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(backend.prompts.len(), 3);
    }

    #[tokio::test]
    async fn the_escape_field_ends_the_loop_early() {
        let mut backend = ScriptedBackend::new(vec![Ok(
            "{\"noToolAvailable\": true, \"reasoning\": \"nothing fits\"}".to_string(),
        )]);
        let snapshot = ProviderSnapshot::default();

        let outcome = select_tool(&mut backend, "anything", &snapshot, 3).await;
        assert_eq!(
            outcome,
            SelectionOutcome::NoneAvailable {
                reasoning: Some("nothing fits".to_string())
            }
        );
    }

    #[tokio::test]
    async fn backend_failures_consume_attempts() {
        let mut backend = ScriptedBackend::new(vec![
            Err("connection reset".to_string()),
            Ok(valid_tool_reply()),
        ]);
        let snapshot = ProviderSnapshot::default();

        let outcome = select_tool(&mut backend, "what is 2+2?", &snapshot, 2).await;
        assert!(matches!(outcome, SelectionOutcome::Selected(_)));
        assert_eq!(backend.prompts.len(), 2);
        assert!(backend.prompts[1].contains("connection reset"));
    }

    #[tokio::test]
    async fn resource_selection_accepts_a_uri() {
        let mut backend = ScriptedBackend::new(vec![Ok(
            "```\n{\"serverName\": \"n8n\", \"uri\": \"mcp://n8n/synthetic/calculator\"}\n```"
                .to_string(),
        )]);
        let snapshot = ProviderSnapshot::default();

        let outcome = select_resource(&mut backend, "evaluate 2+2", &snapshot, 3).await;
        match outcome {
            SelectionOutcome::Selected(selection) => {
                assert_eq!(selection.uri, "mcp://n8n/synthetic/calculator");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }
}
