//! Corrective feedback prompts.
//!
//! A rejected attempt earns one retry prompt. The opening line comes from a
//! template keyed by the classified intent of the user's original request;
//! the rest embeds what the model said, what was wrong with it, the original
//! request, and the current capability snapshot.

use crate::selection::intent::{classify_intent, SelectionIntent};
use crate::selection::types::SelectionError;

const ARITHMETIC_TEMPLATE: &str = "The request looks arithmetic. Select the \
calculator tool and put the expression to evaluate in the arguments, or \
reply {\"noToolAvailable\": true} if no calculator is listed.";

const WEATHER_TEMPLATE: &str = "The request looks like a weather question. \
Select the weather capability with the location named in the request, or \
reply with the escape field if none is listed.";

const GENERIC_TEMPLATE: &str = "The previous selection was rejected. Reply \
with exactly one JSON object matching the selection schema, or with the \
escape field when nothing fits.";

fn template_for(intent: SelectionIntent) -> &'static str {
    match intent {
        SelectionIntent::Arithmetic => ARITHMETIC_TEMPLATE,
        SelectionIntent::WeatherQuery => WEATHER_TEMPLATE,
        SelectionIntent::Unclassified => GENERIC_TEMPLATE,
    }
}

/// Builds the retry prompt for one rejected attempt.
pub fn corrective_prompt(
    request: &str,
    response: &str,
    error: &SelectionError,
    snapshot_text: &str,
) -> String {
    format!(
        "{}\n\nYour previous response:\n{}\n\nProblems:\n{}\n\nOriginal request:\n{}\n\nAvailable capabilities:\n{}",
        template_for(classify_intent(request)),
        response,
        error_lines(error),
        request,
        snapshot_text
    )
}

fn error_lines(error: &SelectionError) -> String {
    match error {
        SelectionError::SchemaValidation(errors) => errors
            .iter()
            .map(|line| format!("- {}", line))
            .collect::<Vec<_>>()
            .join("\n"),
        other => format!("- {}", other),
    }
}
