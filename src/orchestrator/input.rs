//! Turning a submission into the canonical messages sent upstream

use crate::config::Config;
use crate::error::{RelayError, RelayResult};
use crate::native::types::{Input, Message};
use crate::text::truncate_text;

/// Longest label taken from the first line of an unnamed custom prompt
const PROMPT_LABEL_CHARS: usize = 50;

/// Canonical request ready for an adapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedInput {
    pub messages: Vec<Message>,
    pub system_prompt: String,
    /// What the caller should record as the first user turn, initial requests only
    pub original_context: Option<String>,
}

/// Build the canonical messages and system prompt for a submission
///
/// Initial content is trimmed and truncated to `max_text_length`. A custom
/// prompt replaces the system prompt and is prepended to the recorded
/// context, separated by a rule.
///
/// # Errors
///
/// `RelayError::EmptyInput` for blank initial text or an empty follow-up.
pub fn prepare(input: &Input, custom_prompt: Option<&str>, config: &Config) -> RelayResult<PreparedInput> {
    match input {
        Input::Initial(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return Err(RelayError::EmptyInput);
            }
            let processed = truncate_text(trimmed, config.max_text_length);

            let (system_prompt, original_context) = match custom_prompt {
                Some(custom) => (
                    custom.to_string(),
                    format!("{}\n\n---\n\n{}", custom, processed),
                ),
                None => (config.effective_system_prompt(), processed.clone()),
            };

            Ok(PreparedInput {
                messages: vec![Message::user(processed)],
                system_prompt,
                original_context: Some(original_context),
            })
        }
        Input::FollowUp(messages) => {
            if messages.is_empty() {
                return Err(RelayError::EmptyInput);
            }
            Ok(PreparedInput {
                messages: messages.clone(),
                system_prompt: config.effective_system_prompt(),
                original_context: None,
            })
        }
    }
}

/// Header shown above a response produced for a custom prompt
pub fn custom_prompt_banner(custom_prompt: &str, command_name: Option<&str>) -> String {
    let label = match command_name {
        Some(command) => format!("/{}", command),
        None => {
            let first_line: String = custom_prompt
                .lines()
                .next()
                .unwrap_or_default()
                .chars()
                .take(PROMPT_LABEL_CHARS)
                .collect();
            format!("{}...", first_line)
        }
    };
    format!("\n**YOU:** {}\n\n---\n", label)
}

/// Description of the request that would have been sent, for dry-run mode
///
/// `system_prompt` is the configured prompt. A custom prompt is listed with
/// the payload instead.
pub fn dry_run_report(
    input: &Input,
    custom_prompt: Option<&str>,
    command_name: Option<&str>,
    model: &str,
    endpoint: &str,
    system_prompt: &str,
) -> RelayResult<String> {
    let content = match input {
        Input::Initial(text) => text.clone(),
        Input::FollowUp(messages) => serde_json::to_string_pretty(messages)?,
    };

    let payload = match (custom_prompt, input) {
        (Some(custom), Input::Initial(_)) => format!(
            "[Custom Prompt]: {}\n\n[Extracted Content]:\n{}",
            custom, content
        ),
        _ => content,
    };

    let action = match (command_name, custom_prompt) {
        (Some(command), _) => format!("/{}", command),
        (None, Some(_)) => "Custom Prompt".to_string(),
        (None, None) => "Default Summary".to_string(),
    };

    Ok(format!(
        "**[DEBUG MODE]**\n\n**Action:** {}\n**Model:** {}\n**Target URL:** {}\n**System Prompt:**\n{}\n\n**Content Payload ({} chars):**\n\n{}\n",
        action,
        model,
        endpoint,
        system_prompt,
        payload.chars().count(),
        payload
    ))
}
