//! Prompt templates built from stored notes.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::mcp::protocol::{RequestId, RpcError};
use crate::mcp::resources::render_markdown;
use crate::mcp::tools::ToolContent;
use crate::store::{ListFilter, NoteId, NoteStore};

/// A prompt definition for prompts/list.
#[derive(Debug, Clone, Serialize)]
pub struct PromptDefinition {
    /// Unique prompt name.
    pub name: &'static str,
    /// Human-readable description.
    pub description: &'static str,
    /// Arguments the prompt accepts.
    pub arguments: Vec<PromptArgument>,
}

/// One argument of a prompt.
#[derive(Debug, Clone, Serialize)]
pub struct PromptArgument {
    /// Argument name.
    pub name: &'static str,
    /// Human-readable description.
    pub description: &'static str,
    /// Whether the argument must be supplied.
    pub required: bool,
}

/// Parameters for prompts/get request.
#[derive(Debug, Clone, Deserialize)]
pub struct PromptGetParams {
    /// Name of the prompt.
    pub name: String,
    /// Prompt arguments (MCP passes these as strings).
    #[serde(default)]
    pub arguments: HashMap<String, String>,
}

/// A message produced by a prompt.
#[derive(Debug, Clone, Serialize)]
struct PromptMessage {
    role: &'static str,
    content: ToolContent,
}

impl PromptMessage {
    fn user(text: String) -> Self {
        Self {
            role: "user",
            content: ToolContent::Text { text },
        }
    }
}

/// Returns the list of available prompts.
#[must_use]
pub fn definitions() -> Vec<PromptDefinition> {
    vec![
        PromptDefinition {
            name: "summarize_note",
            description: "Summarise a single note",
            arguments: vec![PromptArgument {
                name: "id",
                description: "Id of the note to summarise",
                required: true,
            }],
        },
        PromptDefinition {
            name: "notes_by_tag",
            description: "Write a digest of every note carrying a tag",
            arguments: vec![PromptArgument {
                name: "tag",
                description: "Tag to collect notes for",
                required: true,
            }],
        },
    ]
}

fn argument<'a>(
    params: &'a PromptGetParams,
    key: &str,
    id: &RequestId,
) -> Result<&'a str, RpcError> {
    params
        .arguments
        .get(key)
        .map(String::as_str)
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| {
            RpcError::invalid_params(id.clone(), format!("Missing prompt argument: {key}"))
        })
}

/// Builds the prompts/get result.
///
/// # Errors
///
/// Returns invalid params for an unknown prompt, a missing argument or an
/// unknown note, and an internal error if the store is not ready.
pub fn get(
    store: &NoteStore,
    id: &RequestId,
    params: &PromptGetParams,
) -> Result<Value, RpcError> {
    match params.name.as_str() {
        "summarize_note" => summarize_note(store, id, params),
        "notes_by_tag" => notes_by_tag(store, id, params),
        other => Err(RpcError::invalid_params(
            id.clone(),
            format!("Unknown prompt: {other}"),
        )),
    }
}

fn summarize_note(
    store: &NoteStore,
    id: &RequestId,
    params: &PromptGetParams,
) -> Result<Value, RpcError> {
    let note_id: NoteId = argument(params, "id", id)?
        .parse()
        .map_err(|e| RpcError::store(id, &e))?;
    let note = store
        .get(&note_id)
        .map_err(|e| RpcError::store(id, &e))?
        .ok_or_else(|| {
            RpcError::invalid_params(id.clone(), format!("No note with id {note_id}"))
        })?;

    let text = format!(
        "Summarise the following note in a few sentences. \
         Keep names, dates and decisions.\n\n{}",
        render_markdown(&note)
    );

    Ok(json!({
        "description": format!("Summary of \"{}\"", note.title),
        "messages": [PromptMessage::user(text)],
    }))
}

fn notes_by_tag(
    store: &NoteStore,
    id: &RequestId,
    params: &PromptGetParams,
) -> Result<Value, RpcError> {
    let tag = argument(params, "tag", id)?.trim();
    let notes = store
        .list(&ListFilter::default().with_tag(tag))
        .map_err(|e| RpcError::store(id, &e))?;

    let mut text = format!(
        "Write a short digest of my notes tagged \"{tag}\". \
         Group related points and list open questions at the end.\n"
    );
    if notes.is_empty() {
        text.push_str("\n(There are no notes with this tag yet.)\n");
    }
    for note in &notes {
        text.push_str("\n---\n\n");
        text.push_str(&render_markdown(note));
    }

    Ok(json!({
        "description": format!("Digest of {} note(s) tagged \"{tag}\"", notes.len()),
        "messages": [PromptMessage::user(text)],
    }))
}
