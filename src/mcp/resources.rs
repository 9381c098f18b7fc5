//! Notes exposed as MCP resources.
//!
//! Every note is addressable as `note://{id}` and reads back as Markdown.

use serde::Serialize;
use serde_json::{json, Value};

use crate::mcp::protocol::{RequestId, RpcError};
use crate::store::{ListFilter, Note, NoteId, NoteStore};

/// URI scheme prefix for note resources.
pub const NOTE_URI_PREFIX: &str = "note://";

const MARKDOWN: &str = "text/markdown";

/// A resource entry for resources/list.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    /// Resource URI.
    pub uri: String,
    /// Display name.
    pub name: String,
    /// Short description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// MIME type of the contents.
    pub mime_type: &'static str,
}

/// A URI template for resources/templates/list.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceTemplate {
    /// RFC 6570 URI template.
    pub uri_template: &'static str,
    /// Display name.
    pub name: &'static str,
    /// Short description.
    pub description: &'static str,
    /// MIME type of the contents.
    pub mime_type: &'static str,
}

/// The contents of one resource for resources/read.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceContents {
    /// Resource URI.
    pub uri: String,
    /// MIME type of `text`.
    pub mime_type: &'static str,
    /// The rendered resource.
    pub text: String,
}

/// Returns the URI of a note.
#[must_use]
pub fn note_uri(id: &NoteId) -> String {
    format!("{NOTE_URI_PREFIX}{id}")
}

/// Renders a note as Markdown.
#[must_use]
pub fn render_markdown(note: &Note) -> String {
    let mut out = format!("# {}\n\n", note.title);
    if !note.tags.is_empty() {
        out.push_str("Tags: ");
        out.push_str(&note.tags.join(", "));
        out.push('\n');
    }
    out.push_str(&format!(
        "Created: {}\nUpdated: {}\n\n",
        note.created.to_rfc3339(),
        note.updated.to_rfc3339()
    ));
    out.push_str(&note.content);
    if !note.content.ends_with('\n') {
        out.push('\n');
    }
    out
}

fn describe(note: &Note) -> Option<String> {
    if note.tags.is_empty() {
        None
    } else {
        Some(format!("Tags: {}", note.tags.join(", ")))
    }
}

/// Builds the resources/list result.
///
/// # Errors
///
/// Returns an internal error if the store is not ready.
pub fn list(store: &NoteStore, id: &RequestId) -> Result<Value, RpcError> {
    let notes = store
        .list(&ListFilter::default())
        .map_err(|e| RpcError::store(id, &e))?;

    let resources: Vec<Resource> = notes
        .iter()
        .map(|note| Resource {
            uri: note_uri(&note.id),
            name: note.title.clone(),
            description: describe(note),
            mime_type: MARKDOWN,
        })
        .collect();

    Ok(json!({ "resources": resources }))
}

/// Builds the resources/templates/list result.
#[must_use]
pub fn templates() -> Value {
    let templates = [ResourceTemplate {
        uri_template: "note://{id}",
        name: "Note",
        description: "A single note rendered as Markdown",
        mime_type: MARKDOWN,
    }];
    json!({ "resourceTemplates": templates })
}

/// Builds the resources/read result for `uri`.
///
/// # Errors
///
/// Returns invalid params for a malformed note id, resource-not-found for a
/// foreign scheme or unknown note, and an internal error if the store is not
/// ready.
pub fn read(store: &NoteStore, id: &RequestId, uri: &str) -> Result<Value, RpcError> {
    let Some(raw_id) = uri.strip_prefix(NOTE_URI_PREFIX) else {
        return Err(RpcError::resource_not_found(id.clone(), uri));
    };
    let note_id: NoteId = raw_id.parse().map_err(|e| RpcError::store(id, &e))?;

    let note = store
        .get(&note_id)
        .map_err(|e| RpcError::store(id, &e))?
        .ok_or_else(|| RpcError::resource_not_found(id.clone(), uri))?;

    let contents = ResourceContents {
        uri: uri.to_string(),
        mime_type: MARKDOWN,
        text: render_markdown(&note),
    };
    Ok(json!({ "contents": [contents] }))
}
