//! Tool definitions and handlers.
//!
//! Each handler pulls its arguments out of the raw JSON, calls the note
//! store, and turns the outcome into a [`ToolCallResult`]. Store failures are
//! reported as error results rather than JSON-RPC errors so the assistant
//! can see and correct them.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::store::{ListFilter, NoteId, NotePatch, NoteStore, StoreError};

/// A tool definition for tools/list response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    /// Unique tool name.
    pub name: String,
    /// Human-readable description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema for the tool's input parameters.
    pub input_schema: Value,
}

/// Parameters for tools/call request.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolCallParams {
    /// Name of the tool to call.
    pub name: String,
    /// Arguments for the tool.
    #[serde(default)]
    pub arguments: Value,
}

/// Content item in a tool call response or prompt message.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolContent {
    /// Text content.
    Text {
        /// The text content.
        text: String,
    },
}

/// Result of a tool call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallResult {
    /// Content returned by the tool.
    pub content: Vec<ToolContent>,
    /// Whether the tool call resulted in an error.
    #[serde(skip_serializing_if = "is_false")]
    pub is_error: bool,
}

#[allow(clippy::trivially_copy_pass_by_ref)] // serde's skip_serializing_if requires fn(&T) -> bool
const fn is_false(b: &bool) -> bool {
    !*b
}

impl ToolCallResult {
    /// Creates a successful text result.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text { text: text.into() }],
            is_error: false,
        }
    }

    /// Creates an error text result.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text {
                text: message.into(),
            }],
            is_error: true,
        }
    }

    /// Creates a successful result holding pretty-printed JSON.
    #[must_use]
    pub fn json(value: &Value) -> Self {
        Self::text(pretty(value))
    }

    /// Creates an error result describing a store failure.
    #[must_use]
    pub fn store_error(err: &StoreError) -> Self {
        let result = json!({
            "status": "error",
            "kind": err.kind().as_str(),
            "error": err.to_string(),
        });
        Self::error(pretty(&result))
    }
}

/// What a tool call produced, and whether it changed the set of notes.
#[derive(Debug, Clone)]
pub struct ToolOutcome {
    /// The result returned to the client.
    pub result: ToolCallResult,
    /// A note was created, updated or deleted.
    pub notes_changed: bool,
}

impl From<ToolCallResult> for ToolOutcome {
    fn from(result: ToolCallResult) -> Self {
        Self {
            result,
            notes_changed: false,
        }
    }
}

impl ToolOutcome {
    const fn changed(result: ToolCallResult) -> Self {
        Self {
            result,
            notes_changed: true,
        }
    }
}

pub(crate) fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

/// Returns the list of available tools.
#[allow(clippy::too_many_lines)]
#[must_use]
pub fn definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "hello".to_string(),
            description: Some(
                "Return a greeting. Useful to check that the notes server is reachable."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "name": {
                        "type": "string",
                        "description": "Optional: who to greet (default: world)"
                    }
                }
            }),
        },
        ToolDefinition {
            name: "create_note".to_string(),
            description: Some(
                "Create a note with a title, content and optional tags. \
                 Returns the stored note including its generated id and timestamps. \
                 Tags are trimmed and duplicates are collapsed."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "title": {
                        "type": "string",
                        "description": "Note title (non-empty)"
                    },
                    "content": {
                        "type": "string",
                        "description": "Note body"
                    },
                    "tags": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Optional: labels for filtering"
                    }
                },
                "required": ["title", "content"]
            }),
        },
        ToolDefinition {
            name: "get_note".to_string(),
            description: Some("Fetch a single note by id.".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "id": {
                        "type": "string",
                        "description": "Note id"
                    }
                },
                "required": ["id"]
            }),
        },
        ToolDefinition {
            name: "list_notes".to_string(),
            description: Some(
                "List notes in creation order, optionally filtered by tag. \
                 Use limit/offset for pagination."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "tag": {
                        "type": "string",
                        "description": "Optional: only notes carrying this tag"
                    },
                    "limit": {
                        "type": "integer",
                        "description": "Optional: maximum number of notes to return (default: all)"
                    },
                    "offset": {
                        "type": "integer",
                        "description": "Optional: skip first N matching notes (default: 0)"
                    }
                }
            }),
        },
        ToolDefinition {
            name: "update_note".to_string(),
            description: Some(
                "Change the title, content or tags of an existing note. \
                 Fields that are not given are left as they are; tags replace the whole list."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "id": {
                        "type": "string",
                        "description": "Note id"
                    },
                    "title": {
                        "type": "string",
                        "description": "Optional: new title"
                    },
                    "content": {
                        "type": "string",
                        "description": "Optional: new content"
                    },
                    "tags": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Optional: new tag list"
                    }
                },
                "required": ["id"]
            }),
        },
        ToolDefinition {
            name: "delete_note".to_string(),
            description: Some(
                "Permanently delete a note. Reports deleted=false if no note had that id."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "id": {
                        "type": "string",
                        "description": "Note id"
                    }
                },
                "required": ["id"]
            }),
        },
    ]
}

/// Runs the named tool against `store`.
#[must_use]
pub fn call(store: &NoteStore, name: &str, arguments: &Value) -> ToolOutcome {
    match name {
        "hello" => call_hello(arguments).into(),
        "create_note" => call_create_note(store, arguments),
        "get_note" => call_get_note(store, arguments).into(),
        "list_notes" => call_list_notes(store, arguments).into(),
        "update_note" => call_update_note(store, arguments),
        "delete_note" => call_delete_note(store, arguments),
        _ => ToolCallResult::error(format!("Unknown tool: {name}")).into(),
    }
}

// ==================== Argument helpers ====================

fn required_str<'a>(arguments: &'a Value, key: &str) -> Result<&'a str, ToolCallResult> {
    arguments
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| ToolCallResult::error(format!("Missing required parameter: {key}")))
}

fn optional_str<'a>(arguments: &'a Value, key: &str) -> Result<Option<&'a str>, ToolCallResult> {
    match arguments.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(_) => Err(ToolCallResult::error(format!(
            "Parameter {key} must be a string"
        ))),
    }
}

fn optional_tags(arguments: &Value) -> Result<Option<Vec<String>>, ToolCallResult> {
    let invalid = || ToolCallResult::error("Parameter tags must be an array of strings");
    match arguments.get("tags") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| v.as_str().map(str::to_string))
            .collect::<Option<Vec<_>>>()
            .map(Some)
            .ok_or_else(invalid),
        Some(_) => Err(invalid()),
    }
}

fn optional_count(arguments: &Value, key: &str) -> Result<Option<usize>, ToolCallResult> {
    match arguments.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_u64()
            .map(|n| Some(usize::try_from(n).unwrap_or(usize::MAX)))
            .ok_or_else(|| {
                ToolCallResult::error(format!("Parameter {key} must be a non-negative integer"))
            }),
    }
}

fn note_id(arguments: &Value) -> Result<NoteId, ToolCallResult> {
    required_str(arguments, "id")?
        .parse()
        .map_err(|e| ToolCallResult::store_error(&e))
}

type CreateArgs<'a> = (&'a str, &'a str, Option<Vec<String>>);

fn create_args(arguments: &Value) -> Result<CreateArgs<'_>, ToolCallResult> {
    Ok((
        required_str(arguments, "title")?,
        required_str(arguments, "content")?,
        optional_tags(arguments)?,
    ))
}

fn list_args(arguments: &Value) -> Result<(Option<&str>, Option<usize>, usize), ToolCallResult> {
    Ok((
        optional_str(arguments, "tag")?,
        optional_count(arguments, "limit")?,
        optional_count(arguments, "offset")?.unwrap_or(0),
    ))
}

fn update_args(arguments: &Value) -> Result<(NoteId, NotePatch), ToolCallResult> {
    let id = note_id(arguments)?;
    let patch = NotePatch {
        title: optional_str(arguments, "title")?.map(str::to_string),
        content: optional_str(arguments, "content")?.map(str::to_string),
        tags: optional_tags(arguments)?,
    };
    Ok((id, patch))
}

// ==================== Tool Handlers ====================

fn call_hello(arguments: &Value) -> ToolCallResult {
    let name = arguments
        .get("name")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or("world");
    ToolCallResult::text(format!("Hello, {name}!"))
}

fn call_create_note(store: &NoteStore, arguments: &Value) -> ToolOutcome {
    let (title, content, tags) = match create_args(arguments) {
        Ok(args) => args,
        Err(result) => return result.into(),
    };

    match store.create(title, content, tags) {
        Ok(note) => {
            tracing::info!(id = %note.id, "Note created via tool call");
            ToolOutcome::changed(ToolCallResult::json(&json!({
                "status": "success",
                "note": note,
            })))
        }
        Err(e) => ToolCallResult::store_error(&e).into(),
    }
}

fn call_get_note(store: &NoteStore, arguments: &Value) -> ToolCallResult {
    let id = match note_id(arguments) {
        Ok(id) => id,
        Err(result) => return result,
    };

    match store.get(&id) {
        Ok(Some(note)) => ToolCallResult::json(&json!({
            "status": "success",
            "note": note,
        })),
        Ok(None) => ToolCallResult::store_error(&StoreError::NotFound { id }),
        Err(e) => ToolCallResult::store_error(&e),
    }
}

fn call_list_notes(store: &NoteStore, arguments: &Value) -> ToolCallResult {
    let (tag, limit, offset) = match list_args(arguments) {
        Ok(args) => args,
        Err(result) => return result,
    };

    let mut filter = ListFilter::default().with_offset(offset);
    if let Some(tag) = tag {
        filter = filter.with_tag(tag);
    }
    if let Some(limit) = limit {
        filter = filter.with_limit(limit);
    }

    match store.page(&filter) {
        Ok((total_count, notes)) => {
            let returned_count = notes.len();
            ToolCallResult::json(&json!({
                "status": "success",
                "total_count": total_count,
                "returned_count": returned_count,
                "offset": offset,
                "has_more": offset.saturating_add(returned_count) < total_count,
                "notes": notes,
            }))
        }
        Err(e) => ToolCallResult::store_error(&e),
    }
}

fn call_update_note(store: &NoteStore, arguments: &Value) -> ToolOutcome {
    let (id, patch) = match update_args(arguments) {
        Ok(args) => args,
        Err(result) => return result.into(),
    };

    match store.update(&id, patch) {
        Ok(note) => {
            tracing::info!(%id, "Note updated via tool call");
            ToolOutcome::changed(ToolCallResult::json(&json!({
                "status": "success",
                "note": note,
            })))
        }
        Err(e) => ToolCallResult::store_error(&e).into(),
    }
}

fn call_delete_note(store: &NoteStore, arguments: &Value) -> ToolOutcome {
    let id = match note_id(arguments) {
        Ok(id) => id,
        Err(result) => return result.into(),
    };

    match store.delete(&id) {
        Ok(deleted) => {
            let result = ToolCallResult::json(&json!({
                "status": "success",
                "id": id,
                "deleted": deleted,
            }));
            if deleted {
                tracing::info!(%id, "Note deleted via tool call");
                ToolOutcome::changed(result)
            } else {
                result.into()
            }
        }
        Err(e) => ToolCallResult::store_error(&e).into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Limits;

    fn store() -> (tempfile::TempDir, NoteStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = NoteStore::new(dir.path().join("notes.json"), Limits::default());
        store.initialize().unwrap();
        (dir, store)
    }

    fn text(result: &ToolCallResult) -> &str {
        match &result.content[0] {
            ToolContent::Text { text } => text,
        }
    }

    fn body(result: &ToolCallResult) -> Value {
        serde_json::from_str(text(result)).unwrap()
    }

    #[test]
    fn tool_definitions_valid() {
        let tools = definitions();
        assert_eq!(tools.len(), 6);

        for tool in &tools {
            assert!(!tool.name.is_empty());
            assert!(tool.input_schema.is_object());
        }
    }

    #[test]
    fn tool_call_result_text() {
        let result = ToolCallResult::text("Hello, world!");
        assert!(!result.is_error);
        assert_eq!(result.content.len(), 1);
        assert_eq!(text(&result), "Hello, world!");
    }

    #[test]
    fn tool_call_result_error() {
        let result = ToolCallResult::error("Something went wrong");
        assert!(result.is_error);
        assert_eq!(text(&result), "Something went wrong");
    }

    #[test]
    fn hello_greets() {
        let (_dir, store) = store();
        let outcome = call(&store, "hello", &json!({}));
        assert_eq!(text(&outcome.result), "Hello, world!");

        let outcome = call(&store, "hello", &json!({"name": "Ada"}));
        assert_eq!(text(&outcome.result), "Hello, Ada!");
    }

    #[test]
    fn create_reports_change() {
        let (_dir, store) = store();
        let outcome = call(
            &store,
            "create_note",
            &json!({"title": "Meeting Notes", "content": "Discussed Q3", "tags": ["work"]}),
        );
        assert!(!outcome.result.is_error);
        assert!(outcome.notes_changed);

        let body = body(&outcome.result);
        assert_eq!(body["note"]["tags"], json!(["work"]));
        assert_eq!(body["note"]["created"], body["note"]["updated"]);
    }

    #[test]
    fn create_requires_title() {
        let (_dir, store) = store();
        let outcome = call(&store, "create_note", &json!({"content": "x"}));
        assert!(outcome.result.is_error);
        assert!(!outcome.notes_changed);
        assert!(text(&outcome.result).contains("title"));
    }

    #[test]
    fn create_rejects_non_string_tags() {
        let (_dir, store) = store();
        let outcome = call(
            &store,
            "create_note",
            &json!({"title": "t", "content": "c", "tags": [1, 2]}),
        );
        assert!(outcome.result.is_error);
        assert!(store.is_empty());
    }

    #[test]
    fn validation_errors_carry_kind() {
        let (_dir, store) = store();
        let outcome = call(&store, "create_note", &json!({"title": "  ", "content": ""}));
        assert!(outcome.result.is_error);
        assert_eq!(body(&outcome.result)["kind"], "validation");
    }

    #[test]
    fn get_unknown_note_is_not_found() {
        let (_dir, store) = store();
        let id = NoteId::generate().to_string();
        let outcome = call(&store, "get_note", &json!({ "id": id }));
        assert!(outcome.result.is_error);
        assert_eq!(body(&outcome.result)["kind"], "not_found");
    }

    #[test]
    fn get_malformed_id_is_validation_error() {
        let (_dir, store) = store();
        let outcome = call(&store, "get_note", &json!({"id": "12"}));
        assert_eq!(body(&outcome.result)["kind"], "validation");
    }

    #[test]
    fn list_reports_pagination() {
        let (_dir, store) = store();
        for i in 0..3 {
            store.create(&format!("n{i}"), "", None).unwrap();
        }
        let outcome = call(&store, "list_notes", &json!({"limit": 2}));
        let body = body(&outcome.result);
        assert_eq!(body["total_count"], 3);
        assert_eq!(body["returned_count"], 2);
        assert_eq!(body["has_more"], true);

        let outcome = call(&store, "list_notes", &json!({"limit": -1}));
        assert!(outcome.result.is_error);
    }

    #[test]
    fn list_accepts_huge_counts() {
        let (_dir, store) = store();
        for i in 0..3 {
            store.create(&format!("n{i}"), "", None).unwrap();
        }
        let outcome = call(&store, "list_notes", &json!({"limit": u64::MAX}));
        let body = body(&outcome.result);
        assert!(!outcome.result.is_error);
        assert_eq!(body["returned_count"], 3);
        assert_eq!(body["has_more"], false);

        let outcome = call(&store, "list_notes", &json!({"offset": u64::MAX}));
        let body = self::body(&outcome.result);
        assert!(!outcome.result.is_error);
        assert_eq!(body["total_count"], 3);
        assert_eq!(body["returned_count"], 0);
        assert_eq!(body["has_more"], false);
    }

    #[test]
    fn update_changes_fields() {
        let (_dir, store) = store();
        let note = store.create("Old", "Body", None).unwrap();
        let outcome = call(
            &store,
            "update_note",
            &json!({"id": note.id.to_string(), "title": "New", "tags": ["a", "a"]}),
        );
        assert!(outcome.notes_changed);
        let body = body(&outcome.result);
        assert_eq!(body["note"]["title"], "New");
        assert_eq!(body["note"]["content"], "Body");
        assert_eq!(body["note"]["tags"], json!(["a"]));
    }

    #[test]
    fn delete_reports_whether_removed() {
        let (_dir, store) = store();
        let note = store.create("Doomed", "", None).unwrap();
        let args = json!({"id": note.id.to_string()});

        let outcome = call(&store, "delete_note", &args);
        assert!(outcome.notes_changed);
        assert_eq!(body(&outcome.result)["deleted"], true);

        let outcome = call(&store, "delete_note", &args);
        assert!(!outcome.notes_changed);
        assert_eq!(body(&outcome.result)["deleted"], false);
    }

    #[test]
    fn unknown_tool() {
        let (_dir, store) = store();
        let outcome = call(&store, "format_disk", &json!({}));
        assert!(outcome.result.is_error);
    }
}
