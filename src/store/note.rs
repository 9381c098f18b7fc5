//! Note records and the input types that create and modify them.
//!
//! All validation happens here, in explicit constructors, before anything
//! reaches the store's map. Lengths are counted in characters, not bytes.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::{StoreError, StoreResult};

/// Opaque note identifier (random UUID v4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(Uuid);

impl NoteId {
    /// Generates a fresh random id.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for NoteId {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| StoreError::validation("id", format!("'{s}' is not a valid note id")))
    }
}

/// Length and count bounds applied to note fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Maximum title length in characters.
    pub max_title_chars: usize,
    /// Maximum content length in characters.
    pub max_content_chars: usize,
    /// Maximum length of a single tag in characters.
    pub max_tag_chars: usize,
    /// Maximum number of distinct tags on one note.
    pub max_tags: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_title_chars: 200,
            max_content_chars: 50_000,
            max_tag_chars: 50,
            max_tags: 32,
        }
    }
}

impl Limits {
    /// Checks and trims a title.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the title is blank or too long.
    pub fn check_title(&self, title: &str) -> StoreResult<String> {
        let title = title.trim();
        if title.is_empty() {
            return Err(StoreError::validation("title", "must not be empty"));
        }
        let len = title.chars().count();
        if len > self.max_title_chars {
            return Err(StoreError::validation(
                "title",
                format!(
                    "{len} characters exceeds the limit of {}",
                    self.max_title_chars
                ),
            ));
        }
        Ok(title.to_string())
    }

    /// Checks content length.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the content is too long.
    pub fn check_content(&self, content: &str) -> StoreResult<()> {
        let len = content.chars().count();
        if len > self.max_content_chars {
            return Err(StoreError::validation(
                "content",
                format!(
                    "{len} characters exceeds the limit of {}",
                    self.max_content_chars
                ),
            ));
        }
        Ok(())
    }

    /// Normalises a tag list: trims each tag, collapses duplicates keeping
    /// the first occurrence, and enforces the tag limits.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a blank or over-long tag, or when more
    /// than `max_tags` distinct tags remain.
    pub fn normalise_tags<I, S>(&self, tags: I) -> StoreResult<Vec<String>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut normalised: Vec<String> = Vec::new();
        for tag in tags {
            let tag = tag.as_ref().trim();
            if tag.is_empty() {
                return Err(StoreError::validation("tags", "tags must not be empty"));
            }
            if tag.chars().count() > self.max_tag_chars {
                return Err(StoreError::validation(
                    "tags",
                    format!(
                        "tag '{tag}' exceeds the limit of {} characters",
                        self.max_tag_chars
                    ),
                ));
            }
            if !normalised.iter().any(|t| t == tag) {
                normalised.push(tag.to_string());
            }
        }
        if normalised.len() > self.max_tags {
            return Err(StoreError::validation(
                "tags",
                format!(
                    "{} tags exceeds the limit of {}",
                    normalised.len(),
                    self.max_tags
                ),
            ));
        }
        Ok(normalised)
    }
}

/// A stored note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Identifier assigned at creation.
    pub id: NoteId,
    /// Non-empty title.
    pub title: String,
    /// Free-form body text.
    pub content: String,
    /// Distinct, non-empty labels.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Creation time; never changes.
    pub created: DateTime<Utc>,
    /// Time of the last successful mutation.
    pub updated: DateTime<Utc>,
}

impl Note {
    /// Builds a note from a validated draft, stamping both timestamps with `now`.
    #[must_use]
    pub fn from_draft(id: NoteId, draft: NoteDraft, now: DateTime<Utc>) -> Self {
        Self {
            id,
            title: draft.title,
            content: draft.content,
            tags: draft.tags,
            created: now,
            updated: now,
        }
    }

    /// Returns `true` if the note carries `tag`.
    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Re-checks every invariant on a note that did not come through a
    /// [`NoteDraft`], e.g. one read back from disk.
    ///
    /// # Errors
    ///
    /// Returns a validation error naming the first violated invariant.
    pub fn check(&self, limits: &Limits) -> StoreResult<()> {
        let title = limits.check_title(&self.title)?;
        if title != self.title {
            return Err(StoreError::validation(
                "title",
                "has leading or trailing whitespace",
            ));
        }
        limits.check_content(&self.content)?;
        if limits.normalise_tags(&self.tags)? != self.tags {
            return Err(StoreError::validation("tags", "contains duplicates"));
        }
        if self.created > self.updated {
            return Err(StoreError::validation(
                "updated",
                "is earlier than the creation time",
            ));
        }
        Ok(())
    }
}

/// Validated input for creating a note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteDraft {
    title: String,
    content: String,
    tags: Vec<String>,
}

impl NoteDraft {
    /// Validates and normalises new-note input.
    ///
    /// # Errors
    ///
    /// Returns a validation error if any field breaks the limits.
    pub fn new(
        title: &str,
        content: impl Into<String>,
        tags: Option<Vec<String>>,
        limits: &Limits,
    ) -> StoreResult<Self> {
        let title = limits.check_title(title)?;
        let content = content.into();
        limits.check_content(&content)?;
        let tags = limits.normalise_tags(tags.unwrap_or_default())?;
        Ok(Self {
            title,
            content,
            tags,
        })
    }

    /// The normalised title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// The normalised tags.
    #[must_use]
    pub fn tags(&self) -> &[String] {
        &self.tags
    }
}

/// A partial modification of an existing note.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotePatch {
    /// Replacement title.
    pub title: Option<String>,
    /// Replacement content.
    pub content: Option<String>,
    /// Replacement tag list.
    pub tags: Option<Vec<String>>,
}

impl NotePatch {
    /// Returns `true` if the patch changes nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.title.is_none() && self.content.is_none() && self.tags.is_none()
    }

    /// Validates every field of the patch, then applies it to `note`.
    ///
    /// `note` is left untouched if validation fails. `updated` is set to
    /// `now`, or to `created` if the clock has gone backwards.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an empty patch or an invalid field.
    pub fn apply(self, note: &mut Note, limits: &Limits, now: DateTime<Utc>) -> StoreResult<()> {
        if self.is_empty() {
            return Err(StoreError::validation(
                "patch",
                "at least one of title, content or tags must be given",
            ));
        }

        let title = self.title.map(|t| limits.check_title(&t)).transpose()?;
        if let Some(content) = &self.content {
            limits.check_content(content)?;
        }
        let tags = self.tags.map(|t| limits.normalise_tags(t)).transpose()?;

        if let Some(title) = title {
            note.title = title;
        }
        if let Some(content) = self.content {
            note.content = content;
        }
        if let Some(tags) = tags {
            note.tags = tags;
        }
        note.updated = now.max(note.created);
        Ok(())
    }
}

/// Selection and pagination for [`NoteStore::list`](super::NoteStore::list).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilter {
    /// Only notes carrying this tag.
    pub tag: Option<String>,
    /// Number of matching notes to skip.
    pub offset: usize,
    /// Maximum number of notes to return (unbounded when `None`).
    pub limit: Option<usize>,
}

impl ListFilter {
    /// Restricts the listing to notes carrying `tag`.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into().trim().to_string());
        self
    }

    /// Caps the number of notes returned.
    #[must_use]
    pub const fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skips the first `offset` matching notes.
    #[must_use]
    pub const fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Returns `true` if `note` passes the tag filter.
    #[must_use]
    pub fn matches(&self, note: &Note) -> bool {
        self.tag.as_deref().map_or(true, |tag| note.has_tag(tag))
    }
}
