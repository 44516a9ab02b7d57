//! Field-level edits. These are the fine-grained, keystroke-rate changes the
//! history coalesces; layout changes live in `layout::pages`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::editor::EditorError;
use crate::layout::templates::TemplateId;
use crate::models::{Document, SectionId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum FieldEdit {
    Title(String),
    Slug(String),
    Tags(Vec<String>),
    Public(bool),
    Locked(bool),
    Password(Option<String>),
    Template(String),
}

impl FieldEdit {
    /// Text fields coalesce per field; toggles and template switches are
    /// discrete actions.
    pub fn coalesce_key(&self) -> Option<&'static str> {
        match self {
            FieldEdit::Title(_) => Some("title"),
            FieldEdit::Slug(_) => Some("slug"),
            FieldEdit::Tags(_) => Some("tags"),
            FieldEdit::Password(_) => Some("password"),
            FieldEdit::Public(_) | FieldEdit::Locked(_) | FieldEdit::Template(_) => None,
        }
    }

    pub fn apply(self, doc: &mut Document) -> Result<(), EditorError> {
        match self {
            FieldEdit::Title(title) => doc.title = title,
            FieldEdit::Slug(slug) => doc.slug = slug,
            FieldEdit::Tags(tags) => doc.tags = tags,
            FieldEdit::Public(public) => doc.visibility.public = public,
            FieldEdit::Locked(locked) => doc.locked = locked,
            FieldEdit::Password(password) => doc.password = password,
            FieldEdit::Template(template) => {
                let id: TemplateId = template.parse().map_err(|_| {
                    EditorError::validation(format!("unknown template '{template}'"))
                })?;
                doc.content.template = id.to_string();
            }
        }
        Ok(())
    }
}

/// Applies `edits` in order. A locked document only accepts a batch that
/// leaves it unlocked.
pub fn apply_all(edits: Vec<FieldEdit>, doc: &mut Document) -> Result<(), EditorError> {
    let was_locked = doc.locked;
    edits.into_iter().try_for_each(|edit| edit.apply(doc))?;
    if was_locked && doc.locked {
        return Err(EditorError::validation("document is locked"));
    }
    Ok(())
}

/// Partial update of one content block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SectionPatch {
    pub name: Option<String>,
    pub visible: Option<bool>,
    pub body: Option<Value>,
}

impl SectionPatch {
    /// Text edits inside one section coalesce; visibility toggles don't.
    pub fn coalesce_key(&self, section: &SectionId) -> Option<String> {
        self.visible.is_none().then(|| format!("section:{section}"))
    }

    pub fn apply(self, doc: &mut Document, section: &SectionId) -> Result<(), EditorError> {
        if doc.locked {
            return Err(EditorError::validation("document is locked"));
        }
        let target = doc
            .content
            .sections
            .get_mut(section)
            .ok_or_else(|| EditorError::not_found(format!("section '{section}'")))?;
        if let Some(name) = self.name {
            if name.trim().is_empty() {
                return Err(EditorError::validation("section name must not be blank"));
            }
            target.name = name;
        }
        if let Some(visible) = self.visible {
            target.visible = visible;
        }
        if let Some(body) = self.body {
            target.body = body;
        }
        Ok(())
    }
}
