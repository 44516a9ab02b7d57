use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

// ────────────────────────────────────────────────────────────────────────────
// Identifiers
// ────────────────────────────────────────────────────────────────────────────

/// Opaque key of a content block. Unique across the whole document.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SectionId(pub String);

impl SectionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SectionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for SectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageId(pub Uuid);

impl PageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Layout
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Column {
    Main,
    Sidebar,
}

/// One printed page. Sections are referenced by id only; a section never
/// knows which page holds it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub id: PageId,
    pub main: Vec<SectionId>,
    pub sidebar: Vec<SectionId>,
    pub full_width: bool,
}

impl Page {
    /// A fresh page with both columns empty, spanning the full width.
    pub fn empty() -> Self {
        Self {
            id: PageId::new(),
            main: Vec::new(),
            sidebar: Vec::new(),
            full_width: true,
        }
    }

    pub fn column(&self, column: Column) -> &Vec<SectionId> {
        match column {
            Column::Main => &self.main,
            Column::Sidebar => &self.sidebar,
        }
    }

    pub fn column_mut(&mut self, column: Column) -> &mut Vec<SectionId> {
        match column {
            Column::Main => &mut self.main,
            Column::Sidebar => &mut self.sidebar,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Content
// ────────────────────────────────────────────────────────────────────────────

/// A content block. `body` is whatever the presentation layer stores for the
/// block: structured JSON for resume sections, a plain string for letters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub id: SectionId,
    pub name: String,
    pub visible: bool,
    pub body: Value,
}

impl Section {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: SectionId::new(id),
            name: name.into(),
            visible: true,
            body: Value::Null,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    /// Template identifier as stored. Resolved leniently at render time.
    pub template: String,
    pub sections: BTreeMap<SectionId, Section>,
    pub pages: Vec<Page>,
}

/// Sections every new resume starts with, in main-column order. The last
/// one goes to the sidebar.
const STARTER_SECTIONS: &[(&str, &str)] = &[
    ("summary", "Summary"),
    ("experience", "Experience"),
    ("education", "Education"),
    ("skills", "Skills"),
];

impl Content {
    /// One page holding the starter sections.
    pub fn starter(template: &str) -> Self {
        let mut sections = BTreeMap::new();
        let mut page = Page::empty();
        page.full_width = false;
        for (i, (id, name)) in STARTER_SECTIONS.iter().enumerate() {
            let section = Section::new(*id, *name);
            if i + 1 == STARTER_SECTIONS.len() {
                page.sidebar.push(section.id.clone());
            } else {
                page.main.push(section.id.clone());
            }
            sections.insert(section.id.clone(), section);
        }
        Self {
            template: template.to_string(),
            sections,
            pages: vec![page],
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Document
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Visibility {
    pub public: bool,
}

/// The résumé or cover letter under edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub content: Content,
    pub tags: Vec<String>,
    pub visibility: Visibility,
    pub locked: bool,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub owner_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The full set of user-editable fields. Autosave always sends all of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentFields {
    pub title: String,
    pub slug: String,
    pub content: Content,
    pub tags: Vec<String>,
    pub visibility: Visibility,
    pub locked: bool,
    pub password: Option<String>,
}

impl Document {
    pub fn fields(&self) -> DocumentFields {
        DocumentFields {
            title: self.title.clone(),
            slug: self.slug.clone(),
            content: self.content.clone(),
            tags: self.tags.clone(),
            visibility: self.visibility,
            locked: self.locked,
            password: self.password.clone(),
        }
    }
}

/// Input for the explicit "create" action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDocument {
    pub owner_id: Uuid,
    pub title: String,
    pub slug: String,
    pub template: Option<String>,
}
