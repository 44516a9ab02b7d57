//! Pagination — the authoritative assignment of sections to (page, column)
//! slots.
//!
//! Every function here is a mutator over a working copy of the document and
//! runs through the session's single mutation entry point. Nothing here
//! measures content: overflow and reflow belong to the presentation layer.
//!
//! # Layout invariant
//! Every section key appears in exactly one slot, and every slot refers to a
//! known section. Page membership is found by scanning; sections never store
//! a back-reference to their page.

use std::collections::HashSet;

use serde::Serialize;
use tracing::warn;

use crate::editor::EditorError;
use crate::models::{Column, Document, Page, PageId, Section, SectionId};

/// Position of a section inside the layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Slot {
    pub page_index: usize,
    pub column: Column,
    pub position: usize,
}

// ────────────────────────────────────────────────────────────────────────────
// Queries
// ────────────────────────────────────────────────────────────────────────────

pub fn locate(doc: &Document, section: &SectionId) -> Option<Slot> {
    doc.content
        .pages
        .iter()
        .enumerate()
        .find_map(|(page_index, page)| {
            [Column::Main, Column::Sidebar].into_iter().find_map(|column| {
                page.column(column)
                    .iter()
                    .position(|s| s == section)
                    .map(|position| Slot {
                        page_index,
                        column,
                        position,
                    })
            })
        })
}

fn page_index(doc: &Document, page: PageId) -> Result<usize, EditorError> {
    doc.content
        .pages
        .iter()
        .position(|p| p.id == page)
        .ok_or_else(|| EditorError::not_found(format!("page {page}")))
}

/// Checks the layout invariant. Used by the store before installing a
/// snapshot.
pub fn check_layout(doc: &Document) -> Result<(), EditorError> {
    let pages = &doc.content.pages;
    if pages.is_empty() {
        return Err(EditorError::validation("document must have at least one page"));
    }

    let mut page_ids = HashSet::new();
    let mut placed: HashSet<&SectionId> = HashSet::new();
    for page in pages {
        if !page_ids.insert(page.id) {
            return Err(EditorError::validation(format!("duplicate page id {}", page.id)));
        }
        for id in page.main.iter().chain(page.sidebar.iter()) {
            if !doc.content.sections.contains_key(id) {
                return Err(EditorError::validation(format!(
                    "page {} references unknown section '{id}'",
                    page.id
                )));
            }
            if !placed.insert(id) {
                return Err(EditorError::validation(format!(
                    "section '{id}' is placed more than once"
                )));
            }
        }
    }

    if let Some(orphan) = doc.content.sections.keys().find(|id| !placed.contains(id)) {
        return Err(EditorError::validation(format!(
            "section '{orphan}' is not placed on any page"
        )));
    }
    Ok(())
}

// ────────────────────────────────────────────────────────────────────────────
// Page operations
// ────────────────────────────────────────────────────────────────────────────

/// Appends an empty full-width page and returns its id.
pub fn add_page(doc: &mut Document) -> PageId {
    let page = Page::empty();
    let id = page.id;
    doc.content.pages.push(page);
    id
}

/// Removes a page. Its sections move to the end of the same column on the
/// preceding page, or on the following page when the first page is removed.
pub fn remove_page(doc: &mut Document, page: PageId) -> Result<(), EditorError> {
    let index = page_index(doc, page)?;
    if doc.content.pages.len() == 1 {
        return Err(EditorError::validation("cannot remove the only page"));
    }

    let removed = doc.content.pages.remove(index);
    let target = &mut doc.content.pages[index.saturating_sub(1)];
    target.main.extend(removed.main);
    target.sidebar.extend(removed.sidebar);
    Ok(())
}

pub fn set_full_width(doc: &mut Document, page: PageId, full_width: bool) -> Result<(), EditorError> {
    let index = page_index(doc, page)?;
    doc.content.pages[index].full_width = full_width;
    Ok(())
}

// ────────────────────────────────────────────────────────────────────────────
// Section operations
// ────────────────────────────────────────────────────────────────────────────

/// Moves a section to the end of `to_column` on `to_page`.
///
/// Both ids are checked before anything changes. The relative order of all
/// other sections is preserved.
pub fn move_section(
    doc: &mut Document,
    section: &SectionId,
    to_page: PageId,
    to_column: Column,
) -> Result<(), EditorError> {
    let from = locate(doc, section)
        .ok_or_else(|| EditorError::not_found(format!("section '{section}'")))?;
    let to_index = page_index(doc, to_page)?;

    let id = doc.content.pages[from.page_index]
        .column_mut(from.column)
        .remove(from.position);
    doc.content.pages[to_index].column_mut(to_column).push(id);
    Ok(())
}

/// Moves a section to `index` within its current column.
pub fn reorder_section(
    doc: &mut Document,
    section: &SectionId,
    index: usize,
) -> Result<(), EditorError> {
    let slot = locate(doc, section)
        .ok_or_else(|| EditorError::not_found(format!("section '{section}'")))?;
    let column = doc.content.pages[slot.page_index].column_mut(slot.column);
    if index >= column.len() {
        return Err(EditorError::validation(format!(
            "index {index} out of range for a column of {} sections",
            column.len()
        )));
    }
    let id = column.remove(slot.position);
    column.insert(index, id);
    Ok(())
}

/// Registers a new content block and appends it to the last page's main
/// column.
pub fn add_section(doc: &mut Document, section: Section) -> Result<(), EditorError> {
    if section.id.as_str().trim().is_empty() {
        return Err(EditorError::validation("section id must not be blank"));
    }
    if doc.content.sections.contains_key(&section.id) {
        return Err(EditorError::validation(format!(
            "section '{}' already exists",
            section.id
        )));
    }
    let last = doc
        .content
        .pages
        .last_mut()
        .ok_or_else(|| EditorError::validation("document has no pages"))?;
    last.main.push(section.id.clone());
    doc.content.sections.insert(section.id.clone(), section);
    Ok(())
}

/// Drops a content block and its slot.
pub fn remove_section(doc: &mut Document, section: &SectionId) -> Result<(), EditorError> {
    if doc.content.sections.remove(section).is_none() {
        return Err(EditorError::not_found(format!("section '{section}'")));
    }
    if let Some(slot) = locate(doc, section) {
        doc.content.pages[slot.page_index]
            .column_mut(slot.column)
            .remove(slot.position);
    }
    Ok(())
}

// ────────────────────────────────────────────────────────────────────────────
// Repair
// ────────────────────────────────────────────────────────────────────────────

/// Repairs a loaded layout so it satisfies the layout invariant.
///
/// Dangling and duplicate refs are dropped, duplicate page ids are reissued,
/// and unplaced sections are appended to the last page's main column.
/// Returns the number of repairs made.
pub fn normalize(doc: &mut Document) -> usize {
    let mut repairs = 0;
    let content = &mut doc.content;

    if content.pages.is_empty() {
        content.pages.push(Page::empty());
        repairs += 1;
    }

    let mut page_ids = HashSet::new();
    let mut placed: HashSet<SectionId> = HashSet::new();
    for page in &mut content.pages {
        if !page_ids.insert(page.id) {
            page.id = PageId::new();
            page_ids.insert(page.id);
            repairs += 1;
        }
        for column in [Column::Main, Column::Sidebar] {
            let refs = page.column_mut(column);
            let before = refs.len();
            refs.retain(|id| content.sections.contains_key(id) && placed.insert(id.clone()));
            repairs += before - refs.len();
        }
    }

    let unplaced: Vec<SectionId> = content
        .sections
        .keys()
        .filter(|id| !placed.contains(*id))
        .cloned()
        .collect();
    repairs += unplaced.len();
    if let Some(last) = content.pages.last_mut() {
        last.main.extend(unplaced);
    }

    if repairs > 0 {
        warn!("Normalized layout of document {}: {repairs} repair(s)", doc.id);
    }
    repairs
}
