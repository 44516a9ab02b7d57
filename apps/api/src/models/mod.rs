pub mod document;

pub use document::{
    Column, Content, Document, DocumentFields, NewDocument, Page, PageId, Section, SectionId,
    Visibility,
};
