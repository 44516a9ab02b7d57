// Layout: structural assignment of sections to pages/columns, and the
// template registry the presentation layer renders with.
// Neither measures text; overflow and reflow stay in the presentation layer.

pub mod pages;
pub mod templates;
