// Hosting layer for editing sessions: the registry of live sessions and the
// HTTP handlers the presentation layer talks to.

pub mod handlers;
pub mod registry;

pub use registry::SessionRegistry;
