//! `ui` crate: view models for admin UI controls.
//!
//! Controls resolve the resources they display through a
//! [`ResourceResolver`] and render to plain data (plus an HTML snapshot), so
//! any front end can draw them.

pub mod quick_status;
pub mod resource;

pub use quick_status::{ContainerStyle, NativeSelect, QuickStatus, QuickStatusView};
pub use resource::{use_resource, RepositoryResolver, ResourceResolver, ResourceSource};
