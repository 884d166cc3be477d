//! `fhir` crate: resource models, references, outcomes and search types.
//!
//! Resources move through the repository as raw JSON; the typed structs here
//! are used at the edges (handlers, UI) via [`from_value`] / [`to_value`].

pub mod error;
pub mod models;
pub mod outcome;
pub mod search;

pub use error::FhirError;
pub use models::{
    from_value, to_value, Concept, Meta, Project, ProjectMembership, Reference, Resource,
    ValueSet, ValueSetCompose, ValueSetInclude,
};
pub use outcome::{assert_ok, Outcome};
pub use search::{Bundle, BundleEntry, Filter, Operator, SearchRequest};
