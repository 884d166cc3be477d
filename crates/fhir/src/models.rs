//! Typed views of the resources the admin surface works with.
//!
//! Only the fields the service reads are modelled. Anything else in the
//! stored JSON is ignored on the way in; handlers that must preserve the
//! full resource keep working on `serde_json::Value`.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::FhirError;

// ---------------------------------------------------------------------------
// Resource trait + JSON conversion
// ---------------------------------------------------------------------------

/// Implemented by every typed resource model.
pub trait Resource: Serialize + DeserializeOwned {
    /// Value of the `resourceType` discriminator.
    const RESOURCE_TYPE: &'static str;

    fn id(&self) -> Option<&str>;
}

/// Convert stored JSON into a typed resource, checking `resourceType`.
pub fn from_value<T: Resource>(value: Value) -> Result<T, FhirError> {
    let found = value
        .get("resourceType")
        .and_then(Value::as_str)
        .unwrap_or_default();
    if found != T::RESOURCE_TYPE {
        return Err(FhirError::WrongResourceType {
            expected: T::RESOURCE_TYPE,
            found: found.to_string(),
        });
    }
    Ok(serde_json::from_value(value)?)
}

/// Serialise a typed resource, stamping its `resourceType`.
pub fn to_value<T: Resource>(resource: &T) -> Result<Value, FhirError> {
    let mut value = serde_json::to_value(resource)?;
    if let Some(obj) = value.as_object_mut() {
        obj.insert(
            "resourceType".to_string(),
            Value::String(T::RESOURCE_TYPE.to_string()),
        );
    }
    Ok(value)
}

// ---------------------------------------------------------------------------
// Shared element types
// ---------------------------------------------------------------------------

/// A pointer to another resource, `"<Type>/<id>"`, plus an optional label.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

impl Reference {
    pub fn new(resource_type: &str, id: &str) -> Self {
        Self {
            reference: Some(format!("{resource_type}/{id}")),
            display: None,
        }
    }

    pub fn with_display(mut self, display: impl Into<String>) -> Self {
        self.display = Some(display.into());
        self
    }

    /// Split the reference into `(resource_type, id)`.
    pub fn parse(&self) -> Result<(&str, &str), FhirError> {
        let raw = self.reference.as_deref().unwrap_or_default();
        match raw.split_once('/') {
            Some((ty, id)) if !ty.is_empty() && !id.is_empty() && !id.contains('/') => {
                Ok((ty, id))
            }
            _ => Err(FhirError::InvalidReference(raw.to_string())),
        }
    }
}

/// Version bookkeeping maintained by the repository.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
}

// ---------------------------------------------------------------------------
// Project
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Project {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Resource for Project {
    const RESOURCE_TYPE: &'static str = "Project";

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

// ---------------------------------------------------------------------------
// ProjectMembership
// ---------------------------------------------------------------------------

/// Links exactly one user to exactly one project, with an admin flag.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectMembership {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<Reference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<Reference>,
    /// The user's profile resource; `display` is the member's name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<Reference>,
    #[serde(default)]
    pub admin: bool,
}

impl Resource for ProjectMembership {
    const RESOURCE_TYPE: &'static str = "ProjectMembership";

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

// ---------------------------------------------------------------------------
// ValueSet
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValueSet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compose: Option<ValueSetCompose>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValueSetCompose {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include: Option<Vec<ValueSetInclude>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValueSetInclude {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concept: Option<Vec<Concept>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Concept {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

impl Resource for ValueSet {
    const RESOURCE_TYPE: &'static str = "ValueSet";

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}
