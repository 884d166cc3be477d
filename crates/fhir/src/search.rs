//! Search requests and the bundles they produce.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{from_value, FhirError, Resource};

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Equals,
    NotEquals,
    Contains,
}

/// One `code <operator> value` condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    pub code: String,
    pub operator: Operator,
    pub value: String,
}

impl Filter {
    /// Whether `resource` satisfies this filter.
    ///
    /// The filter `code` names a top-level field. Reference objects are
    /// compared by their `reference` string, scalars by their string form,
    /// arrays match when any element does.
    pub fn matches(&self, resource: &Value) -> bool {
        let field = resource.get(&self.code);
        match self.operator {
            Operator::Equals => field.is_some_and(|f| any_value(f, |s| s == self.value)),
            Operator::NotEquals => !field.is_some_and(|f| any_value(f, |s| s == self.value)),
            Operator::Contains => field.is_some_and(|f| {
                let needle = self.value.to_lowercase();
                any_value(f, |s| s.to_lowercase().contains(&needle))
            }),
        }
    }
}

fn any_value(field: &Value, pred: impl Fn(&str) -> bool + Copy) -> bool {
    match field {
        Value::Array(items) => items.iter().any(|item| any_value(item, pred)),
        Value::Object(obj) => obj
            .get("reference")
            .and_then(Value::as_str)
            .is_some_and(pred),
        Value::String(s) => pred(s),
        Value::Bool(b) => pred(&b.to_string()),
        Value::Number(n) => pred(&n.to_string()),
        Value::Null => false,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub resource_type: String,
    #[serde(default)]
    pub filters: Vec<Filter>,
}

impl SearchRequest {
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            filters: Vec::new(),
        }
    }

    pub fn filter(
        mut self,
        code: impl Into<String>,
        operator: Operator,
        value: impl Into<String>,
    ) -> Self {
        self.filters.push(Filter {
            code: code.into(),
            operator,
            value: value.into(),
        });
        self
    }

    /// Type check plus every filter.
    pub fn matches(&self, resource: &Value) -> bool {
        resource.get("resourceType").and_then(Value::as_str) == Some(self.resource_type.as_str())
            && self.filters.iter().all(|f| f.matches(resource))
    }
}

// ---------------------------------------------------------------------------
// Bundle
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleEntry {
    pub resource: Value,
}

/// A `searchset` bundle; entries keep the order the repository found them in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bundle {
    pub resource_type: String,
    #[serde(rename = "type")]
    pub bundle_type: String,
    #[serde(default)]
    pub entry: Vec<BundleEntry>,
}

impl Bundle {
    pub fn searchset(resources: Vec<Value>) -> Self {
        Self {
            resource_type: "Bundle".to_string(),
            bundle_type: "searchset".to_string(),
            entry: resources
                .into_iter()
                .map(|resource| BundleEntry { resource })
                .collect(),
        }
    }

    /// Convert every entry into `T`, failing on the first mismatch.
    pub fn into_resources<T: Resource>(self) -> Result<Vec<T>, FhirError> {
        self.entry.into_iter().map(|e| from_value(e.resource)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn membership(user: &str, admin: bool) -> Value {
        json!({
            "resourceType": "ProjectMembership",
            "user": { "reference": user },
            "admin": admin
        })
    }

    #[test]
    fn equals_compares_reference_strings() {
        let req = SearchRequest::new("ProjectMembership").filter("user", Operator::Equals, "User/u1");
        assert!(req.matches(&membership("User/u1", true)));
        assert!(!req.matches(&membership("User/u2", true)));
    }

    #[test]
    fn resource_type_must_match() {
        let req = SearchRequest::new("Project");
        assert!(!req.matches(&membership("User/u1", true)));
    }

    #[test]
    fn not_equals_matches_missing_fields() {
        let f = Filter { code: "name".into(), operator: Operator::NotEquals, value: "x".into() };
        assert!(f.matches(&json!({})));
        assert!(!f.matches(&json!({ "name": "x" })));
    }

    #[test]
    fn contains_is_case_insensitive_and_sees_booleans() {
        let f = Filter { code: "name".into(), operator: Operator::Contains, value: "acm".into() };
        assert!(f.matches(&json!({ "name": "ACME Health" })));

        let admin = Filter { code: "admin".into(), operator: Operator::Equals, value: "true".into() };
        assert!(admin.matches(&membership("User/u1", true)));
        assert!(!admin.matches(&membership("User/u1", false)));
    }

    #[test]
    fn bundle_keeps_entry_order() {
        let bundle = Bundle::searchset(vec![json!({"id": "a"}), json!({"id": "b"})]);
        let ids: Vec<_> = bundle.entry.iter().map(|e| e.resource["id"].clone()).collect();
        assert_eq!(ids, vec![json!("a"), json!("b")]);
        assert_eq!(serde_json::to_value(&bundle).unwrap()["type"], "searchset");
    }
}
