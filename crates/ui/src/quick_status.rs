//! QuickStatus: a dropdown of the codes in a ValueSet.
//!
//! The ValueSet may be given inline or by reference. Only the first
//! `compose.include` group is listed. A value set that is missing that group
//! (or is otherwise malformed) renders a dropdown without options; an
//! unresolvable reference renders nothing at all.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use fhir::ValueSet;

use crate::resource::{use_resource, ResourceResolver, ResourceSource};

/// Selection callback, invoked with the chosen code.
pub type OnChange = Arc<dyn Fn(String) + Send + Sync>;

/// Fixed placement of the control: pinned to the top-right corner of its
/// positioned parent, above page content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerStyle {
    pub top: u32,
    pub right: u32,
    pub width: u32,
    pub height: u32,
    pub z_index: i32,
}

impl Default for ContainerStyle {
    fn default() -> Self {
        Self {
            top: 65,
            right: 5,
            width: 200,
            height: 50,
            z_index: 15,
        }
    }
}

impl ContainerStyle {
    pub fn to_css(&self) -> String {
        format!(
            "position:absolute;top:{}px;right:{}px;width:{}px;height:{}px;z-index:{}",
            self.top, self.right, self.width, self.height, self.z_index
        )
    }
}

/// A native `<select>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeSelect {
    pub default_value: Option<String>,
    /// `None` when the value set had no usable first include group.
    pub data: Option<Vec<String>>,
}

impl NativeSelect {
    pub fn options(&self) -> &[String] {
        self.data.as_deref().unwrap_or_default()
    }

    pub fn to_html(&self) -> String {
        let mut html = String::from("<select>");
        for option in self.options() {
            let selected = if self.default_value.as_deref() == Some(option.as_str()) {
                " selected"
            } else {
                ""
            };
            let escaped = escape_html(option);
            html.push_str(&format!(
                "<option value=\"{escaped}\"{selected}>{escaped}</option>"
            ));
        }
        html.push_str("</select>");
        html
    }
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

/// Codes of the first include group, read straight from JSON so a
/// malformed value set degrades to `None` instead of failing.
fn first_include_codes(value_set: &Value) -> Option<Vec<String>> {
    let concepts = value_set
        .get("compose")?
        .get("include")?
        .get(0)?
        .get("concept")?
        .as_array()?;
    Some(
        concepts
            .iter()
            .filter_map(|c| c.get("code").and_then(Value::as_str).map(str::to_string))
            .collect(),
    )
}

/// The control's inputs.
pub struct QuickStatus {
    pub value_set: ResourceSource<ValueSet>,
    pub default_value: Option<String>,
    on_change: OnChange,
}

impl fmt::Debug for QuickStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuickStatus")
            .field("value_set", &self.value_set)
            .field("default_value", &self.default_value)
            .finish_non_exhaustive()
    }
}

impl QuickStatus {
    pub fn new(
        value_set: ResourceSource<ValueSet>,
        on_change: impl Fn(String) + Send + Sync + 'static,
    ) -> Self {
        Self {
            value_set,
            default_value: None,
            on_change: Arc::new(on_change),
        }
    }

    pub fn with_default_value(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// Resolve the value set and build the view, or `None` if it cannot be
    /// resolved.
    pub async fn render(&self, resolver: &dyn ResourceResolver) -> Option<QuickStatusView> {
        let Some(value_set) = use_resource(&self.value_set, resolver).await else {
            debug!("value set unresolved; rendering nothing");
            return None;
        };

        Some(QuickStatusView {
            container: ContainerStyle::default(),
            select: NativeSelect {
                default_value: self.default_value.clone(),
                data: first_include_codes(&value_set),
            },
            on_change: Arc::clone(&self.on_change),
        })
    }
}

/// What QuickStatus renders once the value set is available.
#[derive(Clone)]
pub struct QuickStatusView {
    pub container: ContainerStyle,
    pub select: NativeSelect,
    on_change: OnChange,
}

impl fmt::Debug for QuickStatusView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuickStatusView")
            .field("container", &self.container)
            .field("select", &self.select)
            .finish_non_exhaustive()
    }
}

impl QuickStatusView {
    /// The user picked `code`.
    pub fn select(&self, code: &str) {
        (self.on_change)(code.to_string());
    }

    pub fn to_html(&self) -> String {
        format!(
            "<div style=\"{}\">{}</div>",
            self.container.to_css(),
            self.select.to_html()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use fhir::{from_value, Reference};
    use serde_json::json;

    #[derive(Default)]
    struct MapResolver(HashMap<String, Value>);

    #[async_trait]
    impl ResourceResolver for MapResolver {
        async fn resolve(&self, reference: &Reference) -> Option<Value> {
            self.0.get(reference.reference.as_deref()?).cloned()
        }
    }

    fn status_value_set() -> Value {
        json!({
            "resourceType": "ValueSet",
            "id": "task-status",
            "compose": { "include": [
                { "concept": [{ "code": "active" }, { "code": "done" }] },
                { "concept": [{ "code": "never-shown" }] }
            ]}
        })
    }

    fn noop() -> impl Fn(String) + Send + Sync + 'static {
        |_: String| {}
    }

    #[tokio::test]
    async fn renders_codes_of_first_include_group() {
        let resolver = MapResolver::default();
        let vs: ValueSet = from_value(status_value_set()).unwrap();
        let control = QuickStatus::new(ResourceSource::Inline(vs), noop());

        let view = control.render(&resolver).await.unwrap();
        assert_eq!(view.select.options(), ["active", "done"]);
        assert_eq!(view.container, ContainerStyle::default());
    }

    #[tokio::test]
    async fn resolves_value_set_by_reference() {
        let mut map = HashMap::new();
        map.insert("ValueSet/task-status".to_string(), status_value_set());
        let resolver = MapResolver(map);

        let control = QuickStatus::new(Reference::new("ValueSet", "task-status").into(), noop())
            .with_default_value("done");
        let view = control.render(&resolver).await.unwrap();
        assert_eq!(view.select.data, Some(vec!["active".to_string(), "done".to_string()]));
        assert_eq!(view.select.default_value.as_deref(), Some("done"));
    }

    #[tokio::test]
    async fn unresolvable_reference_renders_nothing() {
        let resolver = MapResolver::default();
        let control = QuickStatus::new(Reference::new("ValueSet", "missing").into(), noop());
        assert!(control.render(&resolver).await.is_none());
    }

    #[tokio::test]
    async fn malformed_value_set_renders_empty_select() {
        let mut map = HashMap::new();
        map.insert(
            "ValueSet/broken".to_string(),
            json!({ "resourceType": "ValueSet", "compose": { "include": "not-a-list" } }),
        );
        let resolver = MapResolver(map);

        let control = QuickStatus::new(Reference::new("ValueSet", "broken").into(), noop());
        let view = control.render(&resolver).await.unwrap();
        assert_eq!(view.select.data, None);
        assert!(view.select.options().is_empty());
        assert_eq!(view.select.to_html(), "<select></select>");
    }

    #[tokio::test]
    async fn selecting_reports_the_code() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let vs: ValueSet = from_value(status_value_set()).unwrap();
        let control = QuickStatus::new(ResourceSource::Inline(vs), move |code| {
            sink.lock().unwrap().push(code);
        });

        let view = control.render(&MapResolver::default()).await.unwrap();
        view.select("done");
        view.select("active");
        assert_eq!(*seen.lock().unwrap(), vec!["done".to_string(), "active".to_string()]);
    }

    #[test]
    fn html_marks_default_and_escapes_codes() {
        let select = NativeSelect {
            default_value: Some("a&b".into()),
            data: Some(vec!["a&b".into(), "<x>".into()]),
        };
        assert_eq!(
            select.to_html(),
            "<select><option value=\"a&amp;b\" selected>a&amp;b</option>\
             <option value=\"&lt;x&gt;\">&lt;x&gt;</option></select>"
        );
    }

    #[test]
    fn container_css() {
        assert_eq!(
            ContainerStyle::default().to_css(),
            "position:absolute;top:65px;right:5px;width:200px;height:50px;z-index:15"
        );
    }
}
