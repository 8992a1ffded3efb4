use serde::Serialize;
use serde_json::Value;
use std::path::Path;

use crate::entity::{FinalState, KubeEntity, State};

const CLUSTER_ICON: &str = "fas fa-network-wired";
const CLUSTER_ICON_CSS: &str = "selected-entity";
const SELECTED_ROW_CSS: &str = "selected-row";

pub const CURRENT_CONTEXT: &str = "This is your current context";
pub const NOT_CURRENT_CONTEXT: &str = "This is not your current context";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Attribute {
    pub key: String,
    pub value: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub outer_css: String,
}

impl Attribute {
    fn new(key: &str, value: impl Into<String>, outer_css: &str) -> Self {
        Self {
            key: key.to_string(),
            value: value.into(),
            outer_css: outer_css.to_string(),
        }
    }
}

/// One display-ready table row. Header rows carry column titles.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayRow {
    pub name: String,
    pub header: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fontawesome: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fontawesome_css: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balloon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_css: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub done: Option<bool>,
    pub attributes: Vec<Attribute>,
}

impl DisplayRow {
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|attr| attr.key == key)
            .map(|attr| attr.value.as_str())
    }
}

/// Options for a header row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderOptions {
    pub title: Option<String>,
    /// Include a CONTEXT column.
    pub context: bool,
    /// Marks the table as belonging to a cluster context; `Some(true)` when
    /// it is the current one.
    pub current_context: Option<bool>,
}

impl HeaderOptions {
    pub fn titled(title: &str) -> Self {
        Self {
            title: Some(title.to_string()),
            ..Default::default()
        }
    }
}

pub trait EntityFormatter: Send + Sync {
    fn format(&self, entity: &KubeEntity, context: Option<&str>, final_state: FinalState)
    -> DisplayRow;

    fn header_row(&self, options: &HeaderOptions, kind: Option<&str>) -> DisplayRow;
}

/// Default formatter producing KIND/CONTEXT/NAMESPACE/STATUS/MESSAGE columns.
#[derive(Debug, Clone, Copy, Default)]
pub struct TableFormatter;

impl EntityFormatter for TableFormatter {
    fn format(
        &self,
        entity: &KubeEntity,
        context: Option<&str>,
        final_state: FinalState,
    ) -> DisplayRow {
        let state = State::of(entity);

        let mut attributes = vec![Attribute::new("KIND", entity.kind.clone(), "")];
        if let Some(context) = context {
            attributes.push(Attribute::new("CONTEXT", context, ""));
        }
        attributes.push(Attribute::new(
            "NAMESPACE",
            entity.namespace().unwrap_or_default(),
            "pretty-narrow hide-with-sidecar",
        ));
        attributes.push(Attribute::new(
            "STATUS",
            state.to_string(),
            state_css(state),
        ));
        attributes.push(Attribute::new(
            "MESSAGE",
            status_message(entity),
            "hide-with-sidecar",
        ));

        DisplayRow {
            name: entity.name().to_string(),
            header: false,
            title: None,
            fontawesome: None,
            fontawesome_css: None,
            balloon: None,
            table_css: None,
            done: Some(final_state.is_reached(state)),
            attributes,
        }
    }

    fn header_row(&self, options: &HeaderOptions, kind: Option<&str>) -> DisplayRow {
        let mut attributes = vec![Attribute::new("KIND", "KIND", "header-cell")];
        if options.context {
            attributes.push(Attribute::new("CONTEXT", "CONTEXT", "header-cell"));
        }
        let is_namespace_kind = kind.is_some_and(|k| k.to_lowercase().starts_with("namespace"));
        if !is_namespace_kind {
            attributes.push(Attribute::new("NAMESPACE", "NAMESPACE", "header-cell"));
        }
        attributes.push(Attribute::new("STATUS", "STATUS", "header-cell text-center"));
        attributes.push(Attribute::new("MESSAGE", "MESSAGE", "header-cell"));

        let (fontawesome, fontawesome_css, balloon, table_css) = match options.current_context {
            Some(true) => (
                Some(CLUSTER_ICON.to_string()),
                Some(CLUSTER_ICON_CSS.to_string()),
                Some(CURRENT_CONTEXT.to_string()),
                Some(SELECTED_ROW_CSS.to_string()),
            ),
            Some(false) => (
                Some(CLUSTER_ICON.to_string()),
                Some(CLUSTER_ICON_CSS.to_string()),
                Some(NOT_CURRENT_CONTEXT.to_string()),
                None,
            ),
            None => (None, None, None, None),
        };

        DisplayRow {
            name: "NAME".to_string(),
            header: true,
            title: options.title.as_deref().map(display_title),
            fontawesome,
            fontawesome_css,
            balloon,
            table_css,
            done: None,
            attributes,
        }
    }
}

/// Basename of a target with any `.yaml` suffix removed.
pub fn display_title(target: &str) -> String {
    let base = Path::new(target)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(target);
    base.strip_suffix(".yaml").unwrap_or(base).to_string()
}

fn state_css(state: State) -> &'static str {
    match state {
        State::Online => "green-background",
        State::Pending => "yellow-background",
        State::Offline | State::Failed => "red-background",
        State::Unknown => "gray-background",
    }
}

fn status_message(entity: &KubeEntity) -> String {
    let Some(status) = &entity.status else {
        return String::new();
    };

    if let Some(message) = status.get("message").and_then(Value::as_str) {
        return message.to_string();
    }

    status
        .get("conditions")
        .and_then(Value::as_array)
        .and_then(|conditions| conditions.last())
        .and_then(|condition| condition.get("message"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}
