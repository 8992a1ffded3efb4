use serde::Deserialize;
use std::collections::HashMap;

use crate::entity::{DEFAULT_NAMESPACE, FinalState};

/// Marks a target that names a programmatically supplied parameter.
pub const PARAMETER_MARKER: char = '!';

/// Arguments of a `status` / `list` invocation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StatusArgs {
    /// A file, directory, URL, `!parameter`, or resource kind.
    pub target: Option<String>,
    pub name: Option<String>,
    pub namespace: Option<String>,
    #[serde(alias = "all")]
    pub all_contexts: bool,
    pub multi: bool,
    pub final_state: Option<FinalState>,
    pub raw: bool,
    /// Multi-document YAML blobs addressed by `!name` targets.
    pub parameters: HashMap<String, String>,
}

impl StatusArgs {
    pub fn for_target(target: impl Into<String>) -> Self {
        Self {
            target: Some(target.into()),
            ..Default::default()
        }
    }

    pub fn namespace_or_default(&self) -> &str {
        self.namespace.as_deref().unwrap_or(DEFAULT_NAMESPACE)
    }

    pub fn final_state(&self) -> FinalState {
        self.final_state.unwrap_or_default()
    }

    /// Arguments for one file found while walking a directory.
    pub(crate) fn for_directory_entry(&self, path: String) -> Self {
        Self {
            target: Some(path),
            name: None,
            namespace: self.namespace.clone(),
            all_contexts: false,
            multi: false,
            final_state: Some(self.final_state()),
            raw: self.raw,
            parameters: self.parameters.clone(),
        }
    }
}

/// The resolution mode a request selects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusQuery {
    /// Every resource in every known context.
    Global,
    /// Every resource in the current context.
    CurrentContext,
    /// Resources listed in a supplied multi-document blob.
    ProgrammaticList { parameter: String },
    KindName { kind: String, name: String },
    /// A file, directory, URL, or a bare kind when nothing exists at the path.
    PathBased { target: String },
}

impl StatusQuery {
    pub fn from_args(args: &StatusArgs) -> Self {
        if args.all_contexts {
            return StatusQuery::Global;
        }

        let Some(target) = args.target.as_deref().filter(|t| !t.is_empty()) else {
            return StatusQuery::CurrentContext;
        };

        if let Some(parameter) = target.strip_prefix(PARAMETER_MARKER) {
            return StatusQuery::ProgrammaticList {
                parameter: parameter.to_string(),
            };
        }

        match args.name.as_deref().filter(|n| !n.is_empty()) {
            Some(name) => StatusQuery::KindName {
                kind: target.to_string(),
                name: name.to_string(),
            },
            None => StatusQuery::PathBased {
                target: target.to_string(),
            },
        }
    }
}
