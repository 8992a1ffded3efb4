//! Status across cluster contexts.
//!
//! `kubectl get all` does not cover CRD-controlled resources, so each
//! context is scanned twice: once for the core resources, and once for the
//! instances of every custom resource definition that survives the admin
//! filters. Both scans are merged and deduplicated per context.

use futures::future::try_join_all;
use serde_json::Value;
use std::iter::once;
use tracing::{debug, warn};

use crate::cluster::FetchOptions;
use crate::entity::{ContextDescriptor, KubeEntity, remove_duplicate_resources};
use crate::error::StatusError;
use crate::format::{DisplayRow, HeaderOptions};
use crate::request::StatusArgs;
use crate::status::{StatusResult, StatusService};

/// Category covering the built-in workload kinds.
pub const CORE_RESOURCES: &str = "all";
pub const CRD_RESOURCES: &str = "customresourcedefinitions";
pub const ALL_CONTEXTS_TITLE: &str = "Resources Across All Contexts";

/// Kind to query for instances of a CRD, preferring its first short name.
pub fn crd_kind(crd: &KubeEntity) -> Option<String> {
    let names = crd.spec.as_ref()?.get("names")?;
    names
        .get("shortNames")
        .and_then(Value::as_array)
        .and_then(|short_names| short_names.first())
        .and_then(Value::as_str)
        .or_else(|| names.get("kind").and_then(Value::as_str))
        .map(str::to_string)
}

impl StatusService {
    /// Status of the given contexts, or of the current context when none are given.
    pub(crate) async fn status_for_known_contexts(
        &self,
        args: &StatusArgs,
        contexts: Vec<ContextDescriptor>,
    ) -> Result<StatusResult, StatusError> {
        let current = self.contexts.current_context().await?;

        let contexts = if contexts.is_empty() {
            let matching: Vec<ContextDescriptor> = self
                .contexts
                .list_contexts()
                .await?
                .into_iter()
                .filter(|ctx| ctx.name == current)
                .collect();
            if matching.is_empty() {
                return Err(StatusError::NoContextsFound);
            }
            matching
        } else {
            contexts
        };

        debug!(
            contexts = ?contexts.iter().map(|ctx| ctx.name.as_str()).collect::<Vec<_>>(),
            current = %current,
            "fetching status for known contexts"
        );

        let per_context =
            try_join_all(contexts.iter().map(|ctx| self.context_resources(args, ctx))).await?;

        if args.raw {
            return Ok(if args.multi {
                StatusResult::Tables(per_context.into_iter().map(StatusResult::Entities).collect())
            } else {
                StatusResult::Entities(per_context.into_iter().flatten().collect())
            });
        }

        let final_state = args.final_state();
        let format_rows = |ctx: &ContextDescriptor, resources: &[KubeEntity]| -> Vec<DisplayRow> {
            resources
                .iter()
                .map(|entity| self.formatter.format(entity, Some(ctx.name.as_str()), final_state))
                .collect()
        };

        if args.multi {
            let tables = contexts
                .iter()
                .zip(&per_context)
                .map(|(ctx, resources)| {
                    if resources.is_empty() {
                        return StatusResult::Rows(Vec::new());
                    }
                    let header = self.formatter.header_row(
                        &HeaderOptions {
                            title: Some(ctx.name.clone()),
                            context: false,
                            current_context: Some(ctx.name == current),
                        },
                        None,
                    );
                    StatusResult::Rows(
                        once(header)
                            .chain(format_rows(ctx, resources.as_slice()))
                            .collect(),
                    )
                })
                .collect();
            return Ok(StatusResult::Tables(tables));
        }

        let rows: Vec<DisplayRow> = contexts
            .iter()
            .zip(&per_context)
            .flat_map(|(ctx, resources)| format_rows(ctx, resources.as_slice()))
            .collect();

        if rows.is_empty() {
            return Ok(StatusResult::Rows(Vec::new()));
        }

        let title = if contexts.len() == 1 {
            current
        } else {
            ALL_CONTEXTS_TITLE.to_string()
        };
        let header = self.formatter.header_row(
            &HeaderOptions {
                title: Some(title),
                context: true,
                current_context: Some(true),
            },
            None,
        );

        Ok(StatusResult::Rows(once(header).chain(rows).collect()))
    }

    /// Core and CRD-derived resources of one context, deduplicated.
    async fn context_resources(
        &self,
        args: &StatusArgs,
        ctx: &ContextDescriptor,
    ) -> Result<Vec<KubeEntity>, StatusError> {
        let core_options = FetchOptions::default()
            .context(&ctx.name)
            .labels(&self.settings.filters.core_selector);

        let (core, crds) = futures::join!(
            self.scan(args, CORE_RESOURCES, core_options),
            self.crd_resources(args, ctx)
        );

        let mut resources = core?;
        resources.extend(crds?);
        Ok(remove_duplicate_resources(resources))
    }

    async fn crd_resources(
        &self,
        args: &StatusArgs,
        ctx: &ContextDescriptor,
    ) -> Result<Vec<KubeEntity>, StatusError> {
        let filters = &self.settings.filters;
        let crd_options = FetchOptions::default()
            .context(&ctx.name)
            .labels(&filters.crd_selector);

        let crds = self.scan(args, CRD_RESOURCES, crd_options).await?;
        let kinds: Vec<String> = crds
            .iter()
            .filter(|crd| !filters.is_reserved(crd.name()))
            .filter_map(crd_kind)
            .collect();

        debug!(context = %ctx.name, kinds = ?kinds, "fetching custom resources");

        let instances = try_join_all(kinds.iter().map(|kind| {
            let options = FetchOptions::default()
                .context(&ctx.name)
                .namespace(&ctx.namespace)
                .labels(&filters.core_selector);
            self.scan(args, kind, options)
        }))
        .await?;

        Ok(instances.into_iter().flatten().collect())
    }

    /// A list query whose failure counts as an empty result.
    ///
    /// Not-found is always empty. Other failures surface only in raw mode;
    /// outside raw mode they are logged and dropped.
    async fn scan(
        &self,
        args: &StatusArgs,
        kind: &str,
        options: FetchOptions,
    ) -> Result<Vec<KubeEntity>, StatusError> {
        match self.client.get(kind, None, &options).await {
            Ok(found) => Ok(found),
            Err(err) if err.is_not_found() => {
                debug!(kind, context = ?options.context, "nothing found");
                Ok(Vec::new())
            }
            Err(err) if args.raw => Err(err.into()),
            Err(err) => {
                warn!(kind, context = ?options.context, error = %err, "ignoring failed resource scan");
                Ok(Vec::new())
            }
        }
    }
}
