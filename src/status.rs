use futures::FutureExt;
use futures::future::BoxFuture;
use serde::Serialize;
use std::iter::once;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error};

use crate::cluster::{ClusterClient, ContextProvider};
use crate::config::StatusSettings;
use crate::entity::KubeEntity;
use crate::error::StatusError;
use crate::files::FileLoader;
use crate::format::{DisplayRow, EntityFormatter, HeaderOptions};
use crate::request::StatusArgs;
use crate::resolver::DirectReferences;

/// Answer to a status request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StatusResult {
    /// Unformatted entities (raw mode).
    Entities(Vec<KubeEntity>),
    /// One table; a header row, when present, comes first.
    Rows(Vec<DisplayRow>),
    /// Independent tables: per context, per file, or direct and controlled tiers.
    Tables(Vec<StatusResult>),
}

impl StatusResult {
    /// True when no entity or row is present at any depth.
    pub fn is_empty(&self) -> bool {
        match self {
            StatusResult::Entities(entities) => entities.is_empty(),
            StatusResult::Rows(rows) => rows.is_empty(),
            StatusResult::Tables(tables) => tables.iter().all(StatusResult::is_empty),
        }
    }

    pub fn is_nested(&self) -> bool {
        matches!(self, StatusResult::Tables(_))
    }
}

/// Resolves status requests against clusters, files and contexts.
pub struct StatusService {
    pub(crate) client: Arc<dyn ClusterClient>,
    pub(crate) contexts: Arc<dyn ContextProvider>,
    pub(crate) files: Arc<dyn FileLoader>,
    pub(crate) formatter: Arc<dyn EntityFormatter>,
    pub(crate) settings: StatusSettings,
}

impl StatusService {
    pub fn new(
        client: Arc<dyn ClusterClient>,
        contexts: Arc<dyn ContextProvider>,
        files: Arc<dyn FileLoader>,
        formatter: Arc<dyn EntityFormatter>,
        settings: StatusSettings,
    ) -> Self {
        Self {
            client,
            contexts,
            files,
            formatter,
            settings,
        }
    }

    pub async fn status(&self, args: &StatusArgs) -> Result<StatusResult, StatusError> {
        self.status_within(args.clone(), Vec::new()).await
    }

    /// `trail` holds the directories already being walked above this request.
    pub(crate) fn status_within(
        &self,
        args: StatusArgs,
        trail: Vec<PathBuf>,
    ) -> BoxFuture<'_, Result<StatusResult, StatusError>> {
        async move {
            debug!(request_target = ?args.target, name = ?args.name, "constructing status");

            match self.direct_references(&args, &trail).await? {
                DirectReferences::Assembled(result) => {
                    if args.multi || result.is_nested() {
                        Ok(result)
                    } else {
                        Ok(StatusResult::Tables(vec![result]))
                    }
                }
                DirectReferences::Entities {
                    header_row,
                    entities,
                } => {
                    let controlled = self.find_controlled_resources(&entities).await;
                    debug!(
                        direct = entities.len(),
                        controlled = controlled.len(),
                        "resolved direct and controlled resources"
                    );
                    Ok(self.assemble(&args, header_row, entities, controlled))
                }
            }
        }
        .boxed()
    }

    fn assemble(
        &self,
        args: &StatusArgs,
        header_row: Option<DisplayRow>,
        entities: Vec<KubeEntity>,
        controlled: Vec<KubeEntity>,
    ) -> StatusResult {
        if args.raw {
            let mut all = entities;
            all.extend(controlled);
            return StatusResult::Entities(all);
        }

        let final_state = args.final_state();
        let direct_rows: Vec<DisplayRow> = entities
            .iter()
            .map(|entity| self.formatter.format(entity, None, final_state))
            .collect();

        if controlled.is_empty() {
            // no header row without body rows
            if direct_rows.is_empty() {
                return StatusResult::Rows(Vec::new());
            }
            return StatusResult::Rows(header_row.into_iter().chain(direct_rows).collect());
        }

        let controlled_header = self
            .formatter
            .header_row(&HeaderOptions::titled("pods"), None);
        let controlled_table = once(controlled_header)
            .chain(
                controlled
                    .iter()
                    .map(|entity| self.formatter.format(entity, None, final_state)),
            )
            .collect();

        assemble_tiers(header_row, direct_rows, controlled_table)
    }
}

/// Two-tier result of direct rows and the table of controlled resources.
pub(crate) fn assemble_tiers(
    header_row: Option<DisplayRow>,
    direct_rows: Vec<DisplayRow>,
    controlled_table: Vec<DisplayRow>,
) -> StatusResult {
    match header_row {
        Some(header) => StatusResult::Tables(vec![
            StatusResult::Rows(once(header).chain(direct_rows).collect()),
            StatusResult::Rows(controlled_table),
        ]),
        None => {
            error!("internal error: expected a header row for direct resources");
            StatusResult::Rows(direct_rows.into_iter().chain(controlled_table).collect())
        }
    }
}
