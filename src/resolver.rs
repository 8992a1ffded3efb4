//! Turns a status request into the resources it refers to.
//!
//! Requests name either every context, the current context, a programmatic
//! list of resource specs, a kind and name, or a path. Paths resolve to a
//! directory of yaml files, a single (local or remote) yaml file, or, when
//! nothing exists at the path, a bare resource kind.

use futures::future::try_join_all;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::cluster::FetchOptions;
use crate::entity::{KubeEntity, ResourceReference};
use crate::error::StatusError;
use crate::files::{is_url, parse_yaml_documents};
use crate::format::{DisplayRow, HeaderOptions};
use crate::request::{PARAMETER_MARKER, StatusArgs, StatusQuery};
use crate::retry::with_retry_on_404;
use crate::status::{StatusResult, StatusService};

const YAML_SUFFIX: &str = ".yaml";
const MAIN_YAML: &str = "main.yaml";
const SEEDS_DIR: &str = "seeds";

pub(crate) enum DirectReferences {
    /// Final tables (context scans, directory walks, raw programmatic lists).
    Assembled(StatusResult),
    /// Entities still to be expanded with the resources they control.
    Entities {
        header_row: Option<DisplayRow>,
        entities: Vec<KubeEntity>,
    },
}

/// Yaml files listed in a directory; hidden and `#` files are skipped.
pub fn is_yaml_listing(name: &str) -> bool {
    !name.starts_with('.')
        && !name.starts_with('#')
        && name.len() > YAML_SUFFIX.len()
        && name.ends_with(YAML_SUFFIX)
}

/// Moves the first `main.yaml` to the front, keeping the rest in order.
pub fn main_first(mut paths: Vec<PathBuf>) -> Vec<PathBuf> {
    if let Some(idx) = paths.iter().position(|path| path.ends_with(MAIN_YAML)) {
        let main = paths.remove(idx);
        paths.insert(0, main);
    }
    paths
}

fn parameter_in_path(path: &Path) -> Option<&str> {
    path.file_name()?
        .to_str()?
        .strip_prefix(PARAMETER_MARKER)
}

impl StatusService {
    pub(crate) async fn direct_references(
        &self,
        args: &StatusArgs,
        trail: &[PathBuf],
    ) -> Result<DirectReferences, StatusError> {
        match StatusQuery::from_args(args) {
            StatusQuery::Global => {
                debug!("global status check");
                let contexts = self.contexts.list_contexts().await?;
                let result = self.status_for_known_contexts(args, contexts).await?;
                Ok(DirectReferences::Assembled(result))
            }
            StatusQuery::CurrentContext => {
                debug!("status check for the current context");
                let result = self.status_for_known_contexts(args, Vec::new()).await?;
                Ok(DirectReferences::Assembled(result))
            }
            StatusQuery::ProgrammaticList { parameter } => {
                debug!(parameter = %parameter, "status by programmatic parameter");
                let references = self.parameter_references(args, &parameter)?;
                let entities = self.fetch_references(args, &references).await?;
                if args.raw {
                    Ok(DirectReferences::Assembled(StatusResult::Entities(entities)))
                } else {
                    Ok(self.entity_table(args, HeaderOptions::default(), None, entities))
                }
            }
            StatusQuery::KindName { kind, name } => {
                let namespace = args.namespace_or_default();
                let options = FetchOptions::default().namespace(namespace);
                let description = format!("{kind} {name} -n {namespace}");
                debug!(description = %description, "status by kind and name");

                let entities = with_retry_on_404(&self.settings.retry, &description, || {
                    self.client.get(&kind, Some(name.as_str()), &options)
                })
                .await?;

                Ok(self.entity_table(args, HeaderOptions::titled(&kind), Some(kind.as_str()), entities))
            }
            StatusQuery::PathBased { target } => self.path_references(args, &target, trail).await,
        }
    }

    async fn path_references(
        &self,
        args: &StatusArgs,
        target: &str,
        trail: &[PathBuf],
    ) -> Result<DirectReferences, StatusError> {
        if is_url(target) {
            return self.file_references(args, target, None).await;
        }

        let path = self.files.resolve_path(target);
        if let Some(parameter) = parameter_in_path(&path) {
            let parameter = parameter.to_string();
            return self.file_references(args, target, Some(parameter.as_str())).await;
        }

        match self.files.is_directory(&path).await {
            Some(true) => self.directory_references(args, &path, trail).await,
            Some(false) => {
                let location = path.display().to_string();
                self.file_references(args, &location, None).await
            }
            None => self.kind_references(args, target).await,
        }
    }

    /// One status result per yaml file in `dir`, `main.yaml` first.
    async fn directory_references(
        &self,
        args: &StatusArgs,
        dir: &Path,
        trail: &[PathBuf],
    ) -> Result<DirectReferences, StatusError> {
        let canonical = self.files.canonical_path(dir).await;
        if trail.contains(&canonical) {
            warn!(dir = %dir.display(), "skipping directory already being walked");
            return Ok(DirectReferences::Assembled(StatusResult::Tables(Vec::new())));
        }
        if trail.len() >= self.settings.max_directory_depth {
            warn!(
                dir = %dir.display(),
                depth = trail.len(),
                "directory nesting too deep, skipping"
            );
            return Ok(DirectReferences::Assembled(StatusResult::Tables(Vec::new())));
        }

        debug!(dir = %dir.display(), "status of directory");
        let names = self.files.list_directory(dir).await?;
        let mut yamls: Vec<PathBuf> = names
            .iter()
            .filter(|name| is_yaml_listing(name))
            .map(|name| dir.join(name))
            .collect();

        if names.iter().any(|name| name == SEEDS_DIR) {
            let seeds = dir.join(SEEDS_DIR);
            if self.files.is_directory(&seeds).await == Some(true) {
                let seed_names = self.files.list_directory(&seeds).await?;
                yamls.extend(
                    seed_names
                        .iter()
                        .filter(|name| name.ends_with(YAML_SUFFIX))
                        .map(|name| seeds.join(name)),
                );
            }
        }

        let mut nested_trail = trail.to_vec();
        nested_trail.push(canonical);

        let results = try_join_all(main_first(yamls).into_iter().map(|path| {
            let entry_args = args.for_directory_entry(path.display().to_string());
            self.status_within(entry_args, nested_trail.clone())
        }))
        .await?;

        Ok(DirectReferences::Assembled(StatusResult::Tables(results)))
    }

    /// The target names nothing on disk, so treat it as a resource kind.
    async fn kind_references(
        &self,
        args: &StatusArgs,
        kind: &str,
    ) -> Result<DirectReferences, StatusError> {
        debug!(kind, "status by resource kind");
        let namespace = args.namespace_or_default();
        let options = FetchOptions::default().namespace(namespace);

        let entities = match self.client.get(kind, None, &options).await {
            Ok(found) => found,
            // no such resource type
            Err(err) if err.is_not_found() => return Err(err.into()),
            Err(err) => {
                let reference = ResourceReference {
                    kind: kind.to_string(),
                    name: None,
                    namespace: Some(namespace.to_string()),
                    context: None,
                };
                vec![KubeEntity::from_fetch_error(&reference, namespace, err, args.raw)?]
            }
        };

        Ok(self.entity_table(args, HeaderOptions::titled(kind), Some(kind), entities))
    }

    /// A table with one row per document of a yaml file.
    async fn file_references(
        &self,
        args: &StatusArgs,
        location: &str,
        parameter: Option<&str>,
    ) -> Result<DirectReferences, StatusError> {
        debug!(location, "status by file");

        let references = match parameter {
            Some(parameter) => self.parameter_references(args, parameter)?,
            None => {
                let text = self.files.fetch_file_contents(location).await?;
                references_from_yaml(&text, args.namespace.as_deref())?
            }
        };

        let entities = self.fetch_references(args, &references).await?;
        Ok(self.entity_table(args, HeaderOptions::titled(location), None, entities))
    }

    fn parameter_references(
        &self,
        args: &StatusArgs,
        parameter: &str,
    ) -> Result<Vec<ResourceReference>, StatusError> {
        let blob = args
            .parameters
            .get(parameter)
            .ok_or_else(|| StatusError::MissingParameter(parameter.to_string()))?;
        references_from_yaml(blob, args.namespace.as_deref())
    }

    /// Fetches every reference independently. A failed fetch becomes an
    /// error entity in place of the resource.
    async fn fetch_references(
        &self,
        args: &StatusArgs,
        references: &[ResourceReference],
    ) -> Result<Vec<KubeEntity>, StatusError> {
        let backup_namespace = args.namespace_or_default();

        let fetched = try_join_all(references.iter().map(|reference| async move {
            let options = FetchOptions {
                context: reference.context.clone(),
                namespace: reference.namespace.clone(),
                label_selector: None,
            };
            let description = reference.describe();
            let result = with_retry_on_404(&self.settings.retry, &description, || {
                self.client
                    .get(&reference.kind, reference.name.as_deref(), &options)
            })
            .await;

            match result {
                Ok(found) => Ok(found),
                Err(err) => {
                    debug!(reference = %description, error = %err, "creating error entity");
                    KubeEntity::from_fetch_error(reference, backup_namespace, err, args.raw)
                        .map(|entity| vec![entity])
                        .map_err(StatusError::from)
                }
            }
        }))
        .await?;

        Ok(fetched.into_iter().flatten().collect())
    }

    fn entity_table(
        &self,
        args: &StatusArgs,
        header: HeaderOptions,
        kind: Option<&str>,
        entities: Vec<KubeEntity>,
    ) -> DirectReferences {
        let header_row = if args.raw {
            None
        } else {
            Some(self.formatter.header_row(&header, kind))
        };
        DirectReferences::Entities {
            header_row,
            entities,
        }
    }
}

fn references_from_yaml(
    text: &str,
    request_namespace: Option<&str>,
) -> Result<Vec<ResourceReference>, StatusError> {
    let references = parse_yaml_documents(text)?
        .iter()
        .filter_map(|document| {
            let reference = ResourceReference::from_document(document, request_namespace);
            if reference.is_none() {
                warn!("skipping yaml document without kind and metadata.name");
            }
            reference
        })
        .collect();
    Ok(references)
}
