//! Instantiation of a new configuration folder
//!
//! An [`Instantiator`] walks one request through
//! `Idle → SourceSelected → DatasetResolved → Validated → Copying → Rewriting → Done`.
//! [`Instantiator::plan`] covers the first three steps and never writes;
//! [`Instantiator::execute`] copies, rewrites and persists.

pub mod copy;
pub mod state;

pub use copy::{copy_tree, CopyFilter, CopyStats};
pub use state::{Phase, StateMachine};

use crate::catalog::{CatalogReader, Selection, TemplateKind};
use crate::config::Settings;
use crate::config_set::ConfigSet;
use crate::io::paths::Roots;
use crate::naming::{self, CachePaths, DatasetRef, Identifier};
use crate::rewrite::{RewriteEngine, RewriteParams, StrategyChoice, StrategyKind, DEFAULT_RESOLUTION_IDS};
use crate::{Result, TuneconfError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Where the new folder is copied from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSpec {
    /// An existing folder; `token` renames it, otherwise the token is kept
    Existing {
        selection: Selection,
        token: Option<String>,
    },
    /// One of the fixed templates
    Template { kind: TemplateKind, token: String },
}

/// Which dataset the new folder trains on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasetSpec {
    /// The dataset the source backend file already points at
    Reuse,
    Select(Selection),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstantiationRequest {
    pub source: SourceSpec,
    pub version: String,
    pub dataset: DatasetSpec,
}

/// Where the source came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceOrigin {
    Existing { identifier: Identifier },
    Template { template: TemplateKind },
}

/// A fully resolved request. Producing one writes nothing.
#[derive(Debug, Clone, Serialize)]
pub struct InstantiationPlan {
    pub source_path: PathBuf,
    pub origin: SourceOrigin,
    pub identifier: Identifier,
    pub dataset: DatasetRef,
    pub dataset_reused: bool,
    pub destination_path: PathBuf,
    pub cache_paths: CachePaths,
}

impl InstantiationPlan {
    pub fn old_identifier(&self) -> Option<&Identifier> {
        match &self.origin {
            SourceOrigin::Existing { identifier } => Some(identifier),
            SourceOrigin::Template { .. } => None,
        }
    }
}

/// Outcome of a completed instantiation
#[derive(Debug, Clone, Serialize)]
pub struct InstantiationReport {
    pub run_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub identifier: Identifier,
    pub destination_path: PathBuf,
    pub dataset: DatasetRef,
    pub strategy_used: StrategyKind,
    pub files_copied: usize,
    pub documents_rewritten: BTreeSet<String>,
    pub documents_skipped: BTreeMap<String, String>,
}

#[derive(Debug)]
pub struct Instantiator {
    catalog: CatalogReader,
    engine: RewriteEngine,
    copy_filter: CopyFilter,
    resolution_ids: Vec<String>,
    machine: StateMachine,
}

impl Instantiator {
    pub fn new(roots: Roots, engine: RewriteEngine) -> Self {
        Self {
            catalog: CatalogReader::new(roots),
            engine,
            copy_filter: CopyFilter::default(),
            resolution_ids: DEFAULT_RESOLUTION_IDS.iter().map(|s| s.to_string()).collect(),
            machine: StateMachine::default(),
        }
    }

    /// Build from settings; `strategy` overrides the configured choice
    pub fn from_settings(settings: &Settings, strategy: Option<StrategyChoice>) -> Result<Self> {
        let engine = RewriteEngine::select(strategy.unwrap_or(settings.strategy))?;
        Ok(Self::new(settings.roots(), engine)
            .with_copy_filter(settings.copy_filter()?)
            .with_resolution_ids(settings.resolution_ids.clone()))
    }

    pub fn with_copy_filter(mut self, copy_filter: CopyFilter) -> Self {
        self.copy_filter = copy_filter;
        self
    }

    pub fn with_resolution_ids(mut self, resolution_ids: Vec<String>) -> Self {
        self.resolution_ids = resolution_ids;
        self
    }

    pub fn catalog(&self) -> &CatalogReader {
        &self.catalog
    }

    pub fn phase(&self) -> Phase {
        self.machine.current()
    }

    pub fn history(&self) -> &[Phase] {
        self.machine.history()
    }

    /// Return to `Idle` so another request can be handled
    pub fn reset(&mut self) {
        self.machine.reset();
    }

    /// Resolve and validate `request` without touching the filesystem.
    ///
    /// An unrecognized selection leaves the phase where it was so the caller
    /// can retry; any other error moves to `Failed`. A plan that was never
    /// executed is discarded when planning again.
    pub fn plan(&mut self, request: &InstantiationRequest) -> Result<InstantiationPlan> {
        if self.machine.current() == Phase::Validated {
            self.machine.reset();
        }
        let snapshot = self.machine.clone();
        let result = self.resolve(request);
        match &result {
            Err(TuneconfError::UnrecognizedSelection { .. }) => self.machine = snapshot,
            Err(_) => self.machine.fail(),
            Ok(_) => {}
        }
        result
    }

    fn resolve(&mut self, request: &InstantiationRequest) -> Result<InstantiationPlan> {
        let (source_path, origin, identifier) = self.resolve_source(request)?;
        self.machine.advance(Phase::SourceSelected)?;

        let (dataset, dataset_reused) = match &request.dataset {
            DatasetSpec::Reuse => {
                if let SourceOrigin::Template { template } = &origin {
                    return Err(TuneconfError::DatasetUnresolved(format!(
                        "template '{}' has no dataset to reuse; select one",
                        template
                    )));
                }
                let set = ConfigSet::load(&source_path)?;
                let dataset = set
                    .dataset_reference()
                    .map_err(|e| TuneconfError::DatasetUnresolved(e.to_string()))?
                    .ok_or_else(|| {
                        TuneconfError::DatasetUnresolved(format!(
                            "{} has no backend with an instance_data_dir",
                            source_path.display()
                        ))
                    })?;
                (dataset, true)
            }
            DatasetSpec::Select(selection) => {
                (DatasetRef::new(self.catalog.select_dataset(selection)?), false)
            }
        };
        self.machine.advance(Phase::DatasetResolved)?;

        let roots = self.catalog.roots();
        if !roots.config_root.is_dir() {
            return Err(TuneconfError::catalog_unavailable(
                &roots.config_root,
                "destination root does not exist",
            ));
        }
        let destination_path = roots.destination_for(&identifier);
        if destination_path.symlink_metadata().is_ok() {
            return Err(TuneconfError::DestinationExists(destination_path));
        }
        self.machine.advance(Phase::Validated)?;

        let cache_paths = naming::derive(&identifier, &dataset.name);
        Ok(InstantiationPlan {
            source_path,
            origin,
            identifier,
            dataset,
            dataset_reused,
            destination_path,
            cache_paths,
        })
    }

    fn resolve_source(
        &self,
        request: &InstantiationRequest,
    ) -> Result<(PathBuf, SourceOrigin, Identifier)> {
        match &request.source {
            SourceSpec::Existing { selection, token } => {
                let (name, path) = self.catalog.select_source_folder(selection)?;
                let old = Identifier::parse(&name)?;
                let token = token.as_deref().unwrap_or(old.token());
                let identifier = Identifier::new(token, request.version.as_str())?;
                Ok((path, SourceOrigin::Existing { identifier: old }, identifier))
            }
            SourceSpec::Template { kind, token } => {
                let identifier = Identifier::new(token.as_str(), request.version.as_str())?;
                let path = self.catalog.template_dir(*kind)?;
                Ok((path, SourceOrigin::Template { template: *kind }, identifier))
            }
        }
    }

    /// Copy, rewrite and persist a plan produced by [`Instantiator::plan`]
    #[instrument(
        name = "instantiate",
        skip(self, plan),
        fields(
            run_id = tracing::field::Empty,
            destination = %plan.identifier,
            strategy = %self.engine.strategy_kind()
        )
    )]
    pub fn execute(&mut self, plan: &InstantiationPlan) -> Result<InstantiationReport> {
        let run_id = Uuid::new_v4();
        tracing::Span::current().record("run_id", tracing::field::display(run_id));

        let result = self.copy_and_rewrite(plan, run_id);
        if let Err(e) = &result {
            warn!("Instantiation failed: {}", e);
            self.machine.fail();
        }
        result
    }

    fn copy_and_rewrite(
        &mut self,
        plan: &InstantiationPlan,
        run_id: Uuid,
    ) -> Result<InstantiationReport> {
        self.machine.advance(Phase::Copying)?;
        let stats = copy_tree(&plan.source_path, &plan.destination_path, &self.copy_filter)?;

        self.machine.advance(Phase::Rewriting)?;
        let mut set = ConfigSet::load(&plan.destination_path)?;
        let params = RewriteParams::new(plan.identifier.clone(), plan.dataset.clone())
            .with_old_identifier(plan.old_identifier().cloned())
            .with_resolution_ids(self.resolution_ids.clone());
        let summary = self.engine.rewrite_set(&mut set, &params);

        let mut documents_skipped: BTreeMap<String, String> = summary
            .skipped
            .iter()
            .map(|(kind, reason)| (kind.to_string(), reason.clone()))
            .collect();
        let mut documents_rewritten = BTreeSet::new();

        for document in set.documents_mut() {
            let kind = document.kind();
            if !summary.rewritten.contains_key(&kind) {
                continue;
            }
            match document.persist() {
                Ok(_) => {
                    documents_rewritten.insert(kind.to_string());
                }
                Err(e) => {
                    warn!(document = %kind, "Could not write rewritten document: {}", e);
                    documents_skipped.insert(kind.to_string(), e.to_string());
                }
            }
        }

        self.machine.advance(Phase::Done)?;
        info!(
            rewritten = documents_rewritten.len(),
            skipped = documents_skipped.len(),
            "Created {}",
            plan.destination_path.display()
        );

        Ok(InstantiationReport {
            run_id,
            created_at: Utc::now(),
            identifier: plan.identifier.clone(),
            destination_path: plan.destination_path.clone(),
            dataset: plan.dataset.clone(),
            strategy_used: self.engine.strategy_kind(),
            files_copied: stats.files,
            documents_rewritten,
            documents_skipped,
        })
    }

    /// Plan and execute in one step
    pub fn run(&mut self, request: &InstantiationRequest) -> Result<InstantiationReport> {
        let plan = self.plan(request)?;
        self.execute(&plan)
    }
}
