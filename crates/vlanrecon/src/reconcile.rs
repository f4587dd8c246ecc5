//! Reconciliation driver.
//!
//! One driver for every platform: teardown, then (unless only tearing down)
//! topology build and isolation install. The first failing primitive aborts
//! the run; the next successful run cleans up whatever was left behind.

use std::time::{Duration, Instant};
use tracing::{info, instrument};

use vlanrecon_common::{Platform, ReconcileResult};

use crate::config::ReconcileConfig;
use crate::isolation::{self, IsolationReport};
use crate::schema::Schema;
use crate::teardown::{self, TeardownReport};
use crate::topology::{self, BuildReport};

/// What a run is asked to do.
#[derive(Debug, Clone, Copy)]
pub enum RunMode<'a> {
    /// Teardown only.
    DownOnly,
    /// Teardown, then build the given schema.
    Apply(&'a Schema),
}

/// Outcome of a completed run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub teardown: TeardownReport,
    pub build: Option<BuildReport>,
    pub isolation: Option<IsolationReport>,
    pub elapsed: Duration,
}

impl RunSummary {
    /// Wall-clock time of the run in milliseconds, saturating at `u64::MAX`.
    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.elapsed.as_millis()).unwrap_or(u64::MAX)
    }

    /// Logs the summary at info level.
    pub fn log(&self) {
        let (bridges, ports) = self
            .build
            .as_ref()
            .map(|b| (b.bridges_created.len(), b.ports_attached))
            .unwrap_or_default();
        let entries = self
            .isolation
            .as_ref()
            .map(|i| i.entries_created)
            .unwrap_or_default();

        info!(
            bridges_deleted = self.teardown.bridges_deleted.len(),
            tagged_links_deleted = self.teardown.tagged_links_deleted.len(),
            acl_entries_deleted = self.teardown.acl_entries_deleted,
            bridges_created = bridges,
            ports_attached = ports,
            acl_entries_created = entries,
            elapsed_ms = self.elapsed_ms(),
            "Reconciliation finished"
        );
    }
}

/// Drives a platform adapter through a reconciliation run.
pub struct Reconciler<P: Platform> {
    platform: P,
    config: ReconcileConfig,
}

impl<P: Platform> Reconciler<P> {
    pub fn new(platform: P, config: ReconcileConfig) -> Self {
        Self { platform, config }
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    pub fn into_platform(self) -> P {
        self.platform
    }

    /// Restores the baseline state.
    pub async fn teardown(&mut self) -> ReconcileResult<TeardownReport> {
        teardown::teardown(&mut self.platform, &self.config).await
    }

    /// Builds the schema on a torn-down box and installs its isolation policy.
    ///
    /// The `acl` section is compiled only after the topology is in place, so
    /// a bad interface reference is reported before a bad `acl` entry.
    pub async fn build(
        &mut self,
        schema: &Schema,
    ) -> ReconcileResult<(BuildReport, Option<IsolationReport>)> {
        let build = topology::build(&mut self.platform, schema, &self.config.bridge).await?;

        let isolation = match isolation::compile(schema, &self.config.isolation)? {
            Some(plan) => Some(isolation::install(&mut self.platform, &plan).await?),
            None => {
                info!("No acl section, skipping isolation table");
                None
            }
        };

        Ok((build, isolation))
    }

    /// Runs teardown followed by the requested work.
    #[instrument(skip_all, fields(platform = %self.platform.platform_name()))]
    pub async fn run(&mut self, mode: RunMode<'_>) -> ReconcileResult<RunSummary> {
        let started = Instant::now();
        let mut summary = RunSummary {
            teardown: self.teardown().await?,
            ..Default::default()
        };

        if let RunMode::Apply(schema) = mode {
            let (build, isolation) = self.build(schema).await?;
            summary.build = Some(build);
            summary.isolation = isolation;
        } else {
            info!("Down-only run, leaving box torn down");
        }

        summary.elapsed = started.elapsed();
        summary.log();
        Ok(summary)
    }
}
