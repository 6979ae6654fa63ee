//! Round coordinator
//!
//! Drives every round through
//! `Idle -> WorkloadApplied -> Checkpointed -> FullCopied -> IncrementalCopied -> Verified -> Retired`
//! (round 0 goes straight from `FullCopied` to `Retired`) and owns the target
//! set. Any copy, truncation or verification failure ends the run; nothing is
//! cleaned up afterwards.

use crate::catalog::{Catalog, RoundEvent};
use crate::config::RunConfig;
use crate::copy::{CopyOptions, CopyReport};
use crate::error::{BackupError, Result};
use crate::full::FullBackupEngine;
use crate::incremental::IncrementalBackupEngine;
use crate::layout;
use crate::provision::{DirectoryHandle, DirectoryProvisioner};
use crate::targets::{BackupTarget, BackupTargetSet, TargetId};
use crate::verify::{Comparison, VerificationOracle};
use crate::workload::{KeyValueWorkload, Workload};
use journal::Engine;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, info_span, warn};
use ulid::Ulid;
use wr_core::{
    DirectoryOps, FileTransport, LocalDirectoryOps, LocalTransport, Round, StorageSession,
    TableWriter,
};

/// Where a round is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoundPhase {
    Idle,
    WorkloadApplied,
    Checkpointed,
    FullCopied,
    IncrementalCopied,
    Verified,
    Retired,
}

impl RoundPhase {
    /// Whether `self -> to` is a legal step in `round`
    pub fn can_advance(self, to: RoundPhase, round: Round) -> bool {
        use RoundPhase::*;
        match (self, to) {
            (Idle, WorkloadApplied)
            | (WorkloadApplied, Checkpointed)
            | (Checkpointed, FullCopied)
            | (IncrementalCopied, Verified)
            | (Verified, Retired)
            | (Retired, Idle) => true,
            (FullCopied, IncrementalCopied) => !round.is_initial(),
            (FullCopied, Retired) => round.is_initial(),
            _ => false,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            RoundPhase::Idle => "idle",
            RoundPhase::WorkloadApplied => "workload_applied",
            RoundPhase::Checkpointed => "checkpointed",
            RoundPhase::FullCopied => "full_copied",
            RoundPhase::IncrementalCopied => "incremental_copied",
            RoundPhase::Verified => "verified",
            RoundPhase::Retired => "retired",
        }
    }
}

impl fmt::Display for RoundPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What one round did
#[derive(Debug, Clone)]
pub struct RoundReport {
    pub round: Round,
    pub checkpoint_lsn: u64,
    pub keys: usize,
    pub full: CopyReport,
    pub incremental: Option<CopyReport>,
    /// Lagging target verified and retired this round
    pub verified: Option<TargetId>,
}

/// Outcome of a complete run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: Ulid,
    pub rounds: Vec<RoundReport>,
    /// Rolling target against the live source
    pub final_comparison: Comparison,
    /// Keys in the rolling target at the end
    pub rolling_entries: usize,
}

impl RunSummary {
    pub fn bytes_copied(&self) -> u64 {
        self.rounds
            .iter()
            .map(|r| r.full.bytes + r.incremental.as_ref().map_or(0, |i| i.bytes))
            .sum()
    }

    pub fn segments_truncated(&self) -> usize {
        self.rounds
            .iter()
            .filter_map(|r| r.incremental.as_ref())
            .map(|i| i.truncated.len())
            .sum()
    }
}

type RoundCallback = Box<dyn FnMut(&RoundReport)>;

/// Top-level driver of a backup run
pub struct RoundCoordinator<S> {
    session: S,
    rounds: u32,
    workload: Box<dyn Workload>,
    provisioner: DirectoryProvisioner,
    full: FullBackupEngine,
    incremental: IncrementalBackupEngine,
    oracle: VerificationOracle,
    targets: BackupTargetSet,
    current: Round,
    phase: RoundPhase,
    run_id: Ulid,
    catalog: Option<Catalog>,
    on_round_complete: Option<RoundCallback>,
}

impl<S> RoundCoordinator<S>
where
    S: StorageSession + TableWriter,
{
    /// Coordinator over `session` with targets under `root`
    pub fn new(session: S, root: impl Into<PathBuf>, rounds: u32, workload: Box<dyn Workload>) -> Self {
        Self {
            session,
            rounds,
            workload,
            provisioner: DirectoryProvisioner::new(root),
            full: FullBackupEngine::default(),
            incremental: IncrementalBackupEngine::default(),
            oracle: VerificationOracle::new(),
            targets: BackupTargetSet::new(),
            current: Round::ZERO,
            phase: RoundPhase::Idle,
            run_id: Ulid::new(),
            catalog: None,
            on_round_complete: None,
        }
    }

    /// Route every copy through `transport`
    pub fn with_transport(mut self, transport: Arc<dyn FileTransport>, options: CopyOptions) -> Self {
        self.full = FullBackupEngine::new(transport.clone(), options);
        self.incremental = IncrementalBackupEngine::new(transport, options);
        self
    }

    pub fn with_dir_ops(mut self, ops: Arc<dyn DirectoryOps>) -> Self {
        let root = self.provisioner.root().to_path_buf();
        self.provisioner = DirectoryProvisioner::with_ops(root, ops);
        self
    }

    /// Record phase transitions in a run catalog
    pub fn with_catalog(mut self, catalog: Catalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn on_round_complete(mut self, callback: impl FnMut(&RoundReport) + 'static) -> Self {
        self.on_round_complete = Some(Box::new(callback));
        self
    }

    pub fn run_id(&self) -> Ulid {
        self.run_id
    }

    pub fn root(&self) -> &Path {
        self.provisioner.root()
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut S {
        &mut self.session
    }

    pub fn into_session(self) -> S {
        self.session
    }

    pub fn catalog(&self) -> Option<&Catalog> {
        self.catalog.as_ref()
    }

    pub fn targets(&self) -> &BackupTargetSet {
        &self.targets
    }

    /// Round currently running (or last run)
    pub fn current_round(&self) -> Round {
        self.current
    }

    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    /// Directory of a target
    pub fn target_dir(&self, id: TargetId) -> PathBuf {
        layout::target_dir(self.root(), id)
    }

    /// Setup, every round, then the final comparison
    pub fn run(&mut self) -> Result<RunSummary> {
        match self.run_inner() {
            Ok(summary) => Ok(summary),
            Err(e) => {
                warn!(round = %self.current, phase = %self.phase, error = %e, "run aborted");
                if let Err(catalog_err) = self.record(self.current, "failed", e.to_string()) {
                    warn!(error = %catalog_err, "failed to record run failure");
                }
                Err(e)
            }
        }
    }

    fn run_inner(&mut self) -> Result<RunSummary> {
        self.setup()?;

        let mut reports = Vec::with_capacity(self.rounds as usize);
        for round in Round::range(self.rounds) {
            let report = self.run_round(round)?;
            if let Some(callback) = self.on_round_complete.as_mut() {
                callback(&report);
            }
            reports.push(report);
        }

        let (final_comparison, rolling_entries) = self.finish()?;
        Ok(RunSummary {
            run_id: self.run_id,
            rounds: reports,
            final_comparison,
            rolling_entries,
        })
    }

    /// Provision the rolling, lagging and full-snapshot directories
    pub fn setup(&mut self) -> Result<()> {
        let mut ids = vec![TargetId::ROLLING];
        for i in 1..self.rounds {
            ids.push(TargetId::lagging(Round(i)));
            ids.push(TargetId::full_snapshot(Round(i)));
        }
        for &id in &ids {
            self.provisioner.provision(id)?;
        }

        info!(run_id = %self.run_id, rounds = self.rounds, targets = ids.len(), "run set up");
        self.record(Round::ZERO, "setup", format!("{} target directories", ids.len()))
    }

    /// Run one round from `Idle` to `Retired`
    pub fn run_round(&mut self, round: Round) -> Result<RoundReport> {
        let span = info_span!("round", round = %round);
        let _enter = span.enter();

        if self.phase == RoundPhase::Retired {
            self.phase = RoundPhase::Idle;
        }
        self.current = round;
        // Reject before the workload touches the source
        if !self.phase.can_advance(RoundPhase::WorkloadApplied, round) {
            return Err(BackupError::Phase {
                round,
                from: self.phase,
                to: RoundPhase::WorkloadApplied,
            });
        }

        // 1. Workload
        self.workload.apply(&mut self.session, round)?;
        self.advance(RoundPhase::WorkloadApplied, "")?;

        // 2. Checkpoint
        let checkpoint = self.session.checkpoint()?;
        self.advance(
            RoundPhase::Checkpointed,
            format!("lsn {} ({} keys)", checkpoint.lsn, checkpoint.entries),
        )?;

        let mut report = RoundReport {
            round,
            checkpoint_lsn: checkpoint.lsn,
            keys: checkpoint.entries,
            full: CopyReport::default(),
            incremental: None,
            verified: None,
        };

        if round.is_initial() {
            // 3. Seed every baseline from one full pass
            let handles = self.baseline_handles();
            report.full = self.full.copy_full_snapshot(&mut self.session, &handles)?;
            for handle in &handles {
                self.targets.register(BackupTarget::new(handle.id, Round::ZERO))?;
            }
            self.advance(RoundPhase::FullCopied, format!("{} targets seeded", handles.len()))?;
            self.advance(RoundPhase::Retired, "")?;
            return Ok(report);
        }

        // 3. Fresh full snapshot for side-by-side comparison
        let snapshot = TargetId::full_snapshot(round);
        let snapshot_handle = self.provisioner.handle(snapshot);
        report.full = self
            .full
            .copy_full_snapshot(&mut self.session, std::slice::from_ref(&snapshot_handle))?;
        self.targets.register(BackupTarget::new(snapshot, round))?;
        self.advance(RoundPhase::FullCopied, format!("{} files", report.full.files.len()))?;

        // 4. Increment into every live target, then truncate
        let increment = self.incremental.copy_increment(
            &mut self.session,
            round,
            &mut self.targets,
            &self.provisioner,
        )?;
        self.advance(
            RoundPhase::IncrementalCopied,
            format!("{} segments, {} archived", increment.files.len(), increment.truncated.len()),
        )?;
        report.incremental = Some(increment);

        // 5. The lagging target for this round must match the fresh snapshot
        let lagging = TargetId::lagging(round);
        self.verify(round, snapshot, lagging)?;
        report.verified = Some(lagging);
        self.advance(RoundPhase::Verified, format!("{} == {}", lagging, snapshot))?;

        // 6. Retire both and reclaim their directories
        for id in [lagging, snapshot] {
            self.targets.retire(id);
            self.provisioner.reclaim(id);
        }
        self.advance(RoundPhase::Retired, "")?;

        Ok(report)
    }

    /// Compare the rolling target against the live source
    ///
    /// Returns the comparison and the number of keys in the rolling target.
    pub fn finish(&mut self) -> Result<(Comparison, usize)> {
        let source = self.session.home().to_path_buf();
        let rolling = self.target_dir(TargetId::ROLLING);

        let reference = self.oracle.materialize(&source)?;
        let candidate = self.oracle.materialize(&rolling)?;
        let comparison = self.oracle.compare(
            &self.oracle.dump_logical(&reference),
            &self.oracle.dump_logical(&candidate),
        );

        if let Comparison::Differs { index, key } = &comparison {
            return Err(BackupError::VerificationMismatch {
                round: self.current,
                reference: layout::SOURCE_DIR.to_string(),
                candidate: TargetId::ROLLING.to_string(),
                index: *index,
                key: key.clone(),
            });
        }

        info!(entries = candidate.len(), "rolling target matches source");
        self.record(self.current, "finished", format!("{} keys match", candidate.len()))?;
        Ok((comparison, candidate.len()))
    }

    fn baseline_handles(&self) -> Vec<DirectoryHandle> {
        std::iter::once(TargetId::ROLLING)
            .chain((1..self.rounds).map(|j| TargetId::lagging(Round(j))))
            .map(|id| self.provisioner.handle(id))
            .collect()
    }

    fn verify(&self, round: Round, reference: TargetId, candidate: TargetId) -> Result<()> {
        let comparison = self
            .oracle
            .verify_pair(&self.target_dir(reference), &self.target_dir(candidate))?;

        match comparison {
            Comparison::Equal => Ok(()),
            Comparison::Differs { index, key } => Err(BackupError::VerificationMismatch {
                round,
                reference: reference.to_string(),
                candidate: candidate.to_string(),
                index,
                key,
            }),
        }
    }

    fn advance(&mut self, to: RoundPhase, detail: impl Into<String>) -> Result<()> {
        if !self.phase.can_advance(to, self.current) {
            return Err(BackupError::Phase {
                round: self.current,
                from: self.phase,
                to,
            });
        }
        self.phase = to;
        self.record(self.current, to.name(), detail)
    }

    fn record(&self, round: Round, phase: &str, detail: impl Into<String>) -> Result<()> {
        if let Some(catalog) = &self.catalog {
            catalog
                .append(&RoundEvent::new(self.run_id, round, phase, detail))
                .map_err(BackupError::Catalog)?;
        }
        Ok(())
    }
}

impl RoundCoordinator<Engine> {
    /// Build a coordinator over a fresh reference engine as configured
    ///
    /// The source directory is emptied first; the catalog is kept across runs.
    pub fn from_config(config: &RunConfig) -> anyhow::Result<Self> {
        config.validate()?;
        let root = &config.run.work_dir;

        let source = layout::source_dir(root);
        LocalDirectoryOps.make_empty_dir(&source)?;
        let engine = Engine::open(&source, config.engine_config())?;
        let catalog = Catalog::open(&layout::catalog_dir(root))?;

        let transport = Arc::new(LocalTransport {
            fsync: config.copy.fsync,
        });
        let workload = Box::new(KeyValueWorkload::new(config.run.keys_per_round));

        Ok(Self::new(engine, root.clone(), config.run.rounds, workload)
            .with_transport(transport, config.copy_options())
            .with_catalog(catalog))
    }
}
