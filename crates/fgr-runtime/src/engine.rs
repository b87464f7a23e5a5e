use crate::{
    ApplyMismatch, ApplyTarget, Phase, Provisioning, ReconcileOptions, ReconcileStore, RunReport,
    UnitOfWork,
};
use anyhow::{Context, Result};
use chrono::Utc;
use fgr_alloc::{reserve_block, SequenceAllocator};
use fgr_reconcile::{
    compute_change_set, edge_writes, group_inserts, group_refreshes, plan_provisioning,
    preview_provisioning, seed_candidates, ProvisionPlan, SeedStrategy, Snapshot,
};
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

/// Run one reconciliation pass.
///
/// On success the unit of work is committed (full run) or rolled back (dry
/// run). On any error it is rolled back and the error is returned with the
/// failing phase in its context. Reserved versions are never returned to the
/// allocator; an aborted run leaves a gap in the counter, never a duplicate.
pub async fn run_reconciliation<S, A>(
    store: &S,
    alloc: &A,
    opts: &ReconcileOptions,
) -> Result<RunReport>
where
    S: ReconcileStore + ?Sized,
    A: SequenceAllocator + ?Sized,
{
    let run_id = Uuid::new_v4();
    let span = tracing::info_span!("reconcile", %run_id, dry_run = opts.dry_run);
    run_inner(store, alloc, opts, run_id).instrument(span).await
}

async fn run_inner<S, A>(
    store: &S,
    alloc: &A,
    opts: &ReconcileOptions,
    run_id: Uuid,
) -> Result<RunReport>
where
    S: ReconcileStore + ?Sized,
    A: SequenceAllocator + ?Sized,
{
    let mut report = RunReport::new(run_id, opts);

    info!(
        phase = %Phase::Begin,
        lock_wait_secs = ?opts.lock_wait.map(|d| d.as_secs()),
        allocator = alloc.backend(),
        "opening unit of work"
    );
    let mut work = store
        .begin(opts.lock_wait)
        .await
        .with_context(|| format!("phase={}", Phase::Begin))?;

    if let Err(err) = drive(&mut work, alloc, opts, &mut report).await {
        warn!(phase = %Phase::Rollback, error = %format!("{err:#}"), "reconciliation failed");
        if let Err(rb) = work.rollback().await {
            warn!(error = %format!("{rb:#}"), "rollback after failure also failed");
        }
        return Err(err);
    }

    if opts.dry_run {
        work.rollback()
            .await
            .with_context(|| format!("phase={}", Phase::DryRunExit))?;
        info!(
            phase = %Phase::DryRunExit,
            to_update = report.to_update,
            groups_missing = report.groups_missing,
            "dry run rolled back"
        );
    } else {
        work.commit()
            .await
            .with_context(|| format!("phase={}", Phase::Commit))?;
        report.committed = true;
        info!(
            phase = %Phase::Commit,
            updated = report.updated,
            groups_inserted = report.groups_inserted,
            groups_refreshed = report.groups_refreshed,
            "committed"
        );
    }

    report.finished_at = Some(Utc::now());
    Ok(report)
}

async fn drive<W, A>(
    work: &mut W,
    alloc: &A,
    opts: &ReconcileOptions,
    report: &mut RunReport,
) -> Result<()>
where
    W: UnitOfWork,
    A: SequenceAllocator + ?Sized,
{
    let plan = match opts.provisioning {
        Provisioning::Skip => {
            debug!("default group provisioning skipped");
            ProvisionPlan::default()
        }
        Provisioning::Seed(strategy) => provision(work, alloc, opts, strategy, report)
            .await
            .with_context(|| format!("phase={}", Phase::ProvisionGroups))?,
    };

    // Reads happen after provisioning so persisted defaults are visible.
    let groups = work
        .load_groups()
        .await
        .with_context(|| format!("phase={}: load groups", Phase::SnapshotBuild))?;
    let memberships = work
        .load_memberships()
        .await
        .with_context(|| format!("phase={}: load memberships", Phase::SnapshotBuild))?;
    let snapshot = if opts.dry_run {
        // Nothing was persisted: read the groups as the upsert would leave them.
        let (preview, brand_new) =
            preview_provisioning(&groups, &opts.default_group_name, &plan);
        let mut snapshot = Snapshot::build(&preview, &memberships);
        snapshot.defaults.plan_missing(brand_new);
        snapshot
    } else {
        Snapshot::build(&groups, &memberships)
    };
    debug!(
        phase = %Phase::SnapshotBuild,
        groups = groups.len(),
        memberships = memberships.len(),
        defaults = snapshot.defaults.len(),
        membership_owners = snapshot.members.len(),
        "snapshot built"
    );

    let edges = work
        .load_edges()
        .await
        .with_context(|| format!("phase={}: load edges", Phase::SnapshotBuild))?;
    let changes = compute_change_set(&edges, &snapshot, &opts.edge_filter);

    report.edges_scanned = changes.scanned;
    report.edges_filtered_out = changes.filtered_out;
    report.to_update = changes.to_update();
    report.unresolved = changes.unresolved.len();
    report.awaiting_default = changes.awaiting_default.len();

    if !changes.unresolved.is_empty() {
        warn!(
            unresolved = changes.unresolved.len(),
            "edges left untouched: no active membership and no default group"
        );
    }
    info!(
        phase = %Phase::DiffCompute,
        scanned = changes.scanned,
        filtered_out = changes.filtered_out,
        to_update = changes.to_update(),
        "change set computed"
    );

    if opts.dry_run {
        return Ok(());
    }

    let block = reserve_block(alloc, &opts.counters.edge, changes.changes.len())
        .await
        .with_context(|| format!("phase={}: edge versions", Phase::VersionAllocate))?;
    let Some(block) = block else {
        info!("no edges to update");
        return Ok(());
    };
    report.edge_block = Some(block);

    let writes = edge_writes(&changes, &block)
        .with_context(|| format!("phase={}", Phase::VersionAllocate))?;
    let affected = work
        .apply_edge_updates(&writes)
        .await
        .with_context(|| format!("phase={}", Phase::Apply))?;
    ApplyMismatch::check(ApplyTarget::EdgeUpdate, writes.len(), affected)
        .with_context(|| format!("phase={}", Phase::Apply))?;
    report.updated = affected;

    info!(
        phase = %Phase::Apply,
        updated = affected,
        versions = %block,
        "edges updated"
    );
    Ok(())
}

/// Seed candidates, split them, and (full run only) persist both sides.
async fn provision<W, A>(
    work: &mut W,
    alloc: &A,
    opts: &ReconcileOptions,
    strategy: SeedStrategy,
    report: &mut RunReport,
) -> Result<ProvisionPlan>
where
    W: UnitOfWork,
    A: SequenceAllocator + ?Sized,
{
    let edge_owners = if strategy.reads_edges() {
        work.edge_owners().await.context("seed owners from edges")?
    } else {
        Vec::new()
    };
    let registry = if strategy.reads_registry() {
        work.registry_owners()
            .await
            .context("seed owners from registry")?
    } else {
        Vec::new()
    };
    let candidates = seed_candidates(strategy, edge_owners, registry);

    let groups = work.load_groups().await.context("load groups")?;
    let plan = plan_provisioning(&candidates, &groups);

    report.candidate_owners = candidates.len();
    report.groups_missing = plan.missing_owners.len();
    report.groups_existing = plan.existing_groups.len();
    info!(
        phase = %Phase::ProvisionGroups,
        seed = strategy.as_str(),
        candidates = candidates.len(),
        missing = plan.missing_owners.len(),
        existing = plan.existing_groups.len(),
        "default group plan"
    );

    if opts.dry_run {
        return Ok(plan);
    }

    if let Some(block) = reserve_block(alloc, &opts.counters.group, plan.missing_owners.len())
        .await
        .context("reserve versions for new default groups")?
    {
        let inserts = group_inserts(&plan, &block)?;
        let n = work
            .upsert_default_groups(&opts.default_group_name, &inserts)
            .await
            .context("insert default groups")?;
        ApplyMismatch::check(ApplyTarget::GroupInsert, inserts.len(), n)?;
        report.groups_inserted = n;
        report.group_insert_block = Some(block);
    }

    if let Some(block) = reserve_block(alloc, &opts.counters.group, plan.existing_groups.len())
        .await
        .context("reserve versions for existing default groups")?
    {
        let refreshes = group_refreshes(&plan, &block)?;
        let n = work
            .refresh_default_groups(&refreshes)
            .await
            .context("refresh default groups")?;
        ApplyMismatch::check(ApplyTarget::GroupRefresh, refreshes.len(), n)?;
        report.groups_refreshed = n;
        report.group_refresh_block = Some(block);
    }

    Ok(plan)
}
