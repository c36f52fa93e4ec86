//! Execution engine - applies a plan entry by entry

use crate::context::{ConfirmCallback, ProgressCallback};
use crate::diff::{DiffSummary, EntryDiff};
use crate::error::Error;
use crate::planner::ReconcilePlan;
use crate::system::{DryRunSystem, System};
use crate::types::{ApplySummary, ExecuteOptions};
use anyhow::Result;

/// Execute a plan with the given options and callbacks
///
/// Entries are applied sequentially, in plan order. Confirmation is asked
/// once, before anything is changed, and only when something differs or
/// scripts are due to run. In a dry run nothing is confirmed or changed and
/// the summary counts what would have happened.
///
/// Without `keep_going` the first failing entry aborts the run with its
/// error; with it, failures are reported to `progress` and counted. This
/// includes entries whose contents fail to load while computing the diff.
pub fn execute<P, C>(
    system: &dyn System,
    plan: &ReconcilePlan,
    opts: &ExecuteOptions,
    progress: &mut P,
    confirm: &mut C,
) -> Result<ApplySummary>
where
    P: ProgressCallback,
    C: ConfirmCallback,
{
    // With keep_going an entry whose contents can't be loaded counts as
    // failed and the rest of the batch still runs.
    let mut diffs = Vec::new();
    let mut unreadable: Vec<Option<Error>> = Vec::with_capacity(plan.len());
    for entry in plan {
        match EntryDiff::between(&entry.target, &entry.dest) {
            Ok(diff) => {
                diffs.extend(diff);
                unreadable.push(None);
            }
            Err(err) if opts.keep_going => {
                log::warn!("cannot evaluate {}: {err}", entry.path().display());
                unreadable.push(Some(err));
            }
            Err(err) => {
                return Err(anyhow::Error::new(err)
                    .context(format!("failed to evaluate {}", entry.path().display())));
            }
        }
    }
    let diffs = DiffSummary::from_diffs(&diffs);
    let scripts = plan.script_count();
    let has_work = diffs.has_changes() || scripts > 0;

    if !has_work && unreadable.iter().all(Option::is_none) {
        return Ok(ApplySummary {
            no_change: plan.len(),
            ..Default::default()
        });
    }

    if has_work && !opts.dry_run {
        let prompt = format!(
            "Apply {} change(s) and {scripts} script(s)?",
            diffs.total()
        );
        if !confirm.confirm(&prompt)? {
            return Ok(ApplySummary {
                skipped: plan.len(),
                ..Default::default()
            });
        }
    }

    let dry_run = DryRunSystem::new(system);
    let system: &dyn System = if opts.dry_run { &dry_run } else { system };

    let mut summary = ApplySummary::default();
    progress.on_batch_start(plan.len());
    for (entry, unreadable) in plan.iter().zip(unreadable) {
        let path = entry.path();
        progress.on_entry_start(path, entry.target.kind());
        if let Some(err) = unreadable {
            progress.on_entry_failed(path, &err);
            summary.failed += 1;
            continue;
        }
        match entry.target.apply(system, &entry.dest) {
            Ok(result) => {
                progress.on_entry_complete(path, &result);
                summary.add_result(&result);
            }
            Err(err) => {
                progress.on_entry_failed(path, &err);
                summary.failed += 1;
                if !opts.keep_going {
                    return Err(anyhow::Error::new(err)
                        .context(format!("failed to apply {}", path.display())));
                }
            }
        }
    }
    progress.on_batch_complete();

    Ok(summary)
}

/// Simple execution without callbacks
///
/// For basic use cases where you don't need progress or confirmation.
pub fn execute_simple(
    system: &dyn System,
    plan: &ReconcilePlan,
    opts: &ExecuteOptions,
) -> Result<ApplySummary> {
    use crate::context::{AutoConfirm, NoProgress};

    execute(system, plan, opts, &mut NoProgress, &mut AutoConfirm)
}
