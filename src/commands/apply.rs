use super::plan::{self, Action, Planned};
use super::{Session, confirm, connect};
use crate::Context;
use crate::cli::ApplyArgs;
use crate::registry::{Client, Outcome};
use crate::state::CachedEntry;
use crate::ui;
use anyhow::{Result, bail};
use policy::{GraphqlClient, Transport};
use reconcile::{ApplyResult, ReconcileSummary};

pub fn run(ctx: &Context, args: ApplyArgs) -> Result<()> {
    let mut session = Session::open(ctx)?;
    let manifest = session.manifest(args.select.manifest.as_deref())?;
    let planned = plan::build(
        &session,
        &manifest,
        args.select.kind.as_deref(),
        args.select.name.as_deref(),
    )?;

    let mut summary = ReconcileSummary::default();
    let pending: Vec<&Planned<'_>> = planned.iter().filter(|p| p.is_change()).collect();
    summary.no_change = planned.len() - pending.len();

    if pending.is_empty() {
        ui::success("Everything is up to date");
        return Ok(());
    }

    if !ctx.quiet {
        ui::header("Changes");
        for item in &pending {
            plan::show(&session, item)?;
        }
        println!();
    }

    if !confirm(&format!("Apply {} change(s)?", pending.len()), args.yes)? {
        ui::info("Cancelled");
        return Ok(());
    }

    let transport = connect(ctx)?;
    let client: Client<'_> = GraphqlClient::new(&transport as &dyn Transport);

    for item in pending {
        let entry = item.entry;
        let handler = session.registry.require(&entry.kind)?;
        let outcome = match &item.action {
            Action::Create { .. } => handler.create(&client, &entry.body),
            Action::Update { observed, .. } => handler.update(&client, observed, &entry.body),
            Action::UpToDate { .. } => continue,
        };

        match outcome {
            Ok(Outcome { id, observed, result }) => {
                session
                    .state
                    .record(&entry.kind, &entry.name, CachedEntry::new(&id, &observed)?);
                ui::success(&format!("{} {} {}", verb(&result), entry.kind, entry.name));
                summary.add_result(&result);
            }
            Err(err) => {
                log::debug!("{} {} failed: {err:?}", entry.kind, entry.name);
                ui::error(&format!("{} {}: {err:#}", entry.kind, entry.name));
                summary.add_result(&ApplyResult::Failed {
                    error: format!("{err:#}"),
                });
            }
        }
    }

    session.save_state()?;
    println!();
    ui::summary(&summary);

    if !summary.is_success() {
        bail!("{} resource(s) failed to apply", summary.failed);
    }
    Ok(())
}

fn verb(result: &ApplyResult) -> &'static str {
    match result {
        ApplyResult::Created => "Created",
        ApplyResult::Modified => "Updated",
        ApplyResult::Removed => "Removed",
        ApplyResult::NoChange => "Unchanged",
        ApplyResult::Failed { .. } => "Failed",
        ApplyResult::Skipped { .. } => "Skipped",
    }
}
