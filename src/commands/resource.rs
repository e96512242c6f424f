//! Single-resource commands: read and delete.

use super::{Session, confirm, connect};
use crate::Context;
use crate::cli::{DeleteArgs, TargetArgs};
use crate::registry::Client;
use crate::state::CachedEntry;
use crate::ui;
use anyhow::{Context as _, Result};
use policy::{GraphqlClient, Transport};

pub fn read(ctx: &Context, args: TargetArgs) -> Result<()> {
    let mut session = Session::open(ctx)?;
    let handler = session.registry.require(&args.kind)?;
    let id = cached_id(&session, &args)?;

    let transport = connect(ctx)?;
    let client: Client<'_> = GraphqlClient::new(&transport as &dyn Transport);

    match handler.read(&client, &id)? {
        Some(observed) => {
            session
                .state
                .record(&args.kind, &args.name, CachedEntry::new(&id, &observed)?);
            session.save_state()?;
            ui::header(&format!("{} {}", args.kind, args.name));
            ui::kv("id", &id);
            ui::block(&serde_json::to_string_pretty(&observed)?);
        }
        None => {
            session.state.forget(&args.kind, &args.name);
            session.save_state()?;
            ui::warn(&format!(
                "{} {} ({id}) no longer exists; removed it from the cache",
                args.kind, args.name
            ));
        }
    }
    Ok(())
}

pub fn delete(ctx: &Context, args: DeleteArgs) -> Result<()> {
    let target = args.target;
    let mut session = Session::open(ctx)?;
    let handler = session.registry.require(&target.kind)?;
    let id = cached_id(&session, &target)?;

    if !confirm(&format!("Delete {} {} ({id})?", target.kind, target.name), args.yes)? {
        ui::info("Cancelled");
        return Ok(());
    }

    let transport = connect(ctx)?;
    let client: Client<'_> = GraphqlClient::new(&transport as &dyn Transport);

    handler
        .delete(&client, &id)
        .with_context(|| format!("Failed to delete {} {}", target.kind, target.name))?;

    session.state.forget(&target.kind, &target.name);
    session.save_state()?;
    ui::success(&format!("Deleted {} {}", target.kind, target.name));
    Ok(())
}

fn cached_id(session: &Session, target: &TargetArgs) -> Result<String> {
    session
        .state
        .get(&target.kind, &target.name)
        .map(|entry| entry.id.clone())
        .with_context(|| {
            format!(
                "{} {} is not in the state cache; apply it first",
                target.kind, target.name
            )
        })
}
