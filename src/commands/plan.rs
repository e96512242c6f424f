use super::Session;
use crate::Context;
use crate::cli::SelectArgs;
use crate::manifest::{Declared, Manifest};
use crate::ui;
use anyhow::{Context as _, Result};
use colored::Colorize;
use serde_json::{Map, Value};

/// What apply would do with one declared entry
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Create {
        payload: Value,
    },
    Update {
        id: String,
        observed: Value,
        payload: Value,
    },
    UpToDate {
        id: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Planned<'m> {
    pub entry: &'m Declared,
    pub action: Action,
}

impl Planned<'_> {
    pub fn is_change(&self) -> bool {
        !matches!(self.action, Action::UpToDate { .. })
    }
}

/// Plan every selected entry against the cached observations
pub fn build<'m>(
    session: &Session,
    manifest: &'m Manifest,
    kind: Option<&'m str>,
    name: Option<&'m str>,
) -> Result<Vec<Planned<'m>>> {
    let mut planned = Vec::new();
    for entry in manifest.select(kind, name) {
        let handler = session.registry.require(&entry.kind)?;
        let action = match session.state.get(&entry.kind, &entry.name) {
            Some(cached) => {
                let observed = cached.observed()?;
                match handler
                    .update_payload(&observed, &entry.body)
                    .with_context(|| format!("Cannot plan {} {}", entry.kind, entry.name))?
                {
                    Some(payload) => Action::Update {
                        id: cached.id.clone(),
                        observed,
                        payload,
                    },
                    None => Action::UpToDate {
                        id: cached.id.clone(),
                    },
                }
            }
            None => Action::Create {
                payload: handler
                    .create_payload(&entry.body)
                    .with_context(|| format!("Cannot plan {} {}", entry.kind, entry.name))?,
            },
        };
        planned.push(Planned { entry, action });
    }
    Ok(planned)
}

/// The observed fields that `desired` declares, so the diff leaves out
/// IDs and other backend-only fields.
pub fn project(observed: &Value, desired: &Value) -> Value {
    match desired {
        Value::Object(fields) => {
            let projected: Map<String, Value> = fields
                .keys()
                .map(|key| (key.clone(), observed.get(key).cloned().unwrap_or(Value::Null)))
                .collect();
            Value::Object(projected)
        }
        _ => observed.clone(),
    }
}

fn pretty(value: &Value) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

pub fn show(session: &Session, planned: &Planned<'_>) -> Result<()> {
    let entry = planned.entry;
    match &planned.action {
        Action::Create { payload } => {
            println!("{} {} {}", "+".green().bold(), entry.kind, entry.name.bold());
            ui::block(&pretty(payload)?);
        }
        Action::Update {
            id,
            observed,
            payload,
        } => {
            println!(
                "{} {} {} {}",
                "~".yellow().bold(),
                entry.kind,
                entry.name.bold(),
                format!("({id})").dimmed()
            );
            ui::block(&pretty(payload)?);
            let desired = session.registry.require(&entry.kind)?.normalize(&entry.body)?;
            ui::line_diff(&pretty(&project(observed, &desired))?, &pretty(&desired)?);
        }
        Action::UpToDate { .. } => {
            ui::dim(&format!("{} {} is up to date", entry.kind, entry.name));
        }
    }
    Ok(())
}

pub fn run(ctx: &Context, args: SelectArgs) -> Result<()> {
    let session = Session::open(ctx)?;
    let manifest = session.manifest(args.manifest.as_deref())?;
    let planned = build(&session, &manifest, args.kind.as_deref(), args.name.as_deref())?;

    ui::header("Plan");
    for item in &planned {
        show(&session, item)?;
    }

    for (kind, entries) in &session.state.resources {
        if args.kind.as_deref().is_some_and(|k| k != kind) {
            continue;
        }
        for name in entries.keys() {
            let declared = manifest.select(Some(kind), Some(name)).next().is_some();
            if !declared && args.name.as_deref().is_none_or(|n| n == name) {
                ui::warn(&format!(
                    "{kind} {name} is cached but no longer declared; remove it with `policyctl delete {kind} {name}`"
                ));
            }
        }
    }

    let creates = planned
        .iter()
        .filter(|p| matches!(p.action, Action::Create { .. }))
        .count();
    let updates = planned
        .iter()
        .filter(|p| matches!(p.action, Action::Update { .. }))
        .count();
    println!();
    ui::info(&format!(
        "{creates} to create, {updates} to update, {} unchanged",
        planned.len() - creates - updates
    ));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;
    use crate::state::{CachedEntry, StateCache};
    use serde_json::json;
    use std::path::PathBuf;

    const MANIFEST: &str = r#"
[[trusted_sources]]
name = "office"
sources_identifiers = ["10.0.0.0/8"]

[[trusted_sources]]
name = "vpn"
sources_identifiers = ["172.16.0.0/12"]

[[web_user_response]]
name = "blocked"
mode = "BlockPage"
"#;

    fn session() -> Session {
        let mut state = StateCache::default();
        let office = json!({
            "id": "ts-1",
            "name": "office",
            "visibility": "Shared",
            "sources_identifiers": ["10.0.0.0/8", "192.168.0.0/16"],
            "sources_identifiers_ids": ["10.0.0.0/8;;;s-1", "192.168.0.0/16;;;s-2"]
        });
        let vpn = json!({
            "id": "ts-2",
            "name": "vpn",
            "visibility": "Shared",
            "sources_identifiers": ["172.16.0.0/12"],
            "sources_identifiers_ids": ["172.16.0.0/12;;;s-3"]
        });
        state.record("trusted_sources", "office", CachedEntry::new("ts-1", &office).unwrap());
        state.record("trusted_sources", "vpn", CachedEntry::new("ts-2", &vpn).unwrap());
        Session {
            registry: Registry::standard(),
            state,
            state_path: PathBuf::from("unused.toml"),
        }
    }

    #[test]
    fn test_build_plan() {
        let session = session();
        let manifest = Manifest::parse(MANIFEST).unwrap();

        let planned = build(&session, &manifest, None, None).unwrap();

        assert_eq!(planned.len(), 3);
        assert_eq!(
            planned[0].action,
            Action::Update {
                id: "ts-1".to_string(),
                observed: session.state.get("trusted_sources", "office").unwrap().observed().unwrap(),
                payload: json!({"removeSourcesIdentifiers": ["s-2"]}),
            }
        );
        assert_eq!(planned[1].action, Action::UpToDate { id: "ts-2".to_string() });
        assert!(matches!(planned[2].action, Action::Create { .. }));
        assert_eq!(planned.iter().filter(|p| p.is_change()).count(), 2);
    }

    #[test]
    fn test_build_plan_with_filter() {
        let session = session();
        let manifest = Manifest::parse(MANIFEST).unwrap();

        let planned = build(&session, &manifest, Some("web_user_response"), None).unwrap();

        assert_eq!(planned.len(), 1);
        match &planned[0].action {
            Action::Create { payload } => assert_eq!(payload["mode"], json!("BlockPage")),
            other => panic!("expected create, got {other:?}"),
        }
    }

    #[test]
    fn test_project_keeps_declared_fields() {
        let observed = json!({"id": "ts-1", "name": "office", "sources_identifiers_ids": ["a;;;1"]});
        let desired = json!({"name": "office", "min_num_of_sources": 2});

        assert_eq!(
            project(&observed, &desired),
            json!({"name": "office", "min_num_of_sources": null})
        );
    }
}
