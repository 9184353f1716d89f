// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::errors::TriggerError;
use crate::models::{Client, ClientForm};
use crate::push::PushSender;
use crate::store;
use crate::triggers::{self, TriggerEnv};
use crate::utils::{fmt_money, maybe_print_json, parse_date, parse_decimal, pretty_table};
use crate::validation::validate_client;
use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use tracing::info;

pub fn handle(conn: &Connection, m: &clap::ArgMatches, push: &dyn PushSender) -> Result<()> {
    let env = TriggerEnv::load(conn, push)?;
    match m.subcommand() {
        Some(("add", sub)) => {
            let form = form_from_args(sub)?;
            let c = create_client(conn, &form, env.now)?;
            println!("Added client '{}' ({})", c.full_name(), c.id);
        }
        Some(("list", sub)) => list(conn, sub)?,
        Some(("show", sub)) => show(conn, sub)?,
        Some(("edit", sub)) => {
            let id = sub.get_one::<String>("id").unwrap().trim();
            let form = form_from_args(sub)?;
            let c = edit_client(conn, &env, id, &form)?;
            println!("Updated client '{}' ({})", c.full_name(), c.id);
        }
        Some(("rm", sub)) => {
            let id = sub.get_one::<String>("id").unwrap().trim();
            let purge = sub.get_flag("purge-activities");
            let c = delete_client(conn, &env, id, purge)?;
            println!("Removed client '{}' ({})", c.full_name(), c.id);
        }
        Some(("connect", sub)) => {
            let id = sub.get_one::<String>("id").unwrap();
            let peer = sub.get_one::<String>("peer").unwrap();
            let c = triggers::connect_users(conn, &env, id, peer)?;
            println!(
                "Connected {} -> {} (total YTD {})",
                c.id,
                peer.trim(),
                fmt_money(&c.total_ytd)
            );
        }
        Some(("disconnect", sub)) => {
            let id = sub.get_one::<String>("id").unwrap();
            let peer = sub.get_one::<String>("peer").unwrap();
            let c = triggers::disconnect_users(conn, &env, id, peer)?;
            println!(
                "Disconnected {} -> {} (total YTD {})",
                c.id,
                peer.trim(),
                fmt_money(&c.total_ytd)
            );
        }
        Some(("link", sub)) => {
            let id = sub.get_one::<String>("id").unwrap();
            let uid = sub.get_one::<String>("uid").unwrap();
            let c = triggers::link_user(conn, &env, id, uid)?;
            println!("Linked account {} to client {}", uid.trim(), c.id);
        }
        Some(("unlink", sub)) => {
            let id = sub.get_one::<String>("id").unwrap();
            let c = triggers::unlink_user(conn, &env, id)?;
            println!("Unlinked account from client {}", c.id);
        }
        _ => {}
    }
    Ok(())
}

pub fn form_from_args(sub: &clap::ArgMatches) -> Result<ClientForm> {
    let text = |name: &str| {
        sub.get_one::<String>(name)
            .map(|s| s.trim().to_string())
    };
    Ok(ClientForm {
        first_name: text("first"),
        last_name: text("last"),
        company_name: text("company"),
        email: text("email"),
        phone: text("phone"),
        address: text("address"),
        dob: text("dob").map(|s| parse_date(&s)).transpose()?,
        initial_margin: text("initial-margin")
            .map(|s| parse_decimal(&s))
            .transpose()?,
        notes: text("notes"),
    })
}

fn non_empty(v: Option<&String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

pub fn create_client(conn: &Connection, form: &ClientForm, now: DateTime<Utc>) -> Result<Client> {
    validate_client(form)?;
    let client = Client {
        id: uuid::Uuid::new_v4().to_string(),
        first_name: non_empty(form.first_name.as_ref()).unwrap_or_default(),
        last_name: non_empty(form.last_name.as_ref()).unwrap_or_default(),
        company_name: non_empty(form.company_name.as_ref()),
        email: non_empty(form.email.as_ref()).unwrap_or_default(),
        phone: non_empty(form.phone.as_ref()).unwrap_or_default(),
        address: non_empty(form.address.as_ref()).unwrap_or_default(),
        dob: form.dob,
        initial_margin: form.initial_margin.unwrap_or(Decimal::ZERO),
        notes: non_empty(form.notes.as_ref()),
        assets: BTreeMap::new(),
        connected_users: Vec::new(),
        uid: None,
        uid_grants: Vec::new(),
        ytd: Decimal::ZERO,
        total_ytd: Decimal::ZERO,
        created_at: now,
        updated_at: now,
    };
    store::insert_client(conn, &client)?;
    info!(client_id = %client.id, "client created");
    Ok(client)
}

/// Applies the populated fields of `form` on top of the stored client.
/// An empty `company` clears the company name.
pub fn edit_client(
    conn: &Connection,
    env: &TriggerEnv<'_>,
    id: &str,
    form: &ClientForm,
) -> Result<Client> {
    let before = store::require_client(conn, id)?;
    let mut after = before.clone();
    if let Some(v) = non_empty(form.first_name.as_ref()) {
        after.first_name = v;
    }
    if let Some(v) = non_empty(form.last_name.as_ref()) {
        after.last_name = v;
    }
    if form.company_name.is_some() {
        after.company_name = non_empty(form.company_name.as_ref());
    }
    if let Some(v) = non_empty(form.email.as_ref()) {
        after.email = v;
    }
    if let Some(v) = non_empty(form.phone.as_ref()) {
        after.phone = v;
    }
    if let Some(v) = non_empty(form.address.as_ref()) {
        after.address = v;
    }
    if form.dob.is_some() {
        after.dob = form.dob;
    }
    if let Some(m) = form.initial_margin {
        after.initial_margin = m;
    }
    if form.notes.is_some() {
        after.notes = non_empty(form.notes.as_ref());
    }
    validate_client(&ClientForm {
        first_name: Some(after.first_name.clone()),
        last_name: Some(after.last_name.clone()),
        company_name: after.company_name.clone(),
        email: Some(after.email.clone()),
        phone: Some(after.phone.clone()),
        address: Some(after.address.clone()),
        dob: after.dob,
        initial_margin: Some(after.initial_margin),
        notes: after.notes.clone(),
    })?;
    after.updated_at = env.now;
    store::save_client(conn, &after)?;
    triggers::on_client_updated(conn, env, &before, &after);
    Ok(after)
}

pub fn delete_client(
    conn: &Connection,
    env: &TriggerEnv<'_>,
    id: &str,
    purge_activities: bool,
) -> Result<Client> {
    let client = store::require_client(conn, id)?;
    let tx = conn.unchecked_transaction()?;
    if !store::delete_client(&tx, id)? {
        return Err(TriggerError::NotFound(format!("client '{}'", id)).into());
    }
    if purge_activities {
        let n = store::delete_activities_for_client(&tx, id)?;
        info!(client_id = id, removed = n, "client activities purged");
    }
    tx.commit()?;
    triggers::on_client_deleted(conn, env, &client);
    info!(client_id = id, "client deleted");
    Ok(client)
}

fn list(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let json_flag = sub.get_flag("json");
    let jsonl_flag = sub.get_flag("jsonl");
    let clients = store::list_clients(conn)?;
    if !maybe_print_json(json_flag, jsonl_flag, &clients)? {
        let rows = clients
            .iter()
            .map(|c| {
                vec![
                    c.id.clone(),
                    c.full_name(),
                    c.company_name.clone().unwrap_or_default(),
                    c.email.clone(),
                    c.uid.clone().unwrap_or_default(),
                    c.connected_users.len().to_string(),
                    fmt_money(&c.ytd),
                    fmt_money(&c.total_ytd),
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(
                &["ID", "Name", "Company", "Email", "Account", "Connected", "YTD", "Total YTD"],
                rows,
            )
        );
    }
    Ok(())
}

fn show(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let json_flag = sub.get_flag("json");
    let jsonl_flag = sub.get_flag("jsonl");
    let id = sub.get_one::<String>("id").unwrap().trim();
    let c = store::require_client(conn, id)?;
    if maybe_print_json(json_flag, jsonl_flag, &c)? {
        return Ok(());
    }
    let rows = vec![
        vec!["ID".into(), c.id.clone()],
        vec!["Name".into(), c.full_name()],
        vec!["Company".into(), c.company_name.clone().unwrap_or_default()],
        vec!["Email".into(), c.email.clone()],
        vec!["Phone".into(), c.phone.clone()],
        vec!["Address".into(), c.address.clone()],
        vec![
            "DOB".into(),
            c.dob.map(|d| d.to_string()).unwrap_or_default(),
        ],
        vec!["Initial margin".into(), fmt_money(&c.initial_margin)],
        vec!["Account".into(), c.uid.clone().unwrap_or_default()],
        vec!["Connected".into(), c.connected_users.join(", ")],
        vec!["Access grants".into(), c.uid_grants.join(", ")],
        vec!["YTD".into(), fmt_money(&c.ytd)],
        vec!["Total YTD".into(), fmt_money(&c.total_ytd)],
        vec!["Notes".into(), c.notes.clone().unwrap_or_default()],
    ];
    println!("{}", pretty_table(&["Field", "Value"], rows));
    Ok(())
}
