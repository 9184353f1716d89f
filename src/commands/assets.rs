// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::errors::TriggerError;
use crate::models::{AssetDetails, Client};
use crate::push::PushSender;
use crate::store;
use crate::triggers::{self, TriggerEnv};
use crate::utils::{
    fmt_money, maybe_print_json, normalize_fund, parse_date, parse_decimal, pretty_table,
};
use anyhow::{Result, anyhow};
use chrono::NaiveDate;
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::Serialize;

pub fn handle(conn: &Connection, m: &clap::ArgMatches, push: &dyn PushSender) -> Result<()> {
    let env = TriggerEnv::load(conn, push)?;
    match m.subcommand() {
        Some(("set", sub)) => {
            let client = sub.get_one::<String>("client").unwrap().trim();
            let fund = sub.get_one::<String>("fund").unwrap();
            let asset_type = sub.get_one::<String>("type").unwrap();
            let amount = parse_decimal(sub.get_one::<String>("amount").unwrap().trim())?;
            let title = sub.get_one::<String>("title").map(|s| s.trim().to_string());
            let date = sub
                .get_one::<String>("date")
                .map(|s| parse_date(s.trim()))
                .transpose()?;
            let index = sub.get_one::<u32>("index").copied();
            let update = AssetUpdate {
                amount,
                display_title: title,
                open_date: date,
                index,
            };
            let c = set_asset(conn, &env, client, fund, asset_type, update)?;
            println!(
                "Set {} / {} for {} (fund total {})",
                normalize_fund(fund),
                asset_type.trim(),
                c.full_name(),
                fmt_money(&c.asset_total(&normalize_fund(fund)))
            );
        }
        Some(("rename", sub)) => {
            let client = sub.get_one::<String>("client").unwrap().trim();
            let fund = sub.get_one::<String>("fund").unwrap();
            let asset_type = sub.get_one::<String>("type").unwrap();
            let title = sub.get_one::<String>("title").unwrap();
            rename_asset(conn, &env, client, fund, asset_type, title)?;
            println!("Renamed {} / {} to '{}'", fund.trim(), asset_type.trim(), title.trim());
        }
        Some(("rm", sub)) => {
            let client = sub.get_one::<String>("client").unwrap().trim();
            let fund = sub.get_one::<String>("fund").unwrap();
            let asset_type = sub.get_one::<String>("type").unwrap();
            remove_asset(conn, &env, client, fund, asset_type)?;
            println!("Removed {} / {}", fund.trim(), asset_type.trim());
        }
        Some(("list", sub)) => list(conn, sub)?,
        _ => {}
    }
    Ok(())
}

#[derive(Debug, Clone, Default)]
pub struct AssetUpdate {
    pub amount: Decimal,
    pub display_title: Option<String>,
    pub open_date: Option<NaiveDate>,
    pub index: Option<u32>,
}

fn default_title(client: &Client, asset_type: &str) -> String {
    match asset_type {
        "personal" => client.full_name(),
        "company" => client
            .company_name
            .clone()
            .unwrap_or_else(|| client.full_name()),
        other => other.to_uppercase(),
    }
}

fn save_assets(
    conn: &Connection,
    env: &TriggerEnv<'_>,
    before: &Client,
    after: &mut Client,
) -> Result<()> {
    after.updated_at = env.now;
    store::save_client(conn, after)?;
    triggers::on_client_updated(conn, env, before, after);
    Ok(())
}

/// Creates or updates one fund/asset-type slot on a client.
pub fn set_asset(
    conn: &Connection,
    env: &TriggerEnv<'_>,
    client_id: &str,
    fund: &str,
    asset_type: &str,
    update: AssetUpdate,
) -> Result<Client> {
    let fund = normalize_fund(fund);
    let asset_type = asset_type.trim().to_ascii_lowercase();
    if fund.is_empty() || asset_type.is_empty() {
        return Err(TriggerError::InvalidArgument("fund and asset type are required".into()).into());
    }
    if update.amount.is_sign_negative() {
        return Err(anyhow!("Asset amount must not be negative"));
    }
    let before = store::require_client(conn, client_id)?;
    let mut after = before.clone();
    let next_index = after
        .assets
        .get(&fund)
        .map(|m| m.values().map(|a| a.index + 1).max().unwrap_or(0))
        .unwrap_or(0);
    let title = update
        .display_title
        .filter(|t| !t.is_empty());
    let default = default_title(&after, &asset_type);
    let slot = after.assets.entry(fund).or_default();
    match slot.get_mut(&asset_type) {
        Some(existing) => {
            existing.amount = update.amount;
            if let Some(t) = title {
                existing.display_title = t;
            }
            if update.open_date.is_some() {
                existing.open_date = update.open_date;
            }
            if let Some(i) = update.index {
                existing.index = i;
            }
        }
        None => {
            slot.insert(
                asset_type,
                AssetDetails {
                    amount: update.amount,
                    display_title: title.unwrap_or(default),
                    open_date: update.open_date,
                    index: update.index.unwrap_or(next_index),
                },
            );
        }
    }
    save_assets(conn, env, &before, &mut after)?;
    Ok(after)
}

pub fn rename_asset(
    conn: &Connection,
    env: &TriggerEnv<'_>,
    client_id: &str,
    fund: &str,
    asset_type: &str,
    title: &str,
) -> Result<Client> {
    let fund = normalize_fund(fund);
    let asset_type = asset_type.trim().to_ascii_lowercase();
    let title = title.trim();
    if title.is_empty() {
        return Err(TriggerError::InvalidArgument("title is required".into()).into());
    }
    let before = store::require_client(conn, client_id)?;
    let mut after = before.clone();
    let details = after
        .assets
        .get_mut(&fund)
        .and_then(|m| m.get_mut(&asset_type))
        .ok_or_else(|| {
            TriggerError::NotFound(format!("asset {}/{} on client '{}'", fund, asset_type, client_id))
        })?;
    details.display_title = title.to_string();
    save_assets(conn, env, &before, &mut after)?;
    Ok(after)
}

pub fn remove_asset(
    conn: &Connection,
    env: &TriggerEnv<'_>,
    client_id: &str,
    fund: &str,
    asset_type: &str,
) -> Result<Client> {
    let fund = normalize_fund(fund);
    let asset_type = asset_type.trim().to_ascii_lowercase();
    let before = store::require_client(conn, client_id)?;
    let mut after = before.clone();
    let removed = after
        .assets
        .get_mut(&fund)
        .and_then(|m| m.remove(&asset_type));
    if removed.is_none() {
        return Err(TriggerError::NotFound(format!(
            "asset {}/{} on client '{}'",
            fund, asset_type, client_id
        ))
        .into());
    }
    if after.assets.get(&fund).is_some_and(|m| m.is_empty()) {
        after.assets.remove(&fund);
    }
    save_assets(conn, env, &before, &mut after)?;
    Ok(after)
}

#[derive(Serialize)]
struct AssetRow {
    fund: String,
    asset_type: String,
    display_title: String,
    amount: Decimal,
    open_date: Option<NaiveDate>,
    index: u32,
}

fn list(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let json_flag = sub.get_flag("json");
    let jsonl_flag = sub.get_flag("jsonl");
    let client = store::require_client(conn, sub.get_one::<String>("client").unwrap().trim())?;
    let mut data = Vec::new();
    for (fund, types) in &client.assets {
        let mut entries: Vec<_> = types.iter().collect();
        entries.sort_by_key(|(_, a)| a.index);
        for (asset_type, a) in entries {
            data.push(AssetRow {
                fund: fund.clone(),
                asset_type: asset_type.clone(),
                display_title: a.display_title.clone(),
                amount: a.amount,
                open_date: a.open_date,
                index: a.index,
            });
        }
    }
    if !maybe_print_json(json_flag, jsonl_flag, &data)? {
        let rows = data
            .iter()
            .map(|r| {
                vec![
                    r.fund.clone(),
                    r.asset_type.clone(),
                    r.display_title.clone(),
                    fmt_money(&r.amount),
                    r.open_date.map(|d| d.to_string()).unwrap_or_default(),
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(&["Fund", "Type", "Title", "Amount", "Opened"], rows)
        );
    }
    Ok(())
}
