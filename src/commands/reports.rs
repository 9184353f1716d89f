// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::store;
use crate::utils::{fmt_money, get_primary_fund, maybe_print_json, pretty_table};
use crate::ytd;
use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::Serialize;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("show", sub)) => show(conn, sub)?,
        Some(("recompute", sub)) => recompute(conn, sub)?,
        _ => {}
    }
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct YtdRow {
    pub client_id: String,
    pub name: String,
    pub ytd: Decimal,
    pub total_ytd: Decimal,
    /// Stored values differ from a fresh computation.
    pub stale: bool,
}

/// Fresh YTD figures beside the cached ones, for one client or all.
pub fn ytd_rows(
    conn: &Connection,
    client_id: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Vec<YtdRow>> {
    let fund = get_primary_fund(conn)?;
    let clients = match client_id {
        Some(id) => vec![store::require_client(conn, id)?],
        None => store::list_clients(conn)?,
    };
    let adj = ytd::load_adjacency(conn)?;
    let mut rows = Vec::with_capacity(clients.len());
    for c in clients {
        let fresh = ytd::client_ytd(conn, &c.id, &fund, now)?;
        let mut total = Decimal::ZERO;
        for id in ytd::reachable_from(&adj, &c.id) {
            total += ytd::client_ytd(conn, &id, &fund, now)?;
        }
        rows.push(YtdRow {
            stale: fresh != c.ytd || total != c.total_ytd,
            name: c.full_name(),
            client_id: c.id,
            ytd: fresh,
            total_ytd: total,
        });
    }
    Ok(rows)
}

fn show(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let json_flag = sub.get_flag("json");
    let jsonl_flag = sub.get_flag("jsonl");
    let client = sub.get_one::<String>("client").map(|s| s.trim());
    let rows = ytd_rows(conn, client, Utc::now())?;
    if !maybe_print_json(json_flag, jsonl_flag, &rows)? {
        let data = rows
            .iter()
            .map(|r| {
                vec![
                    r.client_id.clone(),
                    r.name.clone(),
                    fmt_money(&r.ytd),
                    fmt_money(&r.total_ytd),
                    if r.stale { "stale" } else { "" }.to_string(),
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(&["ID", "Name", "YTD", "Total YTD", "Cache"], data)
        );
    }
    Ok(())
}

fn recompute(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let fund = get_primary_fund(conn)?;
    let now = Utc::now();
    match sub.get_one::<String>("client").map(|s| s.trim()) {
        Some(id) => {
            store::require_client(conn, id)?;
            let r = ytd::refresh_for_client(conn, id, &fund, now)?;
            println!(
                "YTD for {} is {}; refreshed {} total(s)",
                r.client_id,
                fmt_money(&r.ytd),
                r.totals.len()
            );
        }
        None => {
            let all = ytd::recompute_all(conn, &fund, now)?;
            println!("Recomputed YTD for {} client(s)", all.len());
        }
    }
    Ok(())
}
