// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Year-to-date aggregation.
//!
//! A client's YTD is the sum of its primary-fund profit and income activities
//! dated inside the current calendar year. Total YTD adds up the YTD of every
//! client reachable through `connected_users`, each counted once.

use crate::errors::TriggerResult;
use crate::models::Activity;
use crate::store::{self, ActivityFilter};
use crate::utils::year_bounds;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::debug;

pub type Adjacency = HashMap<String, Vec<String>>;

pub fn is_qualifying(a: &Activity, primary_fund: &str, now: DateTime<Utc>) -> bool {
    let (start, end) = year_bounds(now);
    a.fund == primary_fund && a.activity_type.is_ytd_qualifying() && a.time >= start && a.time < end
}

pub fn sum_qualifying<'a>(
    activities: impl IntoIterator<Item = &'a Activity>,
    primary_fund: &str,
    now: DateTime<Utc>,
) -> Decimal {
    activities
        .into_iter()
        .filter(|a| is_qualifying(a, primary_fund, now))
        .map(|a| a.amount)
        .sum()
}

pub fn client_ytd(
    conn: &Connection,
    client_id: &str,
    primary_fund: &str,
    now: DateTime<Utc>,
) -> TriggerResult<Decimal> {
    let (since, until) = year_bounds(now);
    let activities = store::list_activities(
        conn,
        &ActivityFilter {
            client_id: Some(client_id.to_string()),
            fund: Some(primary_fund.to_string()),
            since: Some(since),
            until: Some(until),
            limit: None,
        },
    )?;
    Ok(sum_qualifying(&activities, primary_fund, now))
}

pub fn load_adjacency(conn: &Connection) -> TriggerResult<Adjacency> {
    Ok(store::connection_lists(conn)?.into_iter().collect())
}

/// Breadth-first order of clients reachable from `root`, root first.
/// Ids absent from `adj` are dangling connections and are skipped.
pub fn reachable_from(adj: &Adjacency, root: &str) -> Vec<String> {
    let mut order = Vec::new();
    if !adj.contains_key(root) {
        return order;
    }
    let mut visited: HashSet<&str> = HashSet::new();
    let mut queue: VecDeque<&str> = VecDeque::new();
    visited.insert(root);
    queue.push_back(root);
    while let Some(id) = queue.pop_front() {
        order.push(id.to_string());
        for peer in adj.get(id).into_iter().flatten() {
            if adj.contains_key(peer.as_str()) && visited.insert(peer.as_str()) {
                queue.push_back(peer.as_str());
            }
        }
    }
    order
}

/// Every client whose total YTD includes `target`, target included.
pub fn clients_reaching(adj: &Adjacency, target: &str) -> Vec<String> {
    let mut reverse: HashMap<&str, Vec<&str>> = HashMap::new();
    for (id, peers) in adj {
        for peer in peers {
            reverse.entry(peer.as_str()).or_default().push(id.as_str());
        }
    }
    let mut order = Vec::new();
    if !adj.contains_key(target) {
        return order;
    }
    let mut visited: HashSet<&str> = HashSet::from([target]);
    let mut queue: VecDeque<&str> = VecDeque::from([target]);
    while let Some(id) = queue.pop_front() {
        order.push(id.to_string());
        for &src in reverse.get(id).into_iter().flatten() {
            if visited.insert(src) {
                queue.push_back(src);
            }
        }
    }
    order
}

pub fn total_ytd(
    conn: &Connection,
    root_id: &str,
    primary_fund: &str,
    now: DateTime<Utc>,
) -> TriggerResult<Decimal> {
    let adj = load_adjacency(conn)?;
    total_ytd_with(conn, &adj, root_id, primary_fund, now)
}

fn total_ytd_with(
    conn: &Connection,
    adj: &Adjacency,
    root_id: &str,
    primary_fund: &str,
    now: DateTime<Utc>,
) -> TriggerResult<Decimal> {
    let mut total = Decimal::ZERO;
    for id in reachable_from(adj, root_id) {
        total += client_ytd(conn, &id, primary_fund, now)?;
    }
    Ok(total)
}

#[derive(Debug, Clone, PartialEq)]
pub struct YtdRefresh {
    pub client_id: String,
    pub ytd: Decimal,
    /// (client id, new total) for every client whose total was rewritten.
    pub totals: Vec<(String, Decimal)>,
}

/// Recomputes `client_id`'s YTD and the total YTD of every client that reaches it.
pub fn refresh_for_client(
    conn: &Connection,
    client_id: &str,
    primary_fund: &str,
    now: DateTime<Utc>,
) -> TriggerResult<YtdRefresh> {
    let ytd = client_ytd(conn, client_id, primary_fund, now)?;
    store::set_ytd(conn, client_id, ytd)?;

    let adj = load_adjacency(conn)?;
    let mut totals = Vec::new();
    for id in clients_reaching(&adj, client_id) {
        let total = total_ytd_with(conn, &adj, &id, primary_fund, now)?;
        store::set_total_ytd(conn, &id, total)?;
        totals.push((id, total));
    }
    debug!(client_id, %ytd, updated = totals.len(), "ytd refreshed");
    Ok(YtdRefresh {
        client_id: client_id.to_string(),
        ytd,
        totals,
    })
}

/// Recomputes YTD and total YTD for every client.
pub fn recompute_all(
    conn: &Connection,
    primary_fund: &str,
    now: DateTime<Utc>,
) -> TriggerResult<Vec<(String, Decimal, Decimal)>> {
    let adj = load_adjacency(conn)?;
    let mut ytds: HashMap<String, Decimal> = HashMap::with_capacity(adj.len());
    for id in adj.keys() {
        let ytd = client_ytd(conn, id, primary_fund, now)?;
        store::set_ytd(conn, id, ytd)?;
        ytds.insert(id.clone(), ytd);
    }
    let mut out = Vec::with_capacity(adj.len());
    for (id, ytd) in &ytds {
        let total: Decimal = reachable_from(&adj, id)
            .iter()
            .filter_map(|peer| ytds.get(peer))
            .sum();
        store::set_total_ytd(conn, id, total)?;
        out.push((id.clone(), *ytd, total));
    }
    out.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(out)
}
