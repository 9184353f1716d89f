// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::store::{self, ActivityFilter};
use crate::utils::pretty_table;
use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use std::collections::HashMap;

pub fn handle(conn: &Connection) -> Result<()> {
    let rows: Vec<Vec<String>> = diagnose(conn, Utc::now())?
        .into_iter()
        .map(|(issue, detail)| vec![issue, detail])
        .collect();
    if rows.is_empty() {
        println!("✅ doctor: no issues found");
    } else {
        println!("{}", pretty_table(&["Issue", "Detail"], rows));
    }
    Ok(())
}

/// Returns (issue, detail) pairs for every inconsistency found.
pub fn diagnose(conn: &Connection, now: DateTime<Utc>) -> Result<Vec<(String, String)>> {
    let mut issues = Vec::new();
    let clients = store::list_clients(conn)?;
    let by_id: HashMap<&str, _> = clients.iter().map(|c| (c.id.as_str(), c)).collect();

    // 1) Activities pointing at missing clients or carrying a stale recipient
    for a in store::list_activities(conn, &ActivityFilter::default())? {
        match by_id.get(a.client_id.as_str()) {
            None => issues.push((
                "orphan_activity".into(),
                format!("{} -> client {}", a.id, a.client_id),
            )),
            Some(c) if !c.recipient_names().contains(&a.recipient) => issues.push((
                "recipient_mismatch".into(),
                format!("{} '{}' on {}", a.id, a.recipient, c.id),
            )),
            _ => {}
        }
    }

    // 2) Dangling connections and missing access grants
    for c in &clients {
        for peer in &c.connected_users {
            match by_id.get(peer.as_str()) {
                None => issues.push((
                    "dangling_connection".into(),
                    format!("{} -> {}", c.id, peer),
                )),
                Some(p) => {
                    if let Some(ref uid) = c.uid {
                        if !p.uid_grants.contains(uid) {
                            issues.push((
                                "missing_grant".into(),
                                format!("{} lacks grant for {} ({})", p.id, uid, c.id),
                            ));
                        }
                    }
                }
            }
        }
    }

    // 3) Cached YTD figures out of date
    for row in super::reports::ytd_rows(conn, None, now)? {
        if row.stale {
            issues.push(("stale_ytd".into(), row.client_id));
        }
    }
    Ok(issues)
}
