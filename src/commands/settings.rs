// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::config::Config;
use crate::utils::{get_primary_fund, normalize_fund, pretty_table, set_primary_fund};
use crate::ytd;
use anyhow::{Result, anyhow};
use chrono::Utc;
use rusqlite::Connection;
use tracing::info;

pub fn handle(conn: &Connection, m: &clap::ArgMatches, config: &Config) -> Result<()> {
    match m.subcommand() {
        Some(("show", _)) => {
            let rows = vec![
                vec!["database".into(), crate::db::db_path()?.display().to_string()],
                vec!["primary_fund".into(), get_primary_fund(conn)?],
                vec![
                    "push_endpoint".into(),
                    config
                        .push
                        .as_ref()
                        .map(|p| p.url.clone())
                        .unwrap_or_else(|| "(disabled)".into()),
                ],
                vec!["log_filter".into(), config.log_filter.clone()],
            ];
            println!("{}", pretty_table(&["Setting", "Value"], rows));
        }
        Some(("set-fund", sub)) => {
            let fund = normalize_fund(sub.get_one::<String>("fund").unwrap());
            if fund.is_empty() {
                return Err(anyhow!("Fund name must not be empty"));
            }
            set_primary_fund(conn, &fund)?;
            // Cached figures were computed against the previous fund.
            let n = ytd::recompute_all(conn, &fund, Utc::now())?.len();
            info!(fund = %fund, clients = n, "primary fund changed");
            println!("Primary fund set to {} ({} client(s) recomputed)", fund, n);
        }
        _ => {}
    }
    Ok(())
}
