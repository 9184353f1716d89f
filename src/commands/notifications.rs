// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::store;
use crate::utils::{maybe_print_json, pretty_table};
use anyhow::Result;
use rusqlite::Connection;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("list", sub)) => {
            let json_flag = sub.get_flag("json");
            let jsonl_flag = sub.get_flag("jsonl");
            let uid = sub.get_one::<String>("uid").unwrap().trim();
            let data = store::list_notifications(conn, uid, sub.get_flag("unread"))?;
            if !maybe_print_json(json_flag, jsonl_flag, &data)? {
                let rows = data
                    .into_iter()
                    .map(|n| {
                        vec![
                            n.created_at.format("%Y-%m-%d %H:%M").to_string(),
                            n.title,
                            n.body,
                            if n.is_read { "" } else { "unread" }.to_string(),
                            n.id,
                        ]
                    })
                    .collect();
                println!(
                    "{}",
                    pretty_table(&["Created", "Title", "Message", "Status", "ID"], rows)
                );
            }
        }
        Some(("read", sub)) => {
            let id = sub.get_one::<String>("id").unwrap().trim();
            store::mark_notification_read(conn, id)?;
            println!("Marked notification {} as read", id);
        }
        _ => {}
    }
    Ok(())
}
