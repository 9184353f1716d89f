// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::store;
use anyhow::{Result, anyhow};
use rusqlite::Connection;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => {
            let uid = sub.get_one::<String>("uid").unwrap().trim();
            let token = sub.get_one::<String>("token").unwrap().trim();
            if uid.is_empty() || token.is_empty() {
                return Err(anyhow!("Both uid and token are required"));
            }
            store::add_device(conn, uid, token)?;
            println!("Registered device for {}", uid);
        }
        Some(("rm", sub)) => {
            let uid = sub.get_one::<String>("uid").unwrap().trim();
            let token = sub.get_one::<String>("token").unwrap().trim();
            if store::remove_device(conn, uid, token)? {
                println!("Removed device for {}", uid);
            } else {
                println!("No such device for {}", uid);
            }
        }
        _ => {}
    }
    Ok(())
}
