// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::Result;

use fundclip::config::{Config, init_tracing};
use fundclip::{cli, commands, db, push};

fn main() -> Result<()> {
    let config = Config::from_env();
    init_tracing(&config);

    let cli = cli::build_cli();
    let matches = cli.get_matches();

    let conn = db::open_or_init()?;
    let sender = push::sender_for(config.push.as_ref())?;

    match matches.subcommand() {
        Some(("init", _)) => {
            println!("Database initialized at {}", db::db_path()?.display());
        }
        Some(("client", sub)) => commands::clients::handle(&conn, sub, sender.as_ref())?,
        Some(("asset", sub)) => commands::assets::handle(&conn, sub, sender.as_ref())?,
        Some(("activity", sub)) => commands::activities::handle(&conn, sub, sender.as_ref())?,
        Some(("ytd", sub)) => commands::reports::handle(&conn, sub)?,
        Some(("notification", sub)) => commands::notifications::handle(&conn, sub)?,
        Some(("device", sub)) => commands::devices::handle(&conn, sub)?,
        Some(("config", sub)) => commands::settings::handle(&conn, sub, &config)?,
        Some(("doctor", _)) => commands::doctor::handle(&conn)?,
        _ => {
            cli::build_cli().print_help()?;
            println!();
        }
    }
    Ok(())
}
