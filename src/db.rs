// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use once_cell::sync::Lazy;
use rusqlite::Connection;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

static APP: Lazy<(&str, &str, &str)> =
    Lazy::new(|| ("com.alphavelocity", "Fundclip", "fundclip"));

/// Overrides the platform data dir when set.
pub const DB_PATH_ENV: &str = "FUNDCLIP_DB";

pub fn db_path() -> Result<PathBuf> {
    if let Some(p) = std::env::var_os(DB_PATH_ENV).filter(|p| !p.is_empty()) {
        return Ok(PathBuf::from(p));
    }
    let proj = ProjectDirs::from(APP.0, APP.1, APP.2)
        .context("Could not determine platform-specific data dir")?;
    let data_dir = proj.data_dir();
    fs::create_dir_all(data_dir).context("Failed to create data dir")?;
    Ok(data_dir.join("fundclip.sqlite"))
}

pub fn open_or_init() -> Result<Connection> {
    let path = db_path()?;
    let mut conn =
        Connection::open(&path).with_context(|| format!("Open DB at {}", path.display()))?;
    init_schema(&mut conn)?;
    debug!(path = %path.display(), "database ready");
    Ok(conn)
}

pub fn open_in_memory() -> Result<Connection> {
    let mut conn = Connection::open_in_memory()?;
    init_schema(&mut conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &mut Connection) -> Result<()> {
    conn.execute_batch(
        r#"
    CREATE TABLE IF NOT EXISTS settings(
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );

    -- Nested maps and id lists are stored as JSON documents.
    CREATE TABLE IF NOT EXISTS clients(
        id TEXT PRIMARY KEY,
        first_name TEXT NOT NULL,
        last_name TEXT NOT NULL,
        company_name TEXT,
        email TEXT NOT NULL,
        phone TEXT NOT NULL,
        address TEXT NOT NULL,
        dob TEXT,
        initial_margin TEXT NOT NULL DEFAULT '0',
        notes TEXT,
        assets TEXT NOT NULL DEFAULT '{}',
        connected_users TEXT NOT NULL DEFAULT '[]',
        uid TEXT UNIQUE,
        uid_grants TEXT NOT NULL DEFAULT '[]',
        ytd TEXT NOT NULL DEFAULT '0',
        total_ytd TEXT NOT NULL DEFAULT '0',
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    -- client_id is a soft reference: no cascade.
    CREATE TABLE IF NOT EXISTS activities(
        id TEXT PRIMARY KEY,
        client_id TEXT NOT NULL,
        type TEXT NOT NULL,
        amount TEXT NOT NULL,
        fund TEXT NOT NULL,
        recipient TEXT NOT NULL,
        time TEXT NOT NULL,
        send_notif INTEGER NOT NULL DEFAULT 0,
        is_dividend INTEGER NOT NULL DEFAULT 0,
        parent_name TEXT NOT NULL DEFAULT ''
    );
    CREATE INDEX IF NOT EXISTS idx_activities_client ON activities(client_id, time);
    CREATE INDEX IF NOT EXISTS idx_activities_recipient ON activities(client_id, fund, recipient);

    CREATE TABLE IF NOT EXISTS notifications(
        id TEXT PRIMARY KEY,
        uid TEXT NOT NULL,
        client_id TEXT NOT NULL,
        activity_id TEXT NOT NULL,
        type TEXT NOT NULL,
        title TEXT NOT NULL,
        body TEXT NOT NULL,
        created_at TEXT NOT NULL,
        is_read INTEGER NOT NULL DEFAULT 0
    );
    CREATE INDEX IF NOT EXISTS idx_notifications_uid ON notifications(uid, created_at);

    CREATE TABLE IF NOT EXISTS devices(
        uid TEXT NOT NULL,
        token TEXT NOT NULL,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        PRIMARY KEY(uid, token)
    );
    "#,
    )?;
    Ok(())
}
