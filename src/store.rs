// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Document reads and writes for clients, activities, notifications and devices.

use crate::errors::{TriggerError, TriggerResult};
use crate::models::{Activity, ActivityType, AssetMap, Client, Notification};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use rust_decimal::Decimal;

/// Upper bound on documents written in one batch.
pub const MAX_BATCH_WRITES: usize = 500;

const CLIENT_COLUMNS: &str = "id, first_name, last_name, company_name, email, phone, address, dob, \
     initial_margin, notes, assets, connected_users, uid, uid_grants, ytd, total_ytd, created_at, updated_at";

const ACTIVITY_COLUMNS: &str =
    "id, client_id, type, amount, fund, recipient, time, send_notif, is_dividend, parent_name";

pub fn ts(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn parse_ts(doc: &str, field: &'static str, raw: &str) -> TriggerResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| corrupt(doc, field, raw))
}

fn parse_dec(doc: &str, field: &'static str, raw: &str) -> TriggerResult<Decimal> {
    raw.parse::<Decimal>().map_err(|_| corrupt(doc, field, raw))
}

fn corrupt(doc: &str, field: &'static str, raw: &str) -> TriggerError {
    TriggerError::Corrupt {
        doc: doc.to_string(),
        field,
        value: raw.to_string(),
    }
}

struct ClientRow {
    id: String,
    first_name: String,
    last_name: String,
    company_name: Option<String>,
    email: String,
    phone: String,
    address: String,
    dob: Option<String>,
    initial_margin: String,
    notes: Option<String>,
    assets: String,
    connected_users: String,
    uid: Option<String>,
    uid_grants: String,
    ytd: String,
    total_ytd: String,
    created_at: String,
    updated_at: String,
}

impl ClientRow {
    fn read(r: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(ClientRow {
            id: r.get(0)?,
            first_name: r.get(1)?,
            last_name: r.get(2)?,
            company_name: r.get(3)?,
            email: r.get(4)?,
            phone: r.get(5)?,
            address: r.get(6)?,
            dob: r.get(7)?,
            initial_margin: r.get(8)?,
            notes: r.get(9)?,
            assets: r.get(10)?,
            connected_users: r.get(11)?,
            uid: r.get(12)?,
            uid_grants: r.get(13)?,
            ytd: r.get(14)?,
            total_ytd: r.get(15)?,
            created_at: r.get(16)?,
            updated_at: r.get(17)?,
        })
    }

    fn into_client(self) -> TriggerResult<Client> {
        let doc = format!("clients/{}", self.id);
        let dob = match self.dob.as_deref() {
            Some(s) if !s.is_empty() => Some(
                NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| corrupt(&doc, "dob", s))?,
            ),
            _ => None,
        };
        let assets: AssetMap = serde_json::from_str(&self.assets)?;
        Ok(Client {
            initial_margin: parse_dec(&doc, "initial_margin", &self.initial_margin)?,
            ytd: parse_dec(&doc, "ytd", &self.ytd)?,
            total_ytd: parse_dec(&doc, "total_ytd", &self.total_ytd)?,
            created_at: parse_ts(&doc, "created_at", &self.created_at)?,
            updated_at: parse_ts(&doc, "updated_at", &self.updated_at)?,
            connected_users: serde_json::from_str(&self.connected_users)?,
            uid_grants: serde_json::from_str(&self.uid_grants)?,
            assets,
            dob,
            id: self.id,
            first_name: self.first_name,
            last_name: self.last_name,
            company_name: self.company_name,
            email: self.email,
            phone: self.phone,
            address: self.address,
            notes: self.notes,
            uid: self.uid,
        })
    }
}

pub fn get_client(conn: &Connection, id: &str) -> TriggerResult<Option<Client>> {
    let row = conn
        .query_row(
            &format!("SELECT {CLIENT_COLUMNS} FROM clients WHERE id=?1"),
            params![id],
            ClientRow::read,
        )
        .optional()?;
    row.map(ClientRow::into_client).transpose()
}

pub fn require_client(conn: &Connection, id: &str) -> TriggerResult<Client> {
    get_client(conn, id)?.ok_or_else(|| TriggerError::NotFound(format!("client '{}'", id)))
}

pub fn find_client_by_uid(conn: &Connection, uid: &str) -> TriggerResult<Option<Client>> {
    let row = conn
        .query_row(
            &format!("SELECT {CLIENT_COLUMNS} FROM clients WHERE uid=?1"),
            params![uid],
            ClientRow::read,
        )
        .optional()?;
    row.map(ClientRow::into_client).transpose()
}

pub fn list_clients(conn: &Connection) -> TriggerResult<Vec<Client>> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {CLIENT_COLUMNS} FROM clients ORDER BY last_name, first_name, id"
    ))?;
    let rows = stmt.query_map([], ClientRow::read)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?.into_client()?);
    }
    Ok(out)
}

/// Connected-user adjacency for every client, without decoding whole documents.
pub fn connection_lists(conn: &Connection) -> TriggerResult<Vec<(String, Vec<String>)>> {
    let mut stmt = conn.prepare_cached("SELECT id, connected_users FROM clients")?;
    let rows = stmt.query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?)))?;
    let mut out = Vec::new();
    for row in rows {
        let (id, raw) = row?;
        out.push((id, serde_json::from_str(&raw)?));
    }
    Ok(out)
}

pub fn insert_client(conn: &Connection, c: &Client) -> TriggerResult<()> {
    conn.execute(
        &format!(
            "INSERT INTO clients({CLIENT_COLUMNS})
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18)"
        ),
        params![
            c.id,
            c.first_name,
            c.last_name,
            c.company_name,
            c.email,
            c.phone,
            c.address,
            c.dob.map(|d| d.to_string()),
            c.initial_margin.to_string(),
            c.notes,
            serde_json::to_string(&c.assets)?,
            serde_json::to_string(&c.connected_users)?,
            c.uid,
            serde_json::to_string(&c.uid_grants)?,
            c.ytd.to_string(),
            c.total_ytd.to_string(),
            ts(&c.created_at),
            ts(&c.updated_at),
        ],
    )?;
    Ok(())
}

/// Overwrites the whole client document.
pub fn save_client(conn: &Connection, c: &Client) -> TriggerResult<()> {
    let changed = conn.execute(
        "UPDATE clients SET first_name=?2, last_name=?3, company_name=?4, email=?5, phone=?6,
             address=?7, dob=?8, initial_margin=?9, notes=?10, assets=?11, connected_users=?12,
             uid=?13, uid_grants=?14, ytd=?15, total_ytd=?16, updated_at=?17
         WHERE id=?1",
        params![
            c.id,
            c.first_name,
            c.last_name,
            c.company_name,
            c.email,
            c.phone,
            c.address,
            c.dob.map(|d| d.to_string()),
            c.initial_margin.to_string(),
            c.notes,
            serde_json::to_string(&c.assets)?,
            serde_json::to_string(&c.connected_users)?,
            c.uid,
            serde_json::to_string(&c.uid_grants)?,
            c.ytd.to_string(),
            c.total_ytd.to_string(),
            ts(&c.updated_at),
        ],
    )?;
    if changed == 0 {
        return Err(TriggerError::NotFound(format!("client '{}'", c.id)));
    }
    Ok(())
}

pub fn delete_client(conn: &Connection, id: &str) -> TriggerResult<bool> {
    Ok(conn.execute("DELETE FROM clients WHERE id=?1", params![id])? > 0)
}

pub fn set_ytd(conn: &Connection, id: &str, ytd: Decimal) -> TriggerResult<()> {
    conn.execute(
        "UPDATE clients SET ytd=?2 WHERE id=?1",
        params![id, ytd.to_string()],
    )?;
    Ok(())
}

pub fn set_total_ytd(conn: &Connection, id: &str, total: Decimal) -> TriggerResult<()> {
    conn.execute(
        "UPDATE clients SET total_ytd=?2 WHERE id=?1",
        params![id, total.to_string()],
    )?;
    Ok(())
}

pub fn get_ytd(conn: &Connection, id: &str) -> TriggerResult<Option<Decimal>> {
    let raw: Option<String> = conn
        .query_row("SELECT ytd FROM clients WHERE id=?1", params![id], |r| {
            r.get(0)
        })
        .optional()?;
    raw.map(|s| parse_dec(&format!("clients/{id}"), "ytd", &s))
        .transpose()
}

pub fn get_uid_grants(conn: &Connection, id: &str) -> TriggerResult<Option<Vec<String>>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT uid_grants FROM clients WHERE id=?1",
            params![id],
            |r| r.get(0),
        )
        .optional()?;
    Ok(raw.map(|s| serde_json::from_str(&s)).transpose()?)
}

pub fn set_uid_grants(conn: &Connection, id: &str, grants: &[String]) -> TriggerResult<()> {
    conn.execute(
        "UPDATE clients SET uid_grants=?2 WHERE id=?1",
        params![id, serde_json::to_string(grants)?],
    )?;
    Ok(())
}

pub fn set_connected_users(conn: &Connection, id: &str, peers: &[String]) -> TriggerResult<()> {
    conn.execute(
        "UPDATE clients SET connected_users=?2 WHERE id=?1",
        params![id, serde_json::to_string(peers)?],
    )?;
    Ok(())
}

struct ActivityRow {
    id: String,
    client_id: String,
    activity_type: String,
    amount: String,
    fund: String,
    recipient: String,
    time: String,
    send_notif: bool,
    is_dividend: bool,
    parent_name: String,
}

impl ActivityRow {
    fn read(r: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(ActivityRow {
            id: r.get(0)?,
            client_id: r.get(1)?,
            activity_type: r.get(2)?,
            amount: r.get(3)?,
            fund: r.get(4)?,
            recipient: r.get(5)?,
            time: r.get(6)?,
            send_notif: r.get(7)?,
            is_dividend: r.get(8)?,
            parent_name: r.get(9)?,
        })
    }

    fn into_activity(self) -> TriggerResult<Activity> {
        let doc = format!("clients/{}/activities/{}", self.client_id, self.id);
        let activity_type = self
            .activity_type
            .parse::<ActivityType>()
            .map_err(|_| corrupt(&doc, "type", &self.activity_type))?;
        Ok(Activity {
            amount: parse_dec(&doc, "amount", &self.amount)?,
            time: parse_ts(&doc, "time", &self.time)?,
            activity_type,
            id: self.id,
            client_id: self.client_id,
            fund: self.fund,
            recipient: self.recipient,
            send_notif: self.send_notif,
            is_dividend: self.is_dividend,
            parent_name: self.parent_name,
        })
    }
}

pub fn insert_activity(conn: &Connection, a: &Activity) -> TriggerResult<()> {
    conn.execute(
        &format!("INSERT INTO activities({ACTIVITY_COLUMNS}) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10)"),
        params![
            a.id,
            a.client_id,
            a.activity_type.as_str(),
            a.amount.to_string(),
            a.fund,
            a.recipient,
            ts(&a.time),
            a.send_notif,
            a.is_dividend,
            a.parent_name,
        ],
    )?;
    Ok(())
}

pub fn update_activity(conn: &Connection, a: &Activity) -> TriggerResult<()> {
    let changed = conn.execute(
        "UPDATE activities SET type=?2, amount=?3, fund=?4, recipient=?5, time=?6,
             send_notif=?7, is_dividend=?8, parent_name=?9
         WHERE id=?1",
        params![
            a.id,
            a.activity_type.as_str(),
            a.amount.to_string(),
            a.fund,
            a.recipient,
            ts(&a.time),
            a.send_notif,
            a.is_dividend,
            a.parent_name,
        ],
    )?;
    if changed == 0 {
        return Err(TriggerError::NotFound(format!("activity '{}'", a.id)));
    }
    Ok(())
}

pub fn get_activity(conn: &Connection, id: &str) -> TriggerResult<Option<Activity>> {
    let row = conn
        .query_row(
            &format!("SELECT {ACTIVITY_COLUMNS} FROM activities WHERE id=?1"),
            params![id],
            ActivityRow::read,
        )
        .optional()?;
    row.map(ActivityRow::into_activity).transpose()
}

pub fn delete_activity(conn: &Connection, id: &str) -> TriggerResult<bool> {
    Ok(conn.execute("DELETE FROM activities WHERE id=?1", params![id])? > 0)
}

pub fn delete_activities_for_client(conn: &Connection, client_id: &str) -> TriggerResult<usize> {
    Ok(conn.execute(
        "DELETE FROM activities WHERE client_id=?1",
        params![client_id],
    )?)
}

#[derive(Debug, Default, Clone)]
pub struct ActivityFilter {
    pub client_id: Option<String>,
    pub fund: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

/// Activities newest first.
pub fn list_activities(conn: &Connection, f: &ActivityFilter) -> TriggerResult<Vec<Activity>> {
    let mut sql = format!("SELECT {ACTIVITY_COLUMNS} FROM activities WHERE 1=1");
    let mut params_vec: Vec<String> = Vec::new();
    if let Some(ref id) = f.client_id {
        sql.push_str(" AND client_id=?");
        params_vec.push(id.clone());
    }
    if let Some(ref fund) = f.fund {
        sql.push_str(" AND fund=?");
        params_vec.push(fund.clone());
    }
    if let Some(ref since) = f.since {
        sql.push_str(" AND time>=?");
        params_vec.push(ts(since));
    }
    if let Some(ref until) = f.until {
        sql.push_str(" AND time<?");
        params_vec.push(ts(until));
    }
    sql.push_str(" ORDER BY time DESC, id DESC");
    if let Some(limit) = f.limit {
        sql.push_str(&format!(" LIMIT {}", limit));
    }

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(rusqlite::params_from_iter(params_vec.iter()), ActivityRow::read)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?.into_activity()?);
    }
    Ok(out)
}

/// Ids of a client's activities in `fund` whose recipient is exactly `recipient`.
pub fn activity_ids_with_recipient(
    conn: &Connection,
    client_id: &str,
    fund: Option<&str>,
    recipient: &str,
) -> TriggerResult<Vec<String>> {
    let mut stmt = conn.prepare_cached(
        "SELECT id FROM activities
         WHERE client_id=?1 AND recipient=?2 AND (?3 IS NULL OR fund=?3)
         ORDER BY id",
    )?;
    let rows = stmt.query_map(params![client_id, recipient, fund], |r| r.get::<_, String>(0))?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

pub fn insert_notification(conn: &Connection, n: &Notification) -> TriggerResult<()> {
    conn.execute(
        "INSERT INTO notifications(id, uid, client_id, activity_id, type, title, body, created_at, is_read)
         VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9)",
        params![
            n.id,
            n.uid,
            n.client_id,
            n.activity_id,
            n.activity_type.as_str(),
            n.title,
            n.body,
            ts(&n.created_at),
            n.is_read,
        ],
    )?;
    Ok(())
}

pub fn list_notifications(
    conn: &Connection,
    uid: &str,
    unread_only: bool,
) -> TriggerResult<Vec<Notification>> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, uid, client_id, activity_id, type, title, body, created_at, is_read
         FROM notifications WHERE uid=?1 AND (?2=0 OR is_read=0)
         ORDER BY created_at DESC, id DESC",
    )?;
    let rows = stmt.query_map(params![uid, unread_only], |r| {
        Ok((
            r.get::<_, String>(0)?,
            r.get::<_, String>(1)?,
            r.get::<_, String>(2)?,
            r.get::<_, String>(3)?,
            r.get::<_, String>(4)?,
            r.get::<_, String>(5)?,
            r.get::<_, String>(6)?,
            r.get::<_, String>(7)?,
            r.get::<_, bool>(8)?,
        ))
    })?;
    let mut out = Vec::new();
    for row in rows {
        let (id, uid, client_id, activity_id, typ, title, body, created, is_read) = row?;
        let doc = format!("notifications/{id}");
        let activity_type = typ
            .parse::<ActivityType>()
            .map_err(|_| corrupt(&doc, "type", &typ))?;
        out.push(Notification {
            created_at: parse_ts(&doc, "created_at", &created)?,
            id,
            uid,
            client_id,
            activity_id,
            activity_type,
            title,
            body,
            is_read,
        });
    }
    Ok(out)
}

pub fn mark_notification_read(conn: &Connection, id: &str) -> TriggerResult<()> {
    let changed = conn.execute(
        "UPDATE notifications SET is_read=1 WHERE id=?1",
        params![id],
    )?;
    if changed == 0 {
        return Err(TriggerError::NotFound(format!("notification '{}'", id)));
    }
    Ok(())
}

pub fn add_device(conn: &Connection, uid: &str, token: &str) -> TriggerResult<()> {
    conn.execute(
        "INSERT OR IGNORE INTO devices(uid, token) VALUES (?1, ?2)",
        params![uid, token],
    )?;
    Ok(())
}

pub fn remove_device(conn: &Connection, uid: &str, token: &str) -> TriggerResult<bool> {
    Ok(conn.execute(
        "DELETE FROM devices WHERE uid=?1 AND token=?2",
        params![uid, token],
    )? > 0)
}

pub fn device_tokens(conn: &Connection, uid: &str) -> TriggerResult<Vec<String>> {
    let mut stmt = conn.prepare_cached("SELECT token FROM devices WHERE uid=?1 ORDER BY token")?;
    let rows = stmt.query_map(params![uid], |r| r.get::<_, String>(0))?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}
