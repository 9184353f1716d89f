// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Side effects that follow document writes.
//!
//! Writers call the `on_*` hooks after the primary write has landed. Hook
//! failures never roll the primary write back: they are logged and dropped at
//! [`best_effort`]. The callable operations at the bottom (`link_user`,
//! `connect_users`, ...) return typed [`TriggerError`]s to the caller instead.

use crate::errors::{TriggerError, TriggerResult};
use crate::models::{Activity, ActivityType, Client, Notification};
use crate::push::{PushMessage, PushSender};
use crate::store::{self, MAX_BATCH_WRITES};
use crate::utils::{fmt_money, get_primary_fund};
use crate::ytd;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Display;
use tracing::{debug, info, warn};

pub struct TriggerEnv<'a> {
    pub primary_fund: String,
    pub now: DateTime<Utc>,
    pub push: &'a dyn PushSender,
}

impl<'a> TriggerEnv<'a> {
    pub fn load(conn: &Connection, push: &'a dyn PushSender) -> anyhow::Result<Self> {
        Ok(TriggerEnv {
            primary_fund: get_primary_fund(conn)?,
            now: Utc::now(),
            push,
        })
    }
}

/// Runs a side effect, logging and swallowing its error.
pub fn best_effort<T, E: Display>(name: &str, f: impl FnOnce() -> Result<T, E>) -> Option<T> {
    match f() {
        Ok(v) => Some(v),
        Err(err) => {
            warn!(trigger = name, error = %err, "trigger failed");
            None
        }
    }
}

/// Applies `f` to `items` in transactions of at most [`MAX_BATCH_WRITES`] writes.
fn apply_in_batches<T>(
    conn: &Connection,
    items: &[T],
    mut f: impl FnMut(&Connection, &T) -> TriggerResult<()>,
) -> TriggerResult<usize> {
    let mut written = 0;
    for chunk in items.chunks(MAX_BATCH_WRITES) {
        let tx = conn.unchecked_transaction()?;
        for item in chunk {
            f(&*tx, item)?;
        }
        tx.commit()?;
        written += chunk.len();
    }
    Ok(written)
}

// --- activities ---------------------------------------------------------

pub fn on_activity_created(conn: &Connection, env: &TriggerEnv<'_>, activity: &Activity) {
    best_effort("activity.notify", || notify_activity(conn, env, activity));
    best_effort("activity.ytd", || {
        ytd::refresh_for_client(conn, &activity.client_id, &env.primary_fund, env.now)
    });
}

pub fn on_activity_updated(
    conn: &Connection,
    env: &TriggerEnv<'_>,
    before: &Activity,
    after: &Activity,
) {
    best_effort("activity.ytd", || {
        ytd::refresh_for_client(conn, &after.client_id, &env.primary_fund, env.now)
    });
    if before.client_id != after.client_id {
        best_effort("activity.ytd", || {
            ytd::refresh_for_client(conn, &before.client_id, &env.primary_fund, env.now)
        });
    }
}

pub fn on_activity_deleted(conn: &Connection, env: &TriggerEnv<'_>, activity: &Activity) {
    best_effort("activity.ytd", || {
        ytd::refresh_for_client(conn, &activity.client_id, &env.primary_fund, env.now)
    });
}

pub fn notification_text(activity: &Activity) -> (String, String) {
    let kind = match activity.activity_type {
        ActivityType::Deposit => "Deposit",
        ActivityType::Withdrawal => "Withdrawal",
        ActivityType::Profit => "Profit",
        ActivityType::Income => "Income",
        ActivityType::ManualEntry => "Adjustment",
    };
    let title = format!("New {}", kind);
    let body = format!(
        "{} of {} recorded for {} in the {} fund.",
        kind,
        fmt_money(&activity.amount),
        activity.recipient,
        activity.fund.to_uppercase()
    );
    (title, body)
}

/// Appends a notification for the owning client's linked account and pushes it
/// to that account's devices. Push failures are logged only.
pub fn notify_activity(
    conn: &Connection,
    env: &TriggerEnv<'_>,
    activity: &Activity,
) -> TriggerResult<Option<Notification>> {
    if !activity.send_notif {
        return Ok(None);
    }
    let client = store::require_client(conn, &activity.client_id)?;
    let Some(uid) = client.uid else {
        debug!(client_id = %client.id, "client has no linked account; skipping notification");
        return Ok(None);
    };

    let (title, body) = notification_text(activity);
    let notification = Notification {
        id: uuid::Uuid::new_v4().to_string(),
        uid: uid.clone(),
        client_id: activity.client_id.clone(),
        activity_id: activity.id.clone(),
        activity_type: activity.activity_type,
        title,
        body,
        created_at: env.now,
        is_read: false,
    };
    store::insert_notification(conn, &notification)?;

    let tokens = store::device_tokens(conn, &uid)?;
    if !tokens.is_empty() {
        let msg = PushMessage {
            title: notification.title.clone(),
            body: notification.body.clone(),
            client_id: notification.client_id.clone(),
            activity_id: notification.activity_id.clone(),
        };
        best_effort("activity.push", || env.push.send(&tokens, &msg));
    }
    Ok(Some(notification))
}

// --- access grants ------------------------------------------------------

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GrantChanges {
    pub granted: Vec<String>,
    pub revoked: Vec<String>,
}

#[derive(Clone, Copy)]
enum GrantOp<'a> {
    Grant(&'a str),
    Revoke(&'a str),
}

fn apply_grants(conn: &Connection, peers: &[String], op: GrantOp<'_>) -> TriggerResult<Vec<String>> {
    let mut touched = Vec::new();
    apply_in_batches(conn, peers, |tx, peer| {
        let Some(mut grants) = store::get_uid_grants(tx, peer)? else {
            debug!(peer = %peer, "connected client no longer exists");
            return Ok(());
        };
        let changed = match op {
            GrantOp::Grant(uid) => {
                if grants.iter().any(|g| g == uid) {
                    false
                } else {
                    grants.push(uid.to_string());
                    true
                }
            }
            GrantOp::Revoke(uid) => {
                let len = grants.len();
                grants.retain(|g| g != uid);
                grants.len() != len
            }
        };
        if changed {
            store::set_uid_grants(tx, peer, &grants)?;
            touched.push(peer.clone());
        }
        Ok(())
    })?;
    Ok(touched)
}

/// Grants `uid` on newly connected peers and revokes it on dropped ones.
pub fn on_connections_changed(
    conn: &Connection,
    uid: Option<&str>,
    before: &[String],
    after: &[String],
) -> TriggerResult<GrantChanges> {
    let Some(uid) = uid else {
        return Ok(GrantChanges::default());
    };
    let old: BTreeSet<&String> = before.iter().collect();
    let new: BTreeSet<&String> = after.iter().collect();
    let added: Vec<String> = new.difference(&old).map(|s| (*s).clone()).collect();
    let removed: Vec<String> = old.difference(&new).map(|s| (*s).clone()).collect();

    Ok(GrantChanges {
        granted: apply_grants(conn, &added, GrantOp::Grant(uid))?,
        revoked: apply_grants(conn, &removed, GrantOp::Revoke(uid))?,
    })
}

/// Moves access from `before.uid` to `after.uid`: the old uid is revoked on
/// every peer `before` was connected to and the new uid granted on every peer
/// `after` is connected to.
pub fn on_uid_changed(
    conn: &Connection,
    before: &Client,
    after: &Client,
) -> TriggerResult<GrantChanges> {
    if before.uid == after.uid {
        return Ok(GrantChanges::default());
    }
    let revoked = match before.uid.as_deref() {
        Some(uid) => apply_grants(conn, &before.connected_users, GrantOp::Revoke(uid))?,
        None => Vec::new(),
    };
    let granted = match after.uid.as_deref() {
        Some(uid) => apply_grants(conn, &after.connected_users, GrantOp::Grant(uid))?,
        None => Vec::new(),
    };
    Ok(GrantChanges { granted, revoked })
}

// --- recipient propagation ------------------------------------------------

/// Pending recipient rewrites: activity id -> new recipient.
type RewritePlan = BTreeMap<String, String>;

/// Collects the ids matching `old` in `fund` (any fund when `None`). Ids already
/// claimed by an earlier rename are left to that rename.
fn plan_rewrite(
    conn: &Connection,
    client_id: &str,
    fund: Option<&str>,
    old: &str,
    new: &str,
    plan: &mut RewritePlan,
) -> TriggerResult<()> {
    if old == new {
        return Ok(());
    }
    for id in store::activity_ids_with_recipient(conn, client_id, fund, old)? {
        plan.entry(id).or_insert_with(|| new.to_string());
    }
    Ok(())
}

fn apply_rewrites(conn: &Connection, plan: RewritePlan) -> TriggerResult<usize> {
    let rows: Vec<(String, String)> = plan.into_iter().collect();
    apply_in_batches(conn, &rows, |tx, (id, to)| {
        tx.execute(
            "UPDATE activities SET recipient=?2 WHERE id=?1",
            rusqlite::params![id, to],
        )?;
        Ok(())
    })
}

/// Rewrites `recipient` from `old` to `new` on the client's activities,
/// restricted to `fund` when given. Only exact matches are touched.
pub fn rewrite_recipients(
    conn: &Connection,
    client_id: &str,
    fund: Option<&str>,
    old: &str,
    new: &str,
) -> TriggerResult<usize> {
    let mut plan = RewritePlan::new();
    plan_rewrite(conn, client_id, fund, old, new, &mut plan)?;
    let n = apply_rewrites(conn, plan)?;
    if n > 0 {
        info!(client_id, from = old, to = new, updated = n, "activity recipients rewritten");
    }
    Ok(n)
}

/// Propagates client name, company name and asset display-title changes onto
/// activity recipients. Matches are taken against the stored rows before any
/// write, so each activity is rewritten at most once.
pub fn propagate_renames(conn: &Connection, before: &Client, after: &Client) -> TriggerResult<usize> {
    let mut plan = RewritePlan::new();

    let (old_name, new_name) = (before.full_name(), after.full_name());
    plan_rewrite(conn, &after.id, None, &old_name, &new_name, &mut plan)?;

    let trimmed = |c: &Client| {
        c.company_name
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    // A cleared company leaves historical recipients alone.
    if let (Some(old_co), Some(new_co)) = (trimmed(before), trimmed(after)) {
        plan_rewrite(conn, &after.id, None, &old_co, &new_co, &mut plan)?;
    }

    for (fund, types) in &before.assets {
        for (asset_type, old) in types {
            let Some(new) = after.assets.get(fund).and_then(|t| t.get(asset_type)) else {
                continue;
            };
            plan_rewrite(
                conn,
                &after.id,
                Some(fund.as_str()),
                &old.display_title,
                &new.display_title,
                &mut plan,
            )?;
        }
    }

    let updated = apply_rewrites(conn, plan)?;
    if old_name != new_name {
        conn.execute(
            "UPDATE activities SET parent_name=?2 WHERE client_id=?1",
            rusqlite::params![after.id, new_name],
        )?;
    }
    if updated > 0 {
        info!(client_id = %after.id, updated, "activity recipients rewritten");
    }
    Ok(updated)
}

// --- client document hooks ------------------------------------------------

pub fn on_client_updated(conn: &Connection, env: &TriggerEnv<'_>, before: &Client, after: &Client) {
    if before.uid != after.uid {
        best_effort("client.uid", || on_uid_changed(conn, before, after));
    } else if before.connected_users != after.connected_users {
        best_effort("client.connections", || {
            on_connections_changed(
                conn,
                after.uid.as_deref(),
                &before.connected_users,
                &after.connected_users,
            )
        });
    }
    if before.connected_users != after.connected_users {
        best_effort("client.total_ytd", || {
            ytd::refresh_for_client(conn, &after.id, &env.primary_fund, env.now)
        });
    }
    best_effort("client.renames", || propagate_renames(conn, before, after));
}

/// Detaches a deleted client from the connection graph.
pub fn on_client_deleted(conn: &Connection, env: &TriggerEnv<'_>, deleted: &Client) {
    let reaching = best_effort("client.delete", || -> TriggerResult<Vec<String>> {
        let adj = ytd::load_adjacency(conn)?;
        let holders: Vec<String> = adj
            .iter()
            .filter(|(_, peers)| peers.iter().any(|p| p == &deleted.id))
            .map(|(id, _)| id.clone())
            .collect();
        apply_in_batches(conn, &holders, |tx, id| {
            if let Some(peers) = adj.get(id) {
                let kept: Vec<String> = peers.iter().filter(|p| **p != deleted.id).cloned().collect();
                store::set_connected_users(tx, id, &kept)?;
            }
            Ok(())
        })?;
        if let Some(ref uid) = deleted.uid {
            apply_grants(conn, &deleted.connected_users, GrantOp::Revoke(uid))?;
        }
        Ok(holders)
    });

    for id in reaching.into_iter().flatten() {
        best_effort("client.total_ytd", || {
            ytd::refresh_for_client(conn, &id, &env.primary_fund, env.now)
        });
    }
}

// --- callables -----------------------------------------------------------

fn require_arg<'s>(name: &str, v: &'s str) -> TriggerResult<&'s str> {
    let v = v.trim();
    if v.is_empty() {
        return Err(TriggerError::InvalidArgument(format!("{} is required", name)));
    }
    Ok(v)
}

/// Links an authentication identity to a client.
pub fn link_user(
    conn: &Connection,
    env: &TriggerEnv<'_>,
    client_id: &str,
    uid: &str,
) -> TriggerResult<Client> {
    let client_id = require_arg("client id", client_id)?;
    let uid = require_arg("uid", uid)?;
    let before = store::require_client(conn, client_id)?;
    if before.uid.is_some() {
        return Err(TriggerError::AlreadyExists(format!(
            "client '{}' is already linked",
            client_id
        )));
    }
    if let Some(other) = store::find_client_by_uid(conn, uid)? {
        return Err(TriggerError::AlreadyExists(format!(
            "uid '{}' is already linked to client '{}'",
            uid, other.id
        )));
    }
    let mut after = before.clone();
    after.uid = Some(uid.to_string());
    after.updated_at = env.now;
    store::save_client(conn, &after)?;
    info!(client_id, uid, "account linked");
    on_client_updated(conn, env, &before, &after);
    Ok(after)
}

pub fn unlink_user(conn: &Connection, env: &TriggerEnv<'_>, client_id: &str) -> TriggerResult<Client> {
    let client_id = require_arg("client id", client_id)?;
    let before = store::require_client(conn, client_id)?;
    if before.uid.is_none() {
        return Err(TriggerError::NotFound(format!(
            "client '{}' has no linked account",
            client_id
        )));
    }
    let mut after = before.clone();
    after.uid = None;
    after.updated_at = env.now;
    store::save_client(conn, &after)?;
    info!(client_id, "account unlinked");
    on_client_updated(conn, env, &before, &after);
    Ok(after)
}

pub fn connect_users(
    conn: &Connection,
    env: &TriggerEnv<'_>,
    client_id: &str,
    peer_id: &str,
) -> TriggerResult<Client> {
    let client_id = require_arg("client id", client_id)?;
    let peer_id = require_arg("peer id", peer_id)?;
    if client_id == peer_id {
        return Err(TriggerError::InvalidArgument(
            "a client cannot be connected to itself".into(),
        ));
    }
    let before = store::require_client(conn, client_id)?;
    store::require_client(conn, peer_id)?;
    if before.connected_users.iter().any(|p| p == peer_id) {
        return Err(TriggerError::AlreadyExists(format!(
            "client '{}' is already connected to '{}'",
            client_id, peer_id
        )));
    }
    let mut after = before.clone();
    after.connected_users.push(peer_id.to_string());
    after.updated_at = env.now;
    store::save_client(conn, &after)?;
    on_client_updated(conn, env, &before, &after);
    store::require_client(conn, client_id)
}

pub fn disconnect_users(
    conn: &Connection,
    env: &TriggerEnv<'_>,
    client_id: &str,
    peer_id: &str,
) -> TriggerResult<Client> {
    let client_id = require_arg("client id", client_id)?;
    let peer_id = require_arg("peer id", peer_id)?;
    let before = store::require_client(conn, client_id)?;
    if !before.connected_users.iter().any(|p| p == peer_id) {
        return Err(TriggerError::NotFound(format!(
            "client '{}' is not connected to '{}'",
            client_id, peer_id
        )));
    }
    let mut after = before.clone();
    after.connected_users.retain(|p| p != peer_id);
    after.updated_at = env.now;
    store::save_client(conn, &after)?;
    on_client_updated(conn, env, &before, &after);
    store::require_client(conn, client_id)
}
