// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::{DateTime, TimeZone, Utc};
use fundclip::commands::{activities, assets, clients};
use fundclip::errors::TriggerError;
use fundclip::models::{Activity, ActivityForm, ActivityType, Client, ClientForm};
use fundclip::push::LogPushSender;
use fundclip::triggers::{self, TriggerEnv};
use fundclip::{db, store};
use rusqlite::Connection;
use rust_decimal::Decimal;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 8, 1, 10, 0, 0).unwrap()
}

fn env(push: &LogPushSender) -> TriggerEnv<'_> {
    TriggerEnv {
        primary_fund: "agq".into(),
        now: now(),
        push,
    }
}

fn client(conn: &Connection, first: &str, last: &str) -> Client {
    let form = ClientForm {
        first_name: Some(first.into()),
        last_name: Some(last.into()),
        email: Some(format!("{}@example.com", first.to_lowercase())),
        phone: Some("555-010-3000".into()),
        address: Some("2 Side St".into()),
        ..ClientForm::default()
    };
    clients::create_client(conn, &form, now()).unwrap()
}

fn record(
    conn: &Connection,
    env: &TriggerEnv<'_>,
    client_id: &str,
    fund: &str,
    recipient: Option<&str>,
) -> Activity {
    let form = ActivityForm {
        activity_type: Some(ActivityType::Deposit),
        amount: Some(Decimal::from(10)),
        fund: Some(fund.into()),
        recipient: recipient.map(str::to_string),
        time: Some(now()),
        ..ActivityForm::default()
    };
    activities::create_activity(conn, env, client_id, form).unwrap()
}

fn grants(conn: &Connection, id: &str) -> Vec<String> {
    store::require_client(conn, id).unwrap().uid_grants
}

fn code(err: TriggerError) -> &'static str {
    err.code()
}

#[test]
fn connecting_a_linked_client_grants_and_revokes_peer_access() {
    let conn = db::open_in_memory().unwrap();
    let push = LogPushSender;
    let env = env(&push);
    let a = client(&conn, "Ann", "A");
    let b = client(&conn, "Bob", "B");
    triggers::link_user(&conn, &env, &a.id, "uid-a").unwrap();

    triggers::connect_users(&conn, &env, &a.id, &b.id).unwrap();
    assert_eq!(grants(&conn, &b.id), vec!["uid-a"]);
    assert!(grants(&conn, &a.id).is_empty());

    triggers::disconnect_users(&conn, &env, &a.id, &b.id).unwrap();
    assert!(grants(&conn, &b.id).is_empty());
}

#[test]
fn linking_after_connecting_propagates_to_every_peer() {
    let conn = db::open_in_memory().unwrap();
    let push = LogPushSender;
    let env = env(&push);
    let a = client(&conn, "Ann", "A");
    let b = client(&conn, "Bob", "B");
    let c = client(&conn, "Cat", "C");
    triggers::connect_users(&conn, &env, &a.id, &b.id).unwrap();
    triggers::connect_users(&conn, &env, &a.id, &c.id).unwrap();
    assert!(grants(&conn, &b.id).is_empty());

    let linked = triggers::link_user(&conn, &env, &a.id, " uid-a ").unwrap();
    assert_eq!(linked.uid.as_deref(), Some("uid-a"));
    assert_eq!(grants(&conn, &b.id), vec!["uid-a"]);
    assert_eq!(grants(&conn, &c.id), vec!["uid-a"]);

    triggers::unlink_user(&conn, &env, &a.id).unwrap();
    assert!(grants(&conn, &b.id).is_empty());
    assert!(grants(&conn, &c.id).is_empty());
    assert!(store::require_client(&conn, &a.id).unwrap().uid.is_none());
}

#[test]
fn grant_changes_report_only_touched_peers() {
    let conn = db::open_in_memory().unwrap();
    let b = client(&conn, "Bob", "B");
    let c = client(&conn, "Cat", "C");
    store::set_uid_grants(&conn, &b.id, &["uid-a".to_string()]).unwrap();

    let changes = triggers::on_connections_changed(
        &conn,
        Some("uid-a"),
        &[],
        &[b.id.clone(), c.id.clone(), "missing".to_string()],
    )
    .unwrap();
    assert_eq!(changes.granted, vec![c.id.clone()]);
    assert!(changes.revoked.is_empty());
    assert_eq!(grants(&conn, &b.id), vec!["uid-a"]);

    let none = triggers::on_connections_changed(&conn, None, &[], &[b.id.clone()]).unwrap();
    assert_eq!(none, triggers::GrantChanges::default());
}

#[test]
fn link_user_reports_typed_errors() {
    let conn = db::open_in_memory().unwrap();
    let push = LogPushSender;
    let env = env(&push);
    let a = client(&conn, "Ann", "A");
    let b = client(&conn, "Bob", "B");

    assert_eq!(code(triggers::link_user(&conn, &env, &a.id, "  ").unwrap_err()), "invalid-argument");
    assert_eq!(code(triggers::link_user(&conn, &env, "nope", "uid-x").unwrap_err()), "not-found");

    triggers::link_user(&conn, &env, &a.id, "uid-a").unwrap();
    assert_eq!(code(triggers::link_user(&conn, &env, &a.id, "uid-z").unwrap_err()), "already-exists");
    assert_eq!(code(triggers::link_user(&conn, &env, &b.id, "uid-a").unwrap_err()), "already-exists");
    assert_eq!(code(triggers::unlink_user(&conn, &env, &b.id).unwrap_err()), "not-found");
}

#[test]
fn connect_users_rejects_bad_requests() {
    let conn = db::open_in_memory().unwrap();
    let push = LogPushSender;
    let env = env(&push);
    let a = client(&conn, "Ann", "A");
    let b = client(&conn, "Bob", "B");

    assert_eq!(code(triggers::connect_users(&conn, &env, &a.id, &a.id).unwrap_err()), "invalid-argument");
    assert_eq!(code(triggers::connect_users(&conn, &env, &a.id, "ghost").unwrap_err()), "not-found");
    triggers::connect_users(&conn, &env, &a.id, &b.id).unwrap();
    assert_eq!(code(triggers::connect_users(&conn, &env, &a.id, &b.id).unwrap_err()), "already-exists");
    assert_eq!(code(triggers::disconnect_users(&conn, &env, &b.id, &a.id).unwrap_err()), "not-found");
}

#[test]
fn asset_rename_rewrites_exact_recipients_in_the_same_fund() {
    let conn = db::open_in_memory().unwrap();
    let push = LogPushSender;
    let env = env(&push);
    let jane = client(&conn, "Jane", "Doe");
    let ira = assets::AssetUpdate {
        amount: Decimal::from(5000),
        display_title: Some("Jane IRA".into()),
        ..assets::AssetUpdate::default()
    };
    assets::set_asset(&conn, &env, &jane.id, "AGQ", "ira", ira.clone()).unwrap();
    assets::set_asset(&conn, &env, &jane.id, "ak1", "ira", ira).unwrap();

    let in_agq: Vec<_> = (0..3)
        .map(|_| record(&conn, &env, &jane.id, "agq", Some("Jane IRA")).id)
        .collect();
    let in_ak1 = record(&conn, &env, &jane.id, "ak1", Some("Jane IRA")).id;
    let personal = record(&conn, &env, &jane.id, "agq", None).id;

    assets::rename_asset(&conn, &env, &jane.id, "agq", "ira", "Jane Roth IRA").unwrap();

    for id in &in_agq {
        let a = store::get_activity(&conn, id).unwrap().unwrap();
        assert_eq!(a.recipient, "Jane Roth IRA");
    }
    let untouched = store::get_activity(&conn, &in_ak1).unwrap().unwrap();
    assert_eq!(untouched.recipient, "Jane IRA");
    let p = store::get_activity(&conn, &personal).unwrap().unwrap();
    assert_eq!(p.recipient, "Jane Doe");
}

#[test]
fn recipient_rewrite_spans_multiple_batches() {
    let conn = db::open_in_memory().unwrap();
    let jane = client(&conn, "Jane", "Doe");
    let total = store::MAX_BATCH_WRITES * 2 + 7;
    for i in 0..total {
        store::insert_activity(
            &conn,
            &Activity {
                id: format!("act-{:05}", i),
                client_id: jane.id.clone(),
                activity_type: ActivityType::Profit,
                amount: Decimal::ONE,
                fund: "agq".into(),
                recipient: "Old Title".into(),
                time: now(),
                send_notif: false,
                is_dividend: false,
                parent_name: jane.full_name(),
            },
        )
        .unwrap();
    }
    let n = triggers::rewrite_recipients(&conn, &jane.id, Some("agq"), "Old Title", "New Title")
        .unwrap();
    assert_eq!(n, total);
    let left: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM activities WHERE recipient='Old Title'",
            [],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(left, 0);
}

#[test]
fn renaming_a_client_rewrites_name_recipients() {
    let conn = db::open_in_memory().unwrap();
    let push = LogPushSender;
    let env = env(&push);
    let jane = client(&conn, "Jane", "Doe");
    let act = record(&conn, &env, &jane.id, "agq", None);
    assert_eq!(act.recipient, "Jane Doe");

    let form = ClientForm {
        last_name: Some("Smith".into()),
        ..ClientForm::default()
    };
    clients::edit_client(&conn, &env, &jane.id, &form).unwrap();

    let after = store::get_activity(&conn, &act.id).unwrap().unwrap();
    assert_eq!(after.recipient, "Jane Smith");
    assert_eq!(after.parent_name, "Jane Smith");
}

#[test]
fn deleting_a_client_detaches_it_from_peers() {
    let conn = db::open_in_memory().unwrap();
    let push = LogPushSender;
    let env = env(&push);
    let a = client(&conn, "Ann", "A");
    let b = client(&conn, "Bob", "B");
    triggers::link_user(&conn, &env, &b.id, "uid-b").unwrap();
    triggers::connect_users(&conn, &env, &a.id, &b.id).unwrap();
    triggers::connect_users(&conn, &env, &b.id, &a.id).unwrap();
    assert_eq!(grants(&conn, &a.id), vec!["uid-b"]);
    let kept = record(&conn, &env, &b.id, "agq", None);

    clients::delete_client(&conn, &env, &b.id, false).unwrap();

    let a_after = store::require_client(&conn, &a.id).unwrap();
    assert!(a_after.connected_users.is_empty());
    assert!(a_after.uid_grants.is_empty());
    // Activities only soft-reference their client.
    assert!(store::get_activity(&conn, &kept.id).unwrap().is_some());
}

fn client_with_company(conn: &Connection, company: &str) -> Client {
    let form = ClientForm {
        first_name: Some("Jane".into()),
        last_name: Some("Doe".into()),
        company_name: Some(company.into()),
        email: Some("jane@example.com".into()),
        phone: Some("555-010-3000".into()),
        address: Some("2 Side St".into()),
        ..ClientForm::default()
    };
    clients::create_client(conn, &form, now()).unwrap()
}

fn recipient(conn: &Connection, id: &str) -> String {
    store::get_activity(conn, id).unwrap().unwrap().recipient
}

#[test]
fn name_and_company_edited_together_rewrite_each_row_once() {
    let conn = db::open_in_memory().unwrap();
    let push = LogPushSender;
    let env = env(&push);
    let jane = client_with_company(&conn, "Jane Smith");
    let personal = record(&conn, &env, &jane.id, "agq", None).id;
    let company = record(&conn, &env, &jane.id, "agq", Some("Jane Smith")).id;

    let form = ClientForm {
        last_name: Some("Smith".into()),
        company_name: Some("Smith LLC".into()),
        ..ClientForm::default()
    };
    clients::edit_client(&conn, &env, &jane.id, &form).unwrap();

    assert_eq!(recipient(&conn, &personal), "Jane Smith");
    assert_eq!(recipient(&conn, &company), "Smith LLC");
}

#[test]
fn company_rename_rewrites_company_recipients_and_clearing_leaves_them() {
    let conn = db::open_in_memory().unwrap();
    let push = LogPushSender;
    let env = env(&push);
    let jane = client_with_company(&conn, "Doe Holdings");
    let to_company = record(&conn, &env, &jane.id, "agq", Some("Doe Holdings")).id;
    let other_fund = record(&conn, &env, &jane.id, "ak1", Some("Doe Holdings")).id;
    let personal = record(&conn, &env, &jane.id, "agq", None).id;

    let rename = ClientForm {
        company_name: Some("Doe Capital".into()),
        ..ClientForm::default()
    };
    clients::edit_client(&conn, &env, &jane.id, &rename).unwrap();
    assert_eq!(recipient(&conn, &to_company), "Doe Capital");
    assert_eq!(recipient(&conn, &other_fund), "Doe Capital");
    assert_eq!(recipient(&conn, &personal), "Jane Doe");

    let clear = ClientForm {
        company_name: Some(String::new()),
        ..ClientForm::default()
    };
    let cleared = clients::edit_client(&conn, &env, &jane.id, &clear).unwrap();
    assert!(cleared.company_name.is_none());
    assert_eq!(recipient(&conn, &to_company), "Doe Capital");
    assert_eq!(recipient(&conn, &personal), "Jane Doe");
}

#[test]
fn removing_an_asset_drops_the_slot_and_empty_fund() {
    let conn = db::open_in_memory().unwrap();
    let push = LogPushSender;
    let env = env(&push);
    let jane = client(&conn, "Jane", "Doe");
    let ira = assets::AssetUpdate {
        amount: Decimal::from(100),
        ..assets::AssetUpdate::default()
    };
    assets::set_asset(&conn, &env, &jane.id, "agq", "ira", ira.clone()).unwrap();
    assets::set_asset(&conn, &env, &jane.id, "agq", "personal", ira).unwrap();

    let after = assets::remove_asset(&conn, &env, &jane.id, "AGQ", "ira").unwrap();
    assert_eq!(after.assets["agq"].len(), 1);
    assert_eq!(after.asset_total("agq"), Decimal::from(100));

    let after = assets::remove_asset(&conn, &env, &jane.id, "agq", "personal").unwrap();
    assert!(after.assets.is_empty());
    assert!(store::require_client(&conn, &jane.id).unwrap().assets.is_empty());

    let err = assets::remove_asset(&conn, &env, &jane.id, "agq", "ira").unwrap_err();
    assert_eq!(err.downcast_ref::<TriggerError>().unwrap().code(), "not-found");
}

#[test]
fn uid_and_connections_changing_together_move_every_grant() {
    let conn = db::open_in_memory().unwrap();
    let push = LogPushSender;
    let env = env(&push);
    let a = client(&conn, "Ann", "A");
    let b = client(&conn, "Bob", "B");
    let c = client(&conn, "Cat", "C");
    triggers::link_user(&conn, &env, &a.id, "uid-a").unwrap();
    triggers::connect_users(&conn, &env, &a.id, &b.id).unwrap();
    assert_eq!(grants(&conn, &b.id), vec!["uid-a"]);

    let before = store::require_client(&conn, &a.id).unwrap();
    let mut after = before.clone();
    after.uid = Some("uid-z".into());
    after.connected_users = vec![c.id.clone()];
    store::save_client(&conn, &after).unwrap();
    triggers::on_client_updated(&conn, &env, &before, &after);

    assert!(grants(&conn, &b.id).is_empty());
    assert_eq!(grants(&conn, &c.id), vec!["uid-z"]);
}

#[test]
fn deleting_with_purge_removes_only_that_clients_activities() {
    let conn = db::open_in_memory().unwrap();
    let push = LogPushSender;
    let env = env(&push);
    let a = client(&conn, "Ann", "A");
    let b = client(&conn, "Bob", "B");
    let gone = record(&conn, &env, &a.id, "agq", None).id;
    let kept = record(&conn, &env, &b.id, "agq", None).id;

    clients::delete_client(&conn, &env, &a.id, true).unwrap();

    assert!(store::get_client(&conn, &a.id).unwrap().is_none());
    assert!(store::get_activity(&conn, &gone).unwrap().is_none());
    assert!(store::get_activity(&conn, &kept).unwrap().is_some());

    let err = clients::delete_client(&conn, &env, &a.id, true).unwrap_err();
    assert_eq!(err.downcast_ref::<TriggerError>().unwrap().code(), "not-found");
}
