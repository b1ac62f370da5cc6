// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::Arc;

use yaks_client_rs::{
    model::{
        message::{Message, build},
        opcode::Code,
        path::Path,
        value::Value,
    },
    session::Session,
    workspace::Workspace,
};

use crate::integration_tests::common::{spawn, test_config};

#[tokio::test]
async fn a_selector_with_starttime_returns_every_match_oldest_first() {
    let server = spawn(|message: &Message| match message.code {
        Code::Login => Some(build::ok(message.corr_id)),
        Code::Workspace => Some(build::ok_with_id(message.corr_id, "ws-1")),
        Code::Get => {
            let kvs = vec![
                (Path::new("/home/alice/temp/c").unwrap(), Value::string("3")),
                (Path::new("/home/alice/temp/a").unwrap(), Value::string("1")),
                (Path::new("/home/alice/temp/b").unwrap(), Value::string("2")),
            ];
            Some(build::values(message.corr_id, &kvs))
        },
        _ => None,
    })
    .await;
    let cfg = test_config(server.addr);

    let session = Session::connect(cfg).await.expect("connect");
    session.login().await.expect("login");
    let workspace = Workspace::open(Arc::clone(&session), "/home/alice").await.expect("workspace");

    // All entries come back with no timestamp (§ NOTIFY/GET bodies don't
    // carry one on this wire), so a series selector's ordering guarantee
    // degenerates to "stable in arrival order" here; this still exercises
    // the series branch rather than the latest-per-path reduction.
    let entries = workspace.get("temp/**?starttime=0").await.expect("get series");
    assert_eq!(entries.len(), 3);
    assert!(entries.iter().all(|e| e.timestamp.is_none()));
}

#[tokio::test]
async fn a_selector_without_time_bounds_keeps_one_entry_per_path() {
    let server = spawn(|message: &Message| match message.code {
        Code::Login => Some(build::ok(message.corr_id)),
        Code::Workspace => Some(build::ok_with_id(message.corr_id, "ws-1")),
        Code::Get => {
            // Two updates for the same path arrive in the VALUES body; the
            // caller should only see the last one.
            let kvs = vec![
                (Path::new("/home/alice/temp/a").unwrap(), Value::string("stale")),
                (Path::new("/home/alice/temp/a").unwrap(), Value::string("fresh")),
                (Path::new("/home/alice/temp/b").unwrap(), Value::string("b-value")),
            ];
            Some(build::values(message.corr_id, &kvs))
        },
        _ => None,
    })
    .await;
    let cfg = test_config(server.addr);

    let session = Session::connect(cfg).await.expect("connect");
    session.login().await.expect("login");
    let workspace = Workspace::open(Arc::clone(&session), "/home/alice").await.expect("workspace");

    let entries = workspace.get("temp/*").await.expect("get latest");
    assert_eq!(entries.len(), 2);
    let a = entries.iter().find(|e| e.path.as_str() == "/home/alice/temp/a").unwrap();
    assert_eq!(a.value, Value::string("fresh"));
}
