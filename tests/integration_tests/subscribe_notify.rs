// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::{Arc, Mutex};

use tokio::time::{Duration, timeout};
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
async fn subscribe_delivers_a_pushed_notification_then_unsubscribes_cleanly() {
    let server = spawn(|message: &Message| match message.code {
        Code::Login => Some(build::ok(message.corr_id)),
        Code::Workspace => Some(build::ok_with_id(message.corr_id, "ws-1")),
        Code::Sub => Some(build::ok_with_id(message.corr_id, "sub-1")),
        Code::Unsub => Some(build::ok(message.corr_id)),
        _ => None,
    })
    .await;
    let cfg = test_config(server.addr);

    let session = Session::connect(cfg).await.expect("connect");
    session.login().await.expect("login");
    let workspace = Workspace::open(Arc::clone(&session), "/home/alice").await.expect("workspace");

    let received: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let received_for_listener = Arc::clone(&received);
    let sub_id = workspace
        .subscribe("temp/**", move |changes| {
            let mut seen = received_for_listener.lock().unwrap();
            seen.extend(changes.into_iter().map(|c| c.path.into_string()));
        })
        .await
        .expect("subscribe");

    // The subscription is fully registered by the time `subscribe` returns,
    // so pushing the notification now can't race the client's own bookkeeping.
    let kvs = vec![(Path::new("/home/alice/temp/a").unwrap(), Value::string("1"))];
    server.push(build::notify(&sub_id, &kvs));

    timeout(Duration::from_secs(2), async {
        loop {
            if !received.lock().unwrap().is_empty() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("notification delivered");

    assert_eq!(received.lock().unwrap().as_slice(), ["/home/alice/temp/a"]);

    workspace.unsubscribe(&sub_id).await.expect("unsubscribe");
}
