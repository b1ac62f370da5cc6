// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use yaks_client_rs::{
    model::{
        message::{Message, build},
        opcode::Code,
        path::Path,
        selector::Selector,
        value::{Encoding, Value},
    },
    session::Session,
};

use crate::integration_tests::common::{spawn, test_config};

#[tokio::test]
async fn put_then_get_round_trips_a_json_value_unchanged() {
    let stored = Value::json(r#"{"count":3,"label":"widgets"}"#);
    let stored_for_server = stored.clone();

    let server = spawn(move |message: &Message| match message.code {
        Code::Login => Some(build::ok(message.corr_id)),
        Code::Put => Some(build::ok(message.corr_id)),
        Code::Get => {
            let selector = message.get_selector_body().ok()?;
            let path = Path::new(selector.path_part()).ok()?;
            Some(build::values(message.corr_id, &[(path, stored_for_server.clone())]))
        },
        _ => None,
    })
    .await;
    let cfg = test_config(server.addr);

    let session = Session::connect(cfg).await.expect("connect");
    session.login().await.expect("login");

    let path = Path::new("/home/alice/widgets").unwrap();
    session.put("ws-1", &path, stored.clone()).await.expect("put");

    let selector = Selector::new("/home/alice/widgets").unwrap();
    let kvs = session.get("ws-1", &selector).await.expect("get");
    assert_eq!(kvs.len(), 1);
    assert_eq!(kvs[0].1.encoding(), Encoding::Json);
    assert_eq!(kvs[0].1, stored);
}
