// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::Arc;

use yaks_client_rs::{
    model::{
        message::{Message, OP_REGISTER, OP_UNREGISTER, PROP_OP, build},
        opcode::Code,
        selector::Selector,
        value::Value,
    },
    session::Session,
    workspace::Workspace,
};

use crate::integration_tests::common::{spawn, test_config};

#[tokio::test]
async fn a_registered_eval_answers_a_server_initiated_invocation() {
    let server = spawn(|message: &Message| match message.code {
        Code::Login => Some(build::ok(message.corr_id)),
        Code::Workspace => Some(build::ok_with_id(message.corr_id, "ws-1")),
        Code::Eval => Some(build::ok(message.corr_id)),
        _ => None,
    })
    .await;
    let cfg = test_config(server.addr);

    let session = Session::connect(cfg).await.expect("connect");
    session.login().await.expect("login");
    let workspace = Workspace::open(Arc::clone(&session), "/home/alice").await.expect("workspace");

    workspace
        .register_eval("compute/sum", |_path, query| {
            let a: i64 = query.get("a").and_then(|v| v.as_leaf()).and_then(|s| s.parse().ok()).unwrap_or(0);
            let b: i64 = query.get("b").and_then(|v| v.as_leaf()).and_then(|s| s.parse().ok()).unwrap_or(0);
            Ok(Value::string((a + b).to_string()))
        })
        .await
        .expect("register eval");

    // The registration frame must carry `op=register`, not just `Code::Eval`
    // on its own, since an unregistration is wire-identical otherwise.
    let registration = server.recv_matching_code(Code::Eval).await;
    assert_eq!(registration.get_property(PROP_OP), Some(OP_REGISTER));

    // Invoke it the way the service would: a server-initiated EVAL carrying
    // a selector, answered over its own fresh correlation id.
    let invocation_corr_id = 4242;
    let selector = Selector::new("/home/alice/compute/sum?a=2&b=3").unwrap();
    let mut invocation = Message::new(Code::Eval, invocation_corr_id);
    invocation.set_selector_body(&selector);
    server.push(invocation);

    let reply = server.recv_matching(invocation_corr_id).await;
    assert_eq!(reply.code, Code::Values);
    let kvs = reply.get_values_body().unwrap();
    assert_eq!(kvs.len(), 1);
    assert_eq!(kvs[0].1, Value::string("5"));

    workspace.unregister_eval("compute/sum").await.expect("unregister eval");

    let unregistration = server.recv_matching_code(Code::Eval).await;
    assert_eq!(unregistration.get_property(PROP_OP), Some(OP_UNREGISTER));
}

#[tokio::test]
async fn an_eval_invocation_for_an_unregistered_path_answers_not_found() {
    let server = spawn(|message: &Message| match message.code {
        Code::Login => Some(build::ok(message.corr_id)),
        _ => None,
    })
    .await;
    let cfg = test_config(server.addr);

    let session = Session::connect(cfg).await.expect("connect");
    session.login().await.expect("login");

    let selector = Selector::new("/home/alice/no/such/eval").unwrap();
    let mut invocation = Message::new(Code::Eval, 99);
    invocation.set_selector_body(&selector);
    server.push(invocation);

    let reply = server.recv_matching(99).await;
    assert_eq!(reply.code, Code::Error);
    assert_eq!(reply.get_error_body().unwrap(), 404);
}
