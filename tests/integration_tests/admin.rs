// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use yaks_client_rs::{
    admin::Admin,
    model::{
        message::{Message, build},
        opcode::Code,
        path::Path,
        value::Value,
    },
    session::Session,
};

use crate::integration_tests::common::{spawn, test_config};

#[tokio::test]
async fn add_storage_writes_a_descriptor_and_get_storages_lists_it_back() {
    let server = spawn(|message: &Message| match message.code {
        Code::Login => Some(build::ok(message.corr_id)),
        Code::Workspace => Some(build::ok_with_id(message.corr_id, "admin-ws")),
        Code::Put | Code::Delete => Some(build::ok(message.corr_id)),
        Code::Get => {
            let path = Path::new("/@/local/storages/cache-1").unwrap();
            let descriptor = Value::json(r#"{"selector":"/home/alice/**"}"#);
            Some(build::values(message.corr_id, &[(path, descriptor)]))
        },
        _ => None,
    })
    .await;
    let cfg = test_config(server.addr);

    let session = Session::connect(cfg).await.expect("connect");
    session.login().await.expect("login");
    let admin = Admin::new(session).await.expect("open admin workspace");

    admin.add_storage("cache-1", "/home/alice/**").await.expect("add storage");

    let storages = admin.get_storages().await.expect("get storages");
    assert_eq!(storages.len(), 1);
    assert_eq!(storages[0].path.as_str(), "/@/local/storages/cache-1");

    admin.remove_storage("cache-1").await.expect("remove storage");
}

#[tokio::test]
async fn add_storage_rejects_an_empty_id() {
    let server = spawn(|message: &Message| match message.code {
        Code::Login => Some(build::ok(message.corr_id)),
        Code::Workspace => Some(build::ok_with_id(message.corr_id, "admin-ws")),
        _ => None,
    })
    .await;
    let cfg = test_config(server.addr);

    let session = Session::connect(cfg).await.expect("connect");
    session.login().await.expect("login");
    let admin = Admin::new(session).await.expect("open admin workspace");

    let err = admin.add_storage("", "/home/alice/**").await.unwrap_err();
    assert!(matches!(err, yaks_client_rs::Error::InvalidPath(_)));
}
