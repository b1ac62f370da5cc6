// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use yaks_client_rs::{
    model::{message::Message, opcode::Code, path::Path, value::Value},
    session::framer::{read_message, write_message},
};

#[tokio::test]
async fn a_values_message_with_properties_and_a_large_correlation_id_round_trips() {
    let (mut a, mut b) = tokio::io::duplex(8192);

    let mut sent = Message::new(Code::Values, u32::MAX as u64 + 12345);
    sent.set_property("wsid", "ws-42");
    sent.set_values_body(&[
        (Path::new("/home/alice/a").unwrap(), Value::string("1")),
        (Path::new("/home/alice/b").unwrap(), Value::json(r#"{"n":2}"#)),
        (
            Path::new("/home/alice/c").unwrap(),
            Value::sql(vec!["1".into()], vec!["id".into()]),
        ),
    ]);

    write_message(&mut a, &sent).await.expect("write");
    let received = read_message(&mut b).await.expect("read");

    assert_eq!(received, sent);
    assert_eq!(received.get_property("wsid"), Some("ws-42"));
    let kvs = received.get_values_body().unwrap();
    assert_eq!(kvs.len(), 3);
    assert_eq!(kvs[1].1.encoding(), yaks_client_rs::model::value::Encoding::Json);
}

#[tokio::test]
async fn multiple_messages_back_to_back_are_each_read_independently() {
    let (mut a, mut b) = tokio::io::duplex(8192);

    let first = Message::new(Code::Ok, 1);
    let second = Message::new(Code::Logout, 2);
    write_message(&mut a, &first).await.unwrap();
    write_message(&mut a, &second).await.unwrap();

    assert_eq!(read_message(&mut b).await.unwrap(), first);
    assert_eq!(read_message(&mut b).await.unwrap(), second);
}
