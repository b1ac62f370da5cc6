// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{net::SocketAddr, time::Duration};

use tokio::{
    net::TcpListener,
    sync::mpsc,
    task::JoinHandle,
};
use yaks_client_rs::{
    cfg::{
        config::{Config, ConnectionConfig, DispatchConfig, LoggingConfig, LoginConfig},
        enums::Output,
    },
    model::message::Message,
    session::framer,
};

/// A loopback stand-in for the routed service, driven entirely by test
/// code: `respond` answers every message the client sends, and `push` lets
/// a test inject a server-initiated message (NOTIFY, EVAL invocation) at a
/// point of its choosing. Every message the client sends is also mirrored
/// onto a channel the test can drain with `recv`.
pub struct MockServer {
    pub addr: SocketAddr,
    push_tx: mpsc::UnboundedSender<Message>,
    recv_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Message>>,
    _handle: JoinHandle<()>,
}

impl MockServer {
    pub fn push(&self, message: Message) {
        let _ = self.push_tx.send(message);
    }

    /// Waits for the next message the client sent, however it was routed
    /// (auto-reply or not).
    pub async fn recv(&self) -> Message {
        self.recv_rx
            .lock()
            .await
            .recv()
            .await
            .expect("mock server connection closed before a message arrived")
    }

    /// Drains messages until one with `corr_id` arrives, discarding
    /// anything earlier (e.g. the LOGIN/WORKSPACE setup traffic).
    pub async fn recv_matching(&self, corr_id: u64) -> Message {
        loop {
            let message = self.recv().await;
            if message.corr_id == corr_id {
                return message;
            }
        }
    }

    /// Drains messages until one with `code` arrives, discarding anything
    /// earlier. Useful when the corr_id is internally generated and not
    /// known to the test ahead of time.
    pub async fn recv_matching_code(&self, code: yaks_client_rs::model::opcode::Code) -> Message {
        loop {
            let message = self.recv().await;
            if message.code == code {
                return message;
            }
        }
    }
}

/// Spawns a one-shot TCP listener and answers each client message with
/// whatever `respond` returns (if anything), in addition to whatever the
/// test pushes directly via [`MockServer::push`].
pub async fn spawn(
    respond: impl Fn(&Message) -> Option<Message> + Send + 'static,
) -> MockServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind loopback");
    let addr = listener.local_addr().expect("local addr");

    let (push_tx, mut push_rx) = mpsc::unbounded_channel::<Message>();
    let (recv_tx, recv_rx) = mpsc::unbounded_channel::<Message>();
    let auto_reply_tx = push_tx.clone();

    let handle = tokio::spawn(async move {
        let (stream, _) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(_) => return,
        };
        let (mut r, mut w) = stream.into_split();

        let writer = tokio::spawn(async move {
            while let Some(message) = push_rx.recv().await {
                if framer::write_message(&mut w, &message).await.is_err() {
                    return;
                }
            }
        });

        loop {
            let message = match framer::read_message(&mut r).await {
                Ok(m) => m,
                Err(_) => break,
            };
            if let Some(reply) = respond(&message) {
                let _ = auto_reply_tx.send(reply);
            }
            if recv_tx.send(message).is_err() {
                break;
            }
        }
        writer.abort();
    });

    MockServer { addr, push_tx, recv_rx: tokio::sync::Mutex::new(recv_rx), _handle: handle }
}

pub fn test_config(addr: SocketAddr) -> Config {
    Config {
        connection: ConnectionConfig {
            endpoint: addr.to_string(),
            connect_timeout: Duration::from_secs(2),
            request_timeout: Duration::from_secs(2),
            login_grace_period: Duration::from_secs(2),
        },
        login: LoginConfig { username: None, password: None },
        dispatch: DispatchConfig { executor_threads: None },
        logging: LoggingConfig {
            level: "error".into(),
            output: Output::Stdout,
            json: false,
            file: None,
        },
    }
}
