// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The session connection: login/logout, correlation-id request/response
//! multiplexing, and dispatch of server-initiated NOTIFY/EVAL messages.
//! Grounded on the connection-management half of the connection this
//! crate's `client` module descends from: a mutex-guarded reader and
//! writer, a `DashMap` correlation registry, and a single spawned
//! background task that owns all reads off the socket.

use std::{fmt, panic::AssertUnwindSafe, sync::Arc, time::Duration};

use dashmap::DashMap;
use tokio::{
    io::AsyncWriteExt,
    net::{
        TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    sync::{Mutex, oneshot},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    cfg::config::Config,
    error::{Error, Result},
    model::{
        entry::{Change, ChangeKind},
        message::{Message, build},
        opcode::Code,
        path::Path,
        selector::{QueryDict, Selector},
        value::Value,
    },
    session::{
        common::io_with_timeout,
        framer,
        state::{EvalState, SessionState, SubscriptionState},
    },
    utils::generate_corr_id,
};

/// Server-side errno conventions this client recognizes; any other value is
/// surfaced verbatim as [`Error::ServerError`].
pub mod errno {
    pub const UNAUTHORIZED: u64 = 401;
    pub const NOT_FOUND: u64 = 404;
    pub const INTERNAL_SERVER_ERROR: u64 = 500;
}

/// A callback invoked once per NOTIFY batch delivered to a subscription.
pub type SubscriptionListener = Arc<dyn Fn(Vec<Change>) + Send + Sync>;

/// A callback that answers a server-initiated EVAL invocation. Receives the
/// absolute path the invocation targeted and the parsed query dictionary,
/// and returns the `Value` to send back as the EVAL's result.
pub type EvalFn = Arc<dyn Fn(&str, QueryDict) -> Result<Value> + Send + Sync>;

/// Accepts a unit of work to run later, off the background receiver task,
/// so a slow NOTIFY/EVAL callback never stalls message processing. Mirrors
/// the upstream client's own `executor.submit(...)` dispatch.
pub trait Executor: Send + Sync {
    fn execute(&self, job: Box<dyn FnOnce() + Send>);
}

/// An [`Executor`] that runs jobs inline, on whatever task calls
/// [`Executor::execute`]. Used when no dispatch pool is configured;
/// simplest, but a slow callback delays the receiver loop.
struct InlineExecutor;

impl Executor for InlineExecutor {
    fn execute(&self, job: Box<dyn FnOnce() + Send>) {
        job();
    }
}

/// An [`Executor`] that spawns each job as its own task, with `permits`
/// bounding how many run concurrently.
struct TaskPoolExecutor {
    semaphore: Arc<tokio::sync::Semaphore>,
}

impl TaskPoolExecutor {
    fn new(permits: usize) -> Self {
        Self { semaphore: Arc::new(tokio::sync::Semaphore::new(permits)) }
    }
}

impl Executor for TaskPoolExecutor {
    fn execute(&self, job: Box<dyn FnOnce() + Send>) {
        let semaphore = Arc::clone(&self.semaphore);
        tokio::spawn(async move {
            let _permit = semaphore.acquire().await;
            job();
        });
    }
}

struct SubscriptionEntry {
    state: SubscriptionState,
    listener: SubscriptionListener,
}

struct EvalEntry {
    state: EvalState,
    callback: EvalFn,
}

/// A connection to the routed service: one TCP stream with a background
/// task that reads, demultiplexes by correlation id, and dispatches
/// notifications and eval invocations.
pub struct Session {
    writer: Mutex<OwnedWriteHalf>,
    cfg: Config,
    state: Mutex<SessionState>,
    pending: DashMap<u64, oneshot::Sender<Message>>,
    subscriptions: DashMap<String, SubscriptionEntry>,
    evals: DashMap<String, EvalEntry>,
    executor: Arc<dyn Executor>,
    cancel: CancellationToken,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session").field("endpoint", &self.cfg.connection.endpoint).finish()
    }
}

impl Session {
    /// Opens the TCP connection and spawns the background receiver task.
    /// The session is `Connecting` until [`Session::login`] succeeds.
    pub async fn connect(cfg: Config) -> Result<Arc<Self>> {
        let stream = tokio::time::timeout(
            cfg.connection.connect_timeout,
            TcpStream::connect(&cfg.connection.endpoint),
        )
        .await
        .map_err(|_| Error::Timeout)??;
        stream.set_nodelay(true)?;
        let (r, w) = stream.into_split();

        let executor: Arc<dyn Executor> = match cfg.dispatch.executor_threads {
            Some(n) => Arc::new(TaskPoolExecutor::new(n)),
            None => Arc::new(InlineExecutor),
        };

        let session = Arc::new(Self {
            writer: Mutex::new(w),
            cfg,
            state: Mutex::new(SessionState::Connecting),
            pending: DashMap::new(),
            subscriptions: DashMap::new(),
            evals: DashMap::new(),
            executor,
            cancel: CancellationToken::new(),
        });

        let receiver = Arc::clone(&session);
        tokio::spawn(async move {
            receiver.receive_loop(r).await;
        });

        Ok(session)
    }

    pub async fn state(&self) -> SessionState {
        *self.state.lock().await
    }

    /// Sends LOGIN with the configured credentials (if any) and waits for
    /// OK. An ERROR reply or a timeout both fail with [`Error::AuthFailed`].
    pub async fn login(&self) -> Result<()> {
        let corr_id = generate_corr_id(&self.pending);
        let message = build::login(corr_id, self.cfg.login.credentials());
        let reply = self
            .request(corr_id, message, self.cfg.connection.login_grace_period)
            .await
            .map_err(|_| Error::AuthFailed)?;

        match reply.code {
            Code::Ok => {
                *self.state.lock().await = SessionState::Authenticated;
                Ok(())
            },
            _ => Err(Error::AuthFailed),
        }
    }

    /// Sends WORKSPACE for `path` and returns the workspace id the server
    /// assigns, carried in the OK response body.
    pub async fn open_workspace(&self, path: &Path) -> Result<String> {
        let corr_id = generate_corr_id(&self.pending);
        let message = build::open_workspace(corr_id, path);
        let reply = self.request_default(corr_id, message).await?;
        expect_ok(&reply)?;
        reply.get_id_body()
    }

    pub async fn put(&self, wsid: &str, path: &Path, value: Value) -> Result<()> {
        let corr_id = generate_corr_id(&self.pending);
        let message = build::put(corr_id, wsid, path, value);
        let reply = self.request_default(corr_id, message).await?;
        expect_ok(&reply)
    }

    pub async fn update(&self, _wsid: &str, _path: &Path, _value: Value) -> Result<()> {
        Err(Error::NotImplemented("update"))
    }

    pub async fn get(&self, wsid: &str, selector: &Selector) -> Result<Vec<(Path, Value)>> {
        let corr_id = generate_corr_id(&self.pending);
        let message = build::get(corr_id, wsid, selector);
        let reply = self.request_default(corr_id, message).await?;
        match reply.code {
            Code::Values => reply.get_values_body(),
            Code::Ok => Ok(Vec::new()),
            Code::Error => Err(server_error(&reply)?),
            other => Err(Error::UnexpectedMessage(u8::from(other))),
        }
    }

    pub async fn delete(&self, wsid: &str, path: &Path) -> Result<()> {
        let corr_id = generate_corr_id(&self.pending);
        let message = build::delete(corr_id, wsid, path);
        let reply = self.request_default(corr_id, message).await?;
        expect_ok(&reply)
    }

    /// Sends SUB, registers `listener` under the id the server returns, and
    /// returns that id.
    pub async fn subscribe(
        &self,
        wsid: &str,
        selector: &Selector,
        listener: SubscriptionListener,
    ) -> Result<String> {
        let corr_id = generate_corr_id(&self.pending);
        let message = build::sub(corr_id, wsid, selector);
        let reply = self.request_default(corr_id, message).await?;
        expect_ok(&reply)?;
        let sub_id = reply.get_id_body()?;
        self.subscriptions.insert(
            sub_id.clone(),
            SubscriptionEntry { state: SubscriptionState::Active, listener },
        );
        Ok(sub_id)
    }

    pub async fn unsubscribe(&self, wsid: &str, sub_id: &str) -> Result<()> {
        if let Some(mut entry) = self.subscriptions.get_mut(sub_id) {
            entry.state = SubscriptionState::Cancelling;
        }
        let corr_id = generate_corr_id(&self.pending);
        let message = build::unsub(corr_id, wsid, sub_id);
        let result = self.request_default(corr_id, message).await.and_then(|r| expect_ok(&r));
        self.subscriptions.remove(sub_id);
        result
    }

    pub async fn register_eval(&self, wsid: &str, path: &Path, callback: EvalFn) -> Result<()> {
        let corr_id = generate_corr_id(&self.pending);
        let message = build::register_eval(corr_id, wsid, path);
        let reply = self.request_default(corr_id, message).await?;
        expect_ok(&reply)?;
        self.evals.insert(
            path.as_str().to_string(),
            EvalEntry { state: EvalState::Active, callback },
        );
        Ok(())
    }

    pub async fn unregister_eval(&self, wsid: &str, path: &Path) -> Result<()> {
        if let Some(mut entry) = self.evals.get_mut(path.as_str()) {
            entry.state = EvalState::Removing;
        }
        let corr_id = generate_corr_id(&self.pending);
        let message = build::unregister_eval(corr_id, wsid, path);
        let result = self.request_default(corr_id, message).await.and_then(|r| expect_ok(&r));
        self.evals.remove(path.as_str());
        result
    }

    /// Sends LOGOUT, gives the server up to `login_grace_period` to ack it,
    /// then tears the connection down regardless: outstanding requests fail
    /// with [`Error::Closed`] and the write half is shut down.
    pub async fn logout(&self) -> Result<()> {
        *self.state.lock().await = SessionState::Closing;
        let corr_id = generate_corr_id(&self.pending);
        let message = build::logout(corr_id);
        let grace = self.cfg.connection.login_grace_period;
        let _ = self.request(corr_id, message, grace).await;
        self.shutdown().await;
        Ok(())
    }

    async fn shutdown(&self) {
        self.cancel.cancel();
        if !self.pending.is_empty() {
            debug!("failing {} pending request(s) on shutdown", self.pending.len());
        }
        self.pending.clear();
        let mut w = self.writer.lock().await;
        let _ = w.shutdown().await;
        *self.state.lock().await = SessionState::Disconnected;
    }

    async fn request_default(&self, corr_id: u64, message: Message) -> Result<Message> {
        self.request(corr_id, message, self.cfg.connection.request_timeout).await
    }

    /// Registers a oneshot completion slot for `corr_id`, writes `message`,
    /// then waits for the matching reply within `deadline`.
    async fn request(
        &self,
        corr_id: u64,
        message: Message,
        deadline: Duration,
    ) -> Result<Message> {
        let (tx, rx) = oneshot::channel();
        self.pending.insert(corr_id, tx);

        if let Err(e) = self.write_message(&message).await {
            self.pending.remove(&corr_id);
            return Err(e);
        }

        let await_reply = async { rx.await.map_err(|_| Error::Closed) };
        let result = io_with_timeout("await reply", await_reply, deadline, &self.cancel).await;
        if result.is_err() {
            self.pending.remove(&corr_id);
        }
        result
    }

    async fn write_message(&self, message: &Message) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(Error::Closed);
        }
        let mut w = self.writer.lock().await;
        io_with_timeout(
            "write message",
            framer::write_message(&mut *w, message),
            self.cfg.connection.request_timeout,
            &self.cancel,
        )
        .await
    }

    /// Owns the read half for the lifetime of the connection: routes
    /// OK/VALUES/ERROR to whichever caller is waiting on that correlation
    /// id, NOTIFY to subscription listeners, and EVAL invocations to
    /// registered eval callbacks.
    async fn receive_loop(self: Arc<Self>, mut reader: OwnedReadHalf) {
        loop {
            let message = tokio::select! {
                _ = self.cancel.cancelled() => return,
                message = framer::read_message(&mut reader) => message,
            };

            let message = match message {
                Ok(m) => m,
                Err(e) => {
                    warn!("receive loop exiting: {e}");
                    self.shutdown().await;
                    return;
                },
            };

            match message.code {
                Code::Ok | Code::Values | Code::Error => {
                    if let Some((_, tx)) = self.pending.remove(&message.corr_id) {
                        let _ = tx.send(message);
                    } else {
                        debug!("reply for unknown corr_id={}", message.corr_id);
                    }
                },
                Code::Notify => self.dispatch_notify(message),
                Code::Eval => self.dispatch_eval(message).await,
                other => debug!("unexpected message code on receive loop: {other:?}"),
            }
        }
    }

    fn dispatch_notify(&self, message: Message) {
        let Ok((sub_id, kvs)) = message.get_notify_body() else {
            warn!("malformed NOTIFY body");
            return;
        };
        let Some(entry) = self.subscriptions.get(&sub_id) else {
            return;
        };
        if !entry.state.accepts_notifications() {
            return;
        }
        let listener = Arc::clone(&entry.listener);
        drop(entry);

        let changes: Vec<Change> = kvs
            .into_iter()
            .map(|(path, value)| Change::new(path, ChangeKind::Put, None, value))
            .collect();
        self.executor.execute(Box::new(move || listener(changes)));
    }

    async fn dispatch_eval(&self, message: Message) {
        let Ok(selector) = message.get_selector_body() else {
            warn!("malformed EVAL body");
            return;
        };
        let corr_id = message.corr_id;
        let path = selector.path_part().to_string();
        let query = selector.query_dict();

        let entry = self.evals.get(&path);
        let callback = match entry {
            Some(ref e) if e.state.accepts_invocations() => Some(Arc::clone(&e.callback)),
            _ => None,
        };
        drop(entry);

        let Some(callback) = callback else {
            let reply = build::error(corr_id, errno::NOT_FOUND);
            if let Err(e) = self.write_message(&reply).await {
                warn!("failed to answer EVAL: {e}");
            }
            return;
        };

        let (tx, rx) = oneshot::channel();
        let invocation_path = path.clone();
        self.executor.execute(Box::new(move || {
            let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| {
                callback(&invocation_path, query)
            }));
            let _ = tx.send(outcome);
        }));

        let reply = match rx.await {
            Ok(Ok(Ok(value))) => match Path::new(path) {
                Ok(path) => build::values(corr_id, &[(path, value)]),
                Err(_) => build::error(corr_id, errno::INTERNAL_SERVER_ERROR),
            },
            _ => build::error(corr_id, errno::INTERNAL_SERVER_ERROR),
        };
        if let Err(e) = self.write_message(&reply).await {
            warn!("failed to answer EVAL: {e}");
        }
    }
}

fn expect_ok(message: &Message) -> Result<()> {
    match message.code {
        Code::Ok => Ok(()),
        Code::Error => Err(server_error(message)?),
        other => Err(Error::UnexpectedMessage(u8::from(other))),
    }
}

fn server_error(message: &Message) -> Result<Error> {
    Ok(Error::ServerError(message.get_error_body()?))
}
