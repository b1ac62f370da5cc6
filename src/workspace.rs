// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! [`Workspace`]: the facade most callers use, scoping every operation to a
//! path rooted on the server and resolving relative paths against it.
//! Grounded on the upstream workspace's `__to_absolute`/`get` logic: a
//! selector carrying `starttime`/`stoptime` asks for a time series (every
//! matching entry, oldest first); any other selector asks for the current
//! state (one entry per matching path).

use std::sync::Arc;

use crate::{
    error::Result,
    model::{
        entry::{Entry, sort_by_timestamp_ascending},
        path::Path,
        selector::Selector,
        value::Value,
    },
    session::{EvalFn, Session, SubscriptionListener},
};

/// A session-scoped view rooted at [`Workspace::path`]. Relative paths and
/// selectors passed to its methods are resolved against that root; absolute
/// ones (starting with `/`) pass through unchanged.
pub struct Workspace {
    session: Arc<Session>,
    wsid: String,
    path: Path,
}

impl Workspace {
    pub(crate) fn new(session: Arc<Session>, wsid: String, path: Path) -> Self {
        Self { session, wsid, path }
    }

    /// Opens a workspace rooted at `path` on `session`, the entry point
    /// most callers use to get hold of a [`Workspace`].
    pub async fn open(session: Arc<Session>, path: impl AsRef<str>) -> Result<Self> {
        let path = Path::new(path.as_ref())?;
        let wsid = session.open_workspace(&path).await?;
        Ok(Self::new(session, wsid, path))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn id(&self) -> &str {
        &self.wsid
    }

    fn to_absolute(&self, path: &str) -> Result<Path> {
        resolve_path(&self.path, path)
    }

    fn to_absolute_selector(&self, selector: &str) -> Result<Selector> {
        resolve_selector(&self.path, selector)
    }

    pub async fn put(&self, path: &str, value: Value) -> Result<()> {
        let absolute = self.to_absolute(path)?;
        self.session.put(&self.wsid, &absolute, value).await
    }

    pub async fn update(&self, path: &str, value: Value) -> Result<()> {
        let absolute = self.to_absolute(path)?;
        self.session.update(&self.wsid, &absolute, value).await
    }

    /// Resolves `selector` and returns either a full time series (oldest
    /// first) or the current value for each matching path, depending on
    /// whether the selector carries `starttime`/`stoptime`.
    pub async fn get(&self, selector: &str) -> Result<Vec<Entry>> {
        let selector = self.to_absolute_selector(selector)?;
        let kvs = self.session.get(&self.wsid, &selector).await?;
        let mut entries: Vec<Entry> =
            kvs.into_iter().map(|(path, value)| Entry::new(path, value, None)).collect();

        if is_series_selector(&selector) {
            sort_by_timestamp_ascending(&mut entries);
            return Ok(entries);
        }

        let mut latest: Vec<Entry> = Vec::with_capacity(entries.len());
        for entry in entries.drain(..) {
            match latest.iter_mut().find(|kept| kept.path == entry.path) {
                Some(kept) => *kept = entry,
                None => latest.push(entry),
            }
        }
        Ok(latest)
    }

    /// Triggers any eval registered at a path matching `selector` and
    /// returns its results. Evals are invoked by the server over the same
    /// request the data path uses; there is no separate wire operation.
    pub async fn eval(&self, selector: &str) -> Result<Vec<Entry>> {
        self.get(selector).await
    }

    pub async fn remove(&self, path: &str) -> Result<()> {
        let absolute = self.to_absolute(path)?;
        self.session.delete(&self.wsid, &absolute).await
    }

    pub async fn subscribe(
        &self,
        selector: &str,
        listener: impl Fn(Vec<crate::model::entry::Change>) + Send + Sync + 'static,
    ) -> Result<String> {
        let selector = self.to_absolute_selector(selector)?;
        let listener: SubscriptionListener = Arc::new(listener);
        self.session.subscribe(&self.wsid, &selector, listener).await
    }

    pub async fn unsubscribe(&self, sub_id: &str) -> Result<()> {
        self.session.unsubscribe(&self.wsid, sub_id).await
    }

    pub async fn register_eval(
        &self,
        path: &str,
        callback: impl Fn(&str, crate::model::selector::QueryDict) -> Result<Value>
        + Send
        + Sync
        + 'static,
    ) -> Result<()> {
        let absolute = self.to_absolute(path)?;
        let callback: EvalFn = Arc::new(callback);
        self.session.register_eval(&self.wsid, &absolute, callback).await
    }

    pub async fn unregister_eval(&self, path: &str) -> Result<()> {
        let absolute = self.to_absolute(path)?;
        self.session.unregister_eval(&self.wsid, &absolute).await
    }
}

fn is_series_selector(selector: &Selector) -> bool {
    let dict = selector.query_dict();
    dict.contains_key("starttime") || dict.contains_key("stoptime")
}

/// Resolves `path` against `root`: absolute paths (leading `/`) pass
/// through unchanged, relative ones are joined onto `root`.
fn resolve_path(root: &Path, path: &str) -> Result<Path> {
    if path.starts_with('/') {
        Path::new(path)
    } else {
        Path::new(format!("{}/{}", root.as_str(), path))
    }
}

/// Same as [`resolve_path`] but for a selector string, resolving only its
/// path part and reattaching the query part (if any) unchanged.
fn resolve_selector(root: &Path, selector: &str) -> Result<Selector> {
    let (path_part, rest) = match selector.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (selector, None),
    };
    let absolute = resolve_path(root, path_part)?;
    let repr = match rest {
        Some(q) => format!("{}?{q}", absolute.as_str()),
        None => absolute.into_string(),
    };
    Selector::new(repr)
}
