// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Administrative operations, layered on top of [`Workspace`] rather than
//! their own wire messages: storages are configured by writing JSON
//! descriptors under a conventional `/@/local/storages/<id>` path, the way
//! the routed service's own admin space works.

use std::sync::Arc;

use serde_json::json;

use crate::{
    error::{Error, Result},
    model::{entry::Entry, value::Value},
    session::Session,
    workspace::Workspace,
};

const ADMIN_ROOT: &str = "/@/local";

/// A handle onto the admin space of a single session.
pub struct Admin {
    workspace: Workspace,
}

impl Admin {
    /// Opens the admin workspace (`/@/local`) on `session`.
    pub async fn new(session: Arc<Session>) -> Result<Self> {
        Ok(Self { workspace: Workspace::open(session, ADMIN_ROOT).await? })
    }

    /// Declares a storage named `id` covering `selector`, by writing its
    /// JSON descriptor under `storages/<id>`.
    pub async fn add_storage(&self, id: &str, selector: &str) -> Result<()> {
        if id.is_empty() {
            return Err(Error::invalid_path("storage id must not be empty"));
        }
        let descriptor = json!({ "selector": selector });
        self.workspace
            .put(&format!("storages/{id}"), Value::json(descriptor.to_string()))
            .await
    }

    /// Undeclares the storage named `id`.
    pub async fn remove_storage(&self, id: &str) -> Result<()> {
        self.workspace.remove(&format!("storages/{id}")).await
    }

    /// Lists every currently declared storage descriptor.
    pub async fn get_storages(&self) -> Result<Vec<Entry>> {
        self.workspace.get("storages/**").await
    }
}
