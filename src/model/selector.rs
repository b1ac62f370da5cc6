// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Selector grammar: a possibly-wildcarded path plus an optional query
//! string, used for `get`, `subscribe`, and eval dispatch.

use std::collections::HashMap;

use crate::error::{Error, Result};

/// A value in a parsed query dictionary: either a leaf string or another
/// nested dictionary, produced by splitting dotted keys (`a.b=v`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryValue {
    Leaf(String),
    Nested(HashMap<String, QueryValue>),
}

impl QueryValue {
    pub fn as_leaf(&self) -> Option<&str> {
        match self {
            QueryValue::Leaf(s) => Some(s),
            QueryValue::Nested(_) => None,
        }
    }

    pub fn as_nested(&self) -> Option<&HashMap<String, QueryValue>> {
        match self {
            QueryValue::Nested(m) => Some(m),
            QueryValue::Leaf(_) => None,
        }
    }
}

pub type QueryDict = HashMap<String, QueryValue>;

/// A possibly-wildcarded path plus an optional query part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    path_part: String,
    query_part: Option<String>,
}

impl Selector {
    /// Parses `s` by splitting on the first `?`. `path_part` must be
    /// non-empty and contain only path characters plus `*`.
    pub fn new(s: impl AsRef<str>) -> Result<Self> {
        let s = s.as_ref();
        let (path_part, query_part) = match s.split_once('?') {
            Some((p, q)) => (p, Some(q.to_string())),
            None => (s, None),
        };

        if path_part.is_empty() || path_part.contains(['?', '#']) {
            return Err(Error::invalid_selector(s.to_string()));
        }

        Ok(Self {
            path_part: path_part.to_string(),
            query_part,
        })
    }

    pub fn path_part(&self) -> &str {
        &self.path_part
    }

    /// Everything after the `?`, unparsed, or `""` if there was none.
    pub fn optional_part(&self) -> &str {
        self.query_part.as_deref().unwrap_or("")
    }

    pub fn to_string_repr(&self) -> String {
        match &self.query_part {
            Some(q) => format!("{}?{}", self.path_part, q),
            None => self.path_part.clone(),
        }
    }

    /// Parses the query part into a possibly-nested mapping. `a.b.c=v`
    /// becomes `{a: {b: {c: v}}}`.
    pub fn query_dict(&self) -> QueryDict {
        let mut root = QueryDict::new();
        let Some(query) = &self.query_part else {
            return root;
        };
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let Some((key, value)) = pair.split_once('=') else {
                continue;
            };
            insert_dotted(&mut root, key, value);
        }
        root
    }

    /// True iff `path` matches this selector's wildcard grammar: `*`
    /// matches exactly one path segment, `**` matches zero or more.
    pub fn matches(&self, path: &str) -> bool {
        let pattern: Vec<&str> = self.path_part.split('/').collect();
        let candidate: Vec<&str> = path.split('/').collect();
        match_segments(&pattern, &candidate)
    }
}

fn insert_dotted(root: &mut QueryDict, key: &str, value: &str) {
    let mut parts = key.split('.');
    let Some(first) = parts.next() else { return };
    let rest: Vec<&str> = parts.collect();

    if rest.is_empty() {
        root.insert(first.to_string(), QueryValue::Leaf(value.to_string()));
        return;
    }

    let entry = root
        .entry(first.to_string())
        .or_insert_with(|| QueryValue::Nested(QueryDict::new()));
    if let QueryValue::Nested(nested) = entry {
        insert_dotted(nested, &rest.join("."), value);
    } else {
        *entry = QueryValue::Nested(QueryDict::new());
        if let QueryValue::Nested(nested) = entry {
            insert_dotted(nested, &rest.join("."), value);
        }
    }
}

fn match_segments(pattern: &[&str], path: &[&str]) -> bool {
    match pattern.first() {
        None => path.is_empty(),
        Some(&"**") => {
            match_segments(&pattern[1..], path)
                || (!path.is_empty() && match_segments(pattern, &path[1..]))
        },
        Some(&seg) => {
            !path.is_empty()
                && (seg == "*" || seg == path[0])
                && match_segments(&pattern[1..], &path[1..])
        },
    }
}
