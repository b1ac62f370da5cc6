// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The message container: header, optional properties, and a body whose
//! layout depends on the message code. See §4.4 and §6 of the design
//! document for the exact wire grammar.

use crate::{
    codec::vle,
    error::{Error, Result},
    model::{
        opcode::{Code, FLAG_P},
        path::Path,
        selector::Selector,
        value::Value,
    },
};

/// `yaks.login` is the only property key the login flow reads; `wsid` is
/// echoed by the client on every data operation.
pub const PROP_LOGIN: &str = "yaks.login";
pub const PROP_WSID: &str = "wsid";

/// Distinguishes a client-originated EVAL registration from its removal;
/// both share `Code::Eval` and an otherwise identical `wsid`/path shape, so
/// the server tells them apart by this property alone.
pub const PROP_OP: &str = "op";
pub const OP_REGISTER: &str = "register";
pub const OP_UNREGISTER: &str = "unregister";

/// A decoded or to-be-encoded protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub code: Code,
    pub flags: u8,
    pub corr_id: u64,
    pub properties: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Message {
    pub fn new(code: Code, corr_id: u64) -> Self {
        Self {
            code,
            flags: 0,
            corr_id,
            properties: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn has_properties(&self) -> bool {
        self.flags & FLAG_P != 0
    }

    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.flags |= FLAG_P;
        self.properties.push((key.into(), value.into()));
    }

    pub fn get_property(&self, key: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Serializes the message form (header + properties + body), without
    /// the leading VLE length prefix used on the wire.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(2 + 10 + self.body.len());
        out.push(u8::from(self.code));
        out.push(self.flags);
        out.extend_from_slice(&vle::encode(self.corr_id));

        if self.has_properties() {
            out.extend_from_slice(&vle::encode(self.properties.len() as u64));
            for (k, v) in &self.properties {
                push_string(&mut out, k);
                push_string(&mut out, v);
            }
        }

        out.extend_from_slice(&self.body);
        out
    }

    /// Decodes the message form from `buf` (no length prefix).
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < 2 {
            return Err(Error::malformed("message shorter than header"));
        }
        let code = Code::try_from(buf[0])
            .map_err(|e| Error::malformed(e.to_string()))?;
        let flags = buf[1];
        let mut pos = 2;

        let (corr_id, consumed) = vle::decode(&buf[pos..])?;
        pos += consumed;

        let mut properties = Vec::new();
        if flags & FLAG_P != 0 {
            let (count, consumed) = vle::decode(&buf[pos..])?;
            pos += consumed;
            for _ in 0..count {
                let (k, consumed) = read_string(buf, pos)?;
                pos += consumed;
                let (v, consumed) = read_string(buf, pos)?;
                pos += consumed;
                properties.push((k, v));
            }
        }

        let body = buf[pos..].to_vec();
        Ok(Self { code, flags, corr_id, properties, body })
    }

    /// Wraps [`Self::encode`] with the `VLE(len)` framing prefix.
    pub fn to_wire(&self) -> Vec<u8> {
        let body = self.encode();
        let mut out = vle::encode(body.len() as u64);
        out.extend_from_slice(&body);
        out
    }

    // ---- body accessors/builders, one pair per payload shape in §6 ----

    pub fn set_path_body(&mut self, path: &Path) {
        self.body = encode_string(path.as_str());
    }

    pub fn get_path_body(&self) -> Result<Path> {
        let (s, _) = read_string(&self.body, 0)?;
        Path::new(s)
    }

    pub fn set_selector_body(&mut self, selector: &Selector) {
        self.body = encode_string(&selector.to_string_repr());
    }

    pub fn get_selector_body(&self) -> Result<Selector> {
        let (s, _) = read_string(&self.body, 0)?;
        Selector::new(s)
    }

    pub fn set_values_body(&mut self, kvs: &[(Path, Value)]) {
        self.body = encode_key_value_list(kvs);
    }

    pub fn get_values_body(&self) -> Result<Vec<(Path, Value)>> {
        let (kvs, _) = decode_key_value_list(&self.body, 0)?;
        Ok(kvs)
    }

    pub fn set_notify_body(&mut self, sub_id: &str, kvs: &[(Path, Value)]) {
        let mut out = encode_string(sub_id);
        out.extend_from_slice(&encode_key_value_list(kvs));
        self.body = out;
    }

    pub fn get_notify_body(&self) -> Result<(String, Vec<(Path, Value)>)> {
        let (sub_id, consumed) = read_string(&self.body, 0)?;
        let (kvs, _) = decode_key_value_list(&self.body, consumed)?;
        Ok((sub_id, kvs))
    }

    pub fn set_id_body(&mut self, id: &str) {
        self.body = encode_string(id);
    }

    pub fn get_id_body(&self) -> Result<String> {
        let (s, _) = read_string(&self.body, 0)?;
        Ok(s)
    }

    pub fn set_error_body(&mut self, errno: u64) {
        self.body = vle::encode(errno);
    }

    pub fn get_error_body(&self) -> Result<u64> {
        let (errno, _) = vle::decode(&self.body)?;
        Ok(errno)
    }
}

fn push_string(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(&vle::encode(s.len() as u64));
    out.extend_from_slice(s.as_bytes());
}

fn encode_string(s: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(s.len() + 1);
    push_string(&mut out, s);
    out
}

fn read_string(buf: &[u8], pos: usize) -> Result<(String, usize)> {
    let (len, len_consumed) = vle::decode(&buf[pos..])?;
    let len = len as usize;
    let start = pos + len_consumed;
    let end = start
        .checked_add(len)
        .ok_or_else(|| Error::malformed("string length overflow"))?;
    let bytes = buf
        .get(start..end)
        .ok_or_else(|| Error::malformed("truncated string"))?;
    let s = String::from_utf8(bytes.to_vec())
        .map_err(|e| Error::malformed(format!("invalid utf-8: {e}")))?;
    Ok((s, len_consumed + len))
}

fn encode_key_value_list(kvs: &[(Path, Value)]) -> Vec<u8> {
    let mut out = vle::encode(kvs.len() as u64);
    for (path, value) in kvs {
        push_string(&mut out, path.as_str());
        out.extend_from_slice(&value.as_bytes());
    }
    out
}

fn decode_key_value_list(buf: &[u8], pos: usize) -> Result<(Vec<(Path, Value)>, usize)> {
    let (count, mut consumed) = vle::decode(&buf[pos..])?;
    let mut out = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let (key, n) = read_string(buf, pos + consumed)?;
        consumed += n;
        let (value, n) = Value::from_bytes(&buf[pos + consumed..])?;
        consumed += n;
        out.push((Path::new(key)?, value));
    }
    Ok((out, consumed))
}

/// Typed message constructors, one per request/response shape in §6.
pub mod build {
    use super::*;

    pub fn login(corr_id: u64, credentials: Option<(&str, &str)>) -> Message {
        let mut m = Message::new(Code::Login, corr_id);
        if let Some((user, pass)) = credentials {
            m.set_property(PROP_LOGIN, format!("{user}:{pass}"));
        }
        m
    }

    pub fn logout(corr_id: u64) -> Message {
        Message::new(Code::Logout, corr_id)
    }

    pub fn open_workspace(corr_id: u64, path: &Path) -> Message {
        let mut m = Message::new(Code::Workspace, corr_id);
        m.set_path_body(path);
        m
    }

    pub fn put(corr_id: u64, wsid: &str, path: &Path, value: Value) -> Message {
        let mut m = Message::new(Code::Put, corr_id);
        m.set_property(PROP_WSID, wsid);
        m.set_values_body(&[(path.clone(), value)]);
        m
    }

    pub fn update(corr_id: u64, wsid: &str, path: &Path, value: Value) -> Message {
        let mut m = Message::new(Code::Update, corr_id);
        m.set_property(PROP_WSID, wsid);
        m.set_values_body(&[(path.clone(), value)]);
        m
    }

    pub fn get(corr_id: u64, wsid: &str, selector: &Selector) -> Message {
        let mut m = Message::new(Code::Get, corr_id);
        m.set_property(PROP_WSID, wsid);
        m.set_selector_body(selector);
        m
    }

    pub fn delete(corr_id: u64, wsid: &str, path: &Path) -> Message {
        let mut m = Message::new(Code::Delete, corr_id);
        m.set_property(PROP_WSID, wsid);
        m.set_path_body(path);
        m
    }

    pub fn sub(corr_id: u64, wsid: &str, selector: &Selector) -> Message {
        let mut m = Message::new(Code::Sub, corr_id);
        m.set_property(PROP_WSID, wsid);
        m.set_selector_body(selector);
        m
    }

    pub fn unsub(corr_id: u64, wsid: &str, sub_id: &str) -> Message {
        let mut m = Message::new(Code::Unsub, corr_id);
        m.set_property(PROP_WSID, wsid);
        m.set_id_body(sub_id);
        m
    }

    pub fn register_eval(corr_id: u64, wsid: &str, path: &Path) -> Message {
        let mut m = Message::new(Code::Eval, corr_id);
        m.set_property(PROP_WSID, wsid);
        m.set_property(PROP_OP, OP_REGISTER);
        m.set_path_body(path);
        m
    }

    pub fn unregister_eval(corr_id: u64, wsid: &str, path: &Path) -> Message {
        let mut m = Message::new(Code::Eval, corr_id);
        m.set_property(PROP_WSID, wsid);
        m.set_property(PROP_OP, OP_UNREGISTER);
        m.set_path_body(path);
        m
    }

    pub fn notify(sub_id: &str, kvs: &[(Path, Value)]) -> Message {
        let mut m = Message::new(Code::Notify, 0);
        m.set_notify_body(sub_id, kvs);
        m
    }

    pub fn ok(corr_id: u64) -> Message {
        Message::new(Code::Ok, corr_id)
    }

    pub fn ok_with_id(corr_id: u64, id: &str) -> Message {
        let mut m = Message::new(Code::Ok, corr_id);
        m.set_id_body(id);
        m
    }

    pub fn values(corr_id: u64, kvs: &[(Path, Value)]) -> Message {
        let mut m = Message::new(Code::Values, corr_id);
        m.set_values_body(kvs);
        m
    }

    pub fn error(corr_id: u64, errno: u64) -> Message {
        let mut m = Message::new(Code::Error, corr_id);
        m.set_error_body(errno);
        m
    }
}
