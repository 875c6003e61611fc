// src/domain/response.rs

//! Inbound frames and safe field extraction.

use serde_json::Value;

use crate::{Operation, Result, RpcError};

/// Walk `value` through each key in `path`.
///
/// Returns `None` as soon as a segment is missing, an intermediate value is
/// not an object, or the final value is `null`. Present-but-empty values
/// (`""`, `0`, `[]`, ...) are returned as they are.
pub fn get_field<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    // ---
    let mut current = value;
    for key in path {
        current = current.as_object()?.get(*key)?;
    }

    if current.is_null() {
        None
    } else {
        Some(current)
    }
}

/// Like [`get_field`], but also treats falsy values as absent.
///
/// Kept for callers that relied on `""`, `0`, `false`, `[]` and `{}` being
/// indistinguishable from a missing field.
pub fn get_truthy_field<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    get_field(value, path).filter(|v| is_truthy(v))
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// An inbound frame: a call result, a subscription acknowledgement or a push
/// event.
///
/// No schema is enforced; catalog entries read only the fields they need.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Response {
    content: Value,
}

impl Response {
    /// Wrap a decoded frame.
    pub fn new(content: Value) -> Self {
        Self { content }
    }

    /// Response with no content, used for calls nothing answers.
    pub fn empty() -> Self {
        Self::new(Value::Object(serde_json::Map::new()))
    }

    /// Borrow the raw frame.
    pub fn content(&self) -> &Value {
        &self.content
    }

    /// Take ownership of the raw frame.
    pub fn into_content(self) -> Value {
        self.content
    }

    /// See [`get_field`].
    pub fn get_field(&self, path: &[&str]) -> Option<&Value> {
        get_field(&self.content, path)
    }

    /// See [`get_truthy_field`].
    pub fn get_truthy_field(&self, path: &[&str]) -> Option<&Value> {
        get_truthy_field(&self.content, path)
    }

    /// String at `path`, if present and a string.
    pub fn get_str(&self, path: &[&str]) -> Option<&str> {
        self.get_field(path).and_then(Value::as_str)
    }

    /// The `msg` discriminator of the frame.
    pub fn msg(&self) -> Option<&str> {
        self.get_str(&["msg"])
    }

    /// Server-reported error detail.
    pub fn error(&self) -> Option<&Value> {
        self.get_field(&["error"])
    }

    /// Fail with `op`'s error kind when the frame carries an `error` field.
    ///
    /// `"error": null` reads as no error, like any other `null` field. Every
    /// other value, including `false` and `""`, is a server error.
    pub fn ensure_ok(&self, op: Operation) -> Result<()> {
        // ---
        match self.error() {
            Some(detail) => {
                crate::log_warn!("{op} rejected by server: {detail}");
                Err(RpcError::server(op, detail.clone()))
            }
            None => Ok(()),
        }
    }
}

impl From<Value> for Response {
    fn from(content: Value) -> Self {
        Self::new(content)
    }
}
