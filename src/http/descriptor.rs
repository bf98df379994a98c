//! Request descriptors: the immutable description of one backend call.
//!
//! Descriptors have no mutators once built. Retries reuse the same instance,
//! so every attempt sends exactly the body and query the tool built.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use crate::types::{Error, Result};

/// HTTP method subset used by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// One backend request: method, path, query, optional JSON body, extra headers.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    method: Method,
    path: String,
    query: BTreeMap<String, String>,
    body: Option<Value>,
    headers: BTreeMap<String, String>,
}

impl RequestDescriptor {
    pub fn builder(method: Method, path: impl Into<String>) -> DescriptorBuilder {
        DescriptorBuilder {
            inner: RequestDescriptor {
                method,
                path: path.into(),
                query: BTreeMap::new(),
                body: None,
                headers: BTreeMap::new(),
            },
        }
    }

    pub fn get(path: impl Into<String>) -> DescriptorBuilder {
        Self::builder(Method::Get, path)
    }

    pub fn post(path: impl Into<String>) -> DescriptorBuilder {
        Self::builder(Method::Post, path)
    }

    pub fn put(path: impl Into<String>) -> DescriptorBuilder {
        Self::builder(Method::Put, path)
    }

    pub fn delete(path: impl Into<String>) -> DescriptorBuilder {
        Self::builder(Method::Delete, path)
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> &BTreeMap<String, String> {
        &self.query
    }

    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }
}

/// Builder consumed into a `RequestDescriptor`.
#[derive(Debug)]
pub struct DescriptorBuilder {
    inner: RequestDescriptor,
}

impl DescriptorBuilder {
    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.inner.query.insert(key.into(), value.to_string());
        self
    }

    /// Add a JSON scalar as a query parameter. Objects and arrays are rejected.
    pub fn query_value(mut self, key: impl Into<String>, value: &Value) -> Result<Self> {
        let key = key.into();
        let rendered = match value {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Null => return Ok(self),
            Value::Array(_) | Value::Object(_) => {
                return Err(Error::invalid_argument(
                    key,
                    "query values must be scalars (string, number or boolean)",
                ))
            }
        };
        self.inner.query.insert(key, rendered);
        Ok(self)
    }

    pub fn body(mut self, body: Value) -> Self {
        self.inner.body = Some(body);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.inner.headers.insert(name.into(), value.into());
        self
    }

    pub fn build(self) -> RequestDescriptor {
        self.inner
    }
}

/// Percent-encode a caller-supplied value for use as one path segment.
pub fn path_segment(raw: &str) -> String {
    urlencoding::encode(raw).into_owned()
}
