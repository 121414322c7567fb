use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::error::RequestError;

pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
pub const JSON_ACCEPT: &str = "application/json";
pub const REQUESTED_WITH_HEADER: &str = "x-requested-with";
pub const REQUESTED_WITH_XHR: &str = "XMLHttpRequest";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    #[default]
    Get,
    Post,
    Delete,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestOptions {
    pub method: Method,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl RequestOptions {
    pub fn get() -> Self {
        Self::default()
    }

    pub fn post(body: impl Into<String>) -> Self {
        Self {
            method: Method::Post,
            headers: Vec::new(),
            body: Some(body.into()),
        }
    }

    pub fn delete() -> Self {
        Self {
            method: Method::Delete,
            ..Self::default()
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Settled result of one network request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub ok: bool,
    pub status: u16,
    pub body: String,
}

impl Response {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            ok: (200..300).contains(&status),
            status,
            body: body.into(),
        }
    }

    pub fn json<T: DeserializeOwned>(&self, url: &str) -> Result<T, RequestError> {
        serde_json::from_str(&self.body).map_err(|err| RequestError::Decode {
            url: url.to_string(),
            message: err.to_string(),
        })
    }

    pub fn error_for_status(self, url: &str) -> Result<Self, RequestError> {
        if self.ok {
            Ok(self)
        } else {
            Err(RequestError::Status {
                url: url.to_string(),
                status: self.status,
            })
        }
    }
}

/// Body returned by the preview endpoint after receiving form data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewState {
    pub is_valid: bool,
    #[serde(default = "default_available")]
    pub is_available: bool,
}

fn default_available() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    #[test]
    fn method_orders_as_map_key_and_serializes_uppercase() {
        let mut counts = BTreeMap::new();
        for method in [Method::Delete, Method::Get, Method::Post, Method::Get] {
            *counts.entry(method).or_insert(0) += 1;
        }

        assert_eq!(
            counts.into_iter().collect::<Vec<_>>(),
            vec![(Method::Get, 2), (Method::Post, 1), (Method::Delete, 1)]
        );
        assert_eq!(
            serde_json::to_string(&Method::Delete).expect("serialize"),
            "\"DELETE\""
        );
    }
}
