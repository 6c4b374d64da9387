// Request/response contract between the gate and the host server

use crate::error::{GuardError, Result};
use http::Method;
use std::collections::HashMap;

/// Read-only view of an inbound request.
pub trait GateRequest {
    fn method(&self) -> &Method;

    /// Request path without query string
    fn path(&self) -> &str;

    /// Header value; names are case-insensitive
    fn header(&self, name: &str) -> Option<&str>;

    /// Query or form parameter
    fn parameter(&self, name: &str) -> Option<&str>;
}

/// Outbound response channel.
pub trait ResponseSink {
    fn set_status(&mut self, status: u16) -> Result<()>;

    fn set_header(&mut self, name: &str, value: &str) -> Result<()>;

    /// Append to the body and commit the response. Bodies may be written in
    /// several chunks, but not after a redirect.
    fn write_body(&mut self, bytes: &[u8]) -> Result<()>;

    /// Send a redirect to `location` and commit the response.
    fn write_redirect(&mut self, location: &str, status: u16) -> Result<()>;

    fn is_committed(&self) -> bool;
}

/// In-process request used by hosts without their own request type, and by tests.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub query_params: Vec<(String, String)>,
    pub form_params: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpRequest {
    /// Create a request; a query string in `target` is parsed into parameters.
    pub fn new(method: Method, target: impl Into<String>) -> Self {
        let target = target.into();
        let (path, query_params) = match target.split_once('?') {
            Some((path, query)) => (
                path.to_string(),
                serde_urlencoded::from_str::<Vec<(String, String)>>(query).unwrap_or_default(),
            ),
            None => (target, Vec::new()),
        };

        Self {
            method,
            path,
            headers: HashMap::new(),
            query_params,
            form_params: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn get(target: impl Into<String>) -> Self {
        Self::new(Method::GET, target)
    }

    pub fn post(target: impl Into<String>) -> Self {
        Self::new(Method::POST, target)
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_params.push((name.into(), value.into()));
        self
    }

    /// Set a raw body. Form-urlencoded bodies and the top-level string fields
    /// of JSON object bodies become form parameters.
    pub fn with_body(mut self, content_type: &str, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self.form_params = parse_body_params(content_type, &self.body);
        self.with_header("Content-Type", content_type)
    }

    /// Encode `fields` as a form body.
    pub fn with_form(self, fields: &[(&str, &str)]) -> Self {
        let body = serde_urlencoded::to_string(fields).unwrap_or_default();
        self.with_body("application/x-www-form-urlencoded", body)
    }
}

impl GateRequest for HttpRequest {
    fn method(&self) -> &Method {
        &self.method
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    fn parameter(&self, name: &str) -> Option<&str> {
        self.query_params
            .iter()
            .chain(self.form_params.iter())
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

fn parse_body_params(content_type: &str, body: &[u8]) -> Vec<(String, String)> {
    let content_type = content_type.to_ascii_lowercase();

    if content_type.starts_with("application/x-www-form-urlencoded") {
        return serde_urlencoded::from_bytes(body).unwrap_or_default();
    }

    if content_type.starts_with("application/json") {
        if let Ok(serde_json::Value::Object(fields)) = serde_json::from_slice(body) {
            return fields
                .into_iter()
                .filter_map(|(key, value)| match value {
                    serde_json::Value::String(value) => Some((key, value)),
                    _ => None,
                })
                .collect();
        }
    }

    Vec::new()
}

/// In-process response buffer.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
    committed: bool,
    redirected: bool,
}

impl HttpResponse {
    pub fn new() -> Self {
        Self {
            status: 200,
            headers: HashMap::new(),
            body: Vec::new(),
            committed: false,
            redirected: false,
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn location(&self) -> Option<&str> {
        self.header("Location")
    }

    fn ensure_open(&self) -> Result<()> {
        if self.committed {
            return Err(GuardError::ResponseCommitted);
        }
        Ok(())
    }
}

impl Default for HttpResponse {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseSink for HttpResponse {
    fn set_status(&mut self, status: u16) -> Result<()> {
        self.ensure_open()?;
        self.status = status;
        Ok(())
    }

    fn set_header(&mut self, name: &str, value: &str) -> Result<()> {
        self.ensure_open()?;
        self.headers
            .insert(name.to_ascii_lowercase(), value.to_string());
        Ok(())
    }

    fn write_body(&mut self, bytes: &[u8]) -> Result<()> {
        if self.redirected {
            return Err(GuardError::ResponseCommitted);
        }
        self.body.extend_from_slice(bytes);
        self.committed = true;
        Ok(())
    }

    fn write_redirect(&mut self, location: &str, status: u16) -> Result<()> {
        self.ensure_open()?;
        self.status = status;
        self.headers
            .insert("location".to_string(), location.to_string());
        self.committed = true;
        self.redirected = true;
        Ok(())
    }

    fn is_committed(&self) -> bool {
        self.committed
    }
}
