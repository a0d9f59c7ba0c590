use reqwest::Method;
use serde::Serialize;

use crate::{ActitoError, Result};

/// A fully described HTTP request, independent of the transport sending it.
#[derive(Clone, Debug, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    /// Serialized JSON body.
    pub body: Option<Vec<u8>>,
    /// Basic auth user and password.
    pub basic_auth: Option<(String, String)>,
}

impl ApiRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            body: None,
            basic_auth: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn put(url: impl Into<String>) -> Self {
        Self::new(Method::PUT, url)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::DELETE, url)
    }

    /// Appends a query parameter.
    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /// Appends a query parameter only when `value` is present.
    pub fn query_opt(self, name: impl Into<String>, value: Option<impl Into<String>>) -> Self {
        match value {
            Some(value) => self.query(name, value),
            None => self,
        }
    }

    /// Serializes `payload` as the JSON body. Dates encode as ISO-8601.
    pub fn json<T: Serialize + ?Sized>(mut self, payload: &T) -> Result<Self> {
        let body = serde_json::to_vec(payload)
            .map_err(|err| ActitoError::InvalidArgument(format!("unserializable body: {err}")))?;
        self.body = Some(body);
        Ok(self)
    }

    pub fn basic_auth(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.basic_auth = Some((user.into(), password.into()));
        self
    }
}

/// One logical request plus its retry settings. Lives for a single
/// [`crate::RequestExecutor::perform`] call chain.
#[derive(Clone, Debug, PartialEq)]
pub struct NetworkRequest {
    pub request: ApiRequest,
    /// Retries after the initial attempt.
    pub max_retries: usize,
    /// Return `Some(vec![])` instead of `None` for empty bodies.
    pub allow_empty_data: bool,
}

impl NetworkRequest {
    /// Default retry count for a request.
    pub const DEFAULT_MAX_RETRIES: usize = 5;

    pub fn new(request: ApiRequest) -> Self {
        Self {
            request,
            max_retries: Self::DEFAULT_MAX_RETRIES,
            allow_empty_data: false,
        }
    }

    pub fn max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn allow_empty_data(mut self, allow: bool) -> Self {
        self.allow_empty_data = allow;
        self
    }
}

impl From<ApiRequest> for NetworkRequest {
    fn from(request: ApiRequest) -> Self {
        Self::new(request)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    use super::{ApiRequest, NetworkRequest};

    #[test]
    fn network_request_defaults() {
        let request = NetworkRequest::new(ApiRequest::get("https://example.test/x"));
        assert_eq!(request.max_retries, 5);
        assert!(!request.allow_empty_data);
    }

    #[test]
    fn optional_query_is_skipped_when_absent() {
        let request = ApiRequest::get("https://example.test/asset")
            .query_opt("deviceID", Some("dev-1"))
            .query_opt("userID", None::<String>);
        assert_eq!(
            request.query,
            vec![("deviceID".to_owned(), "dev-1".to_owned())]
        );
    }

    #[test]
    fn json_body_encodes_dates_as_iso8601() {
        let time = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        let request = ApiRequest::post("https://example.test/event")
            .json(&json!({ "time": time }))
            .expect("must serialize");
        let body = String::from_utf8(request.body.expect("body")).expect("utf8");
        assert_eq!(body, r#"{"time":"2024-03-01T12:30:00Z"}"#);
    }
}
