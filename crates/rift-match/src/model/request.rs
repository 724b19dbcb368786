//! HTTP request shape, used both as an expectation's request definition and
//! as the concrete request being matched.

use super::body::Body;
use super::multimap::KeysToMultiValues;
use super::nottable::NottableString;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SocketAddress {
    pub host: String,
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub scheme: Option<String>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HttpRequest {
    #[serde(skip_serializing_if = "NottableString::is_blank")]
    pub method: NottableString,
    #[serde(skip_serializing_if = "NottableString::is_blank")]
    pub path: NottableString,
    #[serde(skip_serializing_if = "KeysToMultiValues::is_empty")]
    pub path_parameters: KeysToMultiValues,
    #[serde(
        alias = "queryParameters",
        skip_serializing_if = "KeysToMultiValues::is_empty"
    )]
    pub query_string_parameters: KeysToMultiValues,
    #[serde(skip_serializing_if = "KeysToMultiValues::is_empty")]
    pub headers: KeysToMultiValues,
    #[serde(skip_serializing_if = "KeysToMultiValues::is_empty")]
    pub cookies: KeysToMultiValues,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Body>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keep_alive: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secure: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub socket_address: Option<SocketAddress>,
    #[serde(skip_serializing_if = "is_false")]
    pub not: bool,
}

impl HttpRequest {
    pub fn request() -> Self {
        Self::default()
    }

    pub fn with_method(mut self, method: impl Into<NottableString>) -> Self {
        self.method = method.into();
        self
    }

    pub fn with_path(mut self, path: impl Into<NottableString>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_path_parameter(
        mut self,
        name: impl Into<NottableString>,
        value: impl Into<NottableString>,
    ) -> Self {
        self.path_parameters.add(name, value);
        self
    }

    pub fn with_query_parameter(
        mut self,
        name: impl Into<NottableString>,
        value: impl Into<NottableString>,
    ) -> Self {
        self.query_string_parameters.add(name, value);
        self
    }

    pub fn with_header(
        mut self,
        name: impl Into<NottableString>,
        value: impl Into<NottableString>,
    ) -> Self {
        self.headers.add(name, value);
        self
    }

    pub fn with_cookie(
        mut self,
        name: impl Into<NottableString>,
        value: impl Into<NottableString>,
    ) -> Self {
        self.cookies.add(name, value);
        self
    }

    pub fn with_body(mut self, body: Body) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = Some(keep_alive);
        self
    }

    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = Some(secure);
        self
    }

    pub fn with_socket_address(mut self, socket_address: SocketAddress) -> Self {
        self.socket_address = Some(socket_address);
        self
    }

    pub fn negated(mut self, not: bool) -> Self {
        self.not = not;
        self
    }

    pub fn first_header(&self, name: &str) -> Option<&str> {
        self.headers.first_value(name)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.first_header("content-type")
    }

    pub fn body_as_string(&self) -> String {
        self.body
            .as_ref()
            .map(|body| body.as_string().into_owned())
            .unwrap_or_default()
    }

    pub fn body_as_bytes(&self) -> Vec<u8> {
        self.body
            .as_ref()
            .map(|body| body.as_bytes().into_owned())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_request() {
        let request: HttpRequest = serde_json::from_value(json!({
            "method": "POST",
            "path": "/orders/{id}",
            "pathParameters": {"id": ["[0-9]+"]},
            "queryStringParameters": {"expand": "items"},
            "headers": {"Content-Type": ["application/json"]},
            "cookies": {"session": "abc"},
            "body": {"type": "JSON", "json": {"qty": 1}},
            "secure": true
        }))
        .unwrap();

        assert_eq!(request.method.value(), "POST");
        assert_eq!(request.path_parameters.first_value("id"), Some("[0-9]+"));
        assert_eq!(request.query_string_parameters.first_value("expand"), Some("items"));
        assert_eq!(request.content_type(), Some("application/json"));
        assert_eq!(request.cookies.first_value("session"), Some("abc"));
        assert_eq!(request.secure, Some(true));
        assert!(request.keep_alive.is_none());
        assert!(!request.not);
    }

    #[test]
    fn test_serialize_skips_empty_fields() {
        let request = HttpRequest::request().with_method("GET").with_path("/a");
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value, json!({"method": "GET", "path": "/a"}));
    }

    #[test]
    fn test_body_accessors() {
        let request = HttpRequest::request().with_body(Body::exact("hello"));
        assert_eq!(request.body_as_string(), "hello");
        assert_eq!(request.body_as_bytes(), b"hello".to_vec());
        assert_eq!(HttpRequest::request().body_as_string(), "");
    }
}
