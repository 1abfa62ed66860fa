use std::fmt;

use crate::ParameterMap;

/// HTTP verbs supported by the client.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum HttpMethod {
    Get,
    Head,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request ready to hand to a [`Transport`](crate::Transport).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpRequest {
    /// Path appended to the transport's base URL.
    pub path: String,
    pub method: HttpMethod,
    /// Parameters sent in the query string.
    pub query: ParameterMap,
    pub content_type: Option<String>,
    pub content: Option<Vec<u8>>,
}

impl HttpRequest {
    fn bare(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method,
            query: ParameterMap::default(),
            content_type: None,
            content: None,
        }
    }

    pub fn get(path: impl Into<String>, params: impl Into<ParameterMap>) -> Self {
        Self {
            query: params.into(),
            ..Self::bare(HttpMethod::Get, path)
        }
    }

    pub fn head(path: impl Into<String>, params: impl Into<ParameterMap>) -> Self {
        Self {
            query: params.into(),
            ..Self::bare(HttpMethod::Head, path)
        }
    }

    pub fn delete(path: impl Into<String>, params: impl Into<ParameterMap>) -> Self {
        Self {
            query: params.into(),
            ..Self::bare(HttpMethod::Delete, path)
        }
    }

    /// POST with the parameters form-encoded into the body.
    pub fn post_form(path: impl Into<String>, params: impl Into<ParameterMap>) -> Self {
        let body = params.into().url_encode();
        Self::post(path, "application/x-www-form-urlencoded", body.into_bytes())
    }

    pub fn post(
        path: impl Into<String>,
        content_type: impl Into<String>,
        content: impl Into<Vec<u8>>,
    ) -> Self {
        Self::bare(HttpMethod::Post, path).with_content(content_type, content)
    }

    pub fn put(
        path: impl Into<String>,
        content_type: impl Into<String>,
        content: impl Into<Vec<u8>>,
    ) -> Self {
        Self::bare(HttpMethod::Put, path).with_content(content_type, content)
    }

    fn with_content(mut self, content_type: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        self.content_type = Some(content_type.into());
        self.content = Some(content.into());
        self
    }
}

/// A successful response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn body_as_string(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}
