use std::{fmt, sync::Arc, time::Duration};

use reqwest::{blocking, header, Method, StatusCode};

use crate::{Error, HttpMethod, HttpRequest, HttpResponse, Result};

/// Performs a single blocking attempt of a request.
///
/// Implementations must honor `timeout` as the upper bound for the whole
/// attempt and report non-success statuses as errors.
pub trait Transport: Send + Sync {
    fn send(&self, request: &HttpRequest, timeout: Duration) -> Result<HttpResponse>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn send(&self, request: &HttpRequest, timeout: Duration) -> Result<HttpResponse> {
        (**self).send(request, timeout)
    }
}

/// [`Transport`] backed by the blocking `reqwest` client.
///
/// The blocking client owns its own runtime: construct and drop it outside
/// of async contexts.
#[derive(Clone)]
pub struct ReqwestTransport {
    http: blocking::Client,
    base_url: String,
}

impl fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReqwestTransport")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl ReqwestTransport {
    /// Creates a transport that resolves request paths against `base_url`.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = blocking::Client::builder()
            .build()
            .map_err(Error::Transport)?;
        Ok(Self::with_client(http, base_url))
    }

    /// Uses a preconfigured client, e.g. one with custom default headers.
    pub fn with_client(http: blocking::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, path: &str) -> String {
        if path.is_empty() || path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }
}

impl Transport for ReqwestTransport {
    fn send(&self, request: &HttpRequest, timeout: Duration) -> Result<HttpResponse> {
        let mut builder = self
            .http
            .request(to_reqwest_method(request.method), self.url_for(&request.path))
            .timeout(timeout);

        if !request.query.is_empty() {
            let pairs: Vec<(&str, &str)> = request.query.iter().collect();
            builder = builder.query(&pairs);
        }
        if let Some(content_type) = &request.content_type {
            builder = builder.header(header::CONTENT_TYPE, content_type);
        }
        if let Some(content) = &request.content {
            builder = builder.body(content.clone());
        }

        let response = builder.send().map_err(Error::Transport)?;
        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_owned(), value.to_owned()))
            })
            .collect();
        let body = response.bytes();

        if !status.is_success() {
            return Err(status_error(status, body));
        }
        let body = body.map_err(Error::Transport)?;

        Ok(HttpResponse {
            status: status.as_u16(),
            headers,
            body: body.to_vec(),
        })
    }
}

/// Builds the error for a non-success response. An unreadable body is
/// reported as empty; the status is what matters for retrying.
fn status_error<B, E>(status: StatusCode, body: std::result::Result<B, E>) -> Error
where
    B: AsRef<[u8]>,
    E: fmt::Display,
{
    let body = match body {
        Ok(body) => String::from_utf8_lossy(body.as_ref()).into_owned(),
        Err(_err) => {
            #[cfg(feature = "tracing")]
            tracing::debug!("failed to read body of {} response: {}", status, _err);
            String::new()
        }
    };
    Error::Http {
        status: status.as_u16(),
        body,
    }
}

fn to_reqwest_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Head => Method::HEAD,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Delete => Method::DELETE,
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use reqwest::StatusCode;

    use super::{status_error, ReqwestTransport};
    use crate::Error;

    #[test]
    fn url_for_joins_paths_with_single_slash() {
        let transport = ReqwestTransport::new("http://localhost:8080/api/").expect("client");
        assert_eq!(transport.base_url(), "http://localhost:8080/api");
        assert_eq!(transport.url_for("/users"), "http://localhost:8080/api/users");
        assert_eq!(transport.url_for("users"), "http://localhost:8080/api/users");
        assert_eq!(transport.url_for(""), "http://localhost:8080/api");
    }

    #[test]
    fn debug_shows_base_url() {
        let transport = ReqwestTransport::new("http://example.test").expect("client");
        assert!(format!("{transport:?}").contains("http://example.test"));
    }

    #[test]
    fn error_status_keeps_body_text() {
        let err = status_error(StatusCode::NOT_FOUND, Ok::<_, io::Error>(b"missing".to_vec()));
        assert!(matches!(err, Error::Http { status: 404, ref body } if body == "missing"));
    }

    #[test]
    fn unreadable_error_body_keeps_status() {
        let err = status_error(
            StatusCode::SERVICE_UNAVAILABLE,
            Err::<Vec<u8>, _>(io::Error::other("connection reset")),
        );
        assert!(matches!(err, Error::Http { status: 503, ref body } if body.is_empty()));
        assert_eq!(err.status(), Some(503));
    }
}
