use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{CONTENT_TYPE, HeaderValue};
use hyper::{Response, StatusCode};

/// Outcome of a command, rendered as an HTTP response
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// 200 with the value as a `text/plain` body
    Value(Bytes),
    /// 200 with an empty body
    Empty,
    /// 400, malformed escape in the request path
    BadRequest,
    /// 404, key absent
    NotFound,
    /// 405, method is not GET, POST or DELETE
    MethodNotAllowed,
    /// 413, only produced when a body limit is configured
    PayloadTooLarge,
    /// 500
    InternalError,
}

impl Reply {
    pub fn status(&self) -> StatusCode {
        match self {
            Reply::Value(_) | Reply::Empty => StatusCode::OK,
            Reply::BadRequest => StatusCode::BAD_REQUEST,
            Reply::NotFound => StatusCode::NOT_FOUND,
            Reply::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Reply::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Reply::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Render into a hyper response. Only `Value` carries a content type.
    pub fn into_response(self) -> Response<Full<Bytes>> {
        let status = self.status();
        let mut response = match self {
            Reply::Value(value) => {
                let mut response = Response::new(Full::new(value));
                response
                    .headers_mut()
                    .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
                response
            }
            _ => Response::new(Full::new(Bytes::new())),
        };
        *response.status_mut() = status;
        response
    }
}
