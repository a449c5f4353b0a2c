use futures::future::BoxFuture;
use futures::Future;
use getset::CopyGetters;
use getset::Getters;
use reqwest::header::HeaderMap;
use reqwest::Method;
use reqwest::StatusCode;
use std::pin::Pin;
use std::sync::Arc;
use tower::Service;
use tower::ServiceExt;
use tracing::debug;
use tracing::debug_span;
use tracing::Instrument;
use url::Url;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A fully assembled outbound request.
#[derive(Debug, Clone, Getters)]
#[getset(get = "pub")]
pub struct Request {
    pub(crate) method: Method,
    pub(crate) url: Url,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Option<Vec<u8>>,
}

/// The response of a call, returned even when decoding fails.
///
/// `body` is exactly what the server sent.
#[derive(Debug, Clone, Getters, CopyGetters)]
pub struct Response {
    #[getset(get_copy = "pub")]
    status: StatusCode,
    #[getset(get = "pub")]
    status_text: String,
    #[getset(get = "pub")]
    headers: HeaderMap,
    #[getset(get = "pub")]
    body: Vec<u8>,
    #[getset(get_copy = "pub")]
    next_offset: u32,
    #[getset(get_copy = "pub")]
    prev_offset: u32,
}

impl Response {
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body: body.into(),
            next_offset: 0,
            prev_offset: 0,
        }
    }

    pub fn status_text_override(mut self, text: impl Into<String>) -> Self {
        self.status_text = text.into();
        self
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub(crate) fn set_offsets(&mut self, next: u32, prev: u32) {
        self.next_offset = next;
        self.prev_offset = prev;
    }
}

/// Performs requests over the network with reqwest.
#[derive(Debug, Clone, Default)]
pub struct ReqwestService {
    client: reqwest::Client,
}

impl ReqwestService {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Service<Request> for ReqwestService {
    type Response = Response;
    type Error = reqwest::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let client = self.client.clone();
        let span = debug_span!("reqwest", method = %req.method, path = req.url.path());
        let fut = async move {
            let mut builder = client.request(req.method, req.url).headers(req.headers);
            if let Some(body) = req.body {
                builder = builder.body(body);
            }
            let response = builder.send().await?;
            let status = response.status();
            let headers = response.headers().clone();
            let body = response.bytes().await?;
            debug!(%status, len = body.len(), "response read");
            Ok(Response::new(status, headers, body.to_vec()))
        };

        Box::pin(fut.instrument(span))
    }
}

/// Object safe view of any cloneable performer service.
pub(crate) trait Perform: Send + Sync {
    fn perform(&self, req: Request) -> BoxFuture<'static, Result<Response, BoxError>>;
}

impl<S> Perform for S
where
    S: Service<Request, Response = Response> + Clone + Send + Sync + 'static,
    S::Error: Into<BoxError>,
    S::Future: Send,
{
    fn perform(&self, req: Request) -> BoxFuture<'static, Result<Response, BoxError>> {
        let service = self.clone();
        Box::pin(async move { service.oneshot(req).await.map_err(Into::into) })
    }
}

pub(crate) type SharedPerformer = Arc<dyn Perform>;

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn test_service_fn_is_a_performer() {
        let svc = tower::service_fn(|req: Request| async move {
            assert_eq!(req.method(), &Method::GET);
            Ok::<_, BoxError>(Response::new(StatusCode::OK, HeaderMap::new(), "pong"))
        });
        let performer: SharedPerformer = Arc::new(svc);
        let req = Request {
            method: Method::GET,
            url: Url::parse("http://localhost/ping").unwrap(),
            headers: HeaderMap::new(),
            body: None,
        };
        let response = performer.perform(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.status_text(), "OK");
        assert_eq!(response.body(), b"pong");
        assert_eq!(response.next_offset(), 0);
    }

    #[test]
    fn test_status_text_override() {
        let response = Response::new(StatusCode::CREATED, HeaderMap::new(), "Created")
            .status_text_override("Created!");
        assert_eq!(response.status_text(), "Created!");
        assert_eq!(response.text(), "Created");
    }
}
