use crate::account::AccountService;
use crate::anime::AnimeService;
use crate::decode;
use crate::decode::DecodeError;
use crate::decode::Page;
use crate::forum::ForumService;
use crate::manga::MangaService;
use crate::option::Params;
use crate::transport::BoxError;
use crate::transport::ReqwestService;
use crate::transport::SharedPerformer;
use crate::user::UserService;
use crate::ErrorPayload;
use crate::MalError;
use crate::Request;
use crate::Response;
use async_trait::async_trait;
use base64::Engine;
use derive_builder::Builder;
use getset::Getters;
use percent_encoding::utf8_percent_encode;
use percent_encoding::AsciiSet;
use percent_encoding::CONTROLS;
use reqwest::header::HeaderMap;
use reqwest::header::HeaderValue;
use reqwest::header::AUTHORIZATION;
use reqwest::header::CONTENT_TYPE;
use reqwest::header::USER_AGENT;
use reqwest::Method;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower::Service;
use tracing::debug;
use tracing::instrument;
use tracing::warn;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://myanimelist.net/";
pub const DEFAULT_API_URL: &str = "https://api.myanimelist.net/v2/";
pub const DEFAULT_USER_AGENT: &str = concat!("myanimelist-rs/", env!("CARGO_PKG_VERSION"));

const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// Characters escaped in a single path segment.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

#[derive(Debug, Clone, Builder, Getters)]
#[builder(setter(into))]
#[getset(get = "pub")]
pub struct ClientConfig {
    /// Root of the legacy XML API.
    #[builder(default = "DEFAULT_BASE_URL.to_string()")]
    base_url: String,
    /// Root of the v2 JSON API.
    #[builder(default = "DEFAULT_API_URL.to_string()")]
    api_url: String,
    #[builder(setter(strip_option), default = "Some(DEFAULT_USER_AGENT.to_string())")]
    user_agent: Option<String>,
}

impl ClientConfigBuilder {
    /// Send requests without a `User-Agent` header.
    pub fn no_user_agent(&mut self) -> &mut Self {
        self.user_agent = Some(None);
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            user_agent: Some(DEFAULT_USER_AGENT.to_string()),
        }
    }
}

/// Supplies bearer tokens for the v2 API.
///
/// Called once per request, right before it is sent, so implementations can
/// refresh expired tokens.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn access_token(&self) -> Result<String, BoxError>;
}

/// A token that never changes.
#[derive(Clone)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StaticToken(..)")
    }
}

#[async_trait]
impl TokenSource for StaticToken {
    async fn access_token(&self) -> Result<String, BoxError> {
        Ok(self.0.clone())
    }
}

/// API generation an endpoint belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Api {
    Legacy,
    V2,
}

#[derive(Clone)]
pub struct Client {
    config: ClientConfig,
    basic: Option<String>,
    token: Option<Arc<dyn TokenSource>>,
    performer: SharedPerformer,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .field("basic_auth", &self.basic.is_some())
            .field("token_source", &self.token.is_some())
            .finish_non_exhaustive()
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new(ClientConfig::default())
    }
}

impl Client {
    pub fn new(config: ClientConfig) -> Self {
        Self::with_service(config, ReqwestService::default())
    }

    /// Use `service` to perform requests instead of the default reqwest
    /// client.
    pub fn with_service<S>(config: ClientConfig, service: S) -> Self
    where
        S: Service<Request, Response = Response> + Clone + Send + Sync + 'static,
        S::Error: Into<BoxError>,
        S::Future: Send,
    {
        Self {
            config,
            basic: None,
            token: None,
            performer: Arc::new(service),
        }
    }

    /// Credentials of the legacy API.
    pub fn basic_auth(mut self, username: &str, password: &str) -> Self {
        let raw = format!("{username}:{password}");
        self.basic = Some(base64::engine::general_purpose::STANDARD.encode(raw));
        self
    }

    /// Token provider of the v2 API.
    pub fn token_source(mut self, source: impl TokenSource + 'static) -> Self {
        self.token = Some(Arc::new(source));
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn account(&self) -> AccountService<'_> {
        AccountService { client: self }
    }

    pub fn anime(&self) -> AnimeService<'_> {
        AnimeService { client: self }
    }

    pub fn manga(&self) -> MangaService<'_> {
        MangaService { client: self }
    }

    pub fn user(&self) -> UserService<'_> {
        UserService { client: self }
    }

    pub fn forum(&self) -> ForumService<'_> {
        ForumService { client: self }
    }

    /// Assemble a request without credentials.
    ///
    /// GET and DELETE carry `params` in the query string, merged over any
    /// query already present in `path`. Other methods send them as an
    /// url-encoded form.
    pub(crate) fn build_request(
        &self,
        api: Api,
        method: Method,
        path: &str,
        params: Params,
    ) -> Result<Request, MalError> {
        let root = match api {
            Api::Legacy => &self.config.base_url,
            Api::V2 => &self.config.api_url,
        };
        let mut url = resolve(root, path)?;

        let mut headers = HeaderMap::new();
        if let Some(agent) = &self.config.user_agent {
            headers.insert(USER_AGENT, HeaderValue::from_str(agent)?);
        }

        let body = if method == Method::GET || method == Method::DELETE {
            let mut query = Params::new();
            for (key, value) in url.query_pairs() {
                query.set(key, value);
            }
            query.extend(params);
            url.set_query(None);
            if !query.is_empty() {
                url.set_query(Some(&query.encode()));
            }
            None
        } else if params.is_empty() {
            None
        } else {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(FORM_URLENCODED));
            Some(params.encode().into_bytes())
        };

        Ok(Request {
            method,
            url,
            headers,
            body,
        })
    }

    async fn authorize(&self, api: Api, req: &mut Request) -> Result<(), MalError> {
        let credentials = match (api, &self.basic, &self.token) {
            (Api::Legacy, Some(basic), _) => format!("Basic {basic}"),
            (Api::V2, _, Some(source)) => {
                let token = source.access_token().await.map_err(MalError::TokenError)?;
                format!("Bearer {token}")
            }
            _ => return Ok(()),
        };
        let mut value = HeaderValue::from_str(&credentials)?;
        value.set_sensitive(true);
        req.headers.insert(AUTHORIZATION, value);
        Ok(())
    }

    #[instrument(level = "debug", skip(self, params, cancel))]
    pub(crate) async fn send(
        &self,
        api: Api,
        method: Method,
        path: &str,
        params: Params,
        cancel: &CancellationToken,
    ) -> Result<Response, MalError> {
        let call = async {
            let mut req = self.build_request(api, method, path, params)?;
            self.authorize(api, &mut req).await?;
            self.performer
                .perform(req)
                .await
                .map_err(MalError::RequestError)
        };

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("request cancelled");
                return Err(MalError::Cancelled);
            }
            response = call => response?,
        };
        debug!(status = %response.status(), len = response.body().len(), "response received");
        classify(api, response)
    }

    pub(crate) async fn get_xml<T: DeserializeOwned>(
        &self,
        path: &str,
        params: Params,
        cancel: &CancellationToken,
    ) -> Result<(T, Response), MalError> {
        let response = self
            .send(Api::Legacy, Method::GET, path, params, cancel)
            .await?;
        decode_with(response, decode::xml)
    }

    /// Post `entry` to a legacy write endpoint as `data=<entry>...</entry>`.
    pub(crate) async fn post_entry<E: Serialize + Sync>(
        &self,
        path: &str,
        entry: &E,
        cancel: &CancellationToken,
    ) -> Result<Response, MalError> {
        let xml = quick_xml::se::to_string_with_root("entry", entry)
            .map_err(MalError::EncodeError)?;
        let mut params = Params::new();
        params.set("data", xml);
        self.send(Api::Legacy, Method::POST, path, params, cancel)
            .await
    }

    pub(crate) async fn json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        params: Params,
        cancel: &CancellationToken,
    ) -> Result<(T, Response), MalError> {
        let response = self.send(Api::V2, method, path, params, cancel).await?;
        decode_with(response, decode::json)
    }

    /// GET a paged v2 list; the paging links end up on the response.
    pub(crate) async fn page<T: DeserializeOwned + Default>(
        &self,
        path: &str,
        params: Params,
        cancel: &CancellationToken,
    ) -> Result<(T, Response), MalError> {
        let (page, mut response) = self.json::<Page<T>>(Method::GET, path, params, cancel).await?;
        response.set_offsets(page.paging.next_offset(), page.paging.prev_offset());
        Ok((page.data, response))
    }
}

fn resolve(root: &str, path: &str) -> Result<Url, MalError> {
    let parse_error = |source| MalError::UrlParseError {
        url: format!("{root}{path}"),
        source,
    };
    let mut base = Url::parse(root).map_err(parse_error)?;
    if !base.path().ends_with('/') {
        let with_slash = format!("{}/", base.path());
        base.set_path(&with_slash);
    }
    base.join(path.trim_start_matches('/')).map_err(parse_error)
}

fn classify(api: Api, response: Response) -> Result<Response, MalError> {
    let status = response.status();
    if status == StatusCode::NO_CONTENT {
        return Err(MalError::NoContent(Box::new(response)));
    }
    if status.is_success() {
        return Ok(response);
    }
    warn!(%status, "request failed");
    if api == Api::V2 {
        let payload = decode::json::<ErrorPayload>(response.body())
            .ok()
            .filter(|payload| !payload.error.is_empty());
        if let Some(payload) = payload {
            return Err(MalError::ApiError {
                payload,
                response: Box::new(response),
            });
        }
    }
    Err(MalError::StatusError {
        status,
        text: response.text(),
        response: Box::new(response),
    })
}

fn decode_with<T>(
    response: Response,
    decode: fn(&[u8]) -> Result<T, DecodeError>,
) -> Result<(T, Response), MalError> {
    match decode(response.body()) {
        Ok(value) => Ok((value, response)),
        Err(source) => {
            warn!(error = %source, "failed to decode response");
            Err(MalError::DeserializeError {
                source,
                response: Box::new(response),
            })
        }
    }
}

/// Percent-encode one free text path segment.
///
/// Empty and dot-only names are rejected: URL resolution would collapse them
/// and hit another endpoint.
pub(crate) fn segment(raw: &str) -> Result<String, MalError> {
    if matches!(raw, "" | "." | "..") {
        return Err(MalError::InvalidPathSegment(raw.to_string()));
    }
    Ok(utf8_percent_encode(raw, SEGMENT).to_string())
}
