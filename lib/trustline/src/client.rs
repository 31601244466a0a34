//! HTTPS client implementation using hyper-util.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use bytes::Bytes;
use http::Request;
use http_body_util::{BodyExt, Full};
use hyper_rustls::HttpsConnector;
use hyper_util::{
    client::legacy::{Client, connect::HttpConnector},
    rt::{TokioExecutor, TokioTimer},
};
use tower::Layer;
use tower::util::BoxCloneService;
use tower_service::Service;
use trustline_core::{RedirectPolicy, SecureClientContext};
use url::Url;

use crate::{
    ClientOptions, Error, Response, Result,
    connector::https_connector,
    middleware::{FollowRedirectLayer, LoggingLayer},
};

// ============================================================================
// Type-Erased Service for Middleware Composition
// ============================================================================

/// Type-erased service for middleware composition.
pub type BoxedService = BoxCloneService<Request<Bytes>, Response, Error>;

/// Future type for Tower Service implementation.
pub type ServiceFuture = Pin<Box<dyn Future<Output = Result<Response>> + Send + 'static>>;

/// Makes the boxed service `Sync` so the client can be shared across tasks.
#[derive(Clone)]
struct SyncService {
    inner: Arc<Mutex<BoxedService>>,
}

impl SyncService {
    fn new(service: BoxedService) -> Self {
        Self {
            inner: Arc::new(Mutex::new(service)),
        }
    }

    fn call(&self, request: Request<Bytes>) -> ServiceFuture {
        // Lock, clone the service, and release the lock immediately
        let mut service = self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone();

        Box::pin(async move { service.call(request).await })
    }
}

// ============================================================================
// Raw Client
// ============================================================================

/// hyper-util client bound to one TLS context.
#[derive(Clone)]
struct RawHttpsClient {
    inner: Client<HttpsConnector<HttpConnector>, Full<Bytes>>,
    options: ClientOptions,
}

impl RawHttpsClient {
    fn new(context: &SecureClientContext, options: ClientOptions) -> Self {
        let connector = https_connector(context, &options);

        let inner = Client::builder(TokioExecutor::new())
            .pool_timer(TokioTimer::new())
            .pool_idle_timeout(options.pool_idle_timeout)
            .pool_max_idle_per_host(options.pool_idle_per_host)
            .build(connector);

        Self { inner, options }
    }

    async fn execute(&self, request: Request<Bytes>) -> Result<Response> {
        let request = request.map(Full::new);

        let exchange = async {
            let response = self
                .inner
                .request(request)
                .await
                .map_err(|e| Error::transport(&e))?;

            let (parts, body) = response.into_parts();
            let body = body
                .collect()
                .await
                .map_err(|e| Error::transport(&e))?
                .to_bytes();

            Ok::<_, Error>(Response::new(parts.status, parts.headers, body))
        };

        tokio::time::timeout(self.options.timeout, exchange)
            .await
            .map_err(|_| Error::Timeout)?
    }
}

impl Service<Request<Bytes>> for RawHttpsClient {
    type Response = Response;
    type Error = Error;
    type Future = ServiceFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request<Bytes>) -> Self::Future {
        let client = self.clone();
        Box::pin(async move { client.execute(request).await })
    }
}

// ============================================================================
// Public Client
// ============================================================================

/// HTTPS client with connection pooling, the trust decisions of its
/// [`SecureClientContext`], and middleware support.
///
/// Cloning is cheap and clones share the connection pool.
///
/// # Example
///
/// ```ignore
/// use trustline::{HttpClientFactory, TrustConfiguration};
///
/// let config = TrustConfiguration::default().trusted_certificate("/certs/ca.crt");
/// let client = HttpClientFactory::new().create_client(&config)?;
///
/// let response = client.get("https://internal.example.com/service?id=1").await?;
/// ```
#[derive(Clone)]
pub struct HttpsClient {
    service: SyncService,
    context: SecureClientContext,
    options: ClientOptions,
}

impl std::fmt::Debug for HttpsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpsClient")
            .field("context", &self.context)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl HttpsClient {
    /// Create a client with default options.
    #[must_use]
    pub fn new(context: SecureClientContext) -> Self {
        Self::builder(context).build()
    }

    /// Create a new client builder.
    #[must_use]
    pub fn builder(context: SecureClientContext) -> HttpsClientBuilder {
        HttpsClientBuilder {
            context,
            options: ClientOptions::default(),
            layers: Vec::new(),
        }
    }

    /// Send a request and buffer the response.
    ///
    /// Non-2xx statuses are returned as responses; use
    /// [`Response::error_for_status`] to turn them into errors.
    pub async fn send(&self, request: Request<Bytes>) -> Result<Response> {
        self.service.call(request).await
    }

    /// Send a GET request.
    pub async fn get(&self, url: &str) -> Result<Response> {
        let url = Url::parse(url)?;
        let request = Request::get(url.as_str())
            .body(Bytes::new())
            .map_err(|e| Error::invalid_request(e.to_string()))?;
        self.send(request).await
    }

    /// The secure context this client was built from.
    #[must_use]
    pub const fn context(&self) -> &SecureClientContext {
        &self.context
    }

    /// The client options.
    #[must_use]
    pub const fn options(&self) -> &ClientOptions {
        &self.options
    }
}

impl Service<Request<Bytes>> for HttpsClient {
    type Response = Response;
    type Error = Error;
    type Future = ServiceFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request<Bytes>) -> Self::Future {
        self.service.call(request)
    }
}

/// Builder for [`HttpsClient`].
///
/// Logging (when enabled in [`ClientOptions::logging`]) wraps each hop,
/// redirects are followed outside of it, and custom layers wrap the whole
/// stack in the order they were added.
pub struct HttpsClientBuilder {
    context: SecureClientContext,
    options: ClientOptions,
    layers: Vec<Arc<dyn Fn(BoxedService) -> BoxedService + Send + Sync>>,
}

impl std::fmt::Debug for HttpsClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpsClientBuilder")
            .field("context", &self.context)
            .field("options", &self.options)
            .field("layers_count", &self.layers.len())
            .finish()
    }
}

impl HttpsClientBuilder {
    /// Replace the client options.
    #[must_use]
    pub fn options(mut self, options: ClientOptions) -> Self {
        self.options = options;
        self
    }

    /// Add a Tower layer to the client.
    #[must_use]
    pub fn layer<L>(mut self, layer: L) -> Self
    where
        L: Layer<BoxedService> + Send + Sync + 'static,
        L::Service:
            Service<Request<Bytes>, Response = Response, Error = Error> + Clone + Send + 'static,
        <L::Service as Service<Request<Bytes>>>::Future: Send,
    {
        self.layers.push(Arc::new(move |service| {
            BoxCloneService::new(layer.layer(service))
        }));
        self
    }

    /// Build the client. No I/O happens until the first request.
    #[must_use]
    pub fn build(self) -> HttpsClient {
        let raw = RawHttpsClient::new(&self.context, self.options.clone());
        let mut service: BoxedService = BoxCloneService::new(raw);

        if let Some(level) = self.options.logging {
            service = BoxCloneService::new(LoggingLayer::with_level(level).layer(service));
        }

        let policy = self.context.redirect_policy();
        if policy != RedirectPolicy::Never {
            let redirects =
                FollowRedirectLayer::new(policy).max_redirects(self.options.max_redirects);
            service = BoxCloneService::new(redirects.layer(service));
        }

        for layer_fn in self.layers {
            service = layer_fn(service);
        }

        HttpsClient {
            service: SyncService::new(service),
            context: self.context,
            options: self.options,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use trustline_core::{TrustConfiguration, build_context};

    use super::*;

    fn context() -> SecureClientContext {
        build_context(&TrustConfiguration::default(), RedirectPolicy::Normal).expect("context")
    }

    #[test]
    fn client_is_clone_and_debug() {
        let client = HttpsClient::new(context());
        let cloned = client.clone();
        let debug = format!("{cloned:?}");
        assert!(debug.contains("HttpsClient"));
        assert!(debug.contains("need_client_auth: true"));
    }

    #[test]
    fn builder_options() {
        let options = ClientOptions::builder()
            .timeout(Duration::from_secs(3))
            .build();
        let client = HttpsClient::builder(context()).options(options).build();
        assert_eq!(client.options().timeout, Duration::from_secs(3));
    }

    #[test]
    fn client_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<HttpsClient>();
    }

    #[tokio::test]
    async fn invalid_url_is_rejected() {
        let client = HttpsClient::new(context());
        let result = client.get("not a url").await;
        assert!(matches!(result, Err(Error::InvalidUrl(_))));
    }
}
