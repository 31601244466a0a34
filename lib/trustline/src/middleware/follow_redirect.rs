//! Follow redirect middleware.
//!
//! Follows 3xx responses carrying a `Location` header, within the limits of a
//! [`RedirectPolicy`] and a maximum redirect count.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use http::header::{
    AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, COOKIE, HOST, LOCATION, PROXY_AUTHORIZATION,
};
use http::{Method, Request, StatusCode, Uri};
use tower::{Layer, Service};
use tracing::debug;
use trustline_core::RedirectPolicy;
use url::Url;

use crate::config::DEFAULT_MAX_REDIRECTS;
use crate::{Error, Response, Result};

/// Layer that follows HTTP redirects.
///
/// # Example
///
/// ```ignore
/// use trustline::middleware::FollowRedirectLayer;
/// use trustline_core::RedirectPolicy;
///
/// let layer = FollowRedirectLayer::new(RedirectPolicy::Normal).max_redirects(5);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct FollowRedirectLayer {
    policy: RedirectPolicy,
    max_redirects: usize,
}

impl Default for FollowRedirectLayer {
    fn default() -> Self {
        Self::new(RedirectPolicy::default())
    }
}

impl FollowRedirectLayer {
    /// Create a layer following redirects allowed by `policy`, up to 10.
    #[must_use]
    pub const fn new(policy: RedirectPolicy) -> Self {
        Self {
            policy,
            max_redirects: DEFAULT_MAX_REDIRECTS,
        }
    }

    /// Set the maximum number of redirects.
    #[must_use]
    pub const fn max_redirects(mut self, max_redirects: usize) -> Self {
        self.max_redirects = max_redirects;
        self
    }
}

impl<S> Layer<S> for FollowRedirectLayer {
    type Service = FollowRedirect<S>;

    fn layer(&self, inner: S) -> Self::Service {
        FollowRedirect {
            inner,
            policy: self.policy,
            max_redirects: self.max_redirects,
        }
    }
}

/// Service that follows HTTP redirects.
#[derive(Debug, Clone)]
pub struct FollowRedirect<S> {
    inner: S,
    policy: RedirectPolicy,
    max_redirects: usize,
}

fn is_redirect(status: StatusCode) -> bool {
    matches!(status.as_u16(), 301 | 302 | 303 | 307 | 308)
}

/// 307 and 308 keep method and body, the others switch to a bodiless GET.
fn preserves_method(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TEMPORARY_REDIRECT | StatusCode::PERMANENT_REDIRECT
    )
}

fn replicate(request: &Request<Bytes>) -> Request<Bytes> {
    let mut copy = Request::new(request.body().clone());
    *copy.method_mut() = request.method().clone();
    *copy.uri_mut() = request.uri().clone();
    *copy.version_mut() = request.version();
    *copy.headers_mut() = request.headers().clone();
    copy
}

fn same_origin(from: &Url, to: &Url) -> bool {
    from.scheme() == to.scheme()
        && from.host_str() == to.host_str()
        && from.port_or_known_default() == to.port_or_known_default()
}

fn redirected_request(
    previous: Request<Bytes>,
    status: StatusCode,
    from: &Url,
    to: &Url,
) -> Result<Request<Bytes>> {
    let (mut parts, body) = previous.into_parts();

    parts.uri = to
        .as_str()
        .parse::<Uri>()
        .map_err(|e| Error::invalid_redirect(format!("{to}: {e}")))?;

    let body = if preserves_method(status) {
        body
    } else {
        parts.method = Method::GET;
        parts.headers.remove(CONTENT_TYPE);
        parts.headers.remove(CONTENT_LENGTH);
        Bytes::new()
    };

    parts.headers.remove(HOST);
    if !same_origin(from, to) {
        parts.headers.remove(AUTHORIZATION);
        parts.headers.remove(PROXY_AUTHORIZATION);
        parts.headers.remove(COOKIE);
    }

    Ok(Request::from_parts(parts, body))
}

impl<S> Service<Request<Bytes>> for FollowRedirect<S>
where
    S: Service<Request<Bytes>, Response = Response, Error = Error> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<()>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Bytes>) -> Self::Future {
        let mut inner = self.inner.clone();
        let policy = self.policy;
        let max_redirects = self.max_redirects;

        Box::pin(async move {
            let mut current = request;
            let mut redirects = 0;

            loop {
                let response = inner.call(replicate(&current)).await?;
                if !is_redirect(response.status()) {
                    return Ok(response);
                }

                let location = response.header(LOCATION).ok_or_else(|| {
                    Error::invalid_redirect("redirect response missing Location header")
                })?;
                let from = Url::parse(&current.uri().to_string())?;
                let to = from.join(location)?;

                if !policy.follows(from.scheme(), to.scheme()) {
                    debug!(%from, %to, ?policy, "redirect not followed");
                    return Ok(response);
                }

                if redirects >= max_redirects {
                    return Err(Error::TooManyRedirects {
                        count: redirects,
                        max: max_redirects,
                    });
                }

                debug!(status = response.status().as_u16(), %from, %to, "following redirect");
                current = redirected_request(current, response.status(), &from, &to)?;
                redirects += 1;
            }
        })
    }
}
