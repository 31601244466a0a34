//! Client options.

use std::time::Duration;

use crate::middleware::LogLevel;

/// Default maximum number of redirects to follow.
pub const DEFAULT_MAX_REDIRECTS: usize = 10;

/// Connection and request options of an [`crate::HttpsClient`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Request timeout, covering the response body.
    pub timeout: Duration,
    /// TCP connection timeout.
    pub connect_timeout: Duration,
    /// Maximum idle connections per host.
    pub pool_idle_per_host: usize,
    /// Idle connection timeout.
    pub pool_idle_timeout: Duration,
    /// Maximum redirects followed for one request.
    pub max_redirects: usize,
    /// Request/response logging, disabled when `None`.
    pub logging: Option<LogLevel>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            pool_idle_per_host: 32,
            pool_idle_timeout: Duration::from_secs(90),
            max_redirects: DEFAULT_MAX_REDIRECTS,
            logging: None,
        }
    }
}

impl ClientOptions {
    /// Create a new options builder.
    #[must_use]
    pub fn builder() -> ClientOptionsBuilder {
        ClientOptionsBuilder::default()
    }
}

/// Builder for [`ClientOptions`].
#[derive(Debug, Clone, Default)]
pub struct ClientOptionsBuilder {
    timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
    pool_idle_per_host: Option<usize>,
    pool_idle_timeout: Option<Duration>,
    max_redirects: Option<usize>,
    logging: Option<LogLevel>,
}

impl ClientOptionsBuilder {
    /// Set the request timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the connection timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Set the maximum idle connections per host.
    #[must_use]
    pub const fn pool_idle_per_host(mut self, count: usize) -> Self {
        self.pool_idle_per_host = Some(count);
        self
    }

    /// Set the idle connection timeout.
    #[must_use]
    pub const fn pool_idle_timeout(mut self, timeout: Duration) -> Self {
        self.pool_idle_timeout = Some(timeout);
        self
    }

    /// Set the maximum number of redirects.
    #[must_use]
    pub const fn max_redirects(mut self, max: usize) -> Self {
        self.max_redirects = Some(max);
        self
    }

    /// Log requests and responses at the given level.
    #[must_use]
    pub const fn logging(mut self, level: LogLevel) -> Self {
        self.logging = Some(level);
        self
    }

    /// Build the options.
    #[must_use]
    pub fn build(self) -> ClientOptions {
        let defaults = ClientOptions::default();
        ClientOptions {
            timeout: self.timeout.unwrap_or(defaults.timeout),
            connect_timeout: self.connect_timeout.unwrap_or(defaults.connect_timeout),
            pool_idle_per_host: self
                .pool_idle_per_host
                .unwrap_or(defaults.pool_idle_per_host),
            pool_idle_timeout: self.pool_idle_timeout.unwrap_or(defaults.pool_idle_timeout),
            max_redirects: self.max_redirects.unwrap_or(defaults.max_redirects),
            logging: self.logging.or(defaults.logging),
        }
    }
}
