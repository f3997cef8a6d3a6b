use std::time::Instant;

use reqwest::blocking::{Client, Request, RequestBuilder, Response};
use tracing::{debug, trace};

use crate::error::Result;

/// Sends a fully built request. Decorators wrap another `Transport`.
pub trait Transport {
    fn execute(&self, request: Request) -> reqwest::Result<Response>;
}

impl Transport for Client {
    fn execute(&self, request: Request) -> reqwest::Result<Response> {
        Client::execute(self, request)
    }
}

/// Wraps a transport in a decorator. Applied in the order supplied, so the
/// last wrapper is the outermost one.
pub type TransportWrapper = Box<dyn Fn(Box<dyn Transport>) -> Box<dyn Transport>>;

/// Logs every request and response at debug level. Headers are only logged
/// at trace level and the Authorization header never is.
pub struct LoggingTransport {
    inner: Box<dyn Transport>,
}

impl LoggingTransport {
    pub fn wrap(inner: Box<dyn Transport>) -> Box<dyn Transport> {
        Box::new(Self { inner })
    }
}

impl Transport for LoggingTransport {
    fn execute(&self, request: Request) -> reqwest::Result<Response> {
        let method = request.method().clone();
        let url = request.url().clone();
        debug!(%method, %url, "sending request");
        for (name, value) in request.headers() {
            if name != reqwest::header::AUTHORIZATION {
                trace!(header = %name, value = ?value, "request header");
            }
        }

        let started = Instant::now();
        let result = self.inner.execute(request);
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match &result {
            Ok(response) => debug!(
                %method,
                %url,
                status = response.status().as_u16(),
                elapsed_ms,
                "received response"
            ),
            Err(e) => debug!(%method, %url, elapsed_ms, error = %e, "request failed"),
        }
        result
    }
}

/// The decorator used by the command line: request/response logging.
pub fn logging_wrapper() -> TransportWrapper {
    Box::new(LoggingTransport::wrap)
}

/// HTTP client plus the decorated transport requests are sent through.
pub struct Http {
    client: Client,
    transport: Box<dyn Transport>,
}

impl Http {
    pub fn new(insecure: bool, wrappers: Vec<TransportWrapper>) -> Result<Self> {
        let mut builder = Client::builder().user_agent(concat!("apicr/", env!("CARGO_PKG_VERSION")));
        if insecure {
            builder = builder
                .danger_accept_invalid_certs(true)
                .danger_accept_invalid_hostnames(true);
        }
        let client = builder.build()?;

        let mut transport: Box<dyn Transport> = Box::new(client.clone());
        for wrap in &wrappers {
            transport = wrap(transport);
        }

        Ok(Self { client, transport })
    }

    /// Starting point for building requests.
    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn send(&self, request: RequestBuilder) -> reqwest::Result<Response> {
        self.transport.execute(request.build()?)
    }
}
