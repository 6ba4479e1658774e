use async_trait::async_trait;
use serde_json::Value;
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use url::Url;
use wirekit_core::Param;
use wirekit_middleware::SignerMiddleware;
use wirekit_providers::{
    Authorization, BatchElem, CallContext, Http, HttpClientError, LoggingMiddleware,
    MiddlewareProvider, ProviderError, RetryMiddleware, RpcCall, RpcProvider, Subscription,
    TimeoutProvider,
};
use wirekit_signers::SignerRegistry;

/// Configuration of the default [`Client`] stack.
///
/// | field | default |
/// |---|---|
/// | `retry_count` | 1 |
/// | `retry_interval` | 1s |
/// | `request_timeout` | 30s |
/// | `max_connections_per_host` | unlimited |
/// | `signer_registry` | none, transactions are sent unsigned |
/// | `logging` | enabled |
/// | `authorization` | none |
#[derive(Clone, Debug)]
pub struct ClientOption {
    /// Attempts per call, including the first one
    pub retry_count: u32,
    /// Sleep between attempts
    pub retry_interval: Duration,
    /// Bound on each individual attempt
    pub request_timeout: Duration,
    pub max_connections_per_host: Option<usize>,
    /// Enables local signing of `eth_sendTransaction`
    pub signer_registry: Option<Arc<SignerRegistry>>,
    /// Installs the [`LoggingMiddleware`]
    pub logging: bool,
    /// `Authorization` header sent with every HTTP request
    pub authorization: Option<Authorization>,
}

impl Default for ClientOption {
    fn default() -> Self {
        Self {
            retry_count: 1,
            retry_interval: Duration::from_secs(1),
            request_timeout: Duration::from_secs(30),
            max_connections_per_host: None,
            signer_registry: None,
            logging: true,
            authorization: None,
        }
    }
}

impl ClientOption {
    #[must_use]
    pub fn retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }

    #[must_use]
    pub fn retry_interval(mut self, retry_interval: Duration) -> Self {
        self.retry_interval = retry_interval;
        self
    }

    #[must_use]
    pub fn request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    #[must_use]
    pub fn max_connections_per_host(mut self, max: usize) -> Self {
        self.max_connections_per_host = Some(max);
        self
    }

    #[must_use]
    pub fn signer_registry(mut self, registry: Arc<SignerRegistry>) -> Self {
        self.signer_registry = Some(registry);
        self
    }

    #[must_use]
    pub fn logging(mut self, logging: bool) -> Self {
        self.logging = logging;
        self
    }

    #[must_use]
    pub fn authorization(mut self, authorization: Authorization) -> Self {
        self.authorization = Some(authorization);
        self
    }
}

#[derive(Error, Debug)]
pub enum ClientError {
    #[error(transparent)]
    Url(#[from] url::ParseError),
    #[error(transparent)]
    HttpClient(#[from] HttpClientError),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("signer registry not found")]
    NotFound,
}

/// A node connection with the default middleware stack.
///
/// Calls flow through retry, signing (when a registry is configured) and
/// logging, in that order, and then through a per-attempt timeout into the
/// transport. Use the [`RpcProviderExt`](wirekit_providers::RpcProviderExt)
/// helpers for typed requests.
#[derive(Debug, Clone)]
pub struct Client {
    provider: Arc<MiddlewareProvider>,
    registry: Option<Arc<SignerRegistry>>,
}

impl Client {
    /// Connects to the node at `url` over HTTP
    pub fn new(url: &str, option: ClientOption) -> Result<Self, ClientError> {
        let url = Url::parse(url)?;
        let http = Http::configured(
            url,
            option.authorization.clone(),
            option.max_connections_per_host,
        )?;
        tracing::debug!(url = %http.url(), "connecting");
        Ok(Self::with_transport(Arc::new(http), option))
    }

    /// Builds the default stack on top of any transport
    pub fn with_transport(transport: Arc<dyn RpcProvider>, option: ClientOption) -> Self {
        let transport: Arc<dyn RpcProvider> =
            Arc::new(TimeoutProvider::new(transport, option.request_timeout));

        let mut provider = MiddlewareProvider::new(transport.clone());
        provider.layer(RetryMiddleware::new(option.retry_count, option.retry_interval));
        if let Some(registry) = &option.signer_registry {
            provider.layer(SignerMiddleware::new(transport, registry.clone()));
        }
        if option.logging {
            provider.layer(LoggingMiddleware);
        }

        Self { provider: Arc::new(provider), registry: option.signer_registry }
    }

    /// The registry used for signing, if one was configured
    pub fn signer_registry(&self) -> Result<Arc<SignerRegistry>, ClientError> {
        self.registry.clone().ok_or(ClientError::NotFound)
    }

    /// The assembled pipeline
    pub fn provider(&self) -> &MiddlewareProvider {
        &self.provider
    }
}

#[async_trait]
impl RpcProvider for Client {
    async fn call(&self, call: RpcCall) -> Result<Value, ProviderError> {
        self.provider.call(call).await
    }

    async fn call_context(
        &self,
        ctx: &CallContext,
        call: RpcCall,
    ) -> Result<Value, ProviderError> {
        self.provider.call_context(ctx, call).await
    }

    async fn batch_call(&self, batch: Vec<BatchElem>) -> Result<Vec<BatchElem>, ProviderError> {
        self.provider.batch_call(batch).await
    }

    async fn batch_call_context(
        &self,
        ctx: &CallContext,
        batch: Vec<BatchElem>,
    ) -> Result<Vec<BatchElem>, ProviderError> {
        self.provider.batch_call_context(ctx, batch).await
    }

    async fn subscribe(
        &self,
        ctx: &CallContext,
        namespace: &str,
        params: Vec<Param>,
    ) -> Result<Subscription, ProviderError> {
        self.provider.subscribe(ctx, namespace, params).await
    }

    async fn close(&self) -> Result<(), ProviderError> {
        self.provider.close().await
    }
}
