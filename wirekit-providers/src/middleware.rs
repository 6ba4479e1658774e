use crate::{BatchElem, CallContext, ProviderError, RpcCall, RpcProvider, Subscription};
use async_trait::async_trait;
use serde_json::Value;
use std::{fmt, future::Future, pin::Pin, sync::Arc};
use wirekit_core::Param;

/// The future returned by every handler in the pipeline
pub type HandlerFuture<T> = Pin<Box<dyn Future<Output = Result<T, ProviderError>> + Send>>;

/// Handler for [`RpcProvider::call`]
pub type CallFn = Arc<dyn Fn(RpcCall) -> HandlerFuture<Value> + Send + Sync>;
/// Handler for [`RpcProvider::call_context`]
pub type CallContextFn = Arc<dyn Fn(CallContext, RpcCall) -> HandlerFuture<Value> + Send + Sync>;
/// Handler for [`RpcProvider::batch_call`]
pub type BatchCallFn = Arc<dyn Fn(Vec<BatchElem>) -> HandlerFuture<Vec<BatchElem>> + Send + Sync>;
/// Handler for [`RpcProvider::batch_call_context`]
pub type BatchCallContextFn =
    Arc<dyn Fn(CallContext, Vec<BatchElem>) -> HandlerFuture<Vec<BatchElem>> + Send + Sync>;

/// Wraps the next [`CallFn`] into a new one
pub type CallMiddleware = Arc<dyn Fn(CallFn) -> CallFn + Send + Sync>;
/// Wraps the next [`CallContextFn`] into a new one
pub type CallContextMiddleware = Arc<dyn Fn(CallContextFn) -> CallContextFn + Send + Sync>;
/// Wraps the next [`BatchCallFn`] into a new one
pub type BatchCallMiddleware = Arc<dyn Fn(BatchCallFn) -> BatchCallFn + Send + Sync>;
/// Wraps the next [`BatchCallContextFn`] into a new one
pub type BatchCallContextMiddleware =
    Arc<dyn Fn(BatchCallContextFn) -> BatchCallContextFn + Send + Sync>;

/// Builds a [`CallFn`] from a closure
pub fn call_handler<F>(f: F) -> CallFn
where
    F: Fn(RpcCall) -> HandlerFuture<Value> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Builds a [`CallContextFn`] from a closure
pub fn call_context_handler<F>(f: F) -> CallContextFn
where
    F: Fn(CallContext, RpcCall) -> HandlerFuture<Value> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Builds a [`BatchCallFn`] from a closure
pub fn batch_call_handler<F>(f: F) -> BatchCallFn
where
    F: Fn(Vec<BatchElem>) -> HandlerFuture<Vec<BatchElem>> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Builds a [`BatchCallContextFn`] from a closure
pub fn batch_call_context_handler<F>(f: F) -> BatchCallContextFn
where
    F: Fn(CallContext, Vec<BatchElem>) -> HandlerFuture<Vec<BatchElem>> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// A middleware for exactly one call shape
#[derive(Clone)]
pub enum Middleware {
    Call(CallMiddleware),
    CallContext(CallContextMiddleware),
    BatchCall(BatchCallMiddleware),
    BatchCallContext(BatchCallContextMiddleware),
}

impl fmt::Debug for Middleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shape = match self {
            Middleware::Call(_) => "Call",
            Middleware::CallContext(_) => "CallContext",
            Middleware::BatchCall(_) => "BatchCall",
            Middleware::BatchCallContext(_) => "BatchCallContext",
        };
        f.debug_tuple("Middleware").field(&shape).finish()
    }
}

/// A layer that intercepts all four call shapes.
///
/// Every method defaults to delegating to `next` unchanged, so implementors
/// only override the shapes they care about. Install it with
/// [`MiddlewareProvider::layer`].
#[async_trait]
pub trait RpcMiddleware: Send + Sync + 'static {
    async fn call(&self, call: RpcCall, next: CallFn) -> Result<Value, ProviderError> {
        next(call).await
    }

    async fn call_context(
        &self,
        ctx: CallContext,
        call: RpcCall,
        next: CallContextFn,
    ) -> Result<Value, ProviderError> {
        next(ctx, call).await
    }

    async fn batch_call(
        &self,
        batch: Vec<BatchElem>,
        next: BatchCallFn,
    ) -> Result<Vec<BatchElem>, ProviderError> {
        next(batch).await
    }

    async fn batch_call_context(
        &self,
        ctx: CallContext,
        batch: Vec<BatchElem>,
        next: BatchCallContextFn,
    ) -> Result<Vec<BatchElem>, ProviderError> {
        next(ctx, batch).await
    }
}

/// A provider that layers registered middleware around an inner provider.
///
/// Each call shape has its own ordered middleware list. Registering rebuilds
/// that shape's handler by folding the list around the inner provider's
/// primitive, so the first registered middleware runs first on the way in and
/// last on the way out.
///
/// ```
/// use std::sync::Arc;
/// use wirekit_providers::{call_handler, CallFn, MiddlewareProvider, MockTransport, RpcProviderExt};
///
/// # async fn foo() -> Result<(), Box<dyn std::error::Error>> {
/// let mock = MockTransport::new();
/// mock.push("eth_chainId", "0x3")?;
///
/// let mut provider = MiddlewareProvider::new(Arc::new(mock));
/// provider.hook_call(|next: CallFn| -> CallFn {
///     call_handler(move |call| {
///         println!("calling {}", call.method);
///         next(call)
///     })
/// });
/// assert_eq!(provider.chain_id().await?, Some(3u64.into()));
/// # Ok(())
/// # }
/// ```
pub struct MiddlewareProvider {
    inner: Arc<dyn RpcProvider>,

    call_middleware: Vec<CallMiddleware>,
    call_context_middleware: Vec<CallContextMiddleware>,
    batch_call_middleware: Vec<BatchCallMiddleware>,
    batch_call_context_middleware: Vec<BatchCallContextMiddleware>,

    call: CallFn,
    call_context: CallContextFn,
    batch_call: BatchCallFn,
    batch_call_context: BatchCallContextFn,
}

impl fmt::Debug for MiddlewareProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewareProvider")
            .field("inner", &self.inner)
            .field("call_middleware", &self.call_middleware.len())
            .field("call_context_middleware", &self.call_context_middleware.len())
            .field("batch_call_middleware", &self.batch_call_middleware.len())
            .field("batch_call_context_middleware", &self.batch_call_context_middleware.len())
            .finish()
    }
}

impl MiddlewareProvider {
    /// Wraps `inner` without any middleware
    pub fn new(inner: Arc<dyn RpcProvider>) -> Self {
        Self {
            call: call_primitive(&inner),
            call_context: call_context_primitive(&inner),
            batch_call: batch_call_primitive(&inner),
            batch_call_context: batch_call_context_primitive(&inner),
            call_middleware: Vec::new(),
            call_context_middleware: Vec::new(),
            batch_call_middleware: Vec::new(),
            batch_call_context_middleware: Vec::new(),
            inner,
        }
    }

    /// The wrapped provider
    pub fn inner(&self) -> &Arc<dyn RpcProvider> {
        &self.inner
    }

    /// Appends `middleware` to its shape's list and rebuilds that shape
    pub fn register(&mut self, middleware: Middleware) -> &mut Self {
        match middleware {
            Middleware::Call(m) => {
                self.call_middleware.push(m);
                self.call = fold(call_primitive(&self.inner), &self.call_middleware);
            }
            Middleware::CallContext(m) => {
                self.call_context_middleware.push(m);
                self.call_context =
                    fold(call_context_primitive(&self.inner), &self.call_context_middleware);
            }
            Middleware::BatchCall(m) => {
                self.batch_call_middleware.push(m);
                self.batch_call =
                    fold(batch_call_primitive(&self.inner), &self.batch_call_middleware);
            }
            Middleware::BatchCallContext(m) => {
                self.batch_call_context_middleware.push(m);
                self.batch_call_context = fold(
                    batch_call_context_primitive(&self.inner),
                    &self.batch_call_context_middleware,
                );
            }
        }
        self
    }

    /// Registers a closure around [`RpcProvider::call`]
    pub fn hook_call<F>(&mut self, middleware: F) -> &mut Self
    where
        F: Fn(CallFn) -> CallFn + Send + Sync + 'static,
    {
        self.register(Middleware::Call(Arc::new(middleware)))
    }

    /// Registers a closure around [`RpcProvider::call_context`]
    pub fn hook_call_context<F>(&mut self, middleware: F) -> &mut Self
    where
        F: Fn(CallContextFn) -> CallContextFn + Send + Sync + 'static,
    {
        self.register(Middleware::CallContext(Arc::new(middleware)))
    }

    /// Registers a closure around [`RpcProvider::batch_call`]
    pub fn hook_batch_call<F>(&mut self, middleware: F) -> &mut Self
    where
        F: Fn(BatchCallFn) -> BatchCallFn + Send + Sync + 'static,
    {
        self.register(Middleware::BatchCall(Arc::new(middleware)))
    }

    /// Registers a closure around [`RpcProvider::batch_call_context`]
    pub fn hook_batch_call_context<F>(&mut self, middleware: F) -> &mut Self
    where
        F: Fn(BatchCallContextFn) -> BatchCallContextFn + Send + Sync + 'static,
    {
        self.register(Middleware::BatchCallContext(Arc::new(middleware)))
    }

    /// Installs `layer` on all four call shapes
    pub fn layer<M: RpcMiddleware>(&mut self, layer: M) -> &mut Self {
        let layer = Arc::new(layer);

        let m = layer.clone();
        self.hook_call(move |next: CallFn| -> CallFn {
            let m = m.clone();
            call_handler(move |call| {
                let (m, next) = (m.clone(), next.clone());
                Box::pin(async move { m.call(call, next).await })
            })
        });

        let m = layer.clone();
        self.hook_call_context(move |next: CallContextFn| -> CallContextFn {
            let m = m.clone();
            call_context_handler(move |ctx, call| {
                let (m, next) = (m.clone(), next.clone());
                Box::pin(async move { m.call_context(ctx, call, next).await })
            })
        });

        let m = layer.clone();
        self.hook_batch_call(move |next: BatchCallFn| -> BatchCallFn {
            let m = m.clone();
            batch_call_handler(move |batch| {
                let (m, next) = (m.clone(), next.clone());
                Box::pin(async move { m.batch_call(batch, next).await })
            })
        });

        let m = layer;
        self.hook_batch_call_context(move |next: BatchCallContextFn| -> BatchCallContextFn {
            let m = m.clone();
            batch_call_context_handler(move |ctx, batch| {
                let (m, next) = (m.clone(), next.clone());
                Box::pin(async move { m.batch_call_context(ctx, batch, next).await })
            })
        })
    }
}

/// Wraps `primitive` so that `middleware[0]` ends up outermost
fn fold<H>(primitive: H, middleware: &[Arc<dyn Fn(H) -> H + Send + Sync>]) -> H {
    middleware.iter().rev().fold(primitive, |next, m| m(next))
}

fn call_primitive(inner: &Arc<dyn RpcProvider>) -> CallFn {
    let inner = inner.clone();
    call_handler(move |call| {
        let inner = inner.clone();
        Box::pin(async move { inner.call(call).await })
    })
}

fn call_context_primitive(inner: &Arc<dyn RpcProvider>) -> CallContextFn {
    let inner = inner.clone();
    call_context_handler(move |ctx, call| {
        let inner = inner.clone();
        Box::pin(async move { inner.call_context(&ctx, call).await })
    })
}

fn batch_call_primitive(inner: &Arc<dyn RpcProvider>) -> BatchCallFn {
    let inner = inner.clone();
    batch_call_handler(move |batch| {
        let inner = inner.clone();
        Box::pin(async move { inner.batch_call(batch).await })
    })
}

fn batch_call_context_primitive(inner: &Arc<dyn RpcProvider>) -> BatchCallContextFn {
    let inner = inner.clone();
    batch_call_context_handler(move |ctx, batch| {
        let inner = inner.clone();
        Box::pin(async move { inner.batch_call_context(&ctx, batch).await })
    })
}

#[async_trait]
impl RpcProvider for MiddlewareProvider {
    async fn call(&self, call: RpcCall) -> Result<Value, ProviderError> {
        (self.call)(call).await
    }

    async fn call_context(
        &self,
        ctx: &CallContext,
        call: RpcCall,
    ) -> Result<Value, ProviderError> {
        (self.call_context)(ctx.clone(), call).await
    }

    async fn batch_call(&self, batch: Vec<BatchElem>) -> Result<Vec<BatchElem>, ProviderError> {
        if batch.is_empty() {
            return Err(ProviderError::EmptyBatch)
        }
        (self.batch_call)(batch).await
    }

    async fn batch_call_context(
        &self,
        ctx: &CallContext,
        batch: Vec<BatchElem>,
    ) -> Result<Vec<BatchElem>, ProviderError> {
        if batch.is_empty() {
            return Err(ProviderError::EmptyBatch)
        }
        (self.batch_call_context)(ctx.clone(), batch).await
    }

    async fn subscribe(
        &self,
        ctx: &CallContext,
        namespace: &str,
        params: Vec<Param>,
    ) -> Result<Subscription, ProviderError> {
        self.inner.subscribe(ctx, namespace, params).await
    }

    async fn close(&self) -> Result<(), ProviderError> {
        self.inner.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MockTransport, RpcProviderExt};
    use ethers_core::types::U64;
    use parking_lot::Mutex;

    type Trace = Arc<Mutex<Vec<String>>>;

    fn tracing_hook(name: &'static str, trace: Trace) -> impl Fn(CallFn) -> CallFn + Send + Sync {
        move |next: CallFn| -> CallFn {
            let trace = trace.clone();
            call_handler(move |call| {
                let (trace, next) = (trace.clone(), next.clone());
                Box::pin(async move {
                    trace.lock().push(format!("pre {name}"));
                    let res = next(call).await;
                    trace.lock().push(format!("post {name}"));
                    res
                })
            })
        }
    }

    #[tokio::test]
    async fn first_registered_is_outermost() {
        let mock = MockTransport::new();
        mock.push("eth_chainId", U64::from(1)).unwrap();

        let trace = Trace::default();
        let mut provider = MiddlewareProvider::new(Arc::new(mock));
        provider
            .hook_call(tracing_hook("A", trace.clone()))
            .hook_call(tracing_hook("B", trace.clone()))
            .hook_call(tracing_hook("C", trace.clone()));

        provider.chain_id().await.unwrap();
        assert_eq!(
            *trace.lock(),
            vec!["pre A", "pre B", "pre C", "post C", "post B", "post A"]
        );
    }

    #[tokio::test]
    async fn middleware_can_short_circuit() {
        let mock = MockTransport::new();
        let mut provider = MiddlewareProvider::new(Arc::new(mock.clone()));
        provider.hook_call(|_next: CallFn| -> CallFn {
            call_handler(|_call| Box::pin(async { Ok::<_, ProviderError>(serde_json::json!("0x7")) }))
        });

        assert_eq!(provider.chain_id().await.unwrap(), Some(U64::from(7)));
        assert!(mock.requests().is_empty());
    }

    #[tokio::test]
    async fn shapes_are_independent() {
        let mock = MockTransport::new();
        mock.push("eth_chainId", U64::from(1)).unwrap();
        mock.push("eth_chainId", U64::from(1)).unwrap();

        let trace = Trace::default();
        let mut provider = MiddlewareProvider::new(Arc::new(mock));
        provider.hook_call(tracing_hook("A", trace.clone()));

        provider
            .call_context(&CallContext::background(), RpcCall::new("eth_chainId", vec![]))
            .await
            .unwrap();
        assert!(trace.lock().is_empty());

        provider.call(RpcCall::new("eth_chainId", vec![])).await.unwrap();
        assert_eq!(trace.lock().len(), 2);
    }

    struct Rewrite;

    #[async_trait]
    impl RpcMiddleware for Rewrite {
        async fn batch_call(
            &self,
            mut batch: Vec<BatchElem>,
            next: BatchCallFn,
        ) -> Result<Vec<BatchElem>, ProviderError> {
            for elem in batch.iter_mut() {
                elem.method = "eth_gasPrice".to_string();
            }
            next(batch).await
        }
    }

    #[tokio::test]
    async fn layer_defaults_pass_through() {
        let mock = MockTransport::new();
        mock.push("eth_chainId", U64::from(3)).unwrap();
        mock.push("eth_gasPrice", U64::from(9)).unwrap();

        let mut provider = MiddlewareProvider::new(Arc::new(mock.clone()));
        provider.layer(Rewrite);

        assert_eq!(provider.chain_id().await.unwrap(), Some(U64::from(3)));
        let batch = provider.batch_call(vec![BatchElem::new("eth_chainId", vec![])]).await.unwrap();
        assert_eq!(batch[0].decode::<U64>().unwrap(), U64::from(9));

        let err = provider.batch_call(vec![]).await.unwrap_err();
        assert!(matches!(err, ProviderError::EmptyBatch));
    }
}
