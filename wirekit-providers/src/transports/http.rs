// Code adapted from: https://github.com/althea-net/guac_rs/tree/master/web3/src/jsonrpc

use super::common::{Authorization, Request, Response};
use crate::{BatchElem, CallContext, ProviderError, RpcCall, RpcProvider, Subscription};
use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderValue, InvalidHeaderValue, AUTHORIZATION},
    Client,
};
use serde_json::Value;
use std::{
    str::FromStr,
    sync::atomic::{AtomicU64, Ordering},
};
use thiserror::Error;
use url::Url;
use wirekit_core::Param;

/// A low-level JSON-RPC Client over HTTP.
///
/// # Example
///
/// ```no_run
/// use ethers_core::types::U64;
/// use wirekit_providers::{Http, RpcProviderExt};
/// use std::str::FromStr;
///
/// # async fn foo() -> Result<(), Box<dyn std::error::Error>> {
/// let provider = Http::from_str("http://localhost:8545")?;
/// let block_number: U64 = provider.request("eth_blockNumber", vec![]).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Provider {
    id: AtomicU64,
    client: Client,
    url: Url,
}

impl Provider {
    /// Initializes a new HTTP Client
    ///
    /// # Example
    ///
    /// ```
    /// use wirekit_providers::Http;
    /// use url::Url;
    ///
    /// let url = Url::parse("http://localhost:8545").unwrap();
    /// let provider = Http::new(url);
    /// ```
    pub fn new(url: impl Into<Url>) -> Self {
        Self::new_with_client(url, Client::new())
    }

    /// The Url to which requests are made
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Mutable access to the Url to which requests are made
    pub fn url_mut(&mut self) -> &mut Url {
        &mut self.url
    }

    /// Initializes a new HTTP Client with authentication
    ///
    /// # Example
    ///
    /// ```
    /// use wirekit_providers::{Authorization, Http};
    /// use url::Url;
    ///
    /// let url = Url::parse("http://localhost:8545").unwrap();
    /// let provider = Http::new_with_auth(url, Authorization::basic("admin", "good_password"));
    /// ```
    pub fn new_with_auth(
        url: impl Into<Url>,
        auth: Authorization,
    ) -> Result<Self, ClientBuildError> {
        Self::configured(url, Some(auth), None)
    }

    /// Initializes a new HTTP Client with optional authentication and an
    /// optional cap on the idle connections kept open per host
    pub fn configured(
        url: impl Into<Url>,
        auth: Option<Authorization>,
        max_connections_per_host: Option<usize>,
    ) -> Result<Self, ClientBuildError> {
        let mut builder = Client::builder();

        if let Some(auth) = auth {
            let mut auth_value = HeaderValue::from_str(&auth.to_string())?;
            auth_value.set_sensitive(true);

            let mut headers = HeaderMap::new();
            headers.insert(AUTHORIZATION, auth_value);
            builder = builder.default_headers(headers);
        }

        if let Some(max) = max_connections_per_host {
            builder = builder.pool_max_idle_per_host(max);
        }

        Ok(Self::new_with_client(url, builder.build()?))
    }

    /// Allows to customize the provider by providing your own http client
    ///
    /// # Example
    ///
    /// ```
    /// use wirekit_providers::Http;
    /// use url::Url;
    ///
    /// let url = Url::parse("http://localhost:8545").unwrap();
    /// let client = reqwest::Client::builder().build().unwrap();
    /// let provider = Http::new_with_client(url, client);
    /// ```
    pub fn new_with_client(url: impl Into<Url>, client: reqwest::Client) -> Self {
        Self { id: AtomicU64::new(1), client, url: url.into() }
    }

    async fn send(&self, call: RpcCall) -> Result<Value, ProviderError> {
        let next_id = self.id.fetch_add(1, Ordering::SeqCst);
        let payload = Request::new(next_id, &call.method, &call.params);

        let res = self.client.post(self.url.as_ref()).json(&payload).send().await?;
        let body = res.bytes().await?;

        decode_response(&body)
    }

    async fn send_batch(&self, mut batch: Vec<BatchElem>) -> Result<Vec<BatchElem>, ProviderError> {
        if batch.is_empty() {
            return Err(ProviderError::EmptyBatch)
        }

        let first_id = self.id.fetch_add(batch.len() as u64, Ordering::SeqCst);
        let request = {
            let payload: Vec<Request<'_, &[Param]>> = batch
                .iter()
                .zip(first_id..)
                .map(|(elem, id)| Request::new(id, elem.method.as_str(), elem.params.as_slice()))
                .collect();
            self.client.post(self.url.as_ref()).json(&payload)
        };

        let res = request.send().await?;
        let body = res.bytes().await?;

        decode_batch_response(&mut batch, first_id, &body)?;
        Ok(batch)
    }
}

fn malformed(err: serde_json::Error, body: &[u8]) -> ProviderError {
    ProviderError::MalformedResponse { err, text: String::from_utf8_lossy(body).to_string() }
}

fn decode_response(body: &[u8]) -> Result<Value, ProviderError> {
    match serde_json::from_slice::<Response<'_>>(body) {
        Ok(Response::Success { result, .. }) => {
            serde_json::from_str(result.get()).map_err(|err| malformed(err, body))
        }
        Ok(Response::Error { error, .. }) => Err(error.into()),
        Err(err) => Err(malformed(err, body)),
    }
}

/// Matches the responses of a batch to its elements by request id
fn decode_batch_response(
    batch: &mut [BatchElem],
    first_id: u64,
    body: &[u8],
) -> Result<(), ProviderError> {
    let responses = match serde_json::from_slice::<Vec<Response<'_>>>(body) {
        Ok(responses) => responses,
        Err(err) => {
            // nodes may reject a whole batch with a single error object
            if let Ok(Response::Error { error, .. }) = serde_json::from_slice(body) {
                return Err(error.into())
            }
            return Err(malformed(err, body))
        }
    };

    batch.iter_mut().for_each(BatchElem::reset);

    for response in responses {
        let idx = match response.id().checked_sub(first_id) {
            Some(idx) if (idx as usize) < batch.len() => idx as usize,
            _ => {
                tracing::debug!(id = response.id(), "ignoring unmatched batch response");
                continue
            }
        };

        match response {
            Response::Success { result, .. } => {
                let value = serde_json::from_str(result.get()).map_err(|err| malformed(err, body))?;
                batch[idx].result = Some(value);
            }
            Response::Error { error, .. } => batch[idx].error = Some(error),
        }
    }

    if let Some(missing) = batch.iter().find(|elem| elem.result.is_none() && elem.error.is_none()) {
        return Err(ProviderError::Transport(format!(
            "missing response for batch element `{}`",
            missing.method
        )))
    }

    Ok(())
}

#[async_trait]
impl RpcProvider for Provider {
    async fn call(&self, call: RpcCall) -> Result<Value, ProviderError> {
        self.send(call).await
    }

    async fn call_context(
        &self,
        ctx: &CallContext,
        call: RpcCall,
    ) -> Result<Value, ProviderError> {
        ctx.run(self.send(call)).await
    }

    async fn batch_call(&self, batch: Vec<BatchElem>) -> Result<Vec<BatchElem>, ProviderError> {
        self.send_batch(batch).await
    }

    async fn batch_call_context(
        &self,
        ctx: &CallContext,
        batch: Vec<BatchElem>,
    ) -> Result<Vec<BatchElem>, ProviderError> {
        ctx.run(self.send_batch(batch)).await
    }

    async fn subscribe(
        &self,
        _ctx: &CallContext,
        _namespace: &str,
        _params: Vec<Param>,
    ) -> Result<Subscription, ProviderError> {
        Err(ProviderError::Unsupported("subscriptions over HTTP".to_string()))
    }
}

impl FromStr for Provider {
    type Err = url::ParseError;

    fn from_str(src: &str) -> Result<Self, Self::Err> {
        let url = Url::parse(src)?;
        Ok(Provider::new(url))
    }
}

impl Clone for Provider {
    fn clone(&self) -> Self {
        Self { id: AtomicU64::new(1), client: self.client.clone(), url: self.url.clone() }
    }
}

#[derive(Error, Debug)]
/// Error thrown when dealing with Http clients
pub enum ClientBuildError {
    /// Thrown if unable to build headers for client
    #[error(transparent)]
    InvalidHeader(#[from] InvalidHeaderValue),

    /// Thrown if unable to build client
    #[error(transparent)]
    ClientBuild(#[from] reqwest::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn batch() -> Vec<BatchElem> {
        vec![BatchElem::new("eth_chainId", vec![]), BatchElem::new("eth_gasPrice", vec![])]
    }

    #[test]
    fn decodes_single_response() {
        let value = decode_response(br#"{"jsonrpc":"2.0","id":1,"result":"0x3"}"#).unwrap();
        assert_eq!(value, json!("0x3"));
        let value = decode_response(br#"{"jsonrpc":"2.0","id":2,"result":null}"#).unwrap();
        assert_eq!(value, Value::Null);

        let err = decode_response(
            br#"{"jsonrpc":"2.0","id":1,"error":{"code":-32601,"message":"method not found"}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ProviderError::JsonRpc(ref e) if e.code == -32601));
        assert!(!err.is_retryable());

        let err = decode_response(b"<html>bad gateway</html>").unwrap_err();
        assert!(matches!(err, ProviderError::MalformedResponse { ref text, .. } if text.contains("bad gateway")));
        assert!(err.is_retryable());
    }

    #[test]
    fn matches_batch_responses_by_id() {
        let mut batch = batch();
        let body = br#"[
            {"jsonrpc":"2.0","id":11,"result":"0x5"},
            {"jsonrpc":"2.0","id":10,"error":{"code":-32000,"message":"not ready"}}
        ]"#;
        decode_batch_response(&mut batch, 10, body).unwrap();

        assert_eq!(batch[0].error.as_ref().map(|e| e.message.as_str()), Some("not ready"));
        assert!(batch[0].result.is_none());
        assert_eq!(batch[1].result, Some(json!("0x5")));
    }

    #[test]
    fn missing_batch_response_is_a_transport_error() {
        let mut batch = batch();
        let body = br#"[{"jsonrpc":"2.0","id":10,"result":"0x3"}]"#;
        let err = decode_batch_response(&mut batch, 10, body).unwrap_err();

        assert!(matches!(err, ProviderError::Transport(ref msg) if msg.contains("eth_gasPrice")));
        assert!(err.is_retryable());
    }

    #[test]
    fn rejected_batch_surfaces_rpc_error() {
        let mut batch = batch();
        let body = br#"{"jsonrpc":"2.0","id":0,"error":{"code":-32600,"message":"batch too large"}}"#;
        let err = decode_batch_response(&mut batch, 10, body).unwrap_err();
        assert!(matches!(err, ProviderError::JsonRpc(ref e) if e.code == -32600));
    }

    #[tokio::test]
    async fn http_has_no_subscriptions() {
        let http: Provider = "http://localhost:8545".parse().unwrap();
        let err = http.subscribe(&CallContext::background(), "eth", vec![]).await.unwrap_err();
        assert!(matches!(err, ProviderError::Unsupported(_)));
    }

    #[tokio::test]
    async fn empty_batch_is_rejected() {
        let http: Provider = "http://localhost:8545".parse().unwrap();
        let err = http.batch_call(vec![]).await.unwrap_err();
        assert!(matches!(err, ProviderError::EmptyBatch));
    }
}
