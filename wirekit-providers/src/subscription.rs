use futures_core::Stream;
use serde_json::Value;
use std::{
    pin::Pin,
    task::{Context, Poll},
};
use tokio::sync::mpsc::UnboundedReceiver;

/// A stream of notifications pushed by the node for one subscription.
///
/// The stream ends when the transport drops its sending half.
#[derive(Debug)]
pub struct Subscription {
    id: String,
    rx: UnboundedReceiver<Value>,
}

impl Subscription {
    pub fn new(id: impl Into<String>, rx: UnboundedReceiver<Value>) -> Self {
        Self { id: id.into(), rx }
    }

    /// The subscription id assigned by the transport
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Stops receiving; notifications already queued can still be drained
    pub fn unsubscribe(&mut self) {
        self.rx.close()
    }
}

impl Stream for Subscription {
    type Item = Value;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}
