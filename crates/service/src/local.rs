//! In-process transport
//!
//! Lets an [`AclClient`](common::client::AclClient) talk to a [`Handler`]
//! living in the same process. Each submitted request runs as its own tokio
//! task; the handle is the task's join handle.

use async_trait::async_trait;
use bytes::Bytes;
use tokio::task::JoinHandle;

use common::acl::AclStore;
use common::client::{Transport, TransportError};

use crate::handler::Handler;

#[derive(Debug, Clone)]
pub struct LocalTransport<S> {
    handler: Handler<S>,
}

impl<S: AclStore> LocalTransport<S> {
    pub fn new(handler: Handler<S>) -> Self {
        Self { handler }
    }

    pub fn handler(&self) -> &Handler<S> {
        &self.handler
    }
}

#[async_trait]
impl<S: AclStore> Transport for LocalTransport<S> {
    type Handle = JoinHandle<Bytes>;

    async fn submit(&self, request: Bytes) -> Result<Self::Handle, TransportError> {
        let handler = self.handler.clone();
        Ok(tokio::spawn(async move { handler.handle(&request).await }))
    }

    async fn wait(&self, handle: Self::Handle) -> Result<Bytes, TransportError> {
        handle
            .await
            .map_err(|e| anyhow::anyhow!("request task failed: {}", e).into())
    }
}
