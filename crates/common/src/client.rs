//! Client side of the ACL protocol
//!
//! [`AclClient`] builds one request record per call, encodes it, hands the
//! bytes to a [`Transport`] and decodes the single reply that comes back.
//! It never touches the network itself.

use async_trait::async_trait;
use bytes::Bytes;

use crate::acl::{
    ContainerId, ContainerOperation, CreateAclArgs, CreateContainerArgs, GetAclArgs, GetCapArgs,
    ModAclArgs, RemoveContainerArgs, Reply, ReplyBody, Request, TxnRef, UidSet, VerifyCapsArgs,
};
use crate::crypto::{Capability, Credential};
use crate::wire::{WireDecode, WireEncode, WireError};

/// Failure reported by the transport carrying the request
#[derive(Debug, thiserror::Error)]
#[error("transport error: {0}")]
pub struct TransportError(#[from] pub anyhow::Error);

/// Message transport the client submits encoded requests to
///
/// `submit` hands the request over and returns a handle, `wait` resolves the
/// handle to the encoded reply.
#[async_trait]
pub trait Transport: Send + Sync {
    type Handle: Send;

    async fn submit(&self, request: Bytes) -> Result<Self::Handle, TransportError>;

    async fn wait(&self, handle: Self::Handle) -> Result<Bytes, TransportError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("unauthorized")]
    Unauthorized,
    #[error("server rejected the request as malformed")]
    Malformed,
    #[error("store error: {0}")]
    Store(String),
    #[error("unexpected reply body for {0}")]
    UnexpectedReply(&'static str),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("undecodable reply: {0}")]
    Wire(#[from] WireError),
}

/// Typed client for the ACL protocol
#[derive(Debug, Clone)]
pub struct AclClient<T> {
    transport: T,
}

impl<T: Transport> AclClient<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    async fn call(&self, request: Request) -> Result<ReplyBody, ClientError> {
        let procedure = request.procedure();
        let handle = self.transport.submit(request.to_bytes()).await?;
        let bytes = self.transport.wait(handle).await?;
        let reply = Reply::from_bytes(&bytes)?;
        tracing::trace!("{:?} -> {:?}", procedure, reply);
        match reply {
            Reply::Ok(body) => Ok(body),
            Reply::Unauthorized => Err(ClientError::Unauthorized),
            Reply::Malformed => Err(ClientError::Malformed),
            Reply::Store(message) => Err(ClientError::Store(message)),
        }
    }

    async fn call_empty(&self, request: Request, name: &'static str) -> Result<(), ClientError> {
        match self.call(request).await? {
            ReplyBody::None => Ok(()),
            _ => Err(ClientError::UnexpectedReply(name)),
        }
    }

    pub async fn create_container(
        &self,
        txn: Option<TxnRef>,
        cid: ContainerId,
        cap: Option<Capability>,
    ) -> Result<(), ClientError> {
        let request = Request::CreateContainer(CreateContainerArgs { txn, cid, cap });
        self.call_empty(request, "create_container").await
    }

    pub async fn remove_container(
        &self,
        txn: Option<TxnRef>,
        cid: ContainerId,
        cap: Option<Capability>,
    ) -> Result<(), ClientError> {
        let request = Request::RemoveContainer(RemoveContainerArgs { txn, cid, cap });
        self.call_empty(request, "remove_container").await
    }

    pub async fn create_acl(
        &self,
        txn: Option<TxnRef>,
        cid: ContainerId,
        op: ContainerOperation,
        uids: UidSet,
        cap: Option<Capability>,
    ) -> Result<(), ClientError> {
        let request = Request::CreateAcl(CreateAclArgs {
            txn,
            cid,
            op,
            uids,
            cap,
        });
        self.call_empty(request, "create_acl").await
    }

    pub async fn get_acl(
        &self,
        cid: ContainerId,
        op: ContainerOperation,
        cap: Option<Capability>,
    ) -> Result<UidSet, ClientError> {
        match self
            .call(Request::GetAcl(GetAclArgs { cid, op, cap }))
            .await?
        {
            ReplyBody::Acl(uids) => Ok(uids),
            _ => Err(ClientError::UnexpectedReply("get_acl")),
        }
    }

    pub async fn mod_acl(
        &self,
        txn: Option<TxnRef>,
        cid: ContainerId,
        op: ContainerOperation,
        set: UidSet,
        unset: UidSet,
        cap: Option<Capability>,
    ) -> Result<(), ClientError> {
        let request = Request::ModAcl(ModAclArgs {
            txn,
            cid,
            op,
            set,
            unset,
            cap,
        });
        self.call_empty(request, "mod_acl").await
    }

    pub async fn get_cap(
        &self,
        cid: ContainerId,
        op: ContainerOperation,
        cred: Credential,
        cap: Option<Capability>,
    ) -> Result<Capability, ClientError> {
        match self
            .call(Request::GetCap(GetCapArgs { cid, op, cred, cap }))
            .await?
        {
            ReplyBody::Cap(cap) => Ok(cap),
            _ => Err(ClientError::UnexpectedReply("get_cap")),
        }
    }

    pub async fn verify_caps(&self, caps: Vec<Capability>) -> Result<(), ClientError> {
        let request = Request::VerifyCaps(VerifyCapsArgs { caps });
        self.call_empty(request, "verify_caps").await
    }
}
