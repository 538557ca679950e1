use std::fmt::{Debug, Display};

use async_trait::async_trait;

use super::types::{ContainerId, ContainerOperation, TxnRef, UidSet};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AclStoreError<T> {
    /// Anything the backing store itself failed at
    #[error("unhandled acl store provider error: {0}")]
    Provider(#[from] T),
    /// A container with this id already exists
    #[error("container {0} already exists")]
    ContainerExists(ContainerId),
    /// No container with this id exists
    #[error("container {0} not found")]
    ContainerNotFound(ContainerId),
    /// The container exists but has no ACL for the operation
    #[error("no acl for {1} on container {0}")]
    AclNotFound(ContainerId, ContainerOperation),
    /// The transaction reference is not known to the store
    #[error("unknown transaction {0}")]
    UnknownTxn(TxnRef),
}

/// Durable home of the per-container ACLs
///
/// Implementations are expected to serialize concurrent mutations of the
/// same (cid, op) pair. When a mutation carries a [`TxnRef`] it must not be
/// visible to non-transactional readers until the transaction commits.
///
/// Errors are returned to the protocol caller unchanged.
#[async_trait]
pub trait AclStore: Send + Sync + Debug + Clone + 'static {
    type Error: Display + Debug + Send + Sync;

    /// Create `cid` with no ACLs defined
    ///
    /// Should fail with `Err(AclStoreError::ContainerExists)` if `cid`
    ///  already exists.
    async fn create_container(
        &self,
        txn: Option<TxnRef>,
        cid: ContainerId,
    ) -> Result<(), AclStoreError<Self::Error>>;

    /// Remove `cid` together with every ACL it holds
    async fn remove_container(
        &self,
        txn: Option<TxnRef>,
        cid: ContainerId,
    ) -> Result<(), AclStoreError<Self::Error>>;

    /// Replace the ACL for (cid, op) with `uids`
    ///
    /// # Arguments
    /// * `txn` - Optional transaction grouping this write
    /// * `cid` - The container, which must exist
    /// * `op` - The operation the ACL governs
    /// * `uids` - The complete new member set
    async fn put_acl(
        &self,
        txn: Option<TxnRef>,
        cid: ContainerId,
        op: ContainerOperation,
        uids: UidSet,
    ) -> Result<(), AclStoreError<Self::Error>>;

    /// Add `set`, then remove `unset`, on the existing ACL for (cid, op)
    ///
    /// The read and the write are one step: concurrent calls on the same pair
    ///  never lose each other's changes. Under a transaction the change is
    ///  applied on top of whatever the transaction staged before it.
    ///
    /// # Returns
    /// * `Err(AclStoreError::AclNotFound)` - No ACL has been created for the pair
    /// * `Err(AclStoreError::ContainerNotFound)` - The container does not exist
    async fn mod_acl(
        &self,
        txn: Option<TxnRef>,
        cid: ContainerId,
        op: ContainerOperation,
        set: UidSet,
        unset: UidSet,
    ) -> Result<(), AclStoreError<Self::Error>>;

    /// Read the committed ACL for (cid, op)
    ///
    /// # Returns
    /// * `Ok(UidSet)` - The current members
    /// * `Err(AclStoreError::AclNotFound)` - No ACL has been created for the pair
    /// * `Err(AclStoreError::ContainerNotFound)` - The container does not exist
    async fn get_acl(
        &self,
        cid: ContainerId,
        op: ContainerOperation,
    ) -> Result<UidSet, AclStoreError<Self::Error>>;

    /// Whether `cid` exists in committed state
    async fn exists(&self, cid: ContainerId) -> Result<bool, AclStoreError<Self::Error>>;
}
