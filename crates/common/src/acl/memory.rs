use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::store::{AclStore, AclStoreError};
use super::types::{ContainerId, ContainerOperation, TxnRef, UidSet};

type Containers = HashMap<ContainerId, HashMap<ContainerOperation, UidSet>>;

/// In-memory ACL store using HashMaps
///
/// Mutations without a transaction apply immediately, each under the write
/// lock. Mutations that name a transaction opened with
/// [`MemoryAclStore::begin`] are staged and only applied, in order and all
/// together, by [`MemoryAclStore::commit`]. A staged `mod_acl` therefore sees
/// everything staged before it in the same transaction, and any error it
/// would raise surfaces from `commit`.
#[derive(Debug, Clone)]
pub struct MemoryAclStore {
    inner: Arc<RwLock<MemoryAclStoreInner>>,
}

#[derive(Debug, Default)]
struct MemoryAclStoreInner {
    /// Committed state: cid -> op -> members
    containers: Containers,
    /// Staged mutations per open transaction
    staged: HashMap<TxnRef, Vec<Mutation>>,
    /// Next transaction id handed out by `begin`
    next_txn: u64,
}

#[derive(Debug, Clone)]
enum Mutation {
    CreateContainer(ContainerId),
    RemoveContainer(ContainerId),
    PutAcl(ContainerId, ContainerOperation, UidSet),
    ModAcl(ContainerId, ContainerOperation, UidSet, UidSet),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MemoryAclStoreError {
    #[error("memory store error: {0}")]
    Internal(String),
}

type Result<T> = std::result::Result<T, AclStoreError<MemoryAclStoreError>>;

impl Mutation {
    fn apply(self, containers: &mut Containers) -> Result<()> {
        match self {
            Mutation::CreateContainer(cid) => {
                if containers.contains_key(&cid) {
                    return Err(AclStoreError::ContainerExists(cid));
                }
                containers.insert(cid, HashMap::new());
            }
            Mutation::RemoveContainer(cid) => {
                containers
                    .remove(&cid)
                    .ok_or(AclStoreError::ContainerNotFound(cid))?;
            }
            Mutation::PutAcl(cid, op, uids) => {
                containers
                    .get_mut(&cid)
                    .ok_or(AclStoreError::ContainerNotFound(cid))?
                    .insert(op, uids);
            }
            Mutation::ModAcl(cid, op, set, unset) => {
                let uids = containers
                    .get_mut(&cid)
                    .ok_or(AclStoreError::ContainerNotFound(cid))?
                    .get_mut(&op)
                    .ok_or(AclStoreError::AclNotFound(cid, op))?;
                uids.apply(&set, &unset);
                *uids = std::mem::take(uids).dedup();
            }
        }
        Ok(())
    }
}

impl MemoryAclStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(MemoryAclStoreInner::default())),
        }
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, MemoryAclStoreInner>> {
        self.inner.read().map_err(|e| {
            AclStoreError::Provider(MemoryAclStoreError::Internal(format!(
                "failed to acquire read lock: {}",
                e
            )))
        })
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, MemoryAclStoreInner>> {
        self.inner.write().map_err(|e| {
            AclStoreError::Provider(MemoryAclStoreError::Internal(format!(
                "failed to acquire write lock: {}",
                e
            )))
        })
    }

    fn mutate(&self, txn: Option<TxnRef>, mutation: Mutation) -> Result<()> {
        let mut inner = self.write()?;
        match txn {
            Some(txn) => {
                inner
                    .staged
                    .get_mut(&txn)
                    .ok_or(AclStoreError::UnknownTxn(txn))?
                    .push(mutation);
                tracing::trace!("staged mutation in {}", txn);
                Ok(())
            }
            None => mutation.apply(&mut inner.containers),
        }
    }

    /// Open a transaction that later mutations can be staged under
    pub fn begin(&self) -> Result<TxnRef> {
        let mut inner = self.write()?;
        inner.next_txn += 1;
        let txn = TxnRef(inner.next_txn);
        inner.staged.insert(txn, Vec::new());
        tracing::debug!("opened {}", txn);
        Ok(txn)
    }

    /// Apply every mutation staged under `txn`
    ///
    /// Either all of them apply or none do. The transaction is closed in
    ///  both cases.
    pub fn commit(&self, txn: TxnRef) -> Result<usize> {
        let mut inner = self.write()?;
        let staged = inner
            .staged
            .remove(&txn)
            .ok_or(AclStoreError::UnknownTxn(txn))?;
        let count = staged.len();

        let mut next = inner.containers.clone();
        for mutation in staged {
            mutation.apply(&mut next)?;
        }
        inner.containers = next;

        tracing::debug!("committed {} with {} mutations", txn, count);
        Ok(count)
    }

    /// Discard every mutation staged under `txn`
    pub fn abort(&self, txn: TxnRef) -> Result<()> {
        let mut inner = self.write()?;
        inner
            .staged
            .remove(&txn)
            .ok_or(AclStoreError::UnknownTxn(txn))?;
        tracing::debug!("aborted {}", txn);
        Ok(())
    }
}

impl Default for MemoryAclStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AclStore for MemoryAclStore {
    type Error = MemoryAclStoreError;

    async fn create_container(&self, txn: Option<TxnRef>, cid: ContainerId) -> Result<()> {
        self.mutate(txn, Mutation::CreateContainer(cid))
    }

    async fn remove_container(&self, txn: Option<TxnRef>, cid: ContainerId) -> Result<()> {
        self.mutate(txn, Mutation::RemoveContainer(cid))
    }

    async fn put_acl(
        &self,
        txn: Option<TxnRef>,
        cid: ContainerId,
        op: ContainerOperation,
        uids: UidSet,
    ) -> Result<()> {
        self.mutate(txn, Mutation::PutAcl(cid, op, uids))
    }

    async fn mod_acl(
        &self,
        txn: Option<TxnRef>,
        cid: ContainerId,
        op: ContainerOperation,
        set: UidSet,
        unset: UidSet,
    ) -> Result<()> {
        self.mutate(txn, Mutation::ModAcl(cid, op, set, unset))
    }

    async fn get_acl(&self, cid: ContainerId, op: ContainerOperation) -> Result<UidSet> {
        let inner = self.read()?;
        inner
            .containers
            .get(&cid)
            .ok_or(AclStoreError::ContainerNotFound(cid))?
            .get(&op)
            .cloned()
            .ok_or(AclStoreError::AclNotFound(cid, op))
    }

    async fn exists(&self, cid: ContainerId) -> Result<bool> {
        Ok(self.read()?.containers.contains_key(&cid))
    }
}
