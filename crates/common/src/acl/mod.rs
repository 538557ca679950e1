//! # Container ACLs
//!
//! A container is an ACL-protected namespace. For every
//! ([`ContainerId`], [`ContainerOperation`]) pair an ACL is either absent or
//! present with a [`UidSet`]:
//!
//! ```text
//!  absent --create_acl--> present --mod_acl--> present
//!                            |
//!                  remove_container (with every other ACL of the cid)
//! ```
//!
//! The request records in [`messages`] are what a client sends; the
//! [`AclStore`] trait is the contract of the durable store behind the server.
//! Every mutating record may carry a [`TxnRef`]; it is only forwarded, commit
//! and abort belong to whoever owns the transaction.

pub mod memory;
pub mod messages;
pub mod store;
mod types;

pub use memory::{MemoryAclStore, MemoryAclStoreError};
pub use messages::{
    CreateAclArgs, CreateContainerArgs, GetAclArgs, GetCapArgs, ModAclArgs, Procedure,
    RemoveContainerArgs, Reply, ReplyBody, Request, VerifyCapsArgs,
};
pub use store::{AclStore, AclStoreError};
pub use types::{ContainerId, ContainerOperation, TxnRef, Uid, UidSet, CONTAINER_ID_SIZE};
