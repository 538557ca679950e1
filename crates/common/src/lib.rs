/**
 * Container access control.
 *  - Identifiers, operations and uid sets
 *  - The request/reply records of the ACL protocol
 *  - The ACL store contract and an in-memory store
 */
pub mod acl;
/**
 * Client side of the ACL protocol, generic over
 *  whatever transport carries the request bytes.
 */
pub mod client;
/**
 * Cryptographic types and operations.
 *  - Symmetric keys and how they are sourced
 *  - Keyed MACs
 *  - Credentials and capabilities
 */
pub mod crypto;
/**
 * Canonical big-endian binary encoding of the
 *  protocol records.
 */
pub mod wire;

pub mod prelude {
    pub use crate::acl::{
        AclStore, AclStoreError, ContainerId, ContainerOperation, MemoryAclStore, Reply,
        ReplyBody, Request, TxnRef, Uid, UidSet,
    };
    pub use crate::client::{AclClient, ClientError, Transport, TransportError};
    pub use crate::crypto::{
        generate_cap, generate_cred, verify_cap, verify_caps, verify_cred, Capability,
        CapabilityData, Credential, CredentialData, Key, KeySource,
    };
    pub use crate::wire::{WireDecode, WireEncode, WireError};
}
