//! Credentials and capabilities
//!
//! Both tokens are a fixed-size payload followed by the MAC of that payload
//! under the authority's key. They differ only in what the payload describes:
//!
//! - [`CredentialData`] (32 bytes): `uid (8) || context (24)`, who the holder is.
//! - [`CapabilityData`] (28 bytes): `cid (16) || operation (4) || holder (8)`,
//!   what the holder may do and where.
//!
//! The payload lengths differ, so a credential can never be replayed as a
//! capability or the other way round.

use bytes::{Buf, BufMut};
use serde::{Deserialize, Serialize};

use super::key::Key;
use super::mac::{compute_mac, Mac, MAC_SIZE};
use crate::acl::{ContainerId, ContainerOperation, Uid, CONTAINER_ID_SIZE};
use crate::wire::{self, FixedWireSize, WireDecode, WireEncode, WireError};

/// Size of the opaque principal context carried in a credential
pub const CREDENTIAL_CONTEXT_SIZE: usize = 24;
/// Size of an encoded credential payload
pub const CREDENTIAL_DATA_SIZE: usize = 8 + CREDENTIAL_CONTEXT_SIZE;
/// Size of an encoded capability payload
pub const CAPABILITY_DATA_SIZE: usize = CONTAINER_ID_SIZE + 4 + 8;

/// A credential failed verification
///
/// Carries no detail, the caller only ever learns "unauthorized".
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unauthorized")]
pub struct VerifyCredError;

/// A capability (or one member of a batch) failed verification
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unauthorized")]
pub struct VerifyCapError;

/// Identity of a principal, as asserted by the authority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialData {
    pub uid: Uid,
    /// Opaque principal context, never interpreted here
    pub context: [u8; CREDENTIAL_CONTEXT_SIZE],
}

impl CredentialData {
    pub fn new(uid: Uid) -> Self {
        Self {
            uid,
            context: [0; CREDENTIAL_CONTEXT_SIZE],
        }
    }

    pub fn with_context(uid: Uid, context: [u8; CREDENTIAL_CONTEXT_SIZE]) -> Self {
        Self { uid, context }
    }

    pub fn to_bytes(&self) -> [u8; CREDENTIAL_DATA_SIZE] {
        let mut out = [0u8; CREDENTIAL_DATA_SIZE];
        out[..8].copy_from_slice(&self.uid.0.to_be_bytes());
        out[8..].copy_from_slice(&self.context);
        out
    }

    pub fn from_bytes(bytes: &[u8; CREDENTIAL_DATA_SIZE]) -> Self {
        let mut buf = &bytes[..];
        let uid = Uid(buf.get_u64());
        let mut context = [0u8; CREDENTIAL_CONTEXT_SIZE];
        buf.copy_to_slice(&mut context);
        Self { uid, context }
    }
}

/// Scope of a capability: one operation on one container, for one holder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityData {
    pub cid: ContainerId,
    pub op: ContainerOperation,
    pub holder: Uid,
}

impl CapabilityData {
    pub fn new(cid: ContainerId, op: ContainerOperation, holder: Uid) -> Self {
        Self { cid, op, holder }
    }

    pub fn to_bytes(&self) -> [u8; CAPABILITY_DATA_SIZE] {
        let mut out = [0u8; CAPABILITY_DATA_SIZE];
        let mut buf = &mut out[..];
        buf.put_slice(self.cid.bytes());
        buf.put_u32(self.op.0);
        buf.put_u64(self.holder.0);
        out
    }

    pub fn from_bytes(bytes: &[u8; CAPABILITY_DATA_SIZE]) -> Self {
        let mut buf = &bytes[..];
        let mut cid = [0u8; CONTAINER_ID_SIZE];
        buf.copy_to_slice(&mut cid);
        let op = ContainerOperation(buf.get_u32());
        let holder = Uid(buf.get_u64());
        Self {
            cid: cid.into(),
            op,
            holder,
        }
    }
}

/// Signed proof of a principal's identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub data: CredentialData,
    pub mac: Mac,
}

/// Signed authorization for one operation on one container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capability {
    pub data: CapabilityData,
    pub mac: Mac,
}

/// Issue a credential for `data` under `key`
pub fn generate_cred(key: &Key, data: &CredentialData) -> Credential {
    Credential {
        data: *data,
        mac: compute_mac(key, &data.to_bytes()),
    }
}

/// Check that `cred` was issued under `key`
///
/// The MAC is recomputed and compared in constant time over its full length.
pub fn verify_cred(key: &Key, cred: &Credential) -> Result<(), VerifyCredError> {
    if compute_mac(key, &cred.data.to_bytes()) == cred.mac {
        Ok(())
    } else {
        Err(VerifyCredError)
    }
}

/// Issue a capability for `data` under `key`
pub fn generate_cap(key: &Key, data: &CapabilityData) -> Capability {
    Capability {
        data: *data,
        mac: compute_mac(key, &data.to_bytes()),
    }
}

/// Check that `cap` was issued under `key`
pub fn verify_cap(key: &Key, cap: &Capability) -> Result<(), VerifyCapError> {
    if compute_mac(key, &cap.data.to_bytes()) == cap.mac {
        Ok(())
    } else {
        Err(VerifyCapError)
    }
}

/// Verify a batch of capabilities, all or nothing
///
/// Every member is checked even after a failure, so neither the result nor
/// the time taken depends on where a forged entry sits. An empty batch
/// verifies.
pub fn verify_caps(key: &Key, caps: &[Capability]) -> Result<(), VerifyCapError> {
    let failures = caps
        .iter()
        .filter(|cap| verify_cap(key, cap).is_err())
        .count();
    if failures == 0 {
        Ok(())
    } else {
        Err(VerifyCapError)
    }
}

impl Credential {
    pub fn uid(&self) -> Uid {
        self.data.uid
    }
}

impl Capability {
    pub fn cid(&self) -> ContainerId {
        self.data.cid
    }

    pub fn op(&self) -> ContainerOperation {
        self.data.op
    }
}

// Wire layouts: the raw payload bytes followed by the raw MAC

impl FixedWireSize for Mac {
    const WIRE_SIZE: usize = MAC_SIZE;
}

impl WireEncode for Mac {
    fn encode<B: BufMut>(&self, buf: &mut B) {
        buf.put_slice(self.bytes());
    }
}

impl WireDecode for Mac {
    fn decode<B: Buf>(buf: &mut B) -> Result<Self, WireError> {
        Ok(Mac::from(wire::get_fixed::<MAC_SIZE, _>(buf)?))
    }
}

impl FixedWireSize for Credential {
    const WIRE_SIZE: usize = CREDENTIAL_DATA_SIZE + MAC_SIZE;
}

impl WireEncode for Credential {
    fn encode<B: BufMut>(&self, buf: &mut B) {
        buf.put_slice(&self.data.to_bytes());
        self.mac.encode(buf);
    }
}

impl WireDecode for Credential {
    fn decode<B: Buf>(buf: &mut B) -> Result<Self, WireError> {
        let data = CredentialData::from_bytes(&wire::get_fixed(buf)?);
        let mac = Mac::decode(buf)?;
        Ok(Self { data, mac })
    }
}

impl FixedWireSize for Capability {
    const WIRE_SIZE: usize = CAPABILITY_DATA_SIZE + MAC_SIZE;
}

impl WireEncode for Capability {
    fn encode<B: BufMut>(&self, buf: &mut B) {
        buf.put_slice(&self.data.to_bytes());
        self.mac.encode(buf);
    }
}

impl WireDecode for Capability {
    fn decode<B: Buf>(buf: &mut B) -> Result<Self, WireError> {
        let data = CapabilityData::from_bytes(&wire::get_fixed(buf)?);
        let mac = Mac::decode(buf)?;
        Ok(Self { data, mac })
    }
}
