use std::fmt;

use bytes::{Buf, BufMut};
use serde::{Deserialize, Serialize};

use crate::wire::{self, FixedWireSize, WireDecode, WireEncode, WireError};

/// Size of a container identifier in bytes
pub const CONTAINER_ID_SIZE: usize = 16;

/// Opaque identifier naming an ACL-protected container
///
/// No internal structure is interpreted; two ids are the same container
/// exactly when their bytes are equal.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContainerId([u8; CONTAINER_ID_SIZE]);

impl ContainerId {
    /// Generate a random container id
    pub fn random() -> Self {
        ContainerId(rand::random())
    }

    /// Get a reference to the id bytes
    pub fn bytes(&self) -> &[u8; CONTAINER_ID_SIZE] {
        &self.0
    }

    /// Parse a container id from a hexadecimal string
    pub fn from_hex(hex: &str) -> Result<Self, hex::FromHexError> {
        let mut buff = [0; CONTAINER_ID_SIZE];
        hex::decode_to_slice(hex, &mut buff)?;
        Ok(ContainerId(buff))
    }

    /// Convert the id to a hexadecimal string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl From<[u8; CONTAINER_ID_SIZE]> for ContainerId {
    fn from(bytes: [u8; CONTAINER_ID_SIZE]) -> Self {
        ContainerId(bytes)
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContainerId({})", self.to_hex())
    }
}

/// Which action within a container an ACL entry governs
///
/// Carried as an opaque word. The associated constants name the codes the
/// authority itself gives meaning to; any other value passes through untouched.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContainerOperation(pub u32);

impl ContainerOperation {
    pub const READ: Self = Self(1);
    pub const WRITE: Self = Self(2);
    pub const CREATE_ENTRY: Self = Self(3);
    pub const REMOVE_ENTRY: Self = Self(4);
    /// Manage the container itself and its ACLs
    pub const ADMIN: Self = Self(0x100);
}

impl fmt::Display for ContainerOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::READ => write!(f, "read"),
            Self::WRITE => write!(f, "write"),
            Self::CREATE_ENTRY => write!(f, "create-entry"),
            Self::REMOVE_ENTRY => write!(f, "remove-entry"),
            Self::ADMIN => write!(f, "admin"),
            Self(code) => write!(f, "op#{}", code),
        }
    }
}

impl fmt::Debug for ContainerOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContainerOperation({})", self)
    }
}

/// Principal identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Uid(pub u64);

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque reference to a transaction owned by an external transaction manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TxnRef(pub u64);

impl fmt::Display for TxnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "txn#{}", self.0)
    }
}

/// Ordered sequence of principals
///
/// Wire order is preserved and duplicates are allowed on the wire. Use
/// [`UidSet::dedup`] to collapse repeats, keeping the first occurrence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UidSet(Vec<Uid>);

impl UidSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, uid: Uid) -> bool {
        self.0.contains(&uid)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Uid> {
        self.0.iter()
    }

    /// Append `uid` unless it is already a member
    pub fn insert(&mut self, uid: Uid) -> bool {
        if self.contains(uid) {
            return false;
        }
        self.0.push(uid);
        true
    }

    /// Remove every occurrence of `uid`
    pub fn remove(&mut self, uid: Uid) -> bool {
        let before = self.0.len();
        self.0.retain(|u| *u != uid);
        before != self.0.len()
    }

    /// Drop repeated uids, keeping the first occurrence of each
    pub fn dedup(mut self) -> Self {
        let mut seen = std::collections::HashSet::with_capacity(self.0.len());
        self.0.retain(|u| seen.insert(*u));
        self
    }

    /// Add every uid in `set`, then remove every uid in `unset`
    ///
    /// A uid named in both ends up removed.
    pub fn apply(&mut self, set: &UidSet, unset: &UidSet) {
        for uid in set.iter() {
            self.insert(*uid);
        }
        for uid in unset.iter() {
            self.remove(*uid);
        }
    }
}

impl FromIterator<Uid> for UidSet {
    fn from_iter<I: IntoIterator<Item = Uid>>(iter: I) -> Self {
        UidSet(iter.into_iter().collect())
    }
}

impl From<Vec<Uid>> for UidSet {
    fn from(uids: Vec<Uid>) -> Self {
        UidSet(uids)
    }
}

impl IntoIterator for UidSet {
    type Item = Uid;
    type IntoIter = std::vec::IntoIter<Uid>;
    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

// Wire layouts

impl FixedWireSize for ContainerId {
    const WIRE_SIZE: usize = CONTAINER_ID_SIZE;
}

impl WireEncode for ContainerId {
    fn encode<B: BufMut>(&self, buf: &mut B) {
        buf.put_slice(&self.0);
    }
}

impl WireDecode for ContainerId {
    fn decode<B: Buf>(buf: &mut B) -> Result<Self, WireError> {
        Ok(ContainerId(wire::get_fixed(buf)?))
    }
}

impl FixedWireSize for ContainerOperation {
    const WIRE_SIZE: usize = wire::WORD_SIZE;
}

impl WireEncode for ContainerOperation {
    fn encode<B: BufMut>(&self, buf: &mut B) {
        buf.put_u32(self.0);
    }
}

impl WireDecode for ContainerOperation {
    fn decode<B: Buf>(buf: &mut B) -> Result<Self, WireError> {
        Ok(ContainerOperation(wire::get_word(buf)?))
    }
}

impl FixedWireSize for Uid {
    const WIRE_SIZE: usize = wire::HYPER_SIZE;
}

impl WireEncode for Uid {
    fn encode<B: BufMut>(&self, buf: &mut B) {
        buf.put_u64(self.0);
    }
}

impl WireDecode for Uid {
    fn decode<B: Buf>(buf: &mut B) -> Result<Self, WireError> {
        Ok(Uid(wire::get_hyper(buf)?))
    }
}

impl FixedWireSize for TxnRef {
    const WIRE_SIZE: usize = wire::HYPER_SIZE;
}

impl WireEncode for TxnRef {
    fn encode<B: BufMut>(&self, buf: &mut B) {
        buf.put_u64(self.0);
    }
}

impl WireDecode for TxnRef {
    fn decode<B: Buf>(buf: &mut B) -> Result<Self, WireError> {
        Ok(TxnRef(wire::get_hyper(buf)?))
    }
}

impl WireEncode for UidSet {
    fn encode<B: BufMut>(&self, buf: &mut B) {
        self.0.encode(buf);
    }
}

impl WireDecode for UidSet {
    fn decode<B: Buf>(buf: &mut B) -> Result<Self, WireError> {
        Ok(UidSet(Vec::<Uid>::decode(buf)?))
    }
}
