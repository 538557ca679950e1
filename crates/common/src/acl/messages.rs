use bytes::{Buf, BufMut};

use super::types::{ContainerId, ContainerOperation, TxnRef, UidSet};
use crate::crypto::{Capability, Credential};
use crate::wire::{self, WireDecode, WireEncode, WireError};

/// Procedure numbers, the first word of every request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Procedure {
    CreateContainer = 1,
    RemoveContainer = 2,
    CreateAcl = 3,
    GetAcl = 4,
    ModAcl = 5,
    GetCap = 6,
    VerifyCaps = 7,
}

impl TryFrom<u32> for Procedure {
    type Error = WireError;
    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Ok(match value {
            1 => Procedure::CreateContainer,
            2 => Procedure::RemoveContainer,
            3 => Procedure::CreateAcl,
            4 => Procedure::GetAcl,
            5 => Procedure::ModAcl,
            6 => Procedure::GetCap,
            7 => Procedure::VerifyCaps,
            other => return Err(WireError::UnknownProcedure(other)),
        })
    }
}

/// Create a container with no ACLs defined
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateContainerArgs {
    pub txn: Option<TxnRef>,
    pub cid: ContainerId,
    pub cap: Option<Capability>,
}

/// Remove a container and every ACL it holds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoveContainerArgs {
    pub txn: Option<TxnRef>,
    pub cid: ContainerId,
    pub cap: Option<Capability>,
}

/// Set the ACL for (cid, op) to exactly `uids`, replacing any previous one
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateAclArgs {
    pub txn: Option<TxnRef>,
    pub cid: ContainerId,
    pub op: ContainerOperation,
    pub uids: UidSet,
    pub cap: Option<Capability>,
}

/// Read the ACL for (cid, op)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetAclArgs {
    pub cid: ContainerId,
    pub op: ContainerOperation,
    pub cap: Option<Capability>,
}

/// Add `set` to, then remove `unset` from, the ACL for (cid, op)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModAclArgs {
    pub txn: Option<TxnRef>,
    pub cid: ContainerId,
    pub op: ContainerOperation,
    pub set: UidSet,
    pub unset: UidSet,
    pub cap: Option<Capability>,
}

/// Exchange a credential for a capability scoped to (cid, op)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetCapArgs {
    pub cid: ContainerId,
    pub op: ContainerOperation,
    pub cred: Credential,
    /// Optional capability presented alongside the credential.
    ///  When present it must verify as well.
    pub cap: Option<Capability>,
}

/// Stateless all-or-nothing check of a capability batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyCapsArgs {
    pub caps: Vec<Capability>,
}

/// A request: the procedure word followed by its argument record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    CreateContainer(CreateContainerArgs),
    RemoveContainer(RemoveContainerArgs),
    CreateAcl(CreateAclArgs),
    GetAcl(GetAclArgs),
    ModAcl(ModAclArgs),
    GetCap(GetCapArgs),
    VerifyCaps(VerifyCapsArgs),
}

impl Request {
    pub fn procedure(&self) -> Procedure {
        match self {
            Request::CreateContainer(_) => Procedure::CreateContainer,
            Request::RemoveContainer(_) => Procedure::RemoveContainer,
            Request::CreateAcl(_) => Procedure::CreateAcl,
            Request::GetAcl(_) => Procedure::GetAcl,
            Request::ModAcl(_) => Procedure::ModAcl,
            Request::GetCap(_) => Procedure::GetCap,
            Request::VerifyCaps(_) => Procedure::VerifyCaps,
        }
    }
}

/// Payload of a successful reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyBody {
    None,
    Acl(UidSet),
    Cap(Capability),
}

/// A single result code, plus a payload for get_acl / get_cap
///
/// Verification failures of any kind come back as `Unauthorized` with no
/// further detail. Store errors are passed through as their message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Ok(ReplyBody),
    Unauthorized,
    Malformed,
    Store(String),
}

const STATUS_OK: u32 = 0;
const STATUS_UNAUTHORIZED: u32 = 1;
const STATUS_MALFORMED: u32 = 2;
const STATUS_STORE: u32 = 3;

const BODY_NONE: u32 = 0;
const BODY_ACL: u32 = 1;
const BODY_CAP: u32 = 2;

// Argument records

impl WireEncode for CreateContainerArgs {
    fn encode<B: BufMut>(&self, buf: &mut B) {
        self.txn.encode(buf);
        self.cid.encode(buf);
        self.cap.encode(buf);
    }
}

impl WireDecode for CreateContainerArgs {
    fn decode<B: Buf>(buf: &mut B) -> Result<Self, WireError> {
        Ok(Self {
            txn: WireDecode::decode(buf)?,
            cid: WireDecode::decode(buf)?,
            cap: WireDecode::decode(buf)?,
        })
    }
}

impl WireEncode for RemoveContainerArgs {
    fn encode<B: BufMut>(&self, buf: &mut B) {
        self.txn.encode(buf);
        self.cid.encode(buf);
        self.cap.encode(buf);
    }
}

impl WireDecode for RemoveContainerArgs {
    fn decode<B: Buf>(buf: &mut B) -> Result<Self, WireError> {
        Ok(Self {
            txn: WireDecode::decode(buf)?,
            cid: WireDecode::decode(buf)?,
            cap: WireDecode::decode(buf)?,
        })
    }
}

impl WireEncode for CreateAclArgs {
    fn encode<B: BufMut>(&self, buf: &mut B) {
        self.txn.encode(buf);
        self.cid.encode(buf);
        self.op.encode(buf);
        self.uids.encode(buf);
        self.cap.encode(buf);
    }
}

impl WireDecode for CreateAclArgs {
    fn decode<B: Buf>(buf: &mut B) -> Result<Self, WireError> {
        Ok(Self {
            txn: WireDecode::decode(buf)?,
            cid: WireDecode::decode(buf)?,
            op: WireDecode::decode(buf)?,
            uids: WireDecode::decode(buf)?,
            cap: WireDecode::decode(buf)?,
        })
    }
}

impl WireEncode for GetAclArgs {
    fn encode<B: BufMut>(&self, buf: &mut B) {
        self.cid.encode(buf);
        self.op.encode(buf);
        self.cap.encode(buf);
    }
}

impl WireDecode for GetAclArgs {
    fn decode<B: Buf>(buf: &mut B) -> Result<Self, WireError> {
        Ok(Self {
            cid: WireDecode::decode(buf)?,
            op: WireDecode::decode(buf)?,
            cap: WireDecode::decode(buf)?,
        })
    }
}

impl WireEncode for ModAclArgs {
    fn encode<B: BufMut>(&self, buf: &mut B) {
        self.txn.encode(buf);
        self.cid.encode(buf);
        self.op.encode(buf);
        self.set.encode(buf);
        self.unset.encode(buf);
        self.cap.encode(buf);
    }
}

impl WireDecode for ModAclArgs {
    fn decode<B: Buf>(buf: &mut B) -> Result<Self, WireError> {
        Ok(Self {
            txn: WireDecode::decode(buf)?,
            cid: WireDecode::decode(buf)?,
            op: WireDecode::decode(buf)?,
            set: WireDecode::decode(buf)?,
            unset: WireDecode::decode(buf)?,
            cap: WireDecode::decode(buf)?,
        })
    }
}

impl WireEncode for GetCapArgs {
    fn encode<B: BufMut>(&self, buf: &mut B) {
        self.cid.encode(buf);
        self.op.encode(buf);
        self.cred.encode(buf);
        self.cap.encode(buf);
    }
}

impl WireDecode for GetCapArgs {
    fn decode<B: Buf>(buf: &mut B) -> Result<Self, WireError> {
        Ok(Self {
            cid: WireDecode::decode(buf)?,
            op: WireDecode::decode(buf)?,
            cred: WireDecode::decode(buf)?,
            cap: WireDecode::decode(buf)?,
        })
    }
}

impl WireEncode for VerifyCapsArgs {
    fn encode<B: BufMut>(&self, buf: &mut B) {
        self.caps.encode(buf);
    }
}

impl WireDecode for VerifyCapsArgs {
    fn decode<B: Buf>(buf: &mut B) -> Result<Self, WireError> {
        Ok(Self {
            caps: WireDecode::decode(buf)?,
        })
    }
}

// Envelopes

impl WireEncode for Request {
    fn encode<B: BufMut>(&self, buf: &mut B) {
        buf.put_u32(self.procedure() as u32);
        match self {
            Request::CreateContainer(args) => args.encode(buf),
            Request::RemoveContainer(args) => args.encode(buf),
            Request::CreateAcl(args) => args.encode(buf),
            Request::GetAcl(args) => args.encode(buf),
            Request::ModAcl(args) => args.encode(buf),
            Request::GetCap(args) => args.encode(buf),
            Request::VerifyCaps(args) => args.encode(buf),
        }
    }
}

impl WireDecode for Request {
    fn decode<B: Buf>(buf: &mut B) -> Result<Self, WireError> {
        let procedure = Procedure::try_from(wire::get_word(buf)?)?;
        Ok(match procedure {
            Procedure::CreateContainer => Request::CreateContainer(WireDecode::decode(buf)?),
            Procedure::RemoveContainer => Request::RemoveContainer(WireDecode::decode(buf)?),
            Procedure::CreateAcl => Request::CreateAcl(WireDecode::decode(buf)?),
            Procedure::GetAcl => Request::GetAcl(WireDecode::decode(buf)?),
            Procedure::ModAcl => Request::ModAcl(WireDecode::decode(buf)?),
            Procedure::GetCap => Request::GetCap(WireDecode::decode(buf)?),
            Procedure::VerifyCaps => Request::VerifyCaps(WireDecode::decode(buf)?),
        })
    }
}

impl WireEncode for Reply {
    fn encode<B: BufMut>(&self, buf: &mut B) {
        match self {
            Reply::Ok(body) => {
                buf.put_u32(STATUS_OK);
                match body {
                    ReplyBody::None => buf.put_u32(BODY_NONE),
                    ReplyBody::Acl(uids) => {
                        buf.put_u32(BODY_ACL);
                        uids.encode(buf);
                    }
                    ReplyBody::Cap(cap) => {
                        buf.put_u32(BODY_CAP);
                        cap.encode(buf);
                    }
                }
            }
            Reply::Unauthorized => buf.put_u32(STATUS_UNAUTHORIZED),
            Reply::Malformed => buf.put_u32(STATUS_MALFORMED),
            Reply::Store(message) => {
                buf.put_u32(STATUS_STORE);
                wire::put_string(buf, message);
            }
        }
    }
}

impl WireDecode for Reply {
    fn decode<B: Buf>(buf: &mut B) -> Result<Self, WireError> {
        Ok(match wire::get_word(buf)? {
            STATUS_OK => Reply::Ok(match wire::get_word(buf)? {
                BODY_NONE => ReplyBody::None,
                BODY_ACL => ReplyBody::Acl(WireDecode::decode(buf)?),
                BODY_CAP => ReplyBody::Cap(WireDecode::decode(buf)?),
                other => return Err(WireError::UnknownBody(other)),
            }),
            STATUS_UNAUTHORIZED => Reply::Unauthorized,
            STATUS_MALFORMED => Reply::Malformed,
            STATUS_STORE => Reply::Store(wire::get_string(buf)?),
            other => return Err(WireError::UnknownStatus(other)),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::acl::Uid;
    use crate::crypto::{
        generate_cap, generate_cred, CapabilityData, CredentialData, Key, KeySource,
    };

    struct Fixture {
        cid: ContainerId,
        cap: Capability,
        cred: Credential,
    }

    fn fixture() -> Fixture {
        let key = Key::generate(KeySource::Os).unwrap();
        let cid = ContainerId::random();
        Fixture {
            cid,
            cap: generate_cap(
                &key,
                &CapabilityData::new(cid, ContainerOperation::ADMIN, Uid(1)),
            ),
            cred: generate_cred(&key, &CredentialData::new(Uid(1))),
        }
    }

    fn uids(ids: &[u64]) -> UidSet {
        ids.iter().copied().map(Uid).collect()
    }

    fn requests(f: &Fixture, present: bool) -> Vec<Request> {
        let txn = present.then_some(TxnRef(99));
        let cap = present.then_some(f.cap);
        vec![
            Request::CreateContainer(CreateContainerArgs {
                txn,
                cid: f.cid,
                cap,
            }),
            Request::RemoveContainer(RemoveContainerArgs {
                txn,
                cid: f.cid,
                cap,
            }),
            Request::CreateAcl(CreateAclArgs {
                txn,
                cid: f.cid,
                op: ContainerOperation::READ,
                uids: uids(&[1, 2, 3]),
                cap,
            }),
            Request::GetAcl(GetAclArgs {
                cid: f.cid,
                op: ContainerOperation::WRITE,
                cap,
            }),
            Request::ModAcl(ModAclArgs {
                txn,
                cid: f.cid,
                op: ContainerOperation(42),
                set: uids(&[4]),
                unset: uids(&[]),
                cap,
            }),
            Request::GetCap(GetCapArgs {
                cid: f.cid,
                op: ContainerOperation::READ,
                cred: f.cred,
                cap,
            }),
            Request::VerifyCaps(VerifyCapsArgs {
                caps: if present { vec![f.cap, f.cap] } else { vec![] },
            }),
        ]
    }

    #[test]
    fn test_requests_with_optional_fields_present() {
        let f = fixture();
        for request in requests(&f, true) {
            let bytes = request.to_bytes();
            assert_eq!(Request::from_bytes(&bytes).unwrap(), request);
        }
    }

    #[test]
    fn test_requests_with_optional_fields_absent() {
        let f = fixture();
        for request in requests(&f, false) {
            let bytes = request.to_bytes();
            assert_eq!(Request::from_bytes(&bytes).unwrap(), request);
        }
    }

    #[test]
    fn test_every_truncation_is_rejected() {
        let f = fixture();
        for request in requests(&f, true) {
            let bytes = request.to_bytes();
            for len in 0..bytes.len() {
                assert!(
                    Request::from_bytes(&bytes[..len]).is_err(),
                    "{:?} truncated to {}",
                    request.procedure(),
                    len
                );
            }
        }
    }

    #[test]
    fn test_create_container_layout() {
        let cid = ContainerId::from([0x11; 16]);
        let request = Request::CreateContainer(CreateContainerArgs {
            txn: Some(TxnRef(2)),
            cid,
            cap: None,
        });
        let mut expected = vec![0, 0, 0, 1]; // procedure
        expected.extend_from_slice(&[0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 2]); // txn
        expected.extend_from_slice(&[0x11; 16]); // cid
        expected.extend_from_slice(&[0, 0, 0, 0]); // no cap
        assert_eq!(request.to_bytes().as_ref(), expected.as_slice());
    }

    #[test]
    fn test_unknown_procedure() {
        assert_eq!(
            Request::from_bytes(&[0, 0, 0, 8]).unwrap_err(),
            WireError::UnknownProcedure(8)
        );
    }

    #[test]
    fn test_uid_count_overrun_in_record() {
        let f = fixture();
        let request = Request::CreateAcl(CreateAclArgs {
            txn: None,
            cid: f.cid,
            op: ContainerOperation::READ,
            uids: uids(&[1]),
            cap: None,
        });
        let mut bytes = request.to_bytes().to_vec();
        // procedure + txn tag + cid + op, then the uid count
        let count_at = 4 + 4 + 16 + 4;
        bytes[count_at..count_at + 4].copy_from_slice(&1000u32.to_be_bytes());
        assert!(matches!(
            Request::from_bytes(&bytes),
            Err(WireError::MalformedLength { count: 1000, .. })
        ));
    }

    #[test]
    fn test_reply_round_trips() {
        let f = fixture();
        let replies = vec![
            Reply::Ok(ReplyBody::None),
            Reply::Ok(ReplyBody::Acl(uids(&[7, 8]))),
            Reply::Ok(ReplyBody::Cap(f.cap)),
            Reply::Unauthorized,
            Reply::Malformed,
            Reply::Store("container not found".to_string()),
        ];
        for reply in replies {
            assert_eq!(Reply::from_bytes(&reply.to_bytes()).unwrap(), reply);
        }
    }

    #[test]
    fn test_unauthorized_reply_is_a_bare_status() {
        assert_eq!(Reply::Unauthorized.to_bytes().as_ref(), &[0, 0, 0, 1]);
    }
}
