//! Shared test utilities for protocol integration tests
#![allow(dead_code)]

use ::common::acl::{ContainerId, ContainerOperation, MemoryAclStore, Uid, UidSet};
use ::common::client::AclClient;
use ::common::crypto::{Capability, CapabilityData, Credential, CredentialData};
use service::{Config, Handler, LocalTransport};

pub type Client = AclClient<LocalTransport<MemoryAclStore>>;

/// Set up a handler over a fresh in-memory store and a client wired to it
pub fn setup_test_env() -> (Client, Handler<MemoryAclStore>) {
    let handler = Handler::from_config(&Config::default(), MemoryAclStore::new()).unwrap();
    let client = AclClient::new(LocalTransport::new(handler.clone()));
    (client, handler)
}

/// Enroll a principal out of band
pub fn enroll(handler: &Handler<MemoryAclStore>, uid: u64) -> Credential {
    handler
        .authority()
        .issue_credential(&CredentialData::new(Uid(uid)))
}

/// Bootstrap a container owned by `owner`
///
/// The first admin capability is issued out of band, the container is
/// created with it and `owner` is put on the container's ADMIN acl so later
/// admin capabilities can be obtained through get_cap.
pub async fn create_container(
    client: &Client,
    handler: &Handler<MemoryAclStore>,
    owner: u64,
) -> (ContainerId, Capability) {
    let cid = ContainerId::random();
    let admin = handler.authority().issue_capability(&CapabilityData::new(
        cid,
        ContainerOperation::ADMIN,
        Uid(owner),
    ));
    client.create_container(None, cid, Some(admin)).await.unwrap();
    client
        .create_acl(None, cid, ContainerOperation::ADMIN, uids(&[owner]), Some(admin))
        .await
        .unwrap();
    (cid, admin)
}

/// A capability minted under some other key
pub fn forged_cap(cid: ContainerId, op: ContainerOperation) -> Capability {
    let other = Handler::from_config(&Config::default(), MemoryAclStore::new()).unwrap();
    other
        .authority()
        .issue_capability(&CapabilityData::new(cid, op, Uid(0)))
}

pub fn uids(ids: &[u64]) -> UidSet {
    ids.iter().copied().map(Uid).collect()
}
