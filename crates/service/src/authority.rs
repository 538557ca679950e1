use common::acl::{
    AclStore, AclStoreError, ContainerId, ContainerOperation, CreateAclArgs, CreateContainerArgs,
    GetAclArgs, GetCapArgs, ModAclArgs, RemoveContainerArgs, ReplyBody, Request, UidSet,
    VerifyCapsArgs,
};
use common::crypto::{
    generate_cap, generate_cred, verify_cap, verify_caps, verify_cred, Capability,
    CapabilityData, Credential, CredentialData, Key, VerifyCapError, VerifyCredError,
};

#[derive(Debug, thiserror::Error)]
pub enum AuthorityError<T> {
    /// A token was missing, forged, or scoped to something else.
    ///  Never says which.
    #[error("unauthorized")]
    Unauthorized,
    /// The store refused the operation
    #[error("{0}")]
    Store(#[from] AclStoreError<T>),
}

impl<T> From<VerifyCredError> for AuthorityError<T> {
    fn from(_: VerifyCredError) -> Self {
        AuthorityError::Unauthorized
    }
}

impl<T> From<VerifyCapError> for AuthorityError<T> {
    fn from(_: VerifyCapError) -> Self {
        AuthorityError::Unauthorized
    }
}

/// Issues and checks tokens, and applies authorized operations to the ACL store
///
/// Every operation that carries a capability verifies it, and checks that it
/// names the request's container and an acceptable operation, before the
/// store is touched. A rejected request has no effect on the store.
#[derive(Debug)]
pub struct Authority<S> {
    key: Key,
    store: S,
}

impl<S: AclStore> Authority<S> {
    pub fn new(key: Key, store: S) -> Self {
        Self { key, store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Issue a credential out of band, e.g. when a principal is enrolled
    pub fn issue_credential(&self, data: &CredentialData) -> Credential {
        tracing::debug!("issuing credential for uid {}", data.uid);
        generate_cred(&self.key, data)
    }

    /// Issue a capability directly, without a credential exchange
    ///
    /// This is how a container's first ADMIN capability comes to exist: a new
    /// container has no ACLs, so `get_cap` cannot grant anything on it until
    /// an admin has created them.
    pub fn issue_capability(&self, data: &CapabilityData) -> Capability {
        tracing::debug!(
            "issuing {} capability on {} for uid {}",
            data.op,
            data.cid,
            data.holder
        );
        generate_cap(&self.key, data)
    }

    fn authorize(
        &self,
        cap: Option<&Capability>,
        cid: ContainerId,
        allowed: impl Fn(ContainerOperation) -> bool,
    ) -> Result<(), AuthorityError<S::Error>> {
        let Some(cap) = cap else {
            tracing::warn!("rejecting request on {}: no capability", cid);
            return Err(AuthorityError::Unauthorized);
        };
        if verify_cap(&self.key, cap).is_err() || cap.cid() != cid || !allowed(cap.op()) {
            tracing::warn!("rejecting request on {}: capability refused", cid);
            return Err(AuthorityError::Unauthorized);
        }
        Ok(())
    }

    fn admin(op: ContainerOperation) -> bool {
        op == ContainerOperation::ADMIN
    }

    pub async fn create_container(
        &self,
        args: &CreateContainerArgs,
    ) -> Result<(), AuthorityError<S::Error>> {
        self.authorize(args.cap.as_ref(), args.cid, Self::admin)?;
        self.store.create_container(args.txn, args.cid).await?;
        tracing::info!("created container {}", args.cid);
        Ok(())
    }

    pub async fn remove_container(
        &self,
        args: &RemoveContainerArgs,
    ) -> Result<(), AuthorityError<S::Error>> {
        self.authorize(args.cap.as_ref(), args.cid, Self::admin)?;
        self.store.remove_container(args.txn, args.cid).await?;
        tracing::info!("removed container {}", args.cid);
        Ok(())
    }

    /// Replace the ACL for (cid, op). Repeated uids are collapsed.
    pub async fn create_acl(&self, args: &CreateAclArgs) -> Result<(), AuthorityError<S::Error>> {
        self.authorize(args.cap.as_ref(), args.cid, Self::admin)?;
        let uids = args.uids.clone().dedup();
        tracing::info!(
            "setting {} acl on {} to {} uids",
            args.op,
            args.cid,
            uids.len()
        );
        self.store.put_acl(args.txn, args.cid, args.op, uids).await?;
        Ok(())
    }

    /// Read the ACL for (cid, op)
    ///
    /// Accepts an admin capability or one for the queried operation.
    pub async fn get_acl(&self, args: &GetAclArgs) -> Result<UidSet, AuthorityError<S::Error>> {
        self.authorize(args.cap.as_ref(), args.cid, |op| {
            op == args.op || op == ContainerOperation::ADMIN
        })?;
        Ok(self.store.get_acl(args.cid, args.op).await?)
    }

    /// Add `set`, then remove `unset`, on the existing ACL for (cid, op)
    pub async fn mod_acl(&self, args: &ModAclArgs) -> Result<(), AuthorityError<S::Error>> {
        self.authorize(args.cap.as_ref(), args.cid, Self::admin)?;
        tracing::info!(
            "modifying {} acl on {}: +{} -{}",
            args.op,
            args.cid,
            args.set.len(),
            args.unset.len()
        );
        self.store
            .mod_acl(
                args.txn,
                args.cid,
                args.op,
                args.set.clone(),
                args.unset.clone(),
            )
            .await?;
        Ok(())
    }

    /// Exchange a verified credential for a capability on (cid, op)
    ///
    /// Nothing is issued unless the credential, and the optional capability
    /// presented with it, verify, and the credential's uid is on the ACL for
    /// (cid, op). A missing container or ACL permits nobody.
    pub async fn get_cap(&self, args: &GetCapArgs) -> Result<Capability, AuthorityError<S::Error>> {
        if verify_cred(&self.key, &args.cred).is_err() {
            tracing::warn!("rejecting get_cap on {}: credential refused", args.cid);
            return Err(AuthorityError::Unauthorized);
        }
        if let Some(cap) = &args.cap {
            verify_cap(&self.key, cap)?;
        }

        let uid = args.cred.uid();
        let permitted = match self.store.get_acl(args.cid, args.op).await {
            Ok(uids) => uids.contains(uid),
            Err(AclStoreError::ContainerNotFound(_)) | Err(AclStoreError::AclNotFound(..)) => false,
            Err(e) => return Err(e.into()),
        };
        if !permitted {
            tracing::warn!(
                "rejecting get_cap on {}: uid {} not on the {} acl",
                args.cid,
                uid,
                args.op
            );
            return Err(AuthorityError::Unauthorized);
        }

        let data = CapabilityData::new(args.cid, args.op, uid);
        Ok(self.issue_capability(&data))
    }

    /// All-or-nothing check of a capability batch
    pub fn verify_caps(&self, args: &VerifyCapsArgs) -> Result<(), AuthorityError<S::Error>> {
        verify_caps(&self.key, &args.caps)?;
        Ok(())
    }

    /// Run a decoded request
    pub async fn dispatch(&self, request: &Request) -> Result<ReplyBody, AuthorityError<S::Error>> {
        Ok(match request {
            Request::CreateContainer(args) => {
                self.create_container(args).await?;
                ReplyBody::None
            }
            Request::RemoveContainer(args) => {
                self.remove_container(args).await?;
                ReplyBody::None
            }
            Request::CreateAcl(args) => {
                self.create_acl(args).await?;
                ReplyBody::None
            }
            Request::GetAcl(args) => ReplyBody::Acl(self.get_acl(args).await?),
            Request::ModAcl(args) => {
                self.mod_acl(args).await?;
                ReplyBody::None
            }
            Request::GetCap(args) => ReplyBody::Cap(self.get_cap(args).await?),
            Request::VerifyCaps(args) => {
                self.verify_caps(args)?;
                ReplyBody::None
            }
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use common::acl::{MemoryAclStore, TxnRef, Uid};
    use common::crypto::KeySource;

    fn uids(ids: &[u64]) -> UidSet {
        ids.iter().copied().map(Uid).collect()
    }

    fn authority() -> Authority<MemoryAclStore> {
        Authority::new(Key::generate(KeySource::Os).unwrap(), MemoryAclStore::new())
    }

    fn admin_cap(authority: &Authority<MemoryAclStore>, cid: ContainerId) -> Capability {
        authority.issue_capability(&CapabilityData::new(cid, ContainerOperation::ADMIN, Uid(1)))
    }

    async fn with_container(authority: &Authority<MemoryAclStore>) -> (ContainerId, Capability) {
        let cid = ContainerId::random();
        let cap = admin_cap(authority, cid);
        authority
            .create_container(&CreateContainerArgs {
                txn: None,
                cid,
                cap: Some(cap),
            })
            .await
            .unwrap();
        (cid, cap)
    }

    #[tokio::test]
    async fn test_mod_acl_adds_then_removes() {
        let authority = authority();
        let (cid, cap) = with_container(&authority).await;
        let op = ContainerOperation::READ;

        authority
            .create_acl(&CreateAclArgs {
                txn: None,
                cid,
                op,
                uids: UidSet::new(),
                cap: Some(cap),
            })
            .await
            .unwrap();
        authority
            .mod_acl(&ModAclArgs {
                txn: None,
                cid,
                op,
                set: uids(&[1, 2]),
                unset: uids(&[2]),
                cap: Some(cap),
            })
            .await
            .unwrap();

        let acl = authority
            .get_acl(&GetAclArgs {
                cid,
                op,
                cap: Some(cap),
            })
            .await
            .unwrap();
        assert_eq!(acl, uids(&[1]));
    }

    #[tokio::test]
    async fn test_create_acl_replaces() {
        let authority = authority();
        let (cid, cap) = with_container(&authority).await;
        let op = ContainerOperation::WRITE;

        for set in [uids(&[1]), uids(&[2])] {
            authority
                .create_acl(&CreateAclArgs {
                    txn: None,
                    cid,
                    op,
                    uids: set,
                    cap: Some(cap),
                })
                .await
                .unwrap();
        }
        assert_eq!(authority.store().get_acl(cid, op).await.unwrap(), uids(&[2]));
    }

    #[tokio::test]
    async fn test_create_acl_collapses_duplicates() {
        let authority = authority();
        let (cid, cap) = with_container(&authority).await;
        authority
            .create_acl(&CreateAclArgs {
                txn: None,
                cid,
                op: ContainerOperation::READ,
                uids: uids(&[3, 1, 3]),
                cap: Some(cap),
            })
            .await
            .unwrap();
        assert_eq!(
            authority
                .store()
                .get_acl(cid, ContainerOperation::READ)
                .await
                .unwrap(),
            uids(&[3, 1])
        );
    }

    #[tokio::test]
    async fn test_forged_capability_leaves_store_untouched() {
        let authority = authority();
        let cid = ContainerId::random();
        let forger = Key::generate(KeySource::Os).unwrap();
        let forged = generate_cap(
            &forger,
            &CapabilityData::new(cid, ContainerOperation::ADMIN, Uid(1)),
        );

        let result = authority
            .create_container(&CreateContainerArgs {
                txn: None,
                cid,
                cap: Some(forged),
            })
            .await;
        assert!(matches!(result, Err(AuthorityError::Unauthorized)));
        assert!(!authority.store().exists(cid).await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_capability_is_unauthorized() {
        let authority = authority();
        let result = authority
            .create_container(&CreateContainerArgs {
                txn: None,
                cid: ContainerId::random(),
                cap: None,
            })
            .await;
        assert!(matches!(result, Err(AuthorityError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_capability_scoped_to_other_container() {
        let authority = authority();
        let (_, cap) = with_container(&authority).await;
        let (other, _) = with_container(&authority).await;

        let result = authority
            .remove_container(&RemoveContainerArgs {
                txn: None,
                cid: other,
                cap: Some(cap),
            })
            .await;
        assert!(matches!(result, Err(AuthorityError::Unauthorized)));
        assert!(authority.store().exists(other).await.unwrap());
    }

    #[tokio::test]
    async fn test_non_admin_capability_cannot_mutate() {
        let authority = authority();
        let (cid, admin) = with_container(&authority).await;
        let read = authority.issue_capability(&CapabilityData::new(
            cid,
            ContainerOperation::READ,
            Uid(1),
        ));

        authority
            .create_acl(&CreateAclArgs {
                txn: None,
                cid,
                op: ContainerOperation::READ,
                uids: uids(&[1]),
                cap: Some(admin),
            })
            .await
            .unwrap();

        let result = authority
            .create_acl(&CreateAclArgs {
                txn: None,
                cid,
                op: ContainerOperation::READ,
                uids: uids(&[9]),
                cap: Some(read),
            })
            .await;
        assert!(matches!(result, Err(AuthorityError::Unauthorized)));

        // a capability for the queried operation may read its acl
        let acl = authority
            .get_acl(&GetAclArgs {
                cid,
                op: ContainerOperation::READ,
                cap: Some(read),
            })
            .await
            .unwrap();
        assert_eq!(acl, uids(&[1]));

        let result = authority
            .get_acl(&GetAclArgs {
                cid,
                op: ContainerOperation::WRITE,
                cap: Some(read),
            })
            .await;
        assert!(matches!(result, Err(AuthorityError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_store_errors_pass_through() {
        let authority = authority();
        let (cid, cap) = with_container(&authority).await;

        let result = authority
            .create_container(&CreateContainerArgs {
                txn: None,
                cid,
                cap: Some(cap),
            })
            .await;
        assert!(matches!(
            result,
            Err(AuthorityError::Store(AclStoreError::ContainerExists(c))) if c == cid
        ));

        let result = authority
            .mod_acl(&ModAclArgs {
                txn: None,
                cid,
                op: ContainerOperation::READ,
                set: uids(&[1]),
                unset: UidSet::new(),
                cap: Some(cap),
            })
            .await;
        assert!(matches!(
            result,
            Err(AuthorityError::Store(AclStoreError::AclNotFound(..)))
        ));
    }

    async fn grant(
        authority: &Authority<MemoryAclStore>,
        cid: ContainerId,
        admin: Capability,
        op: ContainerOperation,
        members: &[u64],
    ) {
        authority
            .create_acl(&CreateAclArgs {
                txn: None,
                cid,
                op,
                uids: uids(members),
                cap: Some(admin),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_get_cap_requires_verified_credential() {
        let authority = authority();
        let (cid, admin) = with_container(&authority).await;
        grant(&authority, cid, admin, ContainerOperation::WRITE, &[5, 6]).await;
        let mut cred = authority.issue_credential(&CredentialData::new(Uid(5)));

        let cap = authority
            .get_cap(&GetCapArgs {
                cid,
                op: ContainerOperation::WRITE,
                cred,
                cap: None,
            })
            .await
            .unwrap();
        assert_eq!(cap.data, CapabilityData::new(cid, ContainerOperation::WRITE, Uid(5)));
        assert!(verify_cap(&authority.key, &cap).is_ok());

        // uid 6 is on the acl, but this credential was issued to 5
        cred.data.uid = Uid(6);
        let result = authority
            .get_cap(&GetCapArgs {
                cid,
                op: ContainerOperation::WRITE,
                cred,
                cap: None,
            })
            .await;
        assert!(matches!(result, Err(AuthorityError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_get_cap_checks_presented_capability() {
        let authority = authority();
        let (cid, admin) = with_container(&authority).await;
        grant(&authority, cid, admin, ContainerOperation::READ, &[5]).await;
        let cred = authority.issue_credential(&CredentialData::new(Uid(5)));
        let forged = generate_cap(
            &Key::from([1u8; 32]),
            &CapabilityData::new(cid, ContainerOperation::ADMIN, Uid(5)),
        );

        let result = authority
            .get_cap(&GetCapArgs {
                cid,
                op: ContainerOperation::READ,
                cred,
                cap: Some(forged),
            })
            .await;
        assert!(matches!(result, Err(AuthorityError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_get_cap_refuses_uid_not_on_acl() {
        let authority = authority();
        let (cid, admin) = with_container(&authority).await;
        grant(&authority, cid, admin, ContainerOperation::READ, &[1, 2]).await;
        grant(&authority, cid, admin, ContainerOperation::ADMIN, &[1]).await;
        let outsider = authority.issue_credential(&CredentialData::new(Uid(99)));
        let member = authority.issue_credential(&CredentialData::new(Uid(2)));

        for (cred, op) in [
            (outsider, ContainerOperation::READ),
            (outsider, ContainerOperation::ADMIN),
            (member, ContainerOperation::ADMIN),
            // no acl exists for write
            (member, ContainerOperation::WRITE),
        ] {
            let result = authority
                .get_cap(&GetCapArgs {
                    cid,
                    op,
                    cred,
                    cap: None,
                })
                .await;
            assert!(matches!(result, Err(AuthorityError::Unauthorized)));
        }

        let cap = authority
            .get_cap(&GetCapArgs {
                cid,
                op: ContainerOperation::READ,
                cred: member,
                cap: None,
            })
            .await
            .unwrap();
        assert_eq!(cap.data.holder, Uid(2));
    }

    #[tokio::test]
    async fn test_get_cap_on_missing_container_is_unauthorized() {
        let authority = authority();
        let cred = authority.issue_credential(&CredentialData::new(Uid(1)));
        let result = authority
            .get_cap(&GetCapArgs {
                cid: ContainerId::random(),
                op: ContainerOperation::ADMIN,
                cred,
                cap: None,
            })
            .await;
        assert!(matches!(result, Err(AuthorityError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_transactional_mod_acl_after_create() {
        let authority = authority();
        let cid = ContainerId::random();
        let cap = admin_cap(&authority, cid);
        let op = ContainerOperation::READ;
        let txn = authority.store().begin().unwrap();

        authority
            .create_container(&CreateContainerArgs {
                txn: Some(txn),
                cid,
                cap: Some(cap),
            })
            .await
            .unwrap();
        authority
            .create_acl(&CreateAclArgs {
                txn: Some(txn),
                cid,
                op,
                uids: uids(&[5]),
                cap: Some(cap),
            })
            .await
            .unwrap();
        for uid in [6, 7] {
            authority
                .mod_acl(&ModAclArgs {
                    txn: Some(txn),
                    cid,
                    op,
                    set: uids(&[uid]),
                    unset: UidSet::new(),
                    cap: Some(cap),
                })
                .await
                .unwrap();
        }

        authority.store().commit(txn).unwrap();
        assert_eq!(
            authority.store().get_acl(cid, op).await.unwrap(),
            uids(&[5, 6, 7])
        );
    }

    #[tokio::test]
    async fn test_transactional_create_waits_for_commit() {
        let authority = authority();
        let cid = ContainerId::random();
        let cap = admin_cap(&authority, cid);
        let txn: TxnRef = authority.store().begin().unwrap();

        authority
            .create_container(&CreateContainerArgs {
                txn: Some(txn),
                cid,
                cap: Some(cap),
            })
            .await
            .unwrap();
        assert!(!authority.store().exists(cid).await.unwrap());

        authority.store().commit(txn).unwrap();
        assert!(authority.store().exists(cid).await.unwrap());
    }
}
