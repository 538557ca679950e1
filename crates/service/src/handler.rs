use std::sync::Arc;

use bytes::Bytes;

use common::acl::{AclStore, Reply, Request};
use common::crypto::{GenKeyError, Key};
use common::wire::{WireDecode, WireEncode};

use crate::authority::{Authority, AuthorityError};
use crate::config::Config;

// NOTE: a request is a single record of a few hundred bytes at most,
//  the limit only bounds what we are willing to buffer
/// Default request size limit (1MB)
pub const DEFAULT_MAX_REQUEST_SIZE: usize = 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum HandlerSetupError {
    #[error("failed to generate authority key: {0}")]
    GenKey(#[from] GenKeyError),
}

/// Turns encoded requests into encoded replies
///
/// Malformed input is rejected before any token is looked at or the store
/// is touched. Exactly one reply comes back per request.
#[derive(Debug)]
pub struct Handler<S> {
    authority: Arc<Authority<S>>,
    max_request_size: usize,
}

impl<S> Clone for Handler<S> {
    fn clone(&self) -> Self {
        Self {
            authority: self.authority.clone(),
            max_request_size: self.max_request_size,
        }
    }
}

impl<S: AclStore> Handler<S> {
    pub fn new(authority: Arc<Authority<S>>, max_request_size: usize) -> Self {
        Self {
            authority,
            max_request_size,
        }
    }

    /// Generate a fresh key from the configured source and serve `store` with it
    pub fn from_config(config: &Config, store: S) -> Result<Self, HandlerSetupError> {
        tracing::info!("generating authority key from {:?} source", config.key_source);
        let key = Key::generate(config.key_source)?;
        Ok(Self::new(
            Arc::new(Authority::new(key, store)),
            config.max_request_size,
        ))
    }

    pub fn authority(&self) -> &Arc<Authority<S>> {
        &self.authority
    }

    /// Handle one encoded request and return the encoded reply
    pub async fn handle(&self, request: &[u8]) -> Bytes {
        self.reply(request).await.to_bytes()
    }

    /// Handle one encoded request
    pub async fn reply(&self, request: &[u8]) -> Reply {
        if request.len() > self.max_request_size {
            tracing::warn!(
                "rejecting {} byte request, limit is {}",
                request.len(),
                self.max_request_size
            );
            return Reply::Malformed;
        }

        let request = match Request::from_bytes(request) {
            Ok(request) => request,
            Err(e) => {
                tracing::debug!("failed to decode request: {}", e);
                return Reply::Malformed;
            }
        };

        let procedure = request.procedure();
        tracing::debug!("handling {:?}", procedure);
        match self.authority.dispatch(&request).await {
            Ok(body) => Reply::Ok(body),
            Err(AuthorityError::Unauthorized) => Reply::Unauthorized,
            Err(AuthorityError::Store(e)) => {
                tracing::info!("{:?} failed in store: {}", procedure, e);
                Reply::Store(e.to_string())
            }
        }
    }
}
