//! Cryptographic primitives for capacl
//!
//! This module provides the symmetric-key authorization scheme:
//!
//! - **Keys**: a single 256-bit secret shared by the issuing authority and
//!   every verifying server. Created once per process by a [`KeySource`].
//! - **MACs**: keyed BLAKE3 over a fixed-size payload. Comparison is always
//!   constant-time.
//! - **Tokens**: a [`Credential`] proves who a principal is, a [`Capability`]
//!   authorizes one operation on one container. Both are `payload || mac`.
//!
//! # Security Model
//!
//! Any holder of the key can mint tokens, so the key never leaves the
//! authority and the servers it trusts. Tokens carry no expiry or nonce: a
//! captured capability stays valid for as long as the key does.
//!
//! Verification failures are reported as a single opaque "unauthorized"
//! outcome. Callers learn nothing about which byte failed.

mod key;
mod mac;
mod token;

pub use key::{is_legacy_seeded, GenKeyError, Key, KeyError, KeySource, KEY_SIZE};
pub use mac::{compute_mac, Mac, MAC_SIZE};
pub use token::{
    generate_cap, generate_cred, verify_cap, verify_caps, verify_cred, Capability,
    CapabilityData, Credential, CredentialData, VerifyCapError, VerifyCredError,
    CAPABILITY_DATA_SIZE, CREDENTIAL_CONTEXT_SIZE, CREDENTIAL_DATA_SIZE,
};
