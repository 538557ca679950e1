use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of the shared MAC key in bytes (256 bits)
pub const KEY_SIZE: usize = 32;

/// Errors that can occur while parsing a key
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("key error: {0}")]
    Default(#[from] anyhow::Error),
}

/// The random source failed while a key was being generated
///
/// This is fatal to whatever initialisation step asked for the key. There is
/// no retry: a source that reports failure is never trusted to produce
/// low-entropy output instead.
#[derive(Debug, thiserror::Error)]
pub enum GenKeyError {
    #[error("random source failure: {0}")]
    RandomSource(String),
}

/// Where new keys come from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeySource {
    /// Read directly from the platform CSPRNG
    #[default]
    Os,
    /// Draw from a process-wide generator that was seeded once from OS
    ///  entropy and is reseeded from its own output before every key.
    ///
    /// This is a transitional compatibility mode and is weaker than [`KeySource::Os`].
    LegacySelfSeed,
}

/// Symmetric secret shared by the authority and the servers that verify its tokens
///
/// Immutable once created. The bytes are wiped on drop and never printed by
/// `Debug`. Keys are never put on the wire.
///
/// # Examples
///
/// ```ignore
/// let key = Key::generate(KeySource::Os)?;
/// let cred = generate_cred(&key, &data);
/// verify_cred(&key, &cred)?;
/// ```
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Key([u8; KEY_SIZE]);

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

impl Eq for Key {}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Key(..)")
    }
}

impl From<[u8; KEY_SIZE]> for Key {
    fn from(bytes: [u8; KEY_SIZE]) -> Self {
        Key(bytes)
    }
}

impl TryFrom<&[u8]> for Key {
    type Error = KeyError;
    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        if bytes.len() != KEY_SIZE {
            return Err(anyhow::anyhow!(
                "invalid key size, expected {}, got {}",
                KEY_SIZE,
                bytes.len()
            )
            .into());
        }
        let mut buff = [0; KEY_SIZE];
        buff.copy_from_slice(bytes);
        Ok(buff.into())
    }
}

impl Key {
    /// Generate a new key from the given source
    ///
    /// # Errors
    ///
    /// Returns [`GenKeyError`] if the underlying random source reports failure.
    pub fn generate(source: KeySource) -> Result<Self, GenKeyError> {
        let mut buff = [0u8; KEY_SIZE];
        match source {
            KeySource::Os => getrandom::getrandom(&mut buff)
                .map_err(|e| GenKeyError::RandomSource(e.to_string()))?,
            KeySource::LegacySelfSeed => reseed_and_fill(&mut legacy_rng()?.lock(), &mut buff),
        }
        let key = Key(buff);
        buff.zeroize();
        Ok(key)
    }

    /// Parse a key from a hexadecimal string
    ///
    /// Accepts both plain hex and "0x"-prefixed hex strings.
    pub fn from_hex(hex: &str) -> Result<Self, KeyError> {
        let hex = hex.strip_prefix("0x").unwrap_or(hex);
        let mut buff = [0; KEY_SIZE];
        hex::decode_to_slice(hex, &mut buff).map_err(|_| anyhow::anyhow!("key hex decode error"))?;
        Ok(buff.into())
    }

    /// Convert the key to a hexadecimal string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Get a reference to the key bytes
    pub fn bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

static LEGACY_RNG: OnceLock<Mutex<StdRng>> = OnceLock::new();
static LEGACY_SEEDED: AtomicBool = AtomicBool::new(false);

/// Whether the legacy self-seeded generator has been initialised in this process
pub fn is_legacy_seeded() -> bool {
    LEGACY_SEEDED.load(Ordering::Acquire)
}

/// Replace `rng` with a generator seeded from its own output, then draw `out` from it
fn reseed_and_fill(rng: &mut StdRng, out: &mut [u8]) {
    let mut seed = [0u8; 32];
    rng.fill_bytes(&mut seed);
    *rng = StdRng::from_seed(seed);
    seed.zeroize();
    rng.fill_bytes(out);
}

// Seeding runs at most once: later callers block on the OnceLock until the
//  winning initialiser has stored the generator.
fn legacy_rng() -> Result<&'static Mutex<StdRng>, GenKeyError> {
    if let Some(rng) = LEGACY_RNG.get() {
        return Ok(rng);
    }

    let mut seeder =
        StdRng::try_from_os_rng().map_err(|e| GenKeyError::RandomSource(e.to_string()))?;
    let mut seed = [0u8; 32];
    seeder.fill_bytes(&mut seed);

    let rng = LEGACY_RNG.get_or_init(|| {
        tracing::warn!("seeding legacy self-seeded key generator");
        Mutex::new(StdRng::from_seed(seed))
    });
    seed.zeroize();
    LEGACY_SEEDED.store(true, Ordering::Release);
    Ok(rng)
}
