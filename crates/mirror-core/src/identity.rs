//! Node identity: a durable Ed25519 keypair and its derived peer id.
//!
//! Every node generates a keypair once and reuses it for the life of the
//! installation. The peer id is the BLAKE3 hash of the public key, shown
//! as hex. On disk an identity is two hex lines (public key, then private
//! key) at a configurable path; an existing file is never overwritten.
//!
//! The private key is zeroized on drop and never leaves this module
//! except through `persist`.

use std::fmt;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use rand::RngCore;
use thiserror::Error;
use zeroize::Zeroizing;

/// Byte length of an encoded public or private key.
pub const KEY_LEN: usize = 32;

/// Byte length of an Ed25519 signature.
pub const SIGNATURE_LEN: usize = 64;

// ── PeerId ────────────────────────────────────────────────────────────────────

/// A node's network-visible identifier: BLAKE3 of its public key.
///
/// Stable for the life of an identity. Displayed and serialized as
/// 64 hex characters.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId([u8; 32]);

impl PeerId {
    /// Derive the peer id for a public key. Deterministic.
    pub fn from_public_key(public_key: &[u8; KEY_LEN]) -> Self {
        Self(*blake3::hash(public_key).as_bytes())
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerId({})", &hex::encode(self.0)[..12])
    }
}

impl serde::Serialize for PeerId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

// ── Identity ──────────────────────────────────────────────────────────────────

/// A node's long-term Ed25519 identity.
///
/// Immutable once created. The signing key is held privately; callers
/// get the public key, the peer id, and `sign`.
#[derive(Debug)]
pub struct Identity {
    signing: SigningKey,
    peer_id: PeerId,
}

impl Identity {
    /// Generate a fresh identity from the OS random source.
    pub fn generate() -> Result<Self, IdentityError> {
        let mut seed = Zeroizing::new([0u8; KEY_LEN]);
        OsRng
            .try_fill_bytes(seed.as_mut())
            .map_err(|e| IdentityError::KeyGeneration(e.to_string()))?;
        Ok(Self::from_signing_key(SigningKey::from_bytes(&seed)))
    }

    fn from_signing_key(signing: SigningKey) -> Self {
        let peer_id = PeerId::from_public_key(signing.verifying_key().as_bytes());
        Self { signing, peer_id }
    }

    /// The node's network-visible identifier.
    pub fn peer_id(&self) -> PeerId {
        self.peer_id
    }

    /// The verifiable public half of the keypair.
    pub fn public_key(&self) -> [u8; KEY_LEN] {
        self.signing.verifying_key().to_bytes()
    }

    /// Sign a message with the private key.
    pub fn sign(&self, message: &[u8]) -> [u8; SIGNATURE_LEN] {
        self.signing.sign(message).to_bytes()
    }

    /// Write the identity to `path` as two hex lines (public, private).
    ///
    /// Refuses to overwrite an existing file. The write goes to a
    /// temporary file in the same directory and is renamed into place,
    /// so a crash cannot leave a partial identity that later loads.
    /// File mode is 0600.
    pub fn persist(&self, path: &Path) -> Result<(), IdentityError> {
        if path.exists() {
            return Err(IdentityError::AlreadyExists(path.to_path_buf()));
        }

        let private_hex = Zeroizing::new(hex::encode(self.signing.to_bytes()));
        let contents = Zeroizing::new(format!(
            "{}\n{}\n",
            hex::encode(self.public_key()),
            private_hex.as_str()
        ));

        let mut tmp_name = path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "identity".into());
        tmp_name.push(".tmp");
        let tmp = path.with_file_name(tmp_name);

        {
            let mut open = std::fs::OpenOptions::new();
            open.write(true).create_new(true);
            #[cfg(unix)]
            {
                use std::os::unix::fs::OpenOptionsExt;
                open.mode(0o600);
            }
            let mut file = open.open(&tmp)?;
            file.write_all(contents.as_bytes())?;
            file.sync_all()?;
        }

        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Read an identity back from `path`.
    ///
    /// A missing file is `NotFound`. Anything that does not decode into
    /// a matched 32-byte keypair is `Corrupt`.
    pub fn load(path: &Path) -> Result<Self, IdentityError> {
        let text = match std::fs::read_to_string(path) {
            Ok(t) => Zeroizing::new(t),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(IdentityError::NotFound(path.to_path_buf()))
            }
            Err(e) => return Err(IdentityError::Io(e)),
        };

        let mut lines = text.lines();
        let public_hex = lines
            .next()
            .ok_or_else(|| corrupt(path, "missing public key line"))?;
        let private_hex = lines
            .next()
            .ok_or_else(|| corrupt(path, "missing private key line"))?;

        let public = decode_key(path, "public key", public_hex)?;
        let private = decode_key(path, "private key", private_hex)?;

        let signing = SigningKey::from_bytes(&private);
        if signing.verifying_key().to_bytes() != public {
            return Err(corrupt(path, "public key does not match private key"));
        }

        Ok(Self::from_signing_key(signing))
    }
}

/// Verify a signature over `message` under `public_key`.
///
/// Malformed input never panics or errors, it simply verifies false.
pub fn verify(public_key: &[u8; KEY_LEN], message: &[u8], signature: &[u8]) -> bool {
    let Ok(key) = VerifyingKey::from_bytes(public_key) else {
        return false;
    };
    let Ok(sig) = Signature::from_slice(signature) else {
        return false;
    };
    key.verify(message, &sig).is_ok()
}

fn decode_key(path: &Path, which: &str, hex_str: &str) -> Result<[u8; KEY_LEN], IdentityError> {
    let bytes = hex::decode(hex_str.trim())
        .map_err(|_| corrupt(path, &format!("{which} is not valid hex")))?;
    bytes
        .try_into()
        .map_err(|_| corrupt(path, &format!("{which} has wrong length")))
}

fn corrupt(path: &Path, reason: &str) -> IdentityError {
    IdentityError::Corrupt(path.to_path_buf(), reason.to_string())
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    #[error("identity already exists at {0}")]
    AlreadyExists(PathBuf),

    #[error("no identity at {0}")]
    NotFound(PathBuf),

    #[error("corrupt identity at {0}: {1}")]
    Corrupt(PathBuf, String),

    #[error("identity io: {0}")]
    Io(#[from] std::io::Error),
}

// ── Tests ─────────────────────────────────────────────────────────────────────
