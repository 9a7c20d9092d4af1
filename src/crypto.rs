//! The fixed crypto suite named in spec §4.1: SHA-256, HMAC-SHA-256, and
//! ECDSA over NIST P-256. No algorithm agility — callers never choose a
//! curve or hash, matching the hubris stage0 attestation code this is
//! grounded on
//! (`examples/other_examples/5403a17f_oxidecomputer-hubris__stage0-src-attest.rs.rs`).

use crate::error::CryptoError;
use crate::platform::RngHandle;
use crate::types::{Digest, Signature, DIGEST_LEN};
use hmac::{Hmac, Mac};
use p256::ecdsa::{signature::RandomizedSigner, signature::Verifier, SigningKey, VerifyingKey};
use sha2::{Digest as _, Sha256};

pub fn sha256(data: &[u8]) -> Digest {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let out = hasher.finalize();
    let mut digest = [0u8; DIGEST_LEN];
    digest.copy_from_slice(&out);
    digest
}

/// Hashes the concatenation of `parts` without allocating a combined
/// buffer first, mirroring the order-sensitive concatenations spec §4.3
/// and §4.9 call for (e.g. `pem(dev_pub) ‖ dev_uuid`).
pub fn sha256_concat(parts: &[&[u8]]) -> Digest {
    let mut hasher = Sha256::new();
    for p in parts {
        hasher.update(p);
    }
    let out = hasher.finalize();
    let mut digest = [0u8; DIGEST_LEN];
    digest.copy_from_slice(&out);
    digest
}

/// `key` is the HMAC key, `msg` is the message — order matters and is
/// fixed by the wire protocol (§4.9's `dev_auth` derivation).
pub fn hmac_sha256(key: &[u8], msg: &[u8]) -> Digest {
    hmac_sha256_multi(key, &[msg])
}

/// Same as `hmac_sha256` but feeds `parts` to the MAC in order without
/// concatenating them first — used by `dev_auth`'s
/// `pem(dev_pub) ‖ dev_uuid` message.
pub fn hmac_sha256_multi(key: &[u8], parts: &[&[u8]]) -> Digest {
    let mut mac = Hmac::<Sha256>::new_from_slice(key).expect("HMAC accepts any key length");
    for p in parts {
        mac.update(p);
    }
    let out = mac.finalize().into_bytes();
    let mut digest = [0u8; DIGEST_LEN];
    digest.copy_from_slice(&out);
    digest
}

/// An ECDSA keypair. `SigningKey` zeroizes its scalar on drop (RustCrypto's
/// `elliptic-curve` implements this internally), so no explicit `Zeroize`
/// bound is needed here — only the ephemeral buffers feeding key
/// derivation (`src/keys.rs`) need the `zeroize` crate directly.
pub struct Keypair {
    signing_key: SigningKey,
}

impl Keypair {
    pub fn public(&self) -> VerifyingKey { *self.signing_key.verifying_key() }
    pub fn private(&self) -> &SigningKey { &self.signing_key }
}

/// Deterministically derives a keypair from a 32-byte seed by using the
/// seed directly as the private scalar — the same construction
/// `examples/other_examples/4fbd74df_flihp-hubris__stage0-src-dice.rs.rs`
/// uses for its DICE layer keys (`Keypair::from(okm.as_bytes())`).
pub fn derive_ecc_keypair(seed: &[u8; DIGEST_LEN]) -> Result<Keypair, CryptoError> {
    let bytes = p256::FieldBytes::from(*seed);
    let signing_key = SigningKey::from_bytes(&bytes).map_err(|_| CryptoError::KeyParse)?;
    Ok(Keypair { signing_key })
}

pub fn ecdsa_sign(
    priv_key: &SigningKey,
    msg: &[u8],
    rng: &mut dyn RngHandle,
) -> Result<Signature, CryptoError> {
    let sig: p256::ecdsa::Signature = priv_key
        .try_sign_with_rng(&mut *rng, msg)
        .map_err(|_| CryptoError::SignFailed)?;
    Signature::from_der(sig.to_der().as_bytes()).ok_or(CryptoError::Format)
}

pub fn ecdsa_verify(pub_key: &VerifyingKey, msg: &[u8], sig: &Signature) -> Result<(), CryptoError> {
    let parsed = p256::ecdsa::Signature::from_der(sig.as_bytes()).map_err(|_| CryptoError::KeyParse)?;
    pub_key.verify(msg, &parsed).map_err(|_| CryptoError::VerifyFailed)
}

pub fn compare_public(a: &VerifyingKey, b: &VerifyingKey) -> bool {
    a.to_encoded_point(true) == b.to_encoded_point(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_core::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn sha256_matches_known_vector() {
        let digest = sha256(b"abc");
        let expected = [
            0xba, 0x78, 0x16, 0xbf, 0x8f, 0x01, 0xcf, 0xea, 0x41, 0x41, 0x40, 0xde, 0x5d, 0xae,
            0x22, 0x23, 0xb0, 0x03, 0x61, 0xa3, 0x96, 0x17, 0x7a, 0x9c, 0xb4, 0x10, 0xff, 0x61,
            0xf2, 0x00, 0x15, 0xad,
        ];
        assert_eq!(digest, expected);
    }

    #[test]
    fn sign_then_verify_round_trips() {
        let seed = sha256(b"seed material");
        let keypair = derive_ecc_keypair(&seed).unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(42);
        let sig = ecdsa_sign(keypair.private(), b"hello", &mut rng).unwrap();
        assert!(ecdsa_verify(&keypair.public(), b"hello", &sig).is_ok());
        assert!(ecdsa_verify(&keypair.public(), b"goodbye", &sig).is_err());
    }

    #[test]
    fn derivation_is_deterministic() {
        let seed = sha256(b"same seed");
        let a = derive_ecc_keypair(&seed).unwrap();
        let b = derive_ecc_keypair(&seed).unwrap();
        assert!(compare_public(&a.public(), &b.public()));
    }
}
