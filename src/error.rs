//! Error types for the trust engine (§7). Kept as small `Copy` enums with
//! hand-written `Display` impls, matching the teacher's dependency-light
//! error style in `loader` (no `anyhow`/`thiserror` anywhere in that crate) —
//! appropriate doubly so here since `std::error::Error` isn't available
//! under `no_std`.

use core::fmt;

/// Failures from the crypto primitives in `src/crypto.rs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CryptoError {
    SignFailed,
    VerifyFailed,
    KeyParse,
    Format,
}

impl fmt::Display for CryptoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CryptoError::SignFailed => "signing operation failed",
            CryptoError::VerifyFailed => "signature verification failed",
            CryptoError::KeyParse => "key material could not be parsed",
            CryptoError::Format => "output buffer too small for encoded value",
        };
        f.write_str(s)
    }
}

/// Top-level error type returned by the boot engine (§7). A `CryptoError`
/// is always wrapped rather than discarded so the caller can log which
/// primitive failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LazarusError {
    BootParamsCorrupt,
    Crypto(CryptoError),
    FlashFailure,
    StagingInvalid,
    ImageInvalid,
    CertStoreOverflow,
    NotFound,
}

impl From<CryptoError> for LazarusError {
    fn from(e: CryptoError) -> Self { LazarusError::Crypto(e) }
}

impl fmt::Display for LazarusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LazarusError::BootParamsCorrupt => f.write_str("boot parameters failed validation"),
            LazarusError::Crypto(e) => write!(f, "crypto failure: {}", e),
            LazarusError::FlashFailure => f.write_str("flash read or write failed"),
            LazarusError::StagingInvalid => f.write_str("staging area record is invalid"),
            LazarusError::ImageInvalid => f.write_str("next-layer image failed verification"),
            LazarusError::CertStoreOverflow => f.write_str("certificate bag exceeded its capacity"),
            LazarusError::NotFound => f.write_str("requested item not present"),
        }
    }
}
