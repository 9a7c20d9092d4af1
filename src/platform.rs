//! The external-service boundary named in spec §1/§6: everything that is
//! explicitly out of scope for Lazarus Core itself (flash programming, RNG,
//! the watchdog peripheral, PEM/DER/X.509 encoding, UART) is grouped behind
//! this trait. Generalizes the teacher's pattern of injecting small
//! hardware-access structs (`Keyrom`, `Gfx`, `Uart` in
//! `loader/src/secboot.rs`/`debug.rs`) into one seam, so the trust engine in
//! the rest of this crate never touches hardware directly and can be driven
//! by an in-memory fake in tests.

use crate::debug::DebugSink;
use crate::error::LazarusError;
use crate::types::{BootMode, ConfigData, ImgBootParams, ImgCertStore, TrustAnchors};
use rand_core::{CryptoRng, RngCore};

/// Which flash region a raw read/write targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    App,
    UpdateDownloader,
    CorePatcher,
    Core,
}

/// A certificate-signing-request or certificate subject description, as
/// handed to the out-of-scope X.509 service. Mirrors `lz_x509_cert_info` /
/// `lz_x509_csr_info` from the original source.
pub struct CertSubject<'a> {
    pub common_name: &'a str,
    pub org: &'a str,
    pub country: &'a str,
}

/// Everything Lazarus Core needs from the board that this specification
/// does not itself define the implementation of.
pub trait Platform: DebugSink {
    // --- Flash store (§4.2) ---

    /// Raw image header + code for a given stage. Borrowed views with
    /// platform-defined lifetimes (§9 design note: mmap-backed or copied,
    /// implementer's choice).
    fn image_header(&self, stage: Stage) -> &[u8];
    fn image_code(&self, stage: Stage) -> &[u8];

    fn read_config_data(&self) -> ConfigData;
    fn read_trust_anchors(&self) -> TrustAnchors;
    fn read_staging_area(&self) -> &[u8];

    /// Whole-region rewrite. Returns `false` on failure; a failure is fatal
    /// for the caller (§4.2).
    fn write_config(&mut self, data: &ConfigData) -> bool;
    fn write_trust_anchors(&mut self, anchors: &TrustAnchors) -> bool;
    fn write_image_meta(&mut self, stage: Stage, version: u32, issue_time: u32) -> bool;
    fn write_image(&mut self, stage: Stage, header: &[u8], code: &[u8]) -> bool;

    /// Page-granular staging erase (§4.2).
    fn erase_staging(&mut self) -> bool;
    /// Whole data-store erase, initial boot only (§4.8).
    fn erase_data_store(&mut self) -> bool;

    // --- RNG (out of scope §1, handle passed explicitly §4.1) ---

    fn rng(&mut self) -> &mut dyn RngHandle;

    // --- Watchdog (§6) ---

    /// One-shot, irreversible (§6).
    fn awdt_init(&mut self, timeout_s: u32);
    fn awdt_last_reset_was_awdt(&self) -> bool;

    fn rng_deinit(&mut self);

    // --- PEM / DER / X.509 (out of scope §1) ---

    fn pub_key_to_pem(&self, pub_key: &p256::ecdsa::VerifyingKey) -> Result<heapless::String<256>, LazarusError>;
    fn priv_key_to_pem(&self, priv_key: &p256::ecdsa::SigningKey) -> Result<heapless::String<256>, LazarusError>;
    fn pem_to_pub_key(&self, pem: &str) -> Result<p256::ecdsa::VerifyingKey, LazarusError>;

    /// Issue (or self-sign, for the hub-less bring-up case) a CSR for the
    /// given key, returning its PEM encoding.
    fn issue_device_id_csr(
        &self,
        subject: &CertSubject,
        pub_key_pem: &str,
    ) -> Result<heapless::String<512>, LazarusError>;

    /// Synthesize and sign a leaf certificate (used for the AliasID
    /// certificate in §4.7): `issuer` signs over `subject`'s public key.
    fn issue_cert(
        &self,
        issuer_subject: &CertSubject,
        subject: &CertSubject,
        subject_pub_key_pem: &str,
        issuer_priv_key: &p256::ecdsa::SigningKey,
        serial: u64,
    ) -> Result<heapless::String<512>, LazarusError>;

    // --- Control transfer (§6) ---

    /// Writes the RAM parameter block and certificate bag the next stage
    /// reads at a fixed, board-defined location (`lz_core_provide_params_ram`
    /// in the original). The boot-parameter region these overlap with the
    /// inbound `BootParams` has already been fully consumed by this point.
    fn provide_boot_params(&mut self, params: &ImgBootParams, certs: &ImgCertStore) -> bool;

    /// Jump to `stage`'s reset vector (read from `code_base + 4`) and never
    /// return. Bricking/halting on an unrecoverable error is also routed
    /// through here as `Self::halt`.
    fn enter_stage(&mut self, mode: BootMode) -> !;

    /// Unrecoverable failure handler (`lz_error_handler()` in the original).
    fn halt(&mut self) -> !;

    /// Parks forever while the hub finishes out-of-band provisioning
    /// (flashing trust anchors and the UD/Core Patcher/Core images).
    /// Unlike `halt`, this is not an error: it is the expected state between
    /// the very first boot and the hub completing its work, so it gets its
    /// own distinct log line rather than going through the error handler.
    fn await_provisioning(&mut self) -> !;
}

/// Object-safe RNG handle so `ecdsa_sign` can take `&mut dyn RngHandle`
/// without making `Platform` generic.
pub trait RngHandle: RngCore + CryptoRng {}
impl<T: RngCore + CryptoRng> RngHandle for T {}
