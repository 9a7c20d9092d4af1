//! The data model from spec §3: boot parameters, the persistent Data Store,
//! the staging-area wire format, image headers, and the RAM structures
//! handed to the next stage.
//!
//! Staging records and image headers are read off flash as raw bytes
//! (`Platform::read_staging_area`/`image_header` return `&[u8]`), so their
//! `content` structs parse themselves out of a little-endian byte slice
//! rather than being reinterpreted via `repr(C)` transmutes — safer than
//! the original's raw pointer casts, same wire layout.

use heapless::{String, Vec};

pub const LZ_MAGIC: u32 = 0x4C41_5A30; // "LAZ0" read little-endian
pub const NONCE_LEN: usize = 16;
pub const DIGEST_LEN: usize = 32;
pub const UUID_LEN: usize = 16;
pub const HMAC_KEY_LEN: usize = 32;
pub const CDI_LEN: usize = 32;
pub const IMG_NAME_LEN: usize = 16;
pub const MAX_SIG_DER_LEN: usize = 72;
pub const CERT_BAG_LEN: usize = 4096;
pub const TRUST_ANCHOR_CERTS: usize = 2;
pub const IMG_CERT_SLOTS: usize = 3;
pub const DEFAULT_WDT_TIMEOUT_S: u32 = 60;
pub const PEM_MAX_LEN: usize = 256;
pub const CERT_MAX_LEN: usize = 512;
pub const NW_INFO_LEN: usize = 256;

pub type Nonce = [u8; NONCE_LEN];
pub type Digest = [u8; DIGEST_LEN];

/// DER-encoded ECDSA signature with explicit length, mirroring the
/// original's `lz_ecc_signature { sig[...], length }`.
#[derive(Clone, Copy)]
pub struct Signature {
    pub len: u8,
    pub der: [u8; MAX_SIG_DER_LEN],
}

impl Signature {
    pub fn from_der(bytes: &[u8]) -> Option<Self> {
        if bytes.len() > MAX_SIG_DER_LEN {
            return None;
        }
        let mut der = [0u8; MAX_SIG_DER_LEN];
        der[..bytes.len()].copy_from_slice(bytes);
        Some(Signature { len: bytes.len() as u8, der })
    }

    pub fn as_bytes(&self) -> &[u8] { &self.der[..self.len as usize] }
}

/// Boot parameters handed to Core by DICEpp (§3, inbound §6).
#[derive(Clone)]
pub struct BootParams {
    pub magic: u32,
    pub initial_boot: bool,
    pub cdi_prime: [u8; CDI_LEN],
    /// Only meaningful (non-zero) on the very first boot.
    pub static_symm: [u8; 32],
    pub dev_uuid: [u8; UUID_LEN],
    pub core_auth: [u8; HMAC_KEY_LEN],
    pub cur_nonce: Nonce,
    pub next_nonce: Nonce,
}

impl BootParams {
    pub fn is_valid(&self) -> bool { self.magic == LZ_MAGIC }
}

/// Per-image rollback metadata (`lz_img_meta_t`).
#[derive(Clone, Copy, Default)]
pub struct ImgMeta {
    pub last_version: u32,
    pub last_issue_time: u32,
    pub magic: u32,
}

impl ImgMeta {
    pub fn is_valid(&self) -> bool { self.magic == LZ_MAGIC }
}

#[derive(Clone, Copy, Default)]
pub struct ImgInfo {
    pub app_meta: ImgMeta,
    pub ud_meta: ImgMeta,
    pub um_meta: ImgMeta,
}

#[derive(Clone, Copy, Default)]
pub struct StaticSymmInfo {
    pub magic: u32,
    pub dev_uuid: [u8; UUID_LEN],
    pub static_symm: [u8; 32],
}

impl StaticSymmInfo {
    pub fn is_wiped(&self) -> bool { self.static_symm == [0u8; 32] }
}

/// Opaque network credentials handed only to the Update Downloader.
#[derive(Clone, Copy)]
pub struct NwInfo {
    pub magic: u32,
    pub data: [u8; NW_INFO_LEN],
}

impl Default for NwInfo {
    fn default() -> Self { NwInfo { magic: 0, data: [0u8; NW_INFO_LEN] } }
}

impl NwInfo {
    pub fn is_present(&self) -> bool { self.magic == LZ_MAGIC }
}

/// Config Data region of the Data Store (§3).
#[derive(Clone, Default)]
pub struct ConfigData {
    pub static_symm_info: StaticSymmInfo,
    pub img_info: ImgInfo,
    pub nw_info: NwInfo,
}

#[derive(Clone, Copy, Default)]
pub struct CertTableEntry {
    pub start: u32,
    pub size: u32,
}

/// Trust Anchors region of the Data Store (§3).
#[derive(Clone)]
pub struct TrustAnchors {
    pub dev_pub_key: String<PEM_MAX_LEN>,
    pub management_pub_key: String<PEM_MAX_LEN>,
    pub code_auth_pub_key: String<PEM_MAX_LEN>,
    pub cert_table: [CertTableEntry; TRUST_ANCHOR_CERTS],
    pub cursor: u32,
    pub magic: u32,
    pub cert_bag: Vec<u8, CERT_BAG_LEN>,
}

impl Default for TrustAnchors {
    fn default() -> Self {
        TrustAnchors {
            dev_pub_key: String::new(),
            management_pub_key: String::new(),
            code_auth_pub_key: String::new(),
            cert_table: [CertTableEntry::default(); TRUST_ANCHOR_CERTS],
            cursor: 0,
            magic: 0,
            cert_bag: Vec::new(),
        }
    }
}

impl TrustAnchors {
    pub fn is_valid(&self) -> bool { self.magic == LZ_MAGIC }
}

/// Index into `TrustAnchors::cert_table` (only Hub and DeviceId are stored
/// persistently; AliasID is minted fresh every boot and only appears in
/// `ImgCertStore`).
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum TrustAnchorCertSlot {
    Hub = 0,
    DeviceId = 1,
}

/// Index into `ImgCertStore::cert_table` (§4.7).
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum ImgCertSlot {
    Hub = 0,
    DeviceId = 1,
    AliasId = 2,
}

/// Closed type enum for staging records (§6). Values are the wire codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum HeaderType {
    BootTicket = 0,
    DeferralTicket = 1,
    CoreUpdate = 2,
    UdownloaderUpdate = 3,
    CpatcherUpdate = 4,
    AppUpdate = 5,
    DeviceIdReassocRes = 6,
    ConfigUpdate = 7,
}

impl HeaderType {
    pub fn from_u32(v: u32) -> Option<Self> {
        Some(match v {
            0 => HeaderType::BootTicket,
            1 => HeaderType::DeferralTicket,
            2 => HeaderType::CoreUpdate,
            3 => HeaderType::UdownloaderUpdate,
            4 => HeaderType::CpatcherUpdate,
            5 => HeaderType::AppUpdate,
            6 => HeaderType::DeviceIdReassocRes,
            7 => HeaderType::ConfigUpdate,
            _ => return None,
        })
    }

    /// True for the five ticket types the update applier consumes (§4.6).
    pub fn is_update_kind(self) -> bool {
        matches!(
            self,
            HeaderType::CoreUpdate
                | HeaderType::UdownloaderUpdate
                | HeaderType::CpatcherUpdate
                | HeaderType::AppUpdate
                | HeaderType::ConfigUpdate
        )
    }
}

/// The authenticated part of a staging record header (`auth_hdr.content`).
#[derive(Clone)]
pub struct StagingHeaderContent {
    pub magic: u32,
    pub r#type: HeaderType,
    pub payload_size: u32,
    pub digest: Digest,
    pub nonce: Nonce,
    pub issue_time: u32,
}

/// Size, in bytes, of the serialized `StagingHeaderContent` (what gets
/// hashed/signed as "the full content substructure", §6).
pub const STAGING_CONTENT_LEN: usize = 4 + 4 + 4 + DIGEST_LEN + NONCE_LEN + 4;
/// Size of the full authenticated header: content + signature length byte +
/// max DER signature.
pub const STAGING_HEADER_LEN: usize = STAGING_CONTENT_LEN + 1 + MAX_SIG_DER_LEN;

impl StagingHeaderContent {
    pub fn to_bytes(&self) -> [u8; STAGING_CONTENT_LEN] {
        let mut out = [0u8; STAGING_CONTENT_LEN];
        let mut off = 0;
        out[off..off + 4].copy_from_slice(&self.magic.to_le_bytes());
        off += 4;
        out[off..off + 4].copy_from_slice(&(self.r#type as u32).to_le_bytes());
        off += 4;
        out[off..off + 4].copy_from_slice(&self.payload_size.to_le_bytes());
        off += 4;
        out[off..off + DIGEST_LEN].copy_from_slice(&self.digest);
        off += DIGEST_LEN;
        out[off..off + NONCE_LEN].copy_from_slice(&self.nonce);
        off += NONCE_LEN;
        out[off..off + 4].copy_from_slice(&self.issue_time.to_le_bytes());
        out
    }

    fn parse(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < STAGING_CONTENT_LEN {
            return None;
        }
        let mut off = 0;
        let magic = u32::from_le_bytes(bytes[off..off + 4].try_into().ok()?);
        off += 4;
        let type_raw = u32::from_le_bytes(bytes[off..off + 4].try_into().ok()?);
        off += 4;
        let payload_size = u32::from_le_bytes(bytes[off..off + 4].try_into().ok()?);
        off += 4;
        let mut digest = [0u8; DIGEST_LEN];
        digest.copy_from_slice(&bytes[off..off + DIGEST_LEN]);
        off += DIGEST_LEN;
        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(&bytes[off..off + NONCE_LEN]);
        off += NONCE_LEN;
        let issue_time = u32::from_le_bytes(bytes[off..off + 4].try_into().ok()?);

        // An unrecognized type is treated the same as a magic mismatch by
        // callers: not a valid-looking header, so scanning stops here.
        let r#type = HeaderType::from_u32(type_raw)?;

        Some(StagingHeaderContent { magic, r#type, payload_size, digest, nonce, issue_time })
    }
}

/// A full staging record header plus its signature (`lz_auth_hdr_t`).
#[derive(Clone)]
pub struct StagingRecordHeader {
    pub content: StagingHeaderContent,
    pub signature: Signature,
}

impl StagingRecordHeader {
    /// Parses one header out of `bytes`. Returns `None` if `bytes` is too
    /// short or the leading magic doesn't look like a header at all — the
    /// staging-area scan (§4.5) stops on `None`, mirroring the original's
    /// "first header with `magic != LZ_MAGIC`" termination rule.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        let content = StagingHeaderContent::parse(bytes)?;
        let sig_off = STAGING_CONTENT_LEN;
        let sig_len = *bytes.get(sig_off)? as usize;
        if sig_len > MAX_SIG_DER_LEN {
            return None;
        }
        let der_start = sig_off + 1;
        let der = bytes.get(der_start..der_start + sig_len)?;
        let signature = Signature::from_der(der)?;
        Some(StagingRecordHeader { content, signature })
    }

    /// Bytes consumed by this header on the wire (content + sig prefix +
    /// the signature itself, not including the payload that follows).
    pub const WIRE_LEN: usize = STAGING_CONTENT_LEN + 1 + MAX_SIG_DER_LEN;
}

/// The authenticated part of an image header (`lz_img_hdr_t.hdr.content`).
#[derive(Clone)]
pub struct ImageHeaderContent {
    pub magic: u32,
    pub name: [u8; IMG_NAME_LEN],
    /// `major << 16 | minor`.
    pub version: u32,
    pub issue_time: u32,
    pub size: u32,
    pub hdr_size: u32,
    pub digest: Digest,
}

pub const IMAGE_CONTENT_LEN: usize = 4 + IMG_NAME_LEN + 4 + 4 + 4 + 4 + DIGEST_LEN;

impl ImageHeaderContent {
    pub fn to_bytes(&self) -> [u8; IMAGE_CONTENT_LEN] {
        let mut out = [0u8; IMAGE_CONTENT_LEN];
        let mut off = 0;
        out[off..off + 4].copy_from_slice(&self.magic.to_le_bytes());
        off += 4;
        out[off..off + IMG_NAME_LEN].copy_from_slice(&self.name);
        off += IMG_NAME_LEN;
        out[off..off + 4].copy_from_slice(&self.version.to_le_bytes());
        off += 4;
        out[off..off + 4].copy_from_slice(&self.issue_time.to_le_bytes());
        off += 4;
        out[off..off + 4].copy_from_slice(&self.size.to_le_bytes());
        off += 4;
        out[off..off + 4].copy_from_slice(&self.hdr_size.to_le_bytes());
        off += 4;
        out[off..off + DIGEST_LEN].copy_from_slice(&self.digest);
        out
    }

    fn parse(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < IMAGE_CONTENT_LEN {
            return None;
        }
        let mut off = 0;
        let magic = u32::from_le_bytes(bytes[off..off + 4].try_into().ok()?);
        off += 4;
        let mut name = [0u8; IMG_NAME_LEN];
        name.copy_from_slice(&bytes[off..off + IMG_NAME_LEN]);
        off += IMG_NAME_LEN;
        let version = u32::from_le_bytes(bytes[off..off + 4].try_into().ok()?);
        off += 4;
        let issue_time = u32::from_le_bytes(bytes[off..off + 4].try_into().ok()?);
        off += 4;
        let size = u32::from_le_bytes(bytes[off..off + 4].try_into().ok()?);
        off += 4;
        let hdr_size = u32::from_le_bytes(bytes[off..off + 4].try_into().ok()?);
        off += 4;
        let mut digest = [0u8; DIGEST_LEN];
        digest.copy_from_slice(&bytes[off..off + DIGEST_LEN]);
        Some(ImageHeaderContent { magic, name, version, issue_time, size, hdr_size, digest })
    }
}

#[derive(Clone)]
pub struct ImageHeader {
    pub content: ImageHeaderContent,
    pub signature: Signature,
}

impl ImageHeader {
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        let content = ImageHeaderContent::parse(bytes)?;
        let sig_off = IMAGE_CONTENT_LEN;
        let sig_len = *bytes.get(sig_off)? as usize;
        if sig_len > MAX_SIG_DER_LEN {
            return None;
        }
        let der_start = sig_off + 1;
        let der = bytes.get(der_start..der_start + sig_len)?;
        let signature = Signature::from_der(der)?;
        Some(ImageHeader { content, signature })
    }

    pub fn is_valid_magic(&self) -> bool { self.content.magic == LZ_MAGIC }
}

/// Which next stage the selector (§4.8) decided on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootMode {
    App,
    UpdateDownloader,
    CorePatcher,
}

/// Parameters handed to the next stage (§3/§4.9). Need-to-know fields are
/// modeled as `Option` rather than always-present zeroed fields: a field's
/// absence is enforced by the type system instead of by convention, which
/// is stronger than the original C struct's "just don't fill it in".
#[derive(Clone)]
pub struct ImgBootParams {
    pub magic: u32,
    pub alias_id_pub_pem: String<PEM_MAX_LEN>,
    pub alias_id_priv_pem: String<PEM_MAX_LEN>,
    pub dev_uuid: [u8; UUID_LEN],
    pub next_nonce: Option<Nonce>,
    pub cur_nonce: Option<Nonce>,
    pub dev_auth: Option<Digest>,
    pub dev_reassociation_necessary: Option<bool>,
    pub firmware_update_necessary: Option<bool>,
    pub nw_info: Option<NwInfo>,
}

/// RAM certificate bundle handed to the next stage (§3/§4.7).
#[derive(Clone)]
pub struct ImgCertStore {
    pub dev_pub_key_pem: String<PEM_MAX_LEN>,
    pub management_pub_key_pem: String<PEM_MAX_LEN>,
    pub cert_table: [CertTableEntry; IMG_CERT_SLOTS],
    pub cursor: u32,
    pub cert_bag: Vec<u8, CERT_BAG_LEN>,
    pub magic: u32,
}

impl Default for ImgCertStore {
    fn default() -> Self {
        ImgCertStore {
            dev_pub_key_pem: String::new(),
            management_pub_key_pem: String::new(),
            cert_table: [CertTableEntry::default(); IMG_CERT_SLOTS],
            cursor: 0,
            cert_bag: Vec::new(),
            magic: 0,
        }
    }
}
