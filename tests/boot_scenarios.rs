//! Host-side scenario coverage for the eight situations the trust engine
//! has to handle (§8), driven through an in-memory `Platform` fake instead
//! of real flash/RNG/watchdog hardware. `run()` never returns by design,
//! so each scenario drives it through `std::panic::catch_unwind` and the
//! fake's `halt`/`enter_stage` record what happened before panicking.

use lazarus_core::platform::{CertSubject, Platform, Stage};
use lazarus_core::types::{
    BootMode, BootParams, CertTableEntry, ConfigData, HeaderType, ImgBootParams, ImgCertStore,
    ImgMeta, Nonce, StagingHeaderContent, TrustAnchorCertSlot, TrustAnchors, CDI_LEN, HMAC_KEY_LEN,
    IMAGE_CONTENT_LEN, IMG_NAME_LEN, LZ_MAGIC, MAX_SIG_DER_LEN, NONCE_LEN, UUID_LEN,
};
use lazarus_core::{crypto, keys};
use p256::ecdsa::{SigningKey, VerifyingKey};
use rand_chacha::ChaCha20Rng;
use rand_core::SeedableRng;

fn to_pem(prefix: &str, bytes: &[u8]) -> heapless::String<256> {
    let mut s = heapless::String::new();
    s.push_str(prefix).unwrap();
    for b in bytes {
        let _ = s.push(char::from_digit((b >> 4) as u32, 16).unwrap());
        let _ = s.push(char::from_digit((b & 0xf) as u32, 16).unwrap());
    }
    s
}

fn pub_pem(key: &VerifyingKey) -> heapless::String<256> {
    to_pem("PUB:", key.to_encoded_point(true).as_bytes())
}

fn priv_pem(key: &SigningKey) -> heapless::String<256> {
    to_pem("PRIV:", &key.to_bytes())
}

fn pem_to_pub(pem: &str) -> VerifyingKey {
    let hex = &pem["PUB:".len()..];
    let mut bytes = std::vec::Vec::new();
    let chars: std::vec::Vec<char> = hex.chars().collect();
    for pair in chars.chunks(2) {
        let byte = u8::from_str_radix(&pair.iter().collect::<std::string::String>(), 16).unwrap();
        bytes.push(byte);
    }
    VerifyingKey::from_sec1_bytes(&bytes).unwrap()
}

struct FakePlatform {
    config: ConfigData,
    trust_anchors: TrustAnchors,
    staging: std::vec::Vec<u8>,
    headers: std::collections::HashMap<u8, std::vec::Vec<u8>>,
    codes: std::collections::HashMap<u8, std::vec::Vec<u8>>,
    rng: ChaCha20Rng,
    awdt_timeout: Option<u32>,
    awdt_last_reset_was_awdt: bool,
    provided: Option<(ImgBootParams, ImgCertStore)>,
    entered: Option<BootMode>,
    halted: bool,
    awaited_provisioning: bool,
}

fn stage_key(stage: Stage) -> u8 {
    match stage {
        Stage::App => 0,
        Stage::UpdateDownloader => 1,
        Stage::CorePatcher => 2,
        Stage::Core => 3,
    }
}

impl FakePlatform {
    fn new() -> Self {
        FakePlatform {
            config: ConfigData::default(),
            trust_anchors: TrustAnchors::default(),
            staging: std::vec::Vec::new(),
            headers: std::collections::HashMap::new(),
            codes: std::collections::HashMap::new(),
            rng: ChaCha20Rng::seed_from_u64(99),
            awdt_timeout: None,
            awdt_last_reset_was_awdt: false,
            provided: None,
            entered: None,
            halted: false,
            awaited_provisioning: false,
        }
    }

    fn set_image(&mut self, stage: Stage, header: std::vec::Vec<u8>, code: std::vec::Vec<u8>) {
        self.headers.insert(stage_key(stage), header);
        self.codes.insert(stage_key(stage), code);
    }
}

impl lazarus_core::debug::DebugSink for FakePlatform {
    fn write_byte(&mut self, _b: u8) {}
}

impl Platform for FakePlatform {
    fn image_header(&self, stage: Stage) -> &[u8] {
        self.headers.get(&stage_key(stage)).map(|v| v.as_slice()).unwrap_or(&[])
    }
    fn image_code(&self, stage: Stage) -> &[u8] {
        self.codes.get(&stage_key(stage)).map(|v| v.as_slice()).unwrap_or(&[])
    }
    fn read_config_data(&self) -> ConfigData { self.config.clone() }
    fn read_trust_anchors(&self) -> TrustAnchors { self.trust_anchors.clone() }
    fn read_staging_area(&self) -> &[u8] { &self.staging }

    fn write_config(&mut self, data: &ConfigData) -> bool {
        self.config = data.clone();
        true
    }
    fn write_trust_anchors(&mut self, anchors: &TrustAnchors) -> bool {
        self.trust_anchors = anchors.clone();
        true
    }
    fn write_image_meta(&mut self, stage: Stage, version: u32, issue_time: u32) -> bool {
        let meta = ImgMeta { last_version: version, last_issue_time: issue_time, magic: LZ_MAGIC };
        match stage {
            Stage::App => self.config.img_info.app_meta = meta,
            Stage::UpdateDownloader => self.config.img_info.ud_meta = meta,
            Stage::CorePatcher => self.config.img_info.um_meta = meta,
            Stage::Core => {}
        }
        true
    }
    fn write_image(&mut self, stage: Stage, header: &[u8], code: &[u8]) -> bool {
        self.headers.insert(stage_key(stage), header.to_vec());
        self.codes.insert(stage_key(stage), code.to_vec());
        true
    }
    fn erase_staging(&mut self) -> bool {
        self.staging.clear();
        true
    }
    fn erase_data_store(&mut self) -> bool {
        self.config = ConfigData::default();
        self.trust_anchors = TrustAnchors::default();
        true
    }

    fn rng(&mut self) -> &mut dyn lazarus_core::platform::RngHandle { &mut self.rng }

    fn awdt_init(&mut self, timeout_s: u32) { self.awdt_timeout = Some(timeout_s); }
    fn awdt_last_reset_was_awdt(&self) -> bool { self.awdt_last_reset_was_awdt }
    fn rng_deinit(&mut self) {}

    fn pub_key_to_pem(&self, pub_key: &VerifyingKey) -> Result<heapless::String<256>, lazarus_core::error::LazarusError> {
        Ok(pub_pem(pub_key))
    }
    fn priv_key_to_pem(&self, priv_key: &SigningKey) -> Result<heapless::String<256>, lazarus_core::error::LazarusError> {
        Ok(priv_pem(priv_key))
    }
    fn pem_to_pub_key(&self, pem: &str) -> Result<VerifyingKey, lazarus_core::error::LazarusError> {
        Ok(pem_to_pub(pem))
    }
    fn issue_device_id_csr(
        &self,
        _subject: &CertSubject,
        pub_key_pem: &str,
    ) -> Result<heapless::String<512>, lazarus_core::error::LazarusError> {
        let mut s = heapless::String::new();
        let _ = s.push_str("CSR:");
        let _ = s.push_str(pub_key_pem);
        Ok(s)
    }
    fn issue_cert(
        &self,
        _issuer_subject: &CertSubject,
        _subject: &CertSubject,
        subject_pub_key_pem: &str,
        _issuer_priv_key: &SigningKey,
        _serial: u64,
    ) -> Result<heapless::String<512>, lazarus_core::error::LazarusError> {
        let mut s = heapless::String::new();
        let _ = s.push_str("CERT:");
        let _ = s.push_str(subject_pub_key_pem);
        Ok(s)
    }

    fn provide_boot_params(&mut self, params: &ImgBootParams, certs: &ImgCertStore) -> bool {
        self.provided = Some((params.clone(), certs.clone()));
        true
    }

    fn enter_stage(&mut self, mode: BootMode) -> ! {
        self.entered = Some(mode);
        panic!("entered-stage");
    }
    fn halt(&mut self) -> ! {
        self.halted = true;
        panic!("halted");
    }
    fn await_provisioning(&mut self) -> ! {
        self.awaited_provisioning = true;
        panic!("awaited-provisioning");
    }
}

fn run_and_catch(platform: &mut FakePlatform, boot_params: BootParams) {
    let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        lazarus_core::run(platform, boot_params);
    }));
}

fn zero_nonce() -> Nonce { [0u8; NONCE_LEN] }

fn make_boot_params(cdi: [u8; CDI_LEN], initial_boot: bool, core_auth: [u8; HMAC_KEY_LEN]) -> BootParams {
    BootParams {
        magic: LZ_MAGIC,
        initial_boot,
        cdi_prime: cdi,
        static_symm: [0u8; 32],
        dev_uuid: [1u8; UUID_LEN],
        core_auth,
        cur_nonce: zero_nonce(),
        next_nonce: [2u8; NONCE_LEN],
    }
}

fn signed_image(key: &SigningKey, code: &[u8], version: u32, issue_time: u32) -> std::vec::Vec<u8> {
    let mut rng = ChaCha20Rng::seed_from_u64(5);
    let content = lazarus_core::types::ImageHeaderContent {
        magic: LZ_MAGIC,
        name: [0u8; IMG_NAME_LEN],
        version,
        issue_time,
        size: code.len() as u32,
        hdr_size: IMAGE_CONTENT_LEN as u32,
        digest: crypto::sha256(code),
    };
    let sig = crypto::ecdsa_sign(key, &content.to_bytes(), &mut rng).unwrap();
    let mut out = content.to_bytes().to_vec();
    out.push(sig.len);
    let mut padded = [0u8; MAX_SIG_DER_LEN];
    padded[..sig.as_bytes().len()].copy_from_slice(sig.as_bytes());
    out.extend_from_slice(&padded);
    out
}

fn staging_record(key: &SigningKey, kind: HeaderType, payload: &[u8], nonce: Nonce) -> std::vec::Vec<u8> {
    let mut rng = ChaCha20Rng::seed_from_u64(11);
    let content = StagingHeaderContent {
        magic: LZ_MAGIC,
        r#type: kind,
        payload_size: payload.len() as u32,
        digest: crypto::sha256(payload),
        nonce,
        issue_time: 1,
    };
    let sig = crypto::ecdsa_sign(key, &content.to_bytes(), &mut rng).unwrap();
    let mut out = content.to_bytes().to_vec();
    out.push(sig.len);
    let mut padded = [0u8; MAX_SIG_DER_LEN];
    padded[..sig.as_bytes().len()].copy_from_slice(sig.as_bytes());
    out.extend_from_slice(&padded);
    out.extend_from_slice(payload);
    out
}

/// Sets up a platform past initial provisioning: trust anchors populated,
/// hub/code-auth keys equal to the device's own management key for
/// simplicity, App/UD/CorePatcher images present and correctly signed.
fn provisioned_platform() -> (FakePlatform, SigningKey, [u8; CDI_LEN]) {
    let cdi = [6u8; CDI_LEN];
    let device_id = keys::derive_device_id(&cdi).unwrap();
    let hub_key = SigningKey::from_bytes(&p256::FieldBytes::from(crypto::sha256(b"hub"))).unwrap();

    let mut platform = FakePlatform::new();
    platform.trust_anchors.dev_pub_key = pub_pem(&device_id.public());
    platform.trust_anchors.management_pub_key = pub_pem(hub_key.verifying_key());
    platform.trust_anchors.code_auth_pub_key = pub_pem(hub_key.verifying_key());
    platform.trust_anchors.cert_table[TrustAnchorCertSlot::Hub as usize] = CertTableEntry { start: 0, size: 4 };
    platform.trust_anchors.cert_table[TrustAnchorCertSlot::DeviceId as usize] = CertTableEntry { start: 4, size: 3 };
    platform.trust_anchors.cert_bag.extend_from_slice(b"HUBCDID").unwrap();
    platform.trust_anchors.magic = LZ_MAGIC;

    platform.set_image(Stage::App, signed_image(&hub_key, b"app code", 1, 10), b"app code".to_vec());
    platform.set_image(
        Stage::UpdateDownloader,
        signed_image(&hub_key, b"ud code", 1, 10),
        b"ud code".to_vec(),
    );
    platform.set_image(
        Stage::CorePatcher,
        signed_image(&hub_key, b"cp code", 1, 10),
        b"cp code".to_vec(),
    );
    platform.set_image(
        Stage::Core,
        signed_image(&hub_key, b"core code", 1, 10),
        b"core code".to_vec(),
    );

    (platform, hub_key, cdi)
}

#[test]
fn initial_boot_issues_csr_and_awaits_provisioning() {
    let mut platform = FakePlatform::new();
    let boot_params = make_boot_params([3u8; CDI_LEN], true, [4u8; HMAC_KEY_LEN]);
    run_and_catch(&mut platform, boot_params);

    // No hub-signed images or Trust Anchors exist yet on the very first
    // boot, so Core has nothing safe to do but mint a DeviceID CSR and
    // wait for the hub to finish enrollment out of band.
    assert!(!platform.trust_anchors.dev_pub_key.is_empty());
    assert!(platform.awaited_provisioning);
    assert!(platform.entered.is_none());
    assert!(!platform.halted);
}

#[test]
fn boot_before_provisioning_completes_awaits_again() {
    // Trust Anchors are in place (so a prior boot already derived and
    // stored the DeviceID) but the hub has not yet flashed the Core
    // Patcher or Core images.
    let cdi = [6u8; CDI_LEN];
    let device_id = keys::derive_device_id(&cdi).unwrap();
    let mut platform = FakePlatform::new();
    platform.trust_anchors.dev_pub_key = pub_pem(&device_id.public());
    platform.trust_anchors.magic = LZ_MAGIC;
    platform.set_image(Stage::UpdateDownloader, signed_image(&device_id.private(), b"ud", 1, 10), b"ud".to_vec());

    let boot_params = make_boot_params(cdi, false, [4u8; HMAC_KEY_LEN]);
    run_and_catch(&mut platform, boot_params);

    assert!(platform.awaited_provisioning);
    assert!(platform.entered.is_none());
}

#[test]
fn empty_staging_area_routes_to_update_downloader() {
    let (mut platform, _hub, cdi) = provisioned_platform();
    let boot_params = make_boot_params(cdi, false, [4u8; HMAC_KEY_LEN]);
    run_and_catch(&mut platform, boot_params);

    assert_eq!(platform.entered, Some(BootMode::UpdateDownloader));
}

#[test]
fn valid_boot_ticket_routes_to_app() {
    let (mut platform, hub, cdi) = provisioned_platform();
    let nonce = zero_nonce();
    platform.staging = staging_record(&hub, HeaderType::BootTicket, b"boot", nonce);
    let boot_params = make_boot_params(cdi, false, [4u8; HMAC_KEY_LEN]);
    run_and_catch(&mut platform, boot_params);

    assert_eq!(platform.entered, Some(BootMode::App));
    assert!(platform.provided.is_some());
    assert!(platform.awdt_timeout.is_some());
}

#[test]
fn core_update_ticket_routes_to_core_patcher() {
    let (mut platform, hub, cdi) = provisioned_platform();
    let nonce = zero_nonce();
    let new_core_code = b"new core code";
    let mut new_core_image = signed_image(&hub, new_core_code, 2, 20);
    new_core_image.extend_from_slice(new_core_code);
    platform.staging = staging_record(&hub, HeaderType::CoreUpdate, &new_core_image, nonce);
    let boot_params = make_boot_params(cdi, false, [4u8; HMAC_KEY_LEN]);
    run_and_catch(&mut platform, boot_params);

    assert_eq!(platform.entered, Some(BootMode::CorePatcher));
    assert_eq!(platform.headers.get(&stage_key(Stage::Core)).map(|v| v.len()).unwrap_or(0) > 0, true);
}

#[test]
fn tampered_app_image_falls_back_to_update_downloader() {
    let (mut platform, hub, cdi) = provisioned_platform();
    let nonce = zero_nonce();
    platform.staging = staging_record(&hub, HeaderType::BootTicket, b"boot", nonce);
    // Corrupt the App code after it was signed.
    platform.codes.insert(stage_key(Stage::App), b"corrupted!".to_vec());
    let boot_params = make_boot_params(cdi, false, [4u8; HMAC_KEY_LEN]);
    run_and_catch(&mut platform, boot_params);

    // The dominance principle: a failed App verification never bricks the
    // device, it falls back to the Update Downloader with the firmware
    // update flag set so the hub knows to re-provision it.
    assert_eq!(platform.entered, Some(BootMode::UpdateDownloader));
    assert!(!platform.halted);
    let (params, _certs) = platform.provided.as_ref().unwrap();
    assert_eq!(params.firmware_update_necessary, Some(true));
}

#[test]
fn app_version_rollback_falls_back_to_update_downloader() {
    let (mut platform, hub, cdi) = provisioned_platform();
    platform.config.img_info.app_meta = ImgMeta { last_version: 5, last_issue_time: 0, magic: LZ_MAGIC };
    let nonce = zero_nonce();
    platform.staging = staging_record(&hub, HeaderType::BootTicket, b"boot", nonce);
    let boot_params = make_boot_params(cdi, false, [4u8; HMAC_KEY_LEN]);
    run_and_catch(&mut platform, boot_params);

    assert_eq!(platform.entered, Some(BootMode::UpdateDownloader));
    assert!(!platform.halted);
}

#[test]
fn tampered_update_downloader_image_halts_unconditionally() {
    let (mut platform, _hub, cdi) = provisioned_platform();
    // Empty staging area selects the Update Downloader directly; there is
    // no fallback stage below it, so a corrupt image there is fatal.
    platform.codes.insert(stage_key(Stage::UpdateDownloader), b"corrupted!".to_vec());
    let boot_params = make_boot_params(cdi, false, [4u8; HMAC_KEY_LEN]);
    run_and_catch(&mut platform, boot_params);

    assert!(platform.halted);
    assert!(platform.entered.is_none());
}

#[test]
fn stale_nonce_falls_back_to_update_downloader() {
    let (mut platform, hub, cdi) = provisioned_platform();
    let stale_nonce = [0xffu8; NONCE_LEN];
    platform.staging = staging_record(&hub, HeaderType::BootTicket, b"boot", stale_nonce);
    let boot_params = make_boot_params(cdi, false, [4u8; HMAC_KEY_LEN]);
    run_and_catch(&mut platform, boot_params);

    assert_eq!(platform.entered, Some(BootMode::UpdateDownloader));
}

#[test]
fn core_binary_change_reissues_csr_but_app_handoff_omits_the_flag() {
    let (mut platform, hub, _cdi) = provisioned_platform();
    // A different CDI' simulates Core itself having changed since the
    // DeviceID key stored in the Trust Anchors was derived.
    let new_cdi = [66u8; CDI_LEN];
    let new_device_id = keys::derive_device_id(&new_cdi).unwrap();
    let nonce = zero_nonce();
    platform.staging = staging_record(&hub, HeaderType::BootTicket, b"boot", nonce);
    let boot_params = make_boot_params(new_cdi, false, [4u8; HMAC_KEY_LEN]);
    run_and_catch(&mut platform, boot_params);

    assert_eq!(platform.entered, Some(BootMode::App));
    assert_eq!(platform.trust_anchors.dev_pub_key, pub_pem(&new_device_id.public()));
    // The App is never told reassociation happened — need-to-know (§4.9)
    // denies it the ability to request one.
    let (params, _certs) = platform.provided.as_ref().unwrap();
    assert_eq!(params.dev_reassociation_necessary, None);
}

#[test]
fn core_binary_change_flags_reassociation_in_update_downloader_handoff() {
    let (mut platform, _hub, _cdi) = provisioned_platform();
    // Empty staging area selects the Update Downloader; no valid boot
    // ticket is present so the reassociation flag is observable there.
    let new_cdi = [66u8; CDI_LEN];
    let boot_params = make_boot_params(new_cdi, false, [4u8; HMAC_KEY_LEN]);
    run_and_catch(&mut platform, boot_params);

    assert_eq!(platform.entered, Some(BootMode::UpdateDownloader));
    let (params, _certs) = platform.provided.as_ref().unwrap();
    assert_eq!(params.dev_reassociation_necessary, Some(true));
}
