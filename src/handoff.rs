//! Building the RAM parameter block handed to the next stage (§4.9),
//! arming the watchdog, wiping ephemeral key material, and the final
//! jump — grounded on `lz_core_provide_params_ram`/`lz_core_derive_dev_auth`
//! and the original's `switch_to_next_layer`.

use crate::crypto;
use crate::error::LazarusError;
use crate::platform::Platform;
use crate::types::{
    BootMode, BootParams, Digest, ImgBootParams, NwInfo, Nonce, HMAC_KEY_LEN, LZ_MAGIC, PEM_MAX_LEN,
    UUID_LEN,
};
use zeroize::Zeroize;

/// `dev_auth = HMAC-SHA256(key = core_auth, msg = pem(dev_pub) || dev_uuid)`.
/// `core_auth` is the key, never the message — getting this backwards
/// would make `dev_auth` forgeable by anyone who knows the public DeviceID
/// PEM.
pub fn derive_dev_auth(core_auth: &[u8; HMAC_KEY_LEN], dev_pub_pem: &str, dev_uuid: &[u8; UUID_LEN]) -> Digest {
    crypto::hmac_sha256_multi(core_auth, &[dev_pub_pem.as_bytes(), dev_uuid])
}

fn copy_pem(src: &str) -> Result<heapless::String<PEM_MAX_LEN>, LazarusError> {
    let mut out = heapless::String::new();
    out.push_str(src).map_err(|_| LazarusError::BootParamsCorrupt)?;
    Ok(out)
}

/// Fills in `ImgBootParams` per the need-to-know table in §4.9: the App
/// gets nothing that would let it impersonate the device on the network
/// or replay a ticket; the Update Downloader gets everything, since it's
/// the one stage that talks to the hub; the Core Patcher gets enough to
/// authenticate a firmware exchange but not network credentials.
#[allow(clippy::too_many_arguments)]
pub fn build_handoff_params(
    stage: BootMode,
    alias_id_pub_pem: &str,
    alias_id_priv_pem: &str,
    dev_uuid: &[u8; UUID_LEN],
    cur_nonce: &Nonce,
    next_nonce: &Nonce,
    dev_auth: &Digest,
    reassociation_necessary: bool,
    firmware_update_necessary: bool,
    nw_info: Option<&NwInfo>,
) -> Result<ImgBootParams, LazarusError> {
    let base = ImgBootParams {
        magic: LZ_MAGIC,
        alias_id_pub_pem: copy_pem(alias_id_pub_pem)?,
        alias_id_priv_pem: copy_pem(alias_id_priv_pem)?,
        dev_uuid: *dev_uuid,
        next_nonce: None,
        cur_nonce: None,
        dev_auth: None,
        dev_reassociation_necessary: None,
        firmware_update_necessary: None,
        nw_info: None,
    };

    Ok(match stage {
        BootMode::App => ImgBootParams {
            next_nonce: Some(*next_nonce),
            ..base
        },
        BootMode::UpdateDownloader => ImgBootParams {
            cur_nonce: Some(*cur_nonce),
            next_nonce: Some(*next_nonce),
            dev_auth: Some(*dev_auth),
            dev_reassociation_necessary: Some(reassociation_necessary),
            firmware_update_necessary: Some(firmware_update_necessary),
            nw_info: nw_info.copied(),
            ..base
        },
        BootMode::CorePatcher => ImgBootParams {
            cur_nonce: Some(*cur_nonce),
            next_nonce: Some(*next_nonce),
            dev_auth: Some(*dev_auth),
            dev_reassociation_necessary: Some(reassociation_necessary),
            firmware_update_necessary: Some(firmware_update_necessary),
            ..base
        },
    })
}

/// Arms the authenticated watchdog (§6). One-shot: there is no
/// corresponding disarm call anywhere in this crate, by design — once Core
/// hands off, the next stage has a bounded time to either run correctly or
/// prove itself alive, or the device resets.
pub fn arm_watchdog<P: Platform>(platform: &mut P, timeout_s: u32) {
    platform.awdt_init(timeout_s);
}

/// Wipes the ephemeral secrets Core was handed (§6): `cdi_prime` is the
/// seed for every key this boot derived, and `core_auth`/`static_symm`
/// are symmetric secrets that have no business surviving past this point.
pub fn zeroize_boot_params(params: &mut BootParams) {
    params.cdi_prime.zeroize();
    params.static_symm.zeroize();
    params.core_auth.zeroize();
}

/// Transfers control to `mode`'s image and never returns.
pub fn enter_next_stage<P: Platform>(platform: &mut P, mode: BootMode) -> ! {
    platform.enter_stage(mode)
}
