//! Lazarus Core: the DICE-based secure boot trust engine that runs as the
//! layer directly above DICE++ on a constrained microcontroller. `run()`
//! mirrors the original's `lz_core_run()` top-level orchestration: derive
//! this boot's identity, decide what runs next, verify it, hand off a
//! minimal need-to-know parameter block, and jump — or brick, if anything
//! along the way doesn't check out.
//!
//! Hosted under `cfg(test)` so every module here is exercisable on the
//! host without real flash, RNG, or watchdog hardware; bare-metal builds
//! pull in no std facilities beyond what `core` provides.

#![cfg_attr(not(test), no_std)]

#[macro_use]
pub mod debug;
pub mod bootmode;
pub mod certstore;
pub mod crypto;
pub mod error;
pub mod flash;
pub mod handoff;
pub mod image;
pub mod keys;
pub mod platform;
pub mod staging;
pub mod types;
pub mod update;

use error::LazarusError;
use flash::FlashStore;
use platform::{CertSubject, Platform, Stage};
use types::{BootMode, BootParams, ConfigData, ImageHeader, ImgInfo, ImgMeta, StaticSymmInfo, TrustAnchors, LZ_MAGIC};

/// Upper bound on how many bytes of staging area this implementation will
/// scan in one boot. A staging area larger than this is treated the same
/// as a flash read failure rather than silently truncated.
const STAGING_AREA_MAX: usize = 8192;

/// Runs the trust engine to completion. Never returns: every path either
/// jumps into the next stage's image or halts the device.
pub fn run<P: Platform>(platform: &mut P, mut boot_params: BootParams) -> ! {
    if !boot_params.is_valid() {
        error!(platform, "boot parameters failed magic check");
        handoff::zeroize_boot_params(&mut boot_params);
        platform.halt();
    }

    let outcome = run_inner(platform, &boot_params);
    handoff::zeroize_boot_params(&mut boot_params);

    match outcome {
        Ok(mode) => {
            info!(platform, "handoff complete, entering next stage");
            handoff::enter_next_stage(platform, mode)
        }
        Err(_) => {
            error!(platform, "boot sequence failed, halting");
            platform.halt()
        }
    }
}

fn stage_for_mode(mode: BootMode) -> Stage {
    match mode {
        BootMode::App => Stage::App,
        BootMode::UpdateDownloader => Stage::UpdateDownloader,
        BootMode::CorePatcher => Stage::CorePatcher,
    }
}

fn meta_for_stage(config: &ConfigData, stage: Stage) -> ImgMeta {
    match stage {
        Stage::App => config.img_info.app_meta,
        Stage::UpdateDownloader => config.img_info.ud_meta,
        Stage::CorePatcher => config.img_info.um_meta,
        Stage::Core => ImgMeta::default(),
    }
}

fn set_meta_for_stage(config: &mut ConfigData, stage: Stage, meta: ImgMeta) {
    match stage {
        Stage::App => config.img_info.app_meta = meta,
        Stage::UpdateDownloader => config.img_info.ud_meta = meta,
        Stage::CorePatcher => config.img_info.um_meta = meta,
        Stage::Core => {}
    }
}

/// True once the hub has finished flashing Trust Anchors and the three
/// downstream images (§4.8's `lz_core_is_provisioning_complete`).
fn provisioning_complete<P: Platform>(platform: &P, trust_anchors: &TrustAnchors) -> bool {
    let image_present = |stage: Stage| {
        ImageHeader::parse(platform.image_header(stage))
            .map(|h| h.is_valid_magic())
            .unwrap_or(false)
    };
    trust_anchors.is_valid()
        && image_present(Stage::UpdateDownloader)
        && image_present(Stage::CorePatcher)
        && image_present(Stage::Core)
}

fn run_inner<P: Platform>(platform: &mut P, boot_params: &BootParams) -> Result<BootMode, LazarusError> {
    // Pull the staging area into a local buffer before taking any further
    // borrows of `platform` — keeps its lifetime from entangling with the
    // flash writes later in this function.
    let mut staging_buf: heapless::Vec<u8, STAGING_AREA_MAX> = heapless::Vec::new();
    staging_buf
        .extend_from_slice(platform.read_staging_area())
        .map_err(|_| LazarusError::StagingInvalid)?;

    let device_id = keys::derive_device_id(&boot_params.cdi_prime)?;
    let device_id_pub_pem = platform.pub_key_to_pem(&device_id.public())?;
    let device_id_priv_pem = platform.priv_key_to_pem(device_id.private())?;

    let mut flash = FlashStore::new(platform);

    if boot_params.initial_boot {
        info!(flash.platform_mut(), "initial boot, erasing data store and staging area");
        flash.erase_data_store()?;
        flash.erase_staging()?;
        staging_buf.clear();

        let config = ConfigData {
            static_symm_info: StaticSymmInfo {
                magic: LZ_MAGIC,
                dev_uuid: boot_params.dev_uuid,
                static_symm: boot_params.static_symm,
            },
            img_info: ImgInfo {
                app_meta: ImgMeta { last_version: 0, last_issue_time: 0, magic: LZ_MAGIC },
                ud_meta: ImgMeta { last_version: 0, last_issue_time: 0, magic: LZ_MAGIC },
                um_meta: ImgMeta { last_version: 0, last_issue_time: 0, magic: LZ_MAGIC },
            },
            ..ConfigData::default()
        };
        flash.write_config(&config)?;
    } else {
        // Every boot after the first must not retain `static_symm`: it only
        // ever exists in flash during the single initial boot (§3 invariant).
        let mut config = flash.config()?;
        if !config.static_symm_info.is_wiped() {
            config.static_symm_info.static_symm = [0u8; 32];
            flash.write_config(&config)?;
        }
    }

    // Core-update detection (§4.10) runs on every boot, not just the first:
    // a mismatch between the freshly derived DeviceID and the one on file
    // means either this is the very first boot (all-zero Trust Anchors) or
    // this exact Core binary + CDI' combination has never produced this
    // DeviceID before.
    let mut trust_anchors = flash.trust_anchors_raw();
    let core_updated = bootmode::core_was_updated(flash.platform(), &trust_anchors, &device_id.public())?;
    if core_updated {
        info!(flash.platform_mut(), "new DeviceID public key, issuing CSR for reassociation");
        let subject = CertSubject { common_name: "Lazarus DeviceID", org: "Lazarus", country: "DE" };
        let _csr = flash.platform().issue_device_id_csr(&subject, &device_id_pub_pem)?;
        trust_anchors.dev_pub_key = device_id_pub_pem.clone();
        flash.write_trust_anchors(&trust_anchors)?;
    }

    // The hub is responsible for flashing the signed images and the Trust
    // Anchors out of band; until it has, there is nothing safe to do but
    // wait. This is expected behavior on a freshly enrolled device, not an
    // error, so it does not go through `Platform::halt`.
    if !provisioning_complete(flash.platform(), &trust_anchors) {
        warn_log!(flash.platform_mut(), "device is not provisioned yet, waiting for the hub");
        flash.platform_mut().await_provisioning();
    }

    let hub_key = flash.platform().pem_to_pub_key(&trust_anchors.management_pub_key)?;
    let code_auth_key = flash.platform().pem_to_pub_key(&trust_anchors.code_auth_pub_key)?;

    let applied = update::apply_updates(&staging_buf, &mut flash, &hub_key, &code_auth_key, &boot_params.cur_nonce)?;
    if applied.any() {
        info!(flash.platform_mut(), "applied pending updates from staging area");
    }

    // Read `config` only after updates are applied: `apply_updates` may have
    // bumped image metadata for a stage other than the one about to be
    // selected, and that write has to survive the `write_config` call below.
    let mut config = flash.config()?;

    let mut mode = bootmode::select_mode(&staging_buf, &hub_key, &boot_params.cur_nonce, applied.core);
    info!(flash.platform_mut(), "boot mode selected");

    // Trusted boot with the dominance principle (§4.8): if the App fails
    // verification, fall back to the Update Downloader and flag that a
    // firmware update is required; if the Update Downloader or Core
    // Patcher itself fails verification, there is nowhere left to fall
    // back to and the device is unrecoverable.
    let mut firmware_update_necessary = false;
    let mut next_stage = stage_for_mode(mode);
    let mut next_meta = meta_for_stage(&config, next_stage);
    let (next_header, next_layer_digest) = loop {
        let verified = flash
            .image(next_stage)
            .and_then(|(header, code)| image::verify_image(&header, code, &code_auth_key, &next_meta).map(|d| (header, d)));
        match verified {
            Ok(result) => break result,
            Err(_) if mode == BootMode::App => {
                error!(flash.platform_mut(), "app verification failed, falling back to update downloader");
                mode = BootMode::UpdateDownloader;
                firmware_update_necessary = true;
                next_stage = Stage::UpdateDownloader;
                next_meta = meta_for_stage(&config, next_stage);
            }
            Err(e) => return Err(e),
        }
    };

    let new_meta = ImgMeta {
        last_version: next_header.content.version,
        last_issue_time: next_header.content.issue_time,
        magic: LZ_MAGIC,
    };
    set_meta_for_stage(&mut config, next_stage, new_meta);
    flash.write_config(&config)?;

    let alias_id = keys::derive_alias_id(&next_layer_digest, &device_id_priv_pem)?;
    let alias_id_pub_pem = flash.platform().pub_key_to_pem(&alias_id.public())?;
    let alias_id_priv_pem = flash.platform().priv_key_to_pem(alias_id.private())?;

    let cert_store = certstore::build_cert_store(
        flash.platform(),
        &trust_anchors,
        &device_id_pub_pem,
        device_id.private(),
        &alias_id_pub_pem,
        u64::from(next_header.content.issue_time),
    )?;

    let dev_auth = handoff::derive_dev_auth(&boot_params.core_auth, &device_id_pub_pem, &boot_params.dev_uuid);
    let nw_info = if config.nw_info.is_present() { Some(config.nw_info) } else { None };

    let handoff_params = handoff::build_handoff_params(
        mode,
        &alias_id_pub_pem,
        &alias_id_priv_pem,
        &boot_params.dev_uuid,
        &boot_params.cur_nonce,
        &boot_params.next_nonce,
        &dev_auth,
        core_updated,
        firmware_update_necessary,
        nw_info.as_ref(),
    )?;

    if !flash.platform_mut().provide_boot_params(&handoff_params, &cert_store) {
        return Err(LazarusError::FlashFailure);
    }

    let timeout_s = if mode == BootMode::App {
        bootmode::deferral_time(flash.platform_mut(), &staging_buf, &hub_key, &boot_params.cur_nonce)
    } else {
        bootmode::DEFAULT_DEFERRAL_TIME_S
    };
    handoff::arm_watchdog(flash.platform_mut(), timeout_s);
    if flash.platform().awdt_last_reset_was_awdt() {
        warn_log!(flash.platform_mut(), "last device reset was through expired AWDT");
    }

    flash.platform_mut().rng_deinit();

    Ok(mode)
}
