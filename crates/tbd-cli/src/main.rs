//! tbd-render - run a WAV file through a TBD host bridge module
//!
//! Sets up the same shared resources a host would (flash emulation and the
//! configuration server, here without a network listener), creates one
//! module instance around the reference engine, and processes the file one
//! host tick per frame at the file's own sample rate.
//!
//! Set RUST_LOG=debug for verbose output.

mod args;
mod render;
mod wav;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use tbd_core::arbiter::ArbiterSettings;
use tbd_core::config::{default_config_path, load_config, save_config, BridgeConfig};
use tbd_core::engine::ReferenceEngine;
use tbd_core::flash::FlashImage;
use tbd_core::server::OfflineServer;
use tbd_core::{ServerArbiter, TbdModule};

use args::RenderArgs;
use render::PanelSettings;
use wav::StereoAudio;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = RenderArgs::parse();

    if let Err(e) = run(&args) {
        log::error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run(args: &RenderArgs) -> Result<()> {
    let config_path = args.config.clone().unwrap_or_else(default_config_path);
    let mut config: BridgeConfig = load_config(&config_path);
    if let Some(asset_root) = &args.asset_root {
        log::info!("Asset root overridden: {}", asset_root.display());
        config.asset_root = asset_root.clone();
    }
    if args.write_config {
        save_config(&config, &config_path)
            .with_context(|| format!("Failed to write {}", config_path.display()))?;
    }

    let settings = ArbiterSettings::from_config(&config);
    let server = OfflineServer::new();
    let arbiter = Arc::new(ServerArbiter::new(
        settings.clone(),
        Box::new(server.clone()),
        Box::new(FlashImage::new()),
    ));

    let engine = ReferenceEngine::load(&config.engine_data_dir())
        .context("Failed to load engine configuration")?;
    let mut module = TbdModule::new(&arbiter, engine).with_context(|| {
        format!(
            "Failed to start shared resources (flash image {})",
            settings.flash_image.display()
        )
    })?;

    if let Some(state_path) = &args.state {
        let document = std::fs::read_to_string(state_path)
            .with_context(|| format!("Failed to read {}", state_path.display()))?;
        module
            .import_state(&document)
            .with_context(|| format!("Failed to import {}", state_path.display()))?;
        log::info!("Imported engine state from {}", state_path.display());
    }

    let input = wav::read_stereo(&args.input)?;
    log::info!(
        "Rendering {} frames at {} Hz from {}",
        input.frames.len(),
        input.sample_rate,
        args.input.display()
    );

    let (frames, lights) = render::render(
        &mut module,
        input.sample_rate,
        &input.frames,
        PanelSettings {
            gain: args.gain,
            pots: args.pots(),
        },
    )?;

    wav::write_stereo(
        &args.output,
        &StereoAudio {
            sample_rate: input.sample_rate,
            frames,
        },
    )?;

    log::info!(
        "Lights: attention {} ticks, peak input {:.2}, peak output {:.2}, connected {} ticks",
        lights.attention_ticks,
        lights.peak_input,
        lights.peak_output,
        lights.connected_ticks
    );
    if module.skipped_blocks() > 0 {
        log::warn!("{} blocks bypassed the engine", module.skipped_blocks());
    }
    if let Some(state) = server.current_state()? {
        log::debug!("Final engine state: {}", state);
    }

    log::info!("Wrote {}", args.output.display());
    Ok(())
}
