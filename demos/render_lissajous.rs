//! Example: Drive the scope headlessly with a synthetic Lissajous figure.
//!
//! Streams a few seconds of a 3:2 Lissajous figure through the block driver
//! and the GPU renderer, logging lit-pixel statistics for every frame.
//!
//! Run with:
//!     RUST_LOG=info cargo run --example render_lissajous

use anyhow::Context;
use phosphor_scope::audio::{encode_pcm, lissajous_block};
use phosphor_scope::{
    BlockOutcome, CompositeParams, ConfigSnapshot, FilterSettings, FrameDriver, Payload,
    RendererConfig, ScopeRenderer, StreamFormat,
};

const SAMPLE_RATE: u32 = 48_000;
const BLOCK_LEN: usize = 512;
const SECONDS: f32 = 3.0;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    pollster::block_on(run())
}

async fn run() -> anyhow::Result<()> {
    let stream = StreamFormat {
        sample_rate: SAMPLE_RATE as f32,
        block_len: BLOCK_LEN,
    };
    let mut driver = FrameDriver::new(stream, FilterSettings::default())?;
    let mut renderer = ScopeRenderer::new(RendererConfig::default())
        .await
        .context("failed to initialise the GPU renderer")?;
    log::info!("GPU: {}", renderer.adapter_info().name);

    let mut settings = ConfigSnapshot {
        persistence: 1.0,
        ..Default::default()
    };

    let blocks = (SECONDS * SAMPLE_RATE as f32 / BLOCK_LEN as f32) as usize;
    for index in 0..blocks {
        let block = lissajous_block(330.0, 220.0, SAMPLE_RATE, BLOCK_LEN, index, 0.9);
        let payload = Payload::Binary(encode_pcm(&block, 2));

        let outcome = driver.on_block(payload, &mut settings, &mut renderer).await?;
        if let BlockOutcome::Skipped(reason) = &outcome {
            log::warn!("block {index} skipped: {reason}");
            continue;
        }

        // Present roughly every other block, like a 45 Hz display refresh.
        if index % 2 == 1 {
            let pixels = renderer.capture(&CompositeParams::from_snapshot(driver.snapshot()))?;
            let lit = pixels.chunks(4).filter(|p| p[0] > 8 || p[1] > 8 || p[2] > 8).count();
            let peak = pixels.chunks(4).map(|p| p[0].max(p[1]).max(p[2])).max().unwrap_or(0);
            log::info!(
                "frame {:>3}: {:>6} lit pixels ({:.1}%), peak {}",
                index / 2,
                lit,
                100.0 * lit as f32 / (pixels.len() / 4) as f32,
                peak
            );
        }
    }

    Ok(())
}
