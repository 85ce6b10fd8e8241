//! Per-block sequencing from host payload to presented frame.
//!
//! The driver is a small state machine: a block is admitted only while the
//! driver is [`DriverState::AwaitingData`], then settings are fetched, the
//! payload decoded, the sweep applied, the block resampled and drawn. The
//! previous raw block is replaced only after its successor has been drawn.

use crate::audio::{
    decode_payload, BlockError, FilterSettings, Payload, ResampleError, Resampler, SampleBlock,
    SweepGenerator,
};
use crate::gpu::{CompositeParams, GpuError, LineParams, Trace};
use crate::settings::{ConfigSnapshot, OverlaySelection, SettingsError, StreamFormat};

/// Errors that stop a block from being processed.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),
    #[error("Block error: {0}")]
    Block(#[from] BlockError),
    #[error("Resample error: {0}")]
    Resample(#[from] ResampleError),
    #[error("GPU error: {0}")]
    Gpu(#[from] GpuError),
}

/// Where the driver is in the per-block sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    AwaitingData,
    Decoding,
    Drawing,
}

/// Result of offering or processing one block.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockOutcome {
    /// Admitted; waiting for [`FrameDriver::process`].
    Queued,
    /// Refused because the previous block is still in flight.
    Busy,
    /// Nothing was pending.
    Idle,
    /// Dropped without touching the display.
    Skipped(String),
    /// Sweep and overlap memory advanced, display left as is.
    Frozen { resets: usize },
    Drawn { resets: usize, points: usize },
}

/// Asynchronous source of the per-block settings snapshot.
#[allow(async_fn_in_trait)]
pub trait SettingsSource {
    async fn fetch(&mut self) -> Result<ConfigSnapshot, SettingsError>;
}

/// A fixed snapshot serves every block.
impl SettingsSource for ConfigSnapshot {
    async fn fetch(&mut self) -> Result<ConfigSnapshot, SettingsError> {
        Ok(self.clone())
    }
}

/// The rendering side of the scope.
pub trait FrameSink {
    type Surface;

    /// Queue a display resize for the next frame boundary.
    fn request_resize(&mut self, width: u32, height: u32);

    /// Queue an overlay change for the next frame boundary.
    fn select_overlay(&mut self, selection: OverlaySelection);

    /// Fade the persistent image and draw one trace into it.
    fn draw_trace(&mut self, trace: &Trace<'_>, params: &LineParams) -> Result<(), GpuError>;

    /// Tone-map the persistent image onto `surface`.
    fn present(&mut self, surface: &Self::Surface, params: &CompositeParams)
        -> Result<(), GpuError>;
}

/// Smoothed X/Y/Z series of the current block.
#[derive(Debug, Default)]
struct SmoothedSeries {
    x: Vec<f32>,
    y: Vec<f32>,
    z: Vec<f32>,
}

/// Sequences blocks through sweep, resampling and the frame sink.
pub struct FrameDriver {
    stream: StreamFormat,
    resampler: Resampler,
    sweep: SweepGenerator,
    state: DriverState,
    pending: Option<Payload>,
    previous: SampleBlock,
    smoothed: SmoothedSeries,
    snapshot: ConfigSnapshot,
    overlay: Option<OverlaySelection>,
}

impl FrameDriver {
    /// Create a driver for a fixed stream shape.
    ///
    /// Fails if the block length is shorter than the filter footprint.
    pub fn new(stream: StreamFormat, filter: FilterSettings) -> Result<Self, PipelineError> {
        let needed = filter.min_block_len();
        if stream.block_len < needed {
            return Err(ResampleError::BlockTooShort {
                len: stream.block_len,
                needed,
            }
            .into());
        }
        let resampler = Resampler::new(filter)?;

        Ok(Self {
            stream,
            resampler,
            sweep: SweepGenerator::new(),
            state: DriverState::AwaitingData,
            pending: None,
            previous: SampleBlock::silent(stream.block_len, 2),
            smoothed: SmoothedSeries::default(),
            snapshot: ConfigSnapshot::default(),
            overlay: None,
        })
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn stream(&self) -> StreamFormat {
        self.stream
    }

    pub fn filter(&self) -> FilterSettings {
        self.resampler.settings()
    }

    /// Snapshot used for the most recent block.
    pub fn snapshot(&self) -> &ConfigSnapshot {
        &self.snapshot
    }

    /// Raw block retained as overlap for the next resample.
    pub fn previous_block(&self) -> &SampleBlock {
        &self.previous
    }

    pub fn sweep(&self) -> &SweepGenerator {
        &self.sweep
    }

    fn set_state(&mut self, state: DriverState) {
        if self.state != state {
            log::debug!("Driver {:?} -> {:?}", self.state, state);
            self.state = state;
        }
    }

    /// Offer a block. Refused with [`BlockOutcome::Busy`] unless idle.
    pub fn submit(&mut self, payload: Payload) -> BlockOutcome {
        if self.state != DriverState::AwaitingData {
            log::debug!("Block refused while {:?}", self.state);
            return BlockOutcome::Busy;
        }
        self.pending = Some(payload);
        self.set_state(DriverState::Decoding);
        BlockOutcome::Queued
    }

    /// Offer a block and process it straight away.
    pub async fn on_block<S, K>(
        &mut self,
        payload: Payload,
        settings: &mut S,
        sink: &mut K,
    ) -> Result<BlockOutcome, PipelineError>
    where
        S: SettingsSource,
        K: FrameSink,
    {
        match self.submit(payload) {
            BlockOutcome::Queued => self.process(settings, sink).await,
            refused => Ok(refused),
        }
    }

    /// Process the admitted block. Always returns to `AwaitingData`.
    pub async fn process<S, K>(
        &mut self,
        settings: &mut S,
        sink: &mut K,
    ) -> Result<BlockOutcome, PipelineError>
    where
        S: SettingsSource,
        K: FrameSink,
    {
        let result = self.run_block(settings, sink).await;
        self.set_state(DriverState::AwaitingData);
        result
    }

    async fn run_block<S, K>(
        &mut self,
        settings: &mut S,
        sink: &mut K,
    ) -> Result<BlockOutcome, PipelineError>
    where
        S: SettingsSource,
        K: FrameSink,
    {
        if self.pending.is_none() {
            return Ok(BlockOutcome::Idle);
        }

        let snapshot = settings.fetch().await?;
        let Some(payload) = self.pending.take() else {
            return Ok(BlockOutcome::Idle);
        };

        if let Err(e) = snapshot.validate() {
            log::warn!("Skipping block: {e}");
            return Ok(BlockOutcome::Skipped(e.to_string()));
        }
        let mut block = match decode_payload(payload, snapshot.num_channels, self.stream.block_len) {
            Ok(block) => block,
            Err(e) => {
                log::warn!("Skipping block: {e}");
                return Ok(BlockOutcome::Skipped(e.to_string()));
            }
        };

        self.set_state(DriverState::Drawing);

        let overlay = snapshot.overlay();
        if self.overlay != Some(overlay) {
            sink.select_overlay(overlay);
            self.overlay = Some(overlay);
        }

        // Sweep state is committed together with `previous`, only once the
        // block has been drawn or frozen.
        let mut sweep = self.sweep.clone();
        let resets = if snapshot.sweep_on {
            let params = snapshot.sweep_params(self.stream.sample_rate);
            sweep.apply(&mut block.x, &block.y, &params)
        } else {
            0
        };

        let outcome = if snapshot.freeze_image {
            BlockOutcome::Frozen { resets }
        } else {
            let params = LineParams::from_snapshot(&snapshot, &self.stream, &self.filter());
            let trace = self.build_trace(&block, snapshot.upsampling)?;
            let trace = if snapshot.swap_xy {
                Trace::new(trace.y, trace.x, trace.z)
            } else {
                trace
            };
            sink.draw_trace(&trace, &params)?;
            BlockOutcome::Drawn {
                resets,
                points: trace.len(),
            }
        };

        self.sweep = sweep;
        self.previous = block;
        self.snapshot = snapshot;
        Ok(outcome)
    }

    /// Resample every series against the previous block, or pass the raw
    /// block through when upsampling is off.
    fn build_trace<'a>(
        &'a mut self,
        block: &'a SampleBlock,
        upsampling: bool,
    ) -> Result<Trace<'a>, ResampleError> {
        if !upsampling {
            return Ok(Trace::new(&block.x, &block.y, &block.z));
        }

        let smoothed = &mut self.smoothed;
        self.resampler
            .resample_into(&self.previous.x, &block.x, &mut smoothed.x)?;
        self.resampler
            .resample_into(&self.previous.y, &block.y, &mut smoothed.y)?;
        if block.has_z() {
            self.resampler
                .resample_into(&self.previous.z, &block.z, &mut smoothed.z)?;
        } else {
            smoothed.z.clear();
            smoothed.z.resize(smoothed.x.len(), 1.0);
        }
        Ok(Trace::new(&smoothed.x, &smoothed.y, &smoothed.z))
    }

    /// Forward a display resize to the sink.
    pub fn on_resize<K: FrameSink>(&mut self, sink: &mut K, width: u32, height: u32) {
        sink.request_resize(width, height);
    }

    /// Present the persistent image using the latest snapshot.
    pub fn on_refresh<K: FrameSink>(
        &mut self,
        sink: &mut K,
        surface: &K::Surface,
    ) -> Result<(), PipelineError> {
        sink.present(surface, &CompositeParams::from_snapshot(&self.snapshot))?;
        Ok(())
    }
}
