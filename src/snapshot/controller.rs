//! Capture state machine
//!
//! `WaitingForTrigger` blocks on the trigger channel. A capture trigger moves
//! to `Capturing`, which runs one capture sequence and returns to waiting no
//! matter how the sequence ended. Quit, or the trigger channel closing, moves
//! to `Terminated`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use flume::Receiver;
use tracing::{debug, info, instrument, warn};

use crate::clock::AuthoritativeTimeClient;
use crate::error::{AppError, Result};
use crate::input::{ShutdownSignal, Trigger};
use crate::pipeline::FrameStore;
use crate::snapshot::encoder::encode_jpeg;
use crate::snapshot::output::{persist, Viewer};
use crate::snapshot::record::{CaptureRecord, CaptureReport};
use crate::OutputConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    WaitingForTrigger,
    Capturing,
    Terminated,
}

/// How a capture sequence that did not fail ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    Completed(CaptureReport),
    /// Quit was requested before the image was stored
    Abandoned,
}

pub struct CaptureController {
    clock: AuthoritativeTimeClient,
    store: Arc<FrameStore>,
    triggers: Receiver<Trigger>,
    shutdown: ShutdownSignal,
    viewer: Box<dyn Viewer>,
    output: PathBuf,
    quality: u8,
    state: CaptureState,
}

impl CaptureController {
    pub fn new(
        clock: AuthoritativeTimeClient,
        store: Arc<FrameStore>,
        triggers: Receiver<Trigger>,
        shutdown: ShutdownSignal,
        viewer: Box<dyn Viewer>,
        output: &OutputConfig,
    ) -> Self {
        Self {
            clock,
            store,
            triggers,
            shutdown,
            viewer,
            output: output.path.clone(),
            quality: output.quality,
            state: CaptureState::WaitingForTrigger,
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn output_path(&self) -> &Path {
        &self.output
    }

    /// Drive the state machine until it terminates.
    pub fn run(mut self) {
        while self.step() != CaptureState::Terminated {}
        debug!("Capture controller stopped");
    }

    /// Perform one state transition and return the new state.
    pub fn step(&mut self) -> CaptureState {
        self.state = match self.state {
            CaptureState::WaitingForTrigger => match self.triggers.recv() {
                Ok(Trigger::Capture(key)) => {
                    debug!("Trigger {:?}", key);
                    CaptureState::Capturing
                }
                Ok(Trigger::Quit) | Err(_) => CaptureState::Terminated,
            },
            CaptureState::Capturing => {
                match self.capture() {
                    Ok(_) => {}
                    Err(AppError::NoFrameAvailable) => warn!("No frame available yet."),
                    Err(e) => warn!("Capture aborted: {}", e),
                }

                if self.shutdown.is_requested() {
                    CaptureState::Terminated
                } else {
                    info!("Press any key to capture a frame, or press the quit key to exit...");
                    CaptureState::WaitingForTrigger
                }
            }
            CaptureState::Terminated => CaptureState::Terminated,
        };
        self.state
    }

    /// Run one capture sequence. Any failing step aborts it without output.
    #[instrument(skip(self))]
    pub fn capture(&self) -> Result<CaptureOutcome> {
        let pre = self.clock.now()?;
        info!(
            "Atomic timestamp: {} -> Capturing frame...",
            pre.authoritative_ms()
        );

        let frame = self.store.snapshot().ok_or(AppError::NoFrameAvailable)?;
        let encoded = encode_jpeg(&frame, self.quality)?;
        let post = self.clock.now()?;

        let record = CaptureRecord::new(pre, frame, encoded, post);
        if record.elapsed_ms < 0 {
            warn!(
                "Authoritative time went backwards by {} ms during capture",
                -record.elapsed_ms
            );
        }

        if self.shutdown.is_requested() {
            info!("Quit requested, discarding capture");
            return Ok(CaptureOutcome::Abandoned);
        }

        persist(&self.output, &record.encoded)?;
        self.viewer.open(&self.output);

        let report = record.report(&self.output);
        info!("Screenshot stored. {}", report);
        metrics::counter!("captures_total").increment(1);
        metrics::histogram!("capture_latency_ms").record(record.elapsed_ms as f64);

        Ok(CaptureOutcome::Completed(report))
    }
}
