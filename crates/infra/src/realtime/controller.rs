//! Control-side half of the EQ
//!
//! Runs on a timer or UI thread. Turns parameter changes into coefficient
//! snapshots, delivers them to the renderer and publishes them for display.

use super::{RealtimeError, RenderMessage, Result};
use bellcurve_core::domain::coeffs::gain_to_db;
use bellcurve_core::domain::processor::DEFAULT_SAMPLE_RATE;
use bellcurve_core::domain::{
    validate_sample_rate, ChainSettings, ChainUpdate, ParameterSource, ParameterStore,
    ResponseCurve,
};
use crossbeam::channel::{Sender, TrySendError};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Owns the coefficient calculator and the sending end of the snapshot channel
pub struct EqController {
    store: Arc<ParameterStore>,
    tx: Sender<RenderMessage>,
    published: watch::Sender<ChainUpdate>,
    sample_rate: f64,
    /// Message that did not fit in the channel, retried on the next tick
    backlog: Option<RenderMessage>,
    disconnected: bool,
}

impl EqController {
    pub(crate) fn new(store: Arc<ParameterStore>, tx: Sender<RenderMessage>) -> Self {
        let (published, _) = watch::channel(ChainUpdate::default());
        Self {
            store,
            tx,
            published,
            sample_rate: DEFAULT_SAMPLE_RATE,
            backlog: None,
            disconnected: false,
        }
    }

    pub fn store(&self) -> &Arc<ParameterStore> {
        &self.store
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn get_chain_settings(&self) -> ChainSettings {
        self.store.chain_settings()
    }

    /// Announce a new stream format to the renderer
    ///
    /// The message carries a snapshot of the current settings, so the
    /// renderer starts filtering with correct coefficients immediately.
    pub fn prepare(&mut self, sample_rate: f64, max_block_size: usize) -> Result<()> {
        let sample_rate = validate_sample_rate(sample_rate)?;
        self.sample_rate = sample_rate;

        // The snapshot below covers any change flagged so far
        self.store.take_pending_update();
        let update = self.compute_and_publish();

        info!(sample_rate, max_block_size, "Preparing renderer");

        // Anything still queued was designed for the previous format
        if self.backlog.take().is_some() {
            debug!("Dropping backlogged snapshot superseded by prepare");
        }
        self.deliver(RenderMessage::Prepare {
            sample_rate,
            max_block_size,
            update,
        });

        if self.disconnected {
            Err(RealtimeError::Disconnected)
        } else {
            Ok(())
        }
    }

    /// Consume the pending-update flag and hand a fresh snapshot over
    ///
    /// Returns `true` when a message reached the renderer's queue. A message
    /// that did not fit is kept and retried on the next tick, folded into
    /// whatever newer snapshot that tick computes.
    pub fn tick(&mut self) -> bool {
        if self.disconnected {
            return false;
        }

        let changed = self.store.take_pending_update();
        let message = match (changed, self.backlog.take()) {
            (false, None) => return false,
            (false, Some(backlog)) => backlog,
            (true, backlog) => {
                let update = self.compute_and_publish();
                match backlog {
                    Some(message) => message.with_update(update),
                    None => RenderMessage::Update(update),
                }
            }
        };

        self.deliver(message)
    }

    /// Latest snapshot computed by this controller
    pub fn latest(&self) -> ChainUpdate {
        *self.published.borrow()
    }

    /// Watch the stream of published snapshots
    pub fn subscribe(&self) -> watch::Receiver<ChainUpdate> {
        self.published.subscribe()
    }

    /// Linear magnitude of the latest snapshot at `frequency`
    pub fn query_magnitude_response(&self, frequency: f64) -> f64 {
        self.published
            .borrow()
            .magnitude_at(frequency, self.sample_rate)
    }

    pub fn query_magnitude_response_db(&self, frequency: f64) -> f64 {
        gain_to_db(self.query_magnitude_response(frequency))
    }

    /// Sample the latest snapshot for display
    pub fn response_curve(&self, points: usize, min_freq: f64, max_freq: f64) -> ResponseCurve {
        let update = self.latest();
        let sample_rate = self.sample_rate;
        ResponseCurve::sample(points, min_freq, max_freq, |freq| {
            update.magnitude_at(freq, sample_rate)
        })
    }

    /// Whether a message is waiting for room in the channel
    pub fn has_backlog(&self) -> bool {
        self.backlog.is_some()
    }

    /// Whether the renderer has been dropped
    pub fn is_disconnected(&self) -> bool {
        self.disconnected
    }

    fn compute_and_publish(&mut self) -> ChainUpdate {
        let settings = self.store.chain_settings();
        let update = ChainUpdate::compute(&settings, self.sample_rate);

        debug!(
            low_cut = settings.low_cut_freq,
            low_cut_slope = %settings.low_cut_slope,
            peak = settings.peak_freq,
            gain_db = settings.peak_gain_in_decibels,
            q = settings.peak_quality,
            high_cut = settings.high_cut_freq,
            high_cut_slope = %settings.high_cut_slope,
            "Recomputed chain coefficients"
        );

        self.published.send_replace(update);
        update
    }

    fn deliver(&mut self, message: RenderMessage) -> bool {
        match self.tx.try_send(message) {
            Ok(()) => true,
            Err(TrySendError::Full(message)) => {
                warn!("Renderer queue full, retrying on next tick");
                self.backlog = Some(message);
                false
            }
            Err(TrySendError::Disconnected(_)) => {
                warn!("Renderer dropped, snapshot discarded");
                self.disconnected = true;
                false
            }
        }
    }
}
