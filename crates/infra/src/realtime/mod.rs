//! Controller / renderer split over a bounded snapshot channel
//!
//! - The controller owns the coefficient calculator. It consumes the store's
//!   pending-update flag, computes a [`ChainUpdate`] and hands it over.
//! - The renderer owns the filter state. It drains the channel at block
//!   boundaries and never blocks, allocates or logs.
//!
//! Snapshots are plain `Copy` data, so the handoff moves values and no
//! filter object is ever shared between the two sides.

pub mod controller;
pub mod renderer;
pub mod task;

pub use controller::EqController;
pub use renderer::EqRenderer;
pub use task::spawn_control_task;

use bellcurve_core::domain::{AudioError, ChainUpdate, ParameterStore};
use crossbeam::channel::bounded;
use std::sync::Arc;
use thiserror::Error;

/// Errors reported on the control side
#[derive(Debug, Error, PartialEq)]
pub enum RealtimeError {
    #[error("Invalid stream format: {0}")]
    Format(#[from] AudioError),

    #[error("Renderer has been dropped")]
    Disconnected,
}

pub type Result<T> = std::result::Result<T, RealtimeError>;

/// Message from controller to renderer
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RenderMessage {
    /// New stream format: reset filter state, then load `update`
    Prepare {
        sample_rate: f64,
        max_block_size: usize,
        update: ChainUpdate,
    },
    /// New coefficients for the current format
    Update(ChainUpdate),
}

impl RenderMessage {
    /// Replace the carried snapshot, keeping a pending format change
    pub fn with_update(self, update: ChainUpdate) -> Self {
        match self {
            RenderMessage::Prepare {
                sample_rate,
                max_block_size,
                ..
            } => RenderMessage::Prepare {
                sample_rate,
                max_block_size,
                update,
            },
            RenderMessage::Update(_) => RenderMessage::Update(update),
        }
    }

    pub fn update(&self) -> &ChainUpdate {
        match self {
            RenderMessage::Prepare { update, .. } | RenderMessage::Update(update) => update,
        }
    }
}

/// Build a connected controller / renderer pair and queue the initial format
///
/// `capacity` is the depth of the snapshot channel (at least 1).
pub fn split(
    store: Arc<ParameterStore>,
    sample_rate: f64,
    max_block_size: usize,
    capacity: usize,
) -> Result<(EqController, EqRenderer)> {
    let (tx, rx) = bounded(capacity.max(1));
    let mut controller = EqController::new(store, tx);
    let renderer = EqRenderer::new(rx);

    controller.prepare(sample_rate, max_block_size)?;
    Ok((controller, renderer))
}
