//! Real-time plumbing for the Bellcurve EQ
//!
//! Splits the EQ into a control-side [`EqController`] and an audio-side
//! [`EqRenderer`] that only ever exchange copied coefficient snapshots.

pub mod realtime;

pub use realtime::{
    split, spawn_control_task, EqController, EqRenderer, RealtimeError, RenderMessage,
};
