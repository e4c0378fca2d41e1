//! Audio-side half of the EQ

use super::RenderMessage;
use bellcurve_core::domain::{ChainUpdate, ChannelProcessor};
use crossbeam::channel::Receiver;

/// Owns the filter chains and the receiving end of the snapshot channel
///
/// Everything reachable from [`process_block`](Self::process_block) is
/// wait-free: a non-blocking drain of the channel, then in-place filtering.
pub struct EqRenderer {
    rx: Receiver<RenderMessage>,
    processor: ChannelProcessor,
    current: ChainUpdate,
}

impl EqRenderer {
    pub(crate) fn new(rx: Receiver<RenderMessage>) -> Self {
        Self {
            rx,
            processor: ChannelProcessor::new(),
            current: ChainUpdate::default(),
        }
    }

    /// Apply pending snapshots, then filter `buffer` in place
    ///
    /// Until the first `Prepare` arrives the buffer passes through untouched.
    pub fn process_block(&mut self, buffer: &mut [&mut [f32]], num_samples: usize) {
        self.drain();
        self.processor.process_block(buffer, num_samples);
    }

    /// Take every queued message; only the newest usable snapshot is loaded
    fn drain(&mut self) {
        let mut newest = None;

        for message in self.rx.try_iter() {
            let update = match message {
                RenderMessage::Prepare {
                    sample_rate,
                    max_block_size,
                    update,
                } => {
                    // Format was validated by the controller
                    if self.processor.prepare(sample_rate, max_block_size).is_err() {
                        continue;
                    }
                    update
                }
                RenderMessage::Update(update) => update,
            };

            if update.is_finite() {
                newest = Some(update);
            }
        }

        if let Some(update) = newest {
            self.processor.apply(&update);
            self.current = update;
        }
    }

    pub fn is_prepared(&self) -> bool {
        self.processor.is_prepared()
    }

    /// Snapshot the chains are currently running
    pub fn current(&self) -> ChainUpdate {
        self.current
    }

    pub fn processor(&self) -> &ChannelProcessor {
        &self.processor
    }
}
