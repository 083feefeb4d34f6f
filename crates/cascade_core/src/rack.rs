//! Stage Rack
//!
//! Owns exactly one instance of every stage for the lifetime of the
//! renderer, indexed by [`StageId`]. Stages are boxed once at construction
//! and never recreated per block.

use std::sync::Arc;

use cascade_dsp::{
    ChainParams, Chorus, GeneralFilter, LadderFilter, Overdrive, Phaser, ProcessContext, Stage,
};

use crate::order::{StageId, STAGE_COUNT};

pub struct StageRack {
    stages: [Box<dyn Stage>; STAGE_COUNT],
}

impl StageRack {
    /// Build the five effects, each reading from its handle in `params`
    pub fn new(params: &ChainParams) -> Self {
        Self::from_stages([
            Box::new(Phaser::new(Arc::clone(&params.phaser))),
            Box::new(Chorus::new(Arc::clone(&params.chorus))),
            Box::new(Overdrive::new(Arc::clone(&params.overdrive))),
            Box::new(LadderFilter::new(Arc::clone(&params.ladder))),
            Box::new(GeneralFilter::new(Arc::clone(&params.general_filter))),
        ])
    }

    /// Use custom stages; `stages[i]` serves `StageId` with index `i`
    pub fn from_stages(stages: [Box<dyn Stage>; STAGE_COUNT]) -> Self {
        Self { stages }
    }

    pub fn stage(&self, id: StageId) -> &dyn Stage {
        &*self.stages[id.index()]
    }

    pub fn stage_mut(&mut self, id: StageId) -> &mut dyn Stage {
        &mut *self.stages[id.index()]
    }

    /// All stages in `StageId` order
    pub(crate) fn stages_mut(&mut self) -> &mut [Box<dyn Stage>; STAGE_COUNT] {
        &mut self.stages
    }

    /// Size every stage for the stream (may allocate, not for the audio thread)
    pub fn prepare(&mut self, context: &ProcessContext) {
        for stage in self.stages.iter_mut() {
            stage.prepare(context);
        }
    }

    pub fn reset(&mut self) {
        for stage in self.stages.iter_mut() {
            stage.reset();
        }
    }

    pub fn release(&mut self) {
        for stage in self.stages.iter_mut() {
            stage.release();
        }
    }

    pub fn names(&self) -> [&'static str; STAGE_COUNT] {
        std::array::from_fn(|i| self.stages[i].name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rack_matches_stage_ids() {
        let rack = StageRack::new(&ChainParams::new());
        for id in StageId::ALL {
            assert_eq!(rack.stage(id).name(), id.name());
        }
    }

    #[test]
    fn test_prepare_and_process_every_stage() {
        let mut rack = StageRack::new(&ChainParams::new());
        let ctx = ProcessContext::new(48000.0, 2, 64);
        rack.prepare(&ctx);

        for id in StageId::ALL {
            let mut buffer: Vec<f32> = (0..128).map(|i| (i as f32 * 0.05).sin() * 0.5).collect();
            rack.stage_mut(id).process(&mut buffer, &ctx);
            assert!(buffer.iter().all(|s| s.is_finite()), "{} produced NaN", id);
        }

        rack.reset();
        rack.release();
    }
}
