//! Chain Dispatcher
//!
//! Turns an [`OrderSequence`] into a flat array of stage references for
//! one block. The array lives on the stack and borrows the rack, so it is
//! rebuilt every block and can never outlive the stages it points at.

use cascade_dsp::{ProcessContext, Stage};

use crate::order::{ChainSlot, OrderSequence, STAGE_COUNT};
use crate::rack::StageRack;

/// Stages resolved for one block, in processing order
///
/// `None` marks an empty slot.
pub struct ResolvedChain<'a> {
    slots: [Option<&'a mut (dyn Stage + 'static)>; STAGE_COUNT],
}

/// Map every slot of `order` to its stage in `rack`
///
/// Total and allocation-free. Each stage is handed out at most once: the
/// references are taken out of a pool, so a stage can't be aliased even if
/// a slot named it twice.
pub fn resolve<'a>(order: &OrderSequence, rack: &'a mut StageRack) -> ResolvedChain<'a> {
    let mut pool = rack.stages_mut().each_mut().map(|stage| Some(&mut **stage));

    let slots = order.slots().map(|slot| match slot {
        ChainSlot::Stage(id) => pool[id.index()].take(),
        ChainSlot::Empty => None,
    });

    ResolvedChain { slots }
}

impl<'a> ResolvedChain<'a> {
    /// Run every non-empty slot in order, in place
    ///
    /// Each stage's output is the next stage's input.
    #[inline]
    pub fn process(&mut self, buffer: &mut [f32], context: &ProcessContext) {
        for stage in self.slots.iter_mut().flatten() {
            stage.process(buffer, context);
        }
    }

    /// Number of stages that will run
    pub fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Names of the resolved stages, in processing order
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.slots.iter().flatten().map(|stage| stage.name())
    }

    /// Address of each slot's stage, for identity checks
    pub fn stage_ptrs(&self) -> [Option<*const ()>; STAGE_COUNT] {
        std::array::from_fn(|i| {
            self.slots[i]
                .as_deref()
                .map(|stage| std::ptr::from_ref(stage).cast::<()>())
        })
    }
}
