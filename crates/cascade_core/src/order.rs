//! Chain Order
//!
//! An [`OrderSequence`] says which stage runs in which slot of the chain.
//! It is a fixed-size `Copy` value so it can travel through the lock-free
//! order channel and be compared element-wise on the audio thread without
//! allocating.
//!
//! Every sequence is validated when it is built: a stage may appear in at
//! most one slot. A disabled or omitted stage is an explicit
//! [`ChainSlot::Empty`], never a sentinel identifier, so resolving a
//! sequence on the render thread can't fail.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ChainError, EngineResult};

/// Number of effect kinds, and therefore of slots in a chain
pub const STAGE_COUNT: usize = 5;

/// Identifies one effect kind in the chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageId {
    Phaser = 0,
    Chorus = 1,
    Overdrive = 2,
    LadderFilter = 3,
    GeneralFilter = 4,
}

impl StageId {
    /// Every stage, in default chain order
    pub const ALL: [StageId; STAGE_COUNT] = [
        StageId::Phaser,
        StageId::Chorus,
        StageId::Overdrive,
        StageId::LadderFilter,
        StageId::GeneralFilter,
    ];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Display name (matches the stage's `Stage::name()`)
    pub const fn name(self) -> &'static str {
        match self {
            StageId::Phaser => "Phaser",
            StageId::Chorus => "Chorus",
            StageId::Overdrive => "Overdrive",
            StageId::LadderFilter => "Ladder Filter",
            StageId::GeneralFilter => "General Filter",
        }
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StageId {
    type Err = ChainError;

    /// Accepts an index ("3"), a display name ("Ladder Filter") or a
    /// snake/compact form ("ladder_filter", "ladderfilter"), case-insensitive
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(index) = trimmed.parse::<usize>() {
            return Self::from_index(index).ok_or_else(|| ChainError::UnknownStage(s.to_string()));
        }

        let compact: String = trimmed
            .chars()
            .filter(|c| !matches!(c, ' ' | '_' | '-'))
            .map(|c| c.to_ascii_lowercase())
            .collect();

        // Short aliases used on the command line
        let id = match compact.as_str() {
            "phaser" | "phase" => StageId::Phaser,
            "chorus" => StageId::Chorus,
            "overdrive" | "drive" => StageId::Overdrive,
            "ladderfilter" | "ladder" => StageId::LadderFilter,
            "generalfilter" | "filter" | "eq" => StageId::GeneralFilter,
            _ => return Err(ChainError::UnknownStage(s.to_string())),
        };
        Ok(id)
    }
}

/// One position in the chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainSlot {
    Stage(StageId),
    /// Nothing runs in this slot
    Empty,
}

impl ChainSlot {
    pub fn stage(self) -> Option<StageId> {
        match self {
            ChainSlot::Stage(id) => Some(id),
            ChainSlot::Empty => None,
        }
    }

    pub fn is_empty(self) -> bool {
        matches!(self, ChainSlot::Empty)
    }
}

impl From<StageId> for ChainSlot {
    fn from(id: StageId) -> Self {
        ChainSlot::Stage(id)
    }
}

impl fmt::Display for ChainSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainSlot::Stage(id) => id.fmt(f),
            ChainSlot::Empty => f.write_str("(empty)"),
        }
    }
}

/// Processing order of the chain
///
/// Invariant: no stage occupies more than one slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "[ChainSlot; STAGE_COUNT]", into = "[ChainSlot; STAGE_COUNT]")]
pub struct OrderSequence {
    slots: [ChainSlot; STAGE_COUNT],
}

impl Default for OrderSequence {
    /// Phaser, Chorus, Overdrive, Ladder Filter, General Filter
    fn default() -> Self {
        Self {
            slots: StageId::ALL.map(ChainSlot::Stage),
        }
    }
}

impl OrderSequence {
    /// Build an order from explicit slots, rejecting duplicate stages
    pub fn new(slots: [ChainSlot; STAGE_COUNT]) -> EngineResult<Self> {
        let mut seen = [false; STAGE_COUNT];
        for id in slots.iter().filter_map(|slot| slot.stage()) {
            if std::mem::replace(&mut seen[id.index()], true) {
                return Err(ChainError::DuplicateStage(id));
            }
        }
        Ok(Self { slots })
    }

    /// Build an order from a list of stages; unused trailing slots are empty
    pub fn from_stages(stages: &[StageId]) -> EngineResult<Self> {
        if stages.len() > STAGE_COUNT {
            return Err(ChainError::TooManyStages { got: stages.len() });
        }

        let mut slots = [ChainSlot::Empty; STAGE_COUNT];
        for (slot, id) in slots.iter_mut().zip(stages) {
            *slot = ChainSlot::Stage(*id);
        }
        Self::new(slots)
    }

    /// Build an order from stage indices (0 = Phaser ... 4 = General Filter)
    pub fn from_indices(indices: &[usize]) -> EngineResult<Self> {
        if indices.len() > STAGE_COUNT {
            return Err(ChainError::TooManyStages { got: indices.len() });
        }

        let mut stages = [StageId::Phaser; STAGE_COUNT];
        for (stage, index) in stages.iter_mut().zip(indices) {
            *stage = StageId::from_index(*index)
                .ok_or_else(|| ChainError::UnknownStage(index.to_string()))?;
        }
        Self::from_stages(&stages[..indices.len()])
    }

    /// An order with nothing in it; the chain passes audio through
    pub fn empty() -> Self {
        Self {
            slots: [ChainSlot::Empty; STAGE_COUNT],
        }
    }

    pub fn slots(&self) -> [ChainSlot; STAGE_COUNT] {
        self.slots
    }

    pub fn slot(&self, index: usize) -> Option<ChainSlot> {
        self.slots.get(index).copied()
    }

    /// Active stages in processing order
    pub fn stages(&self) -> impl Iterator<Item = StageId> + '_ {
        self.slots.iter().filter_map(|slot| slot.stage())
    }

    pub fn position(&self, id: StageId) -> Option<usize> {
        self.slots.iter().position(|slot| *slot == ChainSlot::Stage(id))
    }

    pub fn contains(&self, id: StageId) -> bool {
        self.position(id).is_some()
    }

    /// Number of non-empty slots
    pub fn active_len(&self) -> usize {
        self.stages().count()
    }

    /// Move the slot at `from` to `to`, shifting the slots in between
    ///
    /// This is the drag-to-reorder gesture.
    pub fn move_stage(&self, from: usize, to: usize) -> EngineResult<Self> {
        check_index(from)?;
        check_index(to)?;

        let mut slots = self.slots;
        if from < to {
            slots[from..=to].rotate_left(1);
        } else {
            slots[to..=from].rotate_right(1);
        }
        Ok(Self { slots })
    }

    pub fn swap(&self, a: usize, b: usize) -> EngineResult<Self> {
        check_index(a)?;
        check_index(b)?;

        let mut slots = self.slots;
        slots.swap(a, b);
        Ok(Self { slots })
    }

    pub fn reversed(&self) -> Self {
        let mut slots = self.slots;
        slots.reverse();
        Self { slots }
    }

    /// Take a stage out of the chain, leaving its slot empty
    pub fn without(&self, id: StageId) -> Self {
        let slots = self.slots.map(|slot| {
            if slot == ChainSlot::Stage(id) {
                ChainSlot::Empty
            } else {
                slot
            }
        });
        Self { slots }
    }

    /// Put a stage at `index`, vacating wherever it was before
    pub fn with_stage_at(&self, index: usize, id: StageId) -> EngineResult<Self> {
        check_index(index)?;

        let mut next = self.without(id);
        next.slots[index] = ChainSlot::Stage(id);
        Ok(next)
    }
}

fn check_index(index: usize) -> EngineResult<()> {
    if index < STAGE_COUNT {
        Ok(())
    } else {
        Err(ChainError::SlotOutOfRange { index })
    }
}

impl TryFrom<[ChainSlot; STAGE_COUNT]> for OrderSequence {
    type Error = ChainError;

    fn try_from(slots: [ChainSlot; STAGE_COUNT]) -> Result<Self, Self::Error> {
        Self::new(slots)
    }
}

impl From<OrderSequence> for [ChainSlot; STAGE_COUNT] {
    fn from(order: OrderSequence) -> Self {
        order.slots
    }
}

impl fmt::Display for OrderSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, slot) in self.slots.iter().enumerate() {
            if i > 0 {
                f.write_str(" -> ")?;
            }
            slot.fmt(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use StageId::*;

    #[test]
    fn test_default_is_ascending() {
        let order = OrderSequence::default();
        let indices: Vec<usize> = order.stages().map(StageId::index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4]);
        assert_eq!(order.active_len(), STAGE_COUNT);
    }

    #[test]
    fn test_rejects_duplicates() {
        let result = OrderSequence::new([
            ChainSlot::Stage(Chorus),
            ChainSlot::Stage(Phaser),
            ChainSlot::Stage(Chorus),
            ChainSlot::Empty,
            ChainSlot::Empty,
        ]);
        assert!(matches!(result, Err(ChainError::DuplicateStage(Chorus))));
    }

    #[test]
    fn test_empty_slots_are_allowed() {
        let order = OrderSequence::from_stages(&[GeneralFilter, Phaser]).unwrap();
        assert_eq!(order.active_len(), 2);
        assert_eq!(order.slot(2), Some(ChainSlot::Empty));
        assert_eq!(order.slot(4), Some(ChainSlot::Empty));
        assert_eq!(order.slot(5), None);
        assert!(!order.contains(Overdrive));

        assert_eq!(OrderSequence::empty().active_len(), 0);
    }

    #[test]
    fn test_from_indices() {
        let order = OrderSequence::from_indices(&[4, 3, 2, 1, 0]).unwrap();
        assert_eq!(order, OrderSequence::default().reversed());

        assert!(matches!(
            OrderSequence::from_indices(&[0, 5]),
            Err(ChainError::UnknownStage(_))
        ));
        assert!(matches!(
            OrderSequence::from_indices(&[0, 1, 2, 3, 4, 0]),
            Err(ChainError::TooManyStages { got: 6 })
        ));
        assert!(matches!(
            OrderSequence::from_indices(&[1, 1]),
            Err(ChainError::DuplicateStage(Chorus))
        ));
    }

    #[test]
    fn test_equality_is_elementwise() {
        let a = OrderSequence::from_stages(&[Phaser, Chorus]).unwrap();
        let b = OrderSequence::from_stages(&[Phaser, Chorus]).unwrap();
        let c = OrderSequence::from_stages(&[Chorus, Phaser]).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_move_stage_forward_and_back() {
        let order = OrderSequence::default();

        // Drag Phaser to the end
        let moved = order.move_stage(0, 4).unwrap();
        let ids: Vec<StageId> = moved.stages().collect();
        assert_eq!(ids, vec![Chorus, Overdrive, LadderFilter, GeneralFilter, Phaser]);

        // And drag it back to the front
        let back = moved.move_stage(4, 0).unwrap();
        assert_eq!(back, order);

        // Moving onto itself changes nothing
        assert_eq!(order.move_stage(2, 2).unwrap(), order);

        assert!(matches!(
            order.move_stage(0, 5),
            Err(ChainError::SlotOutOfRange { index: 5 })
        ));
    }

    #[test]
    fn test_swap_and_reverse() {
        let order = OrderSequence::default();
        let swapped = order.swap(0, 4).unwrap();
        assert_eq!(swapped.position(GeneralFilter), Some(0));
        assert_eq!(swapped.position(Phaser), Some(4));

        let reversed = order.reversed();
        assert_eq!(reversed.reversed(), order);
        assert_eq!(reversed.position(GeneralFilter), Some(0));
    }

    #[test]
    fn test_without_and_with_stage_at() {
        let order = OrderSequence::default().without(Overdrive);
        assert_eq!(order.slot(2), Some(ChainSlot::Empty));
        assert_eq!(order.active_len(), 4);

        // Re-enable at the front; the old front stage is replaced
        let order = order.with_stage_at(0, Overdrive).unwrap();
        assert_eq!(order.position(Overdrive), Some(0));
        assert!(!order.contains(Phaser));

        // Relocating an active stage vacates its old slot
        let order = order.with_stage_at(2, Overdrive).unwrap();
        assert_eq!(order.slot(0), Some(ChainSlot::Empty));
        assert_eq!(order.position(Overdrive), Some(2));

        assert!(order.with_stage_at(7, Chorus).is_err());
    }

    #[test]
    fn test_stage_id_parsing() {
        assert_eq!("0".parse::<StageId>().unwrap(), Phaser);
        assert_eq!("Ladder Filter".parse::<StageId>().unwrap(), LadderFilter);
        assert_eq!("general_filter".parse::<StageId>().unwrap(), GeneralFilter);
        assert_eq!("CHORUS".parse::<StageId>().unwrap(), Chorus);
        assert_eq!("drive".parse::<StageId>().unwrap(), Overdrive);
        assert!("flanger".parse::<StageId>().is_err());
        assert!("5".parse::<StageId>().is_err());
    }

    #[test]
    fn test_display() {
        let order = OrderSequence::from_stages(&[Chorus, LadderFilter]).unwrap();
        assert_eq!(
            order.to_string(),
            "Chorus -> Ladder Filter -> (empty) -> (empty) -> (empty)"
        );
    }

    #[test]
    fn test_serde_roundtrip() {
        let order = OrderSequence::from_stages(&[GeneralFilter, Phaser]).unwrap();
        let json = serde_json::to_string(&order).unwrap();
        assert!(json.contains("general_filter"));

        let back: OrderSequence = serde_json::from_str(&json).unwrap();
        assert_eq!(back, order);
    }

    #[test]
    fn test_serde_rejects_duplicates() {
        let json = r#"[{"stage":"phaser"},{"stage":"phaser"},"empty","empty","empty"]"#;
        let result: Result<OrderSequence, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }
}
