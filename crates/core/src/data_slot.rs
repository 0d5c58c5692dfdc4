//! Per-instance data slots.
//!
//! Plug-in modules can share data with the applets they are attached to
//! through a small fixed table. An instance reserves one slot and keeps the
//! same id for its whole life. Ids start at 1; 0 never names a slot.

use std::collections::BTreeSet;

use crate::constants::NB_DATA_SLOTS;
use crate::module::InstanceId;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SlotError {
    #[error("All {0} data slots are in use")]
    Exhausted(usize),
}

pub struct DataSlotTable {
    slots: Vec<Option<InstanceId>>,
    free: BTreeSet<usize>,
}

impl Default for DataSlotTable {
    fn default() -> Self {
        Self::with_capacity(NB_DATA_SLOTS)
    }
}

impl DataSlotTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity],
            free: (1..=capacity).collect(),
        }
    }

    /// Reserve the smallest free slot for `instance`. Reserving twice returns the same slot.
    pub fn reserve(&mut self, instance: InstanceId) -> Result<usize, SlotError> {
        if let Some(slot) = self.slot_of(instance) {
            return Ok(slot);
        }
        let slot = self
            .free
            .pop_first()
            .ok_or(SlotError::Exhausted(self.slots.len()))?;
        self.slots[slot - 1] = Some(instance);
        log::debug!("Reserved data slot {} for instance {}", slot, instance);
        Ok(slot)
    }

    /// Free the slot held by `instance`, if any.
    pub fn release(&mut self, instance: InstanceId) -> Option<usize> {
        let slot = self.slot_of(instance)?;
        self.slots[slot - 1] = None;
        self.free.insert(slot);
        Some(slot)
    }

    pub fn slot_of(&self, instance: InstanceId) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| *s == Some(instance))
            .map(|index| index + 1)
    }

    pub fn instance_at(&self, slot: usize) -> Option<InstanceId> {
        let index = slot.checked_sub(1)?;
        self.slots.get(index).copied().flatten()
    }

    pub fn used(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserve_is_idempotent() {
        let mut table = DataSlotTable::new();
        let a = table.reserve(InstanceId(1)).unwrap();
        assert_eq!(table.reserve(InstanceId(1)), Ok(a));
        assert_eq!(table.used(), 1);
        assert_eq!(table.instance_at(a), Some(InstanceId(1)));
    }

    #[test]
    fn test_exhaustion_and_reuse() {
        let mut table = DataSlotTable::with_capacity(2);
        assert_eq!(table.reserve(InstanceId(1)), Ok(1));
        assert_eq!(table.reserve(InstanceId(2)), Ok(2));
        assert_eq!(table.reserve(InstanceId(3)), Err(SlotError::Exhausted(2)));

        assert_eq!(table.release(InstanceId(1)), Some(1));
        assert_eq!(table.release(InstanceId(1)), None);
        assert_eq!(table.reserve(InstanceId(3)), Ok(1));
        assert_eq!(table.instance_at(0), None);
    }

    #[test]
    fn test_full_table_reuses_released_middle_slot() {
        let mut table = DataSlotTable::new();
        let k = table.capacity();
        let slots: Vec<usize> = (1..=k as u64)
            .map(|i| table.reserve(InstanceId(i)).unwrap())
            .collect();
        assert_eq!(slots, (1..=k).collect::<Vec<_>>());
        assert_eq!(table.used(), k);
        assert_eq!(table.reserve(InstanceId(100)), Err(SlotError::Exhausted(k)));

        let middle = k / 2;
        assert_eq!(table.release(InstanceId(middle as u64)), Some(middle));
        assert_eq!(table.instance_at(middle), None);
        assert_eq!(table.reserve(InstanceId(100)), Ok(middle));
        assert_eq!(table.instance_at(middle), Some(InstanceId(100)));
        assert_eq!(table.slot_of(InstanceId(middle as u64 + 1)), Some(middle + 1));
        assert_eq!(table.instance_at(k + 1), None);
    }

    #[test]
    fn test_default_capacity() {
        assert_eq!(DataSlotTable::new().capacity(), NB_DATA_SLOTS);
    }
}
