//! Single-slot change capture

use crate::domain::{ItemId, SlotId};
use crate::session::SlotDataMap;
use serde::Serialize;

/// Old/new committed and staged item of one slot
///
/// Produced by a single-slot slot-data update and handed to exactly one
/// consumer (typically an appearance overlay).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EquipChangeDelta {
    pub old_committed: Option<ItemId>,
    pub new_committed: Option<ItemId>,
    pub old_staged: Option<ItemId>,
    pub new_staged: Option<ItemId>,
}

impl EquipChangeDelta {
    /// Whether the committed item changed
    pub fn committed_changed(&self) -> bool {
        self.old_committed != self.new_committed
    }

    /// Whether the staged item changed
    pub fn staged_changed(&self) -> bool {
        self.old_staged != self.new_staged
    }
}

/// Compare `slot` between two snapshots
///
/// Returns `None` when `slot` is absent from `next` or when neither the
/// committed nor the staged item differs. A missing `previous` snapshot
/// counts as an empty slot.
pub fn capture_equip_change(
    previous: Option<&SlotDataMap>,
    next: &SlotDataMap,
    slot: &SlotId,
) -> Option<EquipChangeDelta> {
    let new_entry = next.get(slot)?;
    let old_entry = previous.and_then(|p| p.get(slot));

    let old_committed = old_entry.and_then(|e| e.content.clone());
    let old_staged = old_entry.and_then(|e| e.staged.as_ref().map(|s| s.item.clone()));
    let new_committed = new_entry.content.clone();
    let new_staged = new_entry.staged.as_ref().map(|s| s.item.clone());

    if old_committed == new_committed && old_staged == new_staged {
        return None;
    }

    Some(EquipChangeDelta {
        old_committed,
        new_committed,
        old_staged,
        new_staged,
    })
}
