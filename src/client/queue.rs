//! Play-queue mirror bookkeeping: delta-based rebuild planning and the
//! two-phase move planner.
//!
//! Both planners are pure so the dispatcher stays a thin executor: it
//! sends the planned commands and fetches the planned positions.

use std::collections::HashSet;

use crate::protocol::types::IdPos;

/// The client's last-known view of the server's play queue.
#[derive(Debug, Clone, Default)]
pub struct QueueMirror {
    /// Song ids in queue order.
    pub ids: Vec<u32>,
    /// Queue version the mirror was last rebuilt against.
    pub last_update_version: u32,
    /// Queue version most recently seen in a `status` reply.
    pub last_status_version: u32,
}

impl QueueMirror {
    pub fn reset(&mut self) {
        self.ids.clear();
        self.last_update_version = 0;
        self.last_status_version = 0;
    }
}

/// Where one slot of the rebuilt mirror comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotSource {
    /// The id existed in the prior mirror; the consumer already holds
    /// the track data, so only a placeholder is emitted.
    Carry { id: u32 },
    /// A new id; the slot's full record must be fetched by position.
    Fetch { pos: u32, id: u32 },
}

/// Plan the rebuild of the queue mirror from a `plchangesposid` delta.
///
/// `prior` is the current mirror, `changes` the reported
/// `(position, id)` pairs in ascending position order, and `new_len`
/// the queue length from the accompanying `status` reply (needed to
/// detect trailing deletions the delta does not report).
///
/// Returns `None` whenever the delta alone cannot guarantee a mirror
/// of exactly `new_len` slots; the caller then falls back to a full
/// refresh.
pub fn plan_rebuild(prior: &[u32], changes: &[IdPos], new_len: u32) -> Option<Vec<SlotSource>> {
    let new_len = new_len as usize;

    if changes.is_empty() {
        // Nothing changed; the mirror must already be the right size.
        if prior.len() != new_len {
            return None;
        }
        return Some(prior.iter().map(|&id| SlotSource::Carry { id }).collect());
    }

    let first_pos = changes[0].pos as usize;
    if first_pos > prior.len() {
        return None;
    }
    // The delta covers consecutive positions from the first change on.
    for (i, change) in changes.iter().enumerate() {
        if change.pos as usize != first_pos + i {
            return None;
        }
    }

    let known: HashSet<u32> = prior.iter().copied().collect();
    let mut slots = Vec::with_capacity(new_len);

    // Leading positions before the first change are untouched.
    for &id in &prior[..first_pos] {
        slots.push(SlotSource::Carry { id });
    }

    for change in changes {
        if known.contains(&change.id) {
            slots.push(SlotSource::Carry { id: change.id });
        } else {
            slots.push(SlotSource::Fetch {
                pos: change.pos,
                id: change.id,
            });
        }
    }

    // Trailing positions implied by the new length but not covered by
    // the delta carry over from the prior mirror, when it has them.
    let covered = first_pos + changes.len();
    if covered < new_len {
        if new_len > prior.len() {
            return None;
        }
        for &id in &prior[covered..new_len] {
            slots.push(SlotSource::Carry { id });
        }
    }

    if slots.len() != new_len {
        return None;
    }
    Some(slots)
}

/// Plan the relocation of the queue slots `items` to `dest` as a
/// sequence of `move <from> <to>` arguments.
///
/// Two phases: every selected item, largest index first, is moved to
/// the queue tail (counting how many of them originally preceded the
/// destination, to compensate the target index), then the relocated
/// block, now contiguous at the tail, is moved into place. Routing via
/// the tail keeps the earlier indices of each phase valid; a naive
/// single pass would invalidate them move by move.
pub fn plan_move(items: &[u32], dest: u32, size: u32) -> Vec<(u32, u32)> {
    let mut sorted = items.to_vec();
    sorted.sort_unstable();

    let mut moves = Vec::with_capacity(sorted.len() * 2);
    let mut dest_offset = 0;

    for &item in sorted.iter().rev() {
        if item < dest && item != size - 1 {
            // Moving away an item that resides before the destination
            // row shifts the destination left.
            dest_offset += 1;
        }
        moves.push((item, size - 1));
    }
    for i in (0..sorted.len() as u32).rev() {
        moves.push((size - 1 - i, dest - dest_offset));
    }
    moves
}
