use crate::core::input::NoteAction;
use crate::game::scroll::ScrollTrajectory;
use log::trace;
use smallvec::SmallVec;
use std::collections::VecDeque;

pub type PromptId = u64;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PromptInput {
    pub pitch: u8,
    /// `None` when the pitch has no configured button.
    pub action: Option<NoteAction>,
}

#[derive(Clone, Debug)]
pub struct Prompt {
    uid: PromptId,
    pub first: Option<PromptInput>,
    pub second: Option<PromptInput>,
    position: f32,
    live: bool,
    trajectory: Option<ScrollTrajectory>,
    /// Chart indices this prompt stands for.
    notes: SmallVec<[usize; 2]>,
}

/// Position a prompt takes when it goes back to the pool.
pub const NEUTRAL_POSITION: f32 = 0.0;

impl Prompt {
    fn vacant() -> Self {
        Self {
            uid: 0,
            first: None,
            second: None,
            position: NEUTRAL_POSITION,
            live: false,
            trajectory: None,
            notes: SmallVec::new(),
        }
    }

    #[inline(always)]
    pub fn uid(&self) -> PromptId {
        self.uid
    }

    #[inline(always)]
    pub fn position(&self) -> f32 {
        self.position
    }

    #[inline(always)]
    pub fn is_live(&self) -> bool {
        self.live
    }

    pub fn trajectory(&self) -> Option<&ScrollTrajectory> {
        self.trajectory.as_ref()
    }

    pub fn is_combination(&self) -> bool {
        self.second.is_some()
    }

    pub(crate) fn set_position(&mut self, position: f32) {
        self.position = position;
    }

    pub(crate) fn begin_scroll(&mut self, trajectory: ScrollTrajectory) {
        self.trajectory = Some(trajectory);
    }

    pub(crate) fn attach_notes(&mut self, notes: &[usize]) {
        self.notes.clear();
        self.notes.extend_from_slice(notes);
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RetireReason {
    Hit,
    Missed,
    /// Trajectory ran out with nobody judging it.
    Expired,
    /// Swept off the field when the session stopped.
    Cleared,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RetireNotice {
    pub uid: PromptId,
    pub reason: RetireReason,
    pub notes: SmallVec<[usize; 2]>,
}

/// Judgable prompts. Slots are reused, uids are not: each spawn takes the next
/// uid from a pool-wide counter, so a uid kept for a retired prompt stops
/// matching once its slot carries another one.
#[derive(Debug, Default)]
pub struct PromptPool {
    slots: Vec<Prompt>,
    /// Slot indices of live prompts, in spawn order.
    live: Vec<usize>,
    next_uid: PromptId,
    retired: VecDeque<RetireNotice>,
}

impl PromptPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let mut pool = Self::default();
        pool.slots.resize_with(capacity, Prompt::vacant);
        pool
    }

    /// Activates the first free slot (growing the pool if none is free) with
    /// a fresh uid.
    pub fn spawn_at(&mut self, position: f32) -> &mut Prompt {
        let slot = match self.slots.iter().position(|p| !p.live) {
            Some(idx) => idx,
            None => {
                self.slots.push(Prompt::vacant());
                self.slots.len() - 1
            }
        };
        let uid = self.next_uid;
        self.next_uid += 1;

        self.live.push(slot);
        let prompt = &mut self.slots[slot];
        *prompt = Prompt {
            uid,
            position,
            live: true,
            ..Prompt::vacant()
        };
        trace!("Prompt {uid} spawned in slot {slot}");
        prompt
    }

    /// Takes the prompt off the field and queues a notice. Returns `false`
    /// (and does nothing) if `uid` is not live.
    pub fn retire(&mut self, uid: PromptId, reason: RetireReason) -> bool {
        let Some(live_idx) = self.live.iter().position(|&s| self.slots[s].uid == uid) else {
            return false;
        };
        let slot = self.live.remove(live_idx);
        let prompt = &mut self.slots[slot];
        prompt.live = false;
        prompt.position = NEUTRAL_POSITION;
        prompt.trajectory = None;
        let notes = std::mem::take(&mut prompt.notes);
        trace!("Prompt {uid} retired ({reason:?})");
        self.retired.push_back(RetireNotice { uid, reason, notes });
        true
    }

    pub fn retire_all(&mut self, reason: RetireReason) -> usize {
        let uids: SmallVec<[PromptId; 8]> = self.live_list().map(Prompt::uid).collect();
        uids.into_iter().filter(|&uid| self.retire(uid, reason)).count()
    }

    pub fn get(&self, uid: PromptId) -> Option<&Prompt> {
        self.live
            .iter()
            .map(|&s| &self.slots[s])
            .find(|p| p.uid == uid)
    }

    pub fn is_live(&self, uid: PromptId) -> bool {
        self.get(uid).is_some()
    }

    /// Live prompts in the order they were spawned.
    pub fn live_list(&self) -> impl Iterator<Item = &Prompt> {
        self.live.iter().map(|&s| &self.slots[s])
    }

    /// Slot order, not spawn order.
    pub(crate) fn live_list_mut(&mut self) -> impl Iterator<Item = &mut Prompt> {
        self.slots.iter_mut().filter(|p| p.live)
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Slots allocated so far; the high-water mark of simultaneous prompts.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn drain_retired(&mut self) -> impl Iterator<Item = RetireNotice> + '_ {
        self.retired.drain(..)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uids_are_monotonic_and_slots_are_reused() {
        let mut pool = PromptPool::new();
        let a = pool.spawn_at(10.0).uid();
        let b = pool.spawn_at(20.0).uid();
        assert_eq!((a, b), (0, 1));
        assert_eq!(pool.capacity(), 2);

        assert!(pool.retire(a, RetireReason::Hit));
        let c = pool.spawn_at(30.0).uid();
        assert_eq!(c, 2, "a retired uid is never handed out again");
        assert_eq!(pool.capacity(), 2, "the freed slot is reused");
        assert!(!pool.is_live(a));
    }

    #[test]
    fn retire_twice_is_a_noop() {
        let mut pool = PromptPool::new();
        let uid = pool.spawn_at(50.0).uid();
        assert!(pool.retire(uid, RetireReason::Expired));
        assert!(!pool.retire(uid, RetireReason::Missed));

        let notices: Vec<_> = pool.drain_retired().collect();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].reason, RetireReason::Expired);
        assert_eq!(pool.live_count(), 0);
    }

    #[test]
    fn stale_uid_does_not_touch_the_reused_slot() {
        let mut pool = PromptPool::new();
        let old = pool.spawn_at(1.0).uid();
        pool.retire(old, RetireReason::Hit);
        let new = pool.spawn_at(2.0).uid();
        assert!(!pool.retire(old, RetireReason::Missed));
        assert!(pool.is_live(new));
        assert_eq!(pool.get(new).map(Prompt::position), Some(2.0));
    }

    #[test]
    fn live_list_keeps_spawn_order_and_retire_resets_position() {
        let mut pool = PromptPool::with_capacity(4);
        let ids: Vec<_> = (0..3).map(|i| pool.spawn_at(i as f32).uid()).collect();
        pool.retire(ids[0], RetireReason::Hit);
        let d = pool.spawn_at(9.0).uid();

        let order: Vec<_> = pool.live_list().map(Prompt::uid).collect();
        assert_eq!(order, vec![ids[1], ids[2], d]);
        assert!(pool.slots.iter().filter(|p| !p.is_live()).all(|p| p.position() == NEUTRAL_POSITION));
    }

    #[test]
    fn retire_all_empties_the_field() {
        let mut pool = PromptPool::new();
        for i in 0..5 {
            pool.spawn_at(i as f32);
        }
        assert_eq!(pool.retire_all(RetireReason::Cleared), 5);
        assert_eq!(pool.live_count(), 0);
        assert_eq!(pool.drain_retired().count(), 5);
    }
}
