/*!
Flows and subqueues, per §3.8/§4.E: a named interface with two bounded
FIFOs (ingress, egress) moving bundle references between components.

A subqueue's depth can change at runtime — including to zero, which
drains new pushes without flushing what's already queued — so it's built
directly on a [`Mutex`] and [`Condvar`] rather than a fixed-capacity
channel: the depth check and the wait both need to observe the *current*
limit, not one fixed at construction.
*/
use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::pool::BlockId;

/// A deadline for a blocking subqueue or pool operation. `Duration::ZERO`
/// is a try-op: return immediately with a timeout status rather than
/// wait at all, per §5's cancellation rule.
pub type Deadline = Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushResult {
    Pushed,
    TimedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullResult {
    Pulled(BlockId),
    TimedOut,
}

struct SubqueueState {
    items: VecDeque<BlockId>,
    depth_limit: usize,
}

/// A bounded FIFO of bundle references.
pub struct Subqueue {
    state: Mutex<SubqueueState>,
    not_empty: Condvar,
    not_full: Condvar,
}

impl Subqueue {
    pub fn new(depth_limit: usize) -> Self {
        Self {
            state: Mutex::new(SubqueueState {
                items: VecDeque::new(),
                depth_limit,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Changes the current depth limit. Lowering it below the current
    /// length does not drop queued items; it only blocks further pushes
    /// until the backlog drains below the new limit.
    pub fn set_depth_limit(&self, limit: usize) {
        let mut state = self.state.lock().unwrap();
        state.depth_limit = limit;
        self.not_full.notify_all();
    }

    /// Appends `item`, waiting up to `deadline` for room if the queue is
    /// currently at its depth limit.
    pub fn push(&self, item: BlockId, deadline: Deadline) -> PushResult {
        let start = Instant::now();
        let mut state = self.state.lock().unwrap();
        while state.items.len() >= state.depth_limit {
            let elapsed = start.elapsed();
            if elapsed >= deadline {
                return PushResult::TimedOut;
            }
            let (guard, timeout) = self
                .not_full
                .wait_timeout(state, deadline - elapsed)
                .unwrap();
            state = guard;
            if timeout.timed_out() && state.items.len() >= state.depth_limit {
                return PushResult::TimedOut;
            }
        }
        state.items.push_back(item);
        self.not_empty.notify_one();
        PushResult::Pushed
    }

    /// Removes and returns the head, waiting up to `deadline` if the
    /// queue is currently empty.
    pub fn pull(&self, deadline: Deadline) -> PullResult {
        let start = Instant::now();
        let mut state = self.state.lock().unwrap();
        while state.items.is_empty() {
            let elapsed = start.elapsed();
            if elapsed >= deadline {
                return PullResult::TimedOut;
            }
            let (guard, timeout) = self
                .not_empty
                .wait_timeout(state, deadline - elapsed)
                .unwrap();
            state = guard;
            if timeout.timed_out() && state.items.is_empty() {
                return PullResult::TimedOut;
            }
        }
        let item = state.items.pop_front().unwrap();
        self.not_full.notify_one();
        PullResult::Pulled(item)
    }
}

/// Bits of [`Flow`]'s `state_flags`, per §3.8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StateFlags(u32);

impl StateFlags {
    pub const UP: Self = Self(1 << 0);
    pub const ENDPOINT: Self = Self(1 << 1);
    pub const STORAGE: Self = Self(1 << 2);
    pub const POLLING_NEEDED: Self = Self(1 << 3);

    pub fn empty() -> Self {
        Self(0)
    }
    pub fn from_bits(bits: u32) -> Self {
        Self(bits)
    }
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
    pub fn bits(self) -> u32 {
        self.0
    }
}

impl core::ops::BitOr for StateFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Up,
    Down,
    Poll,
}

/// A named interface: two subqueues plus the flags and event dispatch
/// that make up an "interface" from the router's point of view.
pub struct Flow {
    pub intf_id: u32,
    pub ingress: Subqueue,
    pub egress: Subqueue,
    state_flags: Mutex<StateFlags>,
    handler: Option<Box<dyn Fn(EventKind, StateFlags) + Send + Sync>>,
}

impl Flow {
    pub fn new(intf_id: u32, depth_limit: usize) -> Self {
        Self {
            intf_id,
            ingress: Subqueue::new(depth_limit),
            egress: Subqueue::new(depth_limit),
            state_flags: Mutex::new(StateFlags::empty()),
            handler: None,
        }
    }

    pub fn with_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(EventKind, StateFlags) + Send + Sync + 'static,
    {
        self.handler = Some(Box::new(handler));
        self
    }

    pub fn state_flags(&self) -> StateFlags {
        *self.state_flags.lock().unwrap()
    }

    /// Atomically sets `set` and clears `clear`, notifying the event
    /// handler when the `UP` bit toggles.
    pub fn modify_flags(&self, set: StateFlags, clear: StateFlags) {
        let mut flags = self.state_flags.lock().unwrap();
        let was_up = flags.contains(StateFlags::UP);
        flags.0 = (flags.0 | set.0) & !clear.0;
        let is_up = flags.contains(StateFlags::UP);
        let new_flags = *flags;
        drop(flags);

        if was_up != is_up {
            self.event(if is_up { EventKind::Up } else { EventKind::Down }, new_flags);
        }
    }

    pub fn event(&self, kind: EventKind, state: StateFlags) {
        if let Some(handler) = &self.handler {
            handler(kind, state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn id(n: u32) -> BlockId {
        // Tests only need distinguishable handles, not real pool blocks.
        BlockId(n)
    }

    #[test]
    fn fifo_ordering_is_preserved() {
        let q = Subqueue::new(4);
        q.push(id(1), Duration::ZERO);
        q.push(id(2), Duration::ZERO);
        q.push(id(3), Duration::ZERO);
        assert_eq!(q.pull(Duration::ZERO), PullResult::Pulled(id(1)));
        assert_eq!(q.pull(Duration::ZERO), PullResult::Pulled(id(2)));
        assert_eq!(q.pull(Duration::ZERO), PullResult::Pulled(id(3)));
    }

    #[test]
    fn push_times_out_when_full() {
        let q = Subqueue::new(1);
        assert_eq!(q.push(id(1), Duration::ZERO), PushResult::Pushed);
        assert_eq!(q.push(id(2), Duration::from_millis(10)), PushResult::TimedOut);
    }

    #[test]
    fn pull_times_out_when_empty() {
        let q = Subqueue::new(1);
        assert_eq!(q.pull(Duration::from_millis(10)), PullResult::TimedOut);
    }

    #[test]
    fn blocked_push_wakes_on_pull() {
        let q = Arc::new(Subqueue::new(1));
        q.push(id(1), Duration::ZERO);

        let q2 = q.clone();
        let handle = thread::spawn(move || q2.push(id(2), Duration::from_secs(2)));

        thread::sleep(Duration::from_millis(20));
        assert_eq!(q.pull(Duration::ZERO), PullResult::Pulled(id(1)));
        assert_eq!(handle.join().unwrap(), PushResult::Pushed);
    }

    #[test]
    fn up_down_transition_notifies_handler() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen2 = seen.clone();
        let flow = Flow::new(1, 4).with_handler(move |kind, _| seen2.lock().unwrap().push(kind));

        flow.modify_flags(StateFlags::UP, StateFlags::empty());
        flow.modify_flags(StateFlags::empty(), StateFlags::UP);
        assert_eq!(*seen.lock().unwrap(), vec![EventKind::Up, EventKind::Down]);
    }
}
