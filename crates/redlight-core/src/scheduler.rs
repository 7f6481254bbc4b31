use std::collections::BTreeMap;

/// Handle returned by [`Scheduler::after`] and [`Scheduler::every_second`].
/// Pass it to [`Scheduler::cancel`] to stop the timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(u64);

#[derive(Debug, Clone)]
struct Entry<T> {
    payload: T,
    repeat_ms: Option<u64>,
}

/// Cooperative, virtual-time timer queue.
///
/// Nothing fires on its own: the owner moves time forward with
/// [`Scheduler::pop_due`] and dispatches each due payload itself. Timers are
/// ordered by due time, ties by scheduling order, so dispatch is fully
/// deterministic for a given sequence of `advance` calls.
#[derive(Debug)]
pub struct Scheduler<T> {
    now_ms: u64,
    next_id: u64,
    queue: BTreeMap<(u64, u64), Entry<T>>,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Scheduler<T> {
    pub fn new() -> Self {
        Self {
            now_ms: 0,
            next_id: 0,
            queue: BTreeMap::new(),
        }
    }

    /// Current virtual time in milliseconds.
    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    /// Number of timers still waiting to fire.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    fn insert(&mut self, delay_ms: u64, payload: T, repeat_ms: Option<u64>) -> TimerHandle {
        let id = self.next_id;
        self.next_id += 1;
        self.queue.insert(
            (self.now_ms + delay_ms, id),
            Entry { payload, repeat_ms },
        );
        TimerHandle(id)
    }

    /// Fire `payload` once, `delay_ms` from now.
    pub fn after(&mut self, delay_ms: u64, payload: T) -> TimerHandle {
        self.insert(delay_ms, payload, None)
    }

    /// Fire `payload` every second, starting one second from now, until cancelled.
    pub fn every_second(&mut self, payload: T) -> TimerHandle {
        self.insert(1000, payload, Some(1000))
    }

    /// Cancel a pending timer. Returns false if it already fired or was cancelled.
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        let key = self.queue.keys().find(|(_, id)| *id == handle.0).copied();
        match key {
            Some(key) => self.queue.remove(&key).is_some(),
            None => false,
        }
    }

    /// Drop every pending timer.
    pub fn cancel_all(&mut self) {
        self.queue.clear();
    }

    /// Reset the clock and drop every pending timer.
    pub fn reset(&mut self) {
        self.queue.clear();
        self.now_ms = 0;
    }

    /// Advance the clock to the deadline without firing anything further.
    pub fn settle(&mut self, until_ms: u64) {
        self.now_ms = self.now_ms.max(until_ms);
    }
}

impl<T: Clone> Scheduler<T> {
    /// Pop the earliest timer due at or before `until_ms`, moving the clock
    /// to its due time. Repeating timers are re-armed under the same handle.
    pub fn pop_due(&mut self, until_ms: u64) -> Option<(TimerHandle, T)> {
        let (&(due, id), _) = self.queue.first_key_value()?;
        if due > until_ms {
            return None;
        }
        let entry = self.queue.remove(&(due, id))?;
        self.now_ms = self.now_ms.max(due);
        if let Some(every) = entry.repeat_ms {
            self.queue.insert(
                (due + every, id),
                Entry {
                    payload: entry.payload.clone(),
                    repeat_ms: Some(every),
                },
            );
        }
        Some((TimerHandle(id), entry.payload))
    }
}
