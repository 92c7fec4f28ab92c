//! Per-resource operation serializer
//!
//! Operations on the same resource id run one at a time, in the order they
//! called [`OperationSerializer::acquire`]. Operations on different ids
//! never wait on each other.
//!
//! Lock order is always the id map first, then a slot; a slot lock is never
//! held while taking the map lock.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use uuid::Uuid;

#[derive(Debug, Default)]
struct Slot {
    /// Ticket currently allowed to run.
    serving: Mutex<u64>,
    released: Condvar,
}

#[derive(Debug)]
struct SlotEntry {
    pending: usize,
    next_ticket: u64,
    slot: Arc<Slot>,
}

/// Grants exclusive, FIFO-ordered access per resource id.
#[derive(Debug, Default)]
pub struct OperationSerializer {
    slots: Mutex<HashMap<Uuid, SlotEntry>>,
}

impl OperationSerializer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until the caller holds exclusive access to `id`.
    ///
    /// Access is released when the returned guard is dropped.
    pub fn acquire(&self, id: Uuid) -> OperationGuard<'_> {
        let (slot, ticket) = {
            let mut slots = self.slots.lock();
            let entry = slots.entry(id).or_insert_with(|| SlotEntry {
                pending: 0,
                next_ticket: 0,
                slot: Arc::new(Slot::default()),
            });
            entry.pending += 1;
            let ticket = entry.next_ticket;
            entry.next_ticket += 1;
            (Arc::clone(&entry.slot), ticket)
        };

        let mut serving = slot.serving.lock();
        if *serving != ticket {
            tracing::trace!(resource_id = %id, ticket, "waiting for resource");
        }
        while *serving != ticket {
            slot.released.wait(&mut serving);
        }
        drop(serving);

        OperationGuard {
            serializer: self,
            id,
            slot,
        }
    }

    /// Number of operations holding or waiting for `id`.
    pub fn pending(&self, id: Uuid) -> usize {
        self.slots.lock().get(&id).map_or(0, |e| e.pending)
    }

    /// Number of ids with at least one pending operation.
    pub fn active_resources(&self) -> usize {
        self.slots.lock().len()
    }

    fn release(&self, id: Uuid, slot: &Slot) {
        {
            let mut serving = slot.serving.lock();
            *serving += 1;
        }
        slot.released.notify_all();

        let mut slots = self.slots.lock();
        if let Some(entry) = slots.get_mut(&id) {
            entry.pending -= 1;
            if entry.pending == 0 {
                slots.remove(&id);
            }
        }
    }
}

/// Exclusive access to one resource id; released on drop.
#[must_use = "access is released as soon as the guard is dropped"]
#[derive(Debug)]
pub struct OperationGuard<'a> {
    serializer: &'a OperationSerializer,
    id: Uuid,
    slot: Arc<Slot>,
}

impl OperationGuard<'_> {
    pub fn resource_id(&self) -> Uuid {
        self.id
    }
}

impl Drop for OperationGuard<'_> {
    fn drop(&mut self) {
        self.serializer.release(self.id, &self.slot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_entry_removed_when_idle() {
        let serializer = OperationSerializer::new();
        let id = Uuid::new_v4();
        {
            let guard = serializer.acquire(id);
            assert_eq!(guard.resource_id(), id);
            assert_eq!(serializer.pending(id), 1);
            assert_eq!(serializer.active_resources(), 1);
        }
        assert_eq!(serializer.pending(id), 0);
        assert_eq!(serializer.active_resources(), 0);

        // reacquiring after cleanup starts a fresh slot
        drop(serializer.acquire(id));
        assert_eq!(serializer.active_resources(), 0);
    }

    #[test]
    fn test_different_ids_do_not_block() {
        let serializer = OperationSerializer::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let _ga = serializer.acquire(a);
        let _gb = serializer.acquire(b);
        assert_eq!(serializer.pending(a), 1);
        assert_eq!(serializer.pending(b), 1);
    }

    #[test]
    fn test_same_id_waits_for_release() {
        let serializer = Arc::new(OperationSerializer::new());
        let id = Uuid::new_v4();
        let guard = serializer.acquire(id);

        let (tx, rx) = mpsc::channel();
        let waiter = {
            let serializer = Arc::clone(&serializer);
            thread::spawn(move || {
                let _g = serializer.acquire(id);
                tx.send(()).unwrap();
            })
        };

        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        assert_eq!(serializer.pending(id), 2);

        drop(guard);
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        waiter.join().unwrap();
        assert_eq!(serializer.pending(id), 0);
    }

    #[test]
    fn test_fifo_order_per_resource() {
        let serializer = Arc::new(OperationSerializer::new());
        let id = Uuid::new_v4();
        let order = Arc::new(Mutex::new(Vec::new()));
        let holder = serializer.acquire(id);

        let mut handles = Vec::new();
        for n in 0..5 {
            let worker = Arc::clone(&serializer);
            let order = Arc::clone(&order);
            handles.push(thread::spawn(move || {
                let _g = worker.acquire(id);
                order.lock().push(n);
            }));
            // let thread n take its ticket before spawning n + 1
            while serializer.pending(id) < n + 2 {
                thread::yield_now();
            }
        }

        drop(holder);
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(*order.lock(), vec![0, 1, 2, 3, 4]);
        assert_eq!(serializer.active_resources(), 0);
    }

    #[test]
    fn test_released_on_panic() {
        let serializer = Arc::new(OperationSerializer::new());
        let id = Uuid::new_v4();
        let result = {
            let serializer = Arc::clone(&serializer);
            thread::spawn(move || {
                let _g = serializer.acquire(id);
                panic!("operation blew up");
            })
            .join()
        };
        assert!(result.is_err());
        assert_eq!(serializer.pending(id), 0);
        drop(serializer.acquire(id));
    }
}
