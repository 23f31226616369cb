//! Recently observed counterparties, the lottery's sampling universe

use rand::seq::SliceRandom;
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};

pub const DEFAULT_CAPACITY: usize = 100;

/// Bounded, insertion-ordered, duplicate-free set of addresses.
/// The agent's own address is never admitted.
#[derive(Debug)]
pub struct RecentCounterparties {
    order: VecDeque<String>,
    members: HashSet<String>,
    capacity: usize,
    excluded: String,
}

impl RecentCounterparties {
    pub fn new(own_address: impl Into<String>, capacity: usize) -> Self {
        Self {
            order: VecDeque::with_capacity(capacity),
            members: HashSet::with_capacity(capacity),
            capacity: capacity.max(1),
            excluded: own_address.into(),
        }
    }

    /// Returns true if the address was newly added
    pub fn insert(&mut self, address: &str) -> bool {
        if address.is_empty() || address == self.excluded || self.members.contains(address) {
            return false;
        }
        self.order.push_back(address.to_string());
        self.members.insert(address.to_string());
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.members.remove(&oldest);
            }
        }
        true
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, address: &str) -> bool {
        self.members.contains(address)
    }

    pub fn is_excluded(&self, address: &str) -> bool {
        self.excluded == address
    }

    /// Uniform random member
    pub fn choose<R: rand::Rng + ?Sized>(&self, rng: &mut R) -> Option<String> {
        let members: Vec<&String> = self.order.iter().collect();
        members.choose(rng).map(|s| s.to_string())
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.order.iter()
    }
}

/// Synchronized accessor shared by the sensor's lookup tasks and the lottery.
/// The lock is never held across an await point.
#[derive(Debug, Clone)]
pub struct CounterpartyBook {
    inner: Arc<Mutex<RecentCounterparties>>,
}

impl CounterpartyBook {
    pub fn new(own_address: impl Into<String>) -> Self {
        Self::with_capacity(own_address, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(own_address: impl Into<String>, capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(RecentCounterparties::new(own_address, capacity))),
        }
    }

    pub fn insert(&self, address: &str) -> bool {
        match self.inner.lock() {
            Ok(mut set) => set.insert(address),
            Err(poisoned) => poisoned.into_inner().insert(address),
        }
    }

    pub fn len(&self) -> usize {
        self.with(|set| set.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn choose_random(&self) -> Option<String> {
        self.with(|set| set.choose(&mut rand::thread_rng()))
    }

    pub fn contains(&self, address: &str) -> bool {
        self.with(|set| set.contains(address))
    }

    /// The agent's own address
    pub fn is_own(&self, address: &str) -> bool {
        self.with(|set| set.is_excluded(address))
    }

    fn with<T>(&self, f: impl FnOnce(&RecentCounterparties) -> T) -> T {
        match self.inner.lock() {
            Ok(set) => f(&set),
            Err(poisoned) => f(&poisoned.into_inner()),
        }
    }
}
