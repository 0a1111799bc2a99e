//! Per-logical-connection cache of physical connections.

use std::collections::HashMap;

use crate::datasource::PhysicalConnectionRef;

/// Ordered multimap from datasource name to the physical connections opened
/// for it.
///
/// Names keep the order in which they were first inserted; connections under
/// one name keep insertion order too. The cache is not synchronized; it is
/// owned by exactly one logical connection.
#[derive(Default)]
pub struct PhysicalConnectionCache {
    index: HashMap<String, usize>,
    entries: Vec<(String, Vec<PhysicalConnectionRef>)>,
}

impl PhysicalConnectionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The first connection cached under `name`.
    pub fn get(&self, name: &str) -> Option<&PhysicalConnectionRef> {
        self.get_all(name).first()
    }

    /// Every connection cached under `name`.
    pub fn get_all(&self, name: &str) -> &[PhysicalConnectionRef] {
        match self.index.get(name) {
            Some(&slot) => &self.entries[slot].1,
            None => &[],
        }
    }

    /// Append a connection under `name`.
    pub fn put(&mut self, name: impl Into<String>, connection: PhysicalConnectionRef) {
        let name = name.into();
        match self.index.get(&name) {
            Some(&slot) => self.entries[slot].1.push(connection),
            None => {
                self.index.insert(name.clone(), self.entries.len());
                self.entries.push((name, vec![connection]));
            }
        }
    }

    /// Append several connections under `name`.
    pub fn put_all<I>(&mut self, name: &str, connections: I)
    where
        I: IntoIterator<Item = PhysicalConnectionRef>,
    {
        for connection in connections {
            self.put(name, connection);
        }
    }

    /// All connections regardless of name, in cache order.
    pub fn values(&self) -> impl Iterator<Item = &PhysicalConnectionRef> {
        self.entries.iter().flat_map(|(_, conns)| conns.iter())
    }

    /// `(name, connection)` pairs in cache order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &PhysicalConnectionRef)> {
        self.entries
            .iter()
            .flat_map(|(name, conns)| conns.iter().map(move |c| (name.as_str(), c)))
    }

    /// Remove everything, handing back the connections in cache order.
    pub fn drain(&mut self) -> Vec<PhysicalConnectionRef> {
        self.index.clear();
        self.entries
            .drain(..)
            .flat_map(|(_, conns)| conns)
            .collect()
    }

    pub fn clear(&mut self) {
        self.index.clear();
        self.entries.clear();
    }

    /// Total number of cached connections.
    pub fn len(&self) -> usize {
        self.entries.iter().map(|(_, conns)| conns.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for PhysicalConnectionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(name, conns)| (name, conns.len())))
            .finish()
    }
}
