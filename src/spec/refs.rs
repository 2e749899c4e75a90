use std::fmt;
use std::marker::PhantomData;

/// Small integer port reference, unique per kind within one block type.
pub type PortId = u8;

/// Sentinel for an invalid port reference.
pub const INVALID_PORT: PortId = PortId::MAX;

/// Largest number of ports of one kind a block type may declare.
pub const MAX_PORTS_PER_KIND: usize = INVALID_PORT as usize;

/// Kind tag: event ports.
pub struct EventKind;
/// Kind tag: data ports.
pub struct DataKind;
/// Direction tag: input ports.
pub struct InputDir;
/// Direction tag: output ports.
pub struct OutputDir;

/// Typed reference to one port within a builder or compiled interface.
///
/// The kind and direction tags make event/data and input/output mixups
/// type errors instead of runtime surprises. An invalid reference carries
/// the [`INVALID_PORT`] sentinel and is produced whenever a declaration
/// failed; it poisons any binding it is used in.
pub struct SpecRef<K, D> {
    id: PortId,
    _tag: PhantomData<(K, D)>,
}

pub type EventInRef = SpecRef<EventKind, InputDir>;
pub type EventOutRef = SpecRef<EventKind, OutputDir>;
pub type DataInRef = SpecRef<DataKind, InputDir>;
pub type DataOutRef = SpecRef<DataKind, OutputDir>;

impl<K, D> SpecRef<K, D> {
    pub const fn invalid() -> Self {
        Self {
            id: INVALID_PORT,
            _tag: PhantomData,
        }
    }

    /// Wraps a raw index, mapping out-of-range values to the sentinel.
    pub fn from_index(index: usize) -> Self {
        if index >= MAX_PORTS_PER_KIND {
            return Self::invalid();
        }
        Self {
            id: index as PortId,
            _tag: PhantomData,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.id != INVALID_PORT
    }

    /// Raw id; [`INVALID_PORT`] when invalid.
    pub fn id(&self) -> PortId {
        self.id
    }

    pub fn index(&self) -> Option<usize> {
        self.is_valid().then_some(self.id as usize)
    }

    /// Raw id, or `None` when invalid.
    pub fn id_checked(&self) -> Option<PortId> {
        self.is_valid().then_some(self.id)
    }
}

impl<K, D> Clone for SpecRef<K, D> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<K, D> Copy for SpecRef<K, D> {}

impl<K, D> PartialEq for SpecRef<K, D> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl<K, D> Eq for SpecRef<K, D> {}

impl<K, D> fmt::Debug for SpecRef<K, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "SpecRef({})", self.id)
        } else {
            write!(f, "SpecRef(invalid)")
        }
    }
}

/// Contiguous range of same-kind, same-direction ports. Never empty when valid.
pub struct SpecRange<K, D> {
    pub first: SpecRef<K, D>,
    pub last: SpecRef<K, D>,
}

pub type EventInRange = SpecRange<EventKind, InputDir>;
pub type EventOutRange = SpecRange<EventKind, OutputDir>;
pub type DataInRange = SpecRange<DataKind, InputDir>;
pub type DataOutRange = SpecRange<DataKind, OutputDir>;

impl<K, D> SpecRange<K, D> {
    pub const fn invalid() -> Self {
        Self {
            first: SpecRef::invalid(),
            last: SpecRef::invalid(),
        }
    }

    pub fn new(first: SpecRef<K, D>, last: SpecRef<K, D>) -> Self {
        Self { first, last }
    }

    pub fn is_valid(&self) -> bool {
        self.first.is_valid() && self.last.is_valid() && self.first.id() <= self.last.id()
    }

    /// Number of ports in the range; zero when invalid.
    pub fn len(&self) -> usize {
        if self.is_valid() {
            self.last.id() as usize - self.first.id() as usize + 1
        } else {
            0
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// One port at `offset` from the start; invalid when out of range.
    pub fn at(&self, offset: usize) -> SpecRef<K, D> {
        if !self.is_valid() || offset >= self.len() {
            return SpecRef::invalid();
        }
        SpecRef::from_index(self.first.id() as usize + offset)
    }
}

impl<K, D> Clone for SpecRange<K, D> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<K, D> Copy for SpecRange<K, D> {}

impl<K, D> fmt::Debug for SpecRange<K, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SpecRange({:?}..={:?})", self.first, self.last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_ref_has_sentinel_id() {
        let r = EventInRef::invalid();
        assert!(!r.is_valid());
        assert_eq!(r.id(), INVALID_PORT);
        assert_eq!(r.index(), None);
    }

    #[test]
    fn out_of_range_index_maps_to_invalid() {
        assert!(!DataOutRef::from_index(MAX_PORTS_PER_KIND).is_valid());
        assert!(DataOutRef::from_index(MAX_PORTS_PER_KIND - 1).is_valid());
    }

    #[test]
    fn range_indexing_stays_within_bounds() {
        let range = DataInRange::new(DataInRef::from_index(2), DataInRef::from_index(4));
        assert_eq!(range.len(), 3);
        assert_eq!(range.at(0).id(), 2);
        assert_eq!(range.at(2).id(), 4);
        assert!(!range.at(3).is_valid());
    }
}
