// Tagged arena index packed into a single 64-bit word.
//
// Bit layout:
//   Bits  0..32: INDEX - slot in the node arena (NIL_INDEX means "no node")
//   Bits 32..64: TAG   - generation, bumped on every write of a shared link
//
// Every link in the queue (head, tail, free-list top, node.next) is one of
// these words. A thread holding a stale copy of a link can never win a CAS
// against it, because any intervening write changed the tag even when the
// index came back to the same slot (ABA).
//
use std::sync::atomic::{AtomicU64, Ordering};

const INDEX_MASK: u64 = 0xFFFF_FFFF;
const TAG_SHIFT: u32 = 32;

/// Index value reserved for "no node".
pub(crate) const NIL_INDEX: u32 = u32::MAX;

/// Largest arena that can be addressed without colliding with `NIL_INDEX`.
pub(crate) const MAX_NODES: usize = 1 << 31;

/// An arena index paired with a generation tag.
#[derive(Copy, Clone, PartialEq, Eq)]
pub(crate) struct TaggedIndex {
    raw: u64,
}

impl TaggedIndex {
    // =========================================================================
    // Construction
    // =========================================================================

    #[inline]
    pub(crate) const fn new(index: u32, tag: u32) -> Self {
        TaggedIndex {
            raw: ((tag as u64) << TAG_SHIFT) | index as u64,
        }
    }

    #[inline]
    pub(crate) const fn nil(tag: u32) -> Self {
        Self::new(NIL_INDEX, tag)
    }

    #[inline]
    const fn from_raw(raw: u64) -> Self {
        TaggedIndex { raw }
    }

    // =========================================================================
    // Extraction
    // =========================================================================

    #[inline]
    pub(crate) const fn index(&self) -> u32 {
        (self.raw & INDEX_MASK) as u32
    }

    #[inline]
    pub(crate) const fn tag(&self) -> u32 {
        (self.raw >> TAG_SHIFT) as u32
    }

    #[inline]
    pub(crate) const fn is_nil(&self) -> bool {
        self.index() == NIL_INDEX
    }

    // =========================================================================
    // Transformers
    // =========================================================================

    /// The value a CAS should install when this link moves to `index`.
    #[inline]
    pub(crate) const fn successor(&self, index: u32) -> Self {
        Self::new(index, self.tag().wrapping_add(1))
    }
}

impl std::fmt::Debug for TaggedIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_nil() {
            write!(f, "nil@{}", self.tag())
        } else {
            write!(f, "{}@{}", self.index(), self.tag())
        }
    }
}

/// Atomic cell holding a [`TaggedIndex`].
pub(crate) struct AtomicTaggedIndex {
    raw: AtomicU64,
}

impl AtomicTaggedIndex {
    pub(crate) const fn new(value: TaggedIndex) -> Self {
        AtomicTaggedIndex {
            raw: AtomicU64::new(value.raw),
        }
    }

    #[inline]
    pub(crate) fn load(&self, order: Ordering) -> TaggedIndex {
        TaggedIndex::from_raw(self.raw.load(order))
    }

    #[inline]
    pub(crate) fn compare_exchange(
        &self,
        current: TaggedIndex,
        new: TaggedIndex,
        success: Ordering,
        failure: Ordering,
    ) -> Result<TaggedIndex, TaggedIndex> {
        self.raw
            .compare_exchange(current.raw, new.raw, success, failure)
            .map(TaggedIndex::from_raw)
            .map_err(TaggedIndex::from_raw)
    }

    #[inline]
    pub(crate) fn compare_exchange_weak(
        &self,
        current: TaggedIndex,
        new: TaggedIndex,
        success: Ordering,
        failure: Ordering,
    ) -> Result<TaggedIndex, TaggedIndex> {
        self.raw
            .compare_exchange_weak(current.raw, new.raw, success, failure)
            .map(TaggedIndex::from_raw)
            .map_err(TaggedIndex::from_raw)
    }

    /// Point the link at `index`, bumping the tag (Release ordering).
    ///
    /// Implemented as an update loop rather than a plain store so that no
    /// concurrent CAS holding an older tag can be overwritten silently.
    ///
    #[inline]
    pub(crate) fn relink(&self, index: u32) -> TaggedIndex {
        let previous = self
            .raw
            .fetch_update(Ordering::Release, Ordering::Relaxed, |raw| {
                Some(TaggedIndex::from_raw(raw).successor(index).raw)
            })
            .unwrap_or_else(|raw| raw);

        TaggedIndex::from_raw(previous)
    }
}
