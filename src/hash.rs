//! Zero-sized hash builder for the registry's internal lookup tables.
//!
//! Keys hashed here are listener addresses and arena indices, none of which
//! are attacker controlled, so a fixed-seed foldhash is enough.

use std::hash::BuildHasher;

pub use foldhash::fast::{FixedState, FoldHasher};

/// A zero-sized BuildHasher that uses foldhash with a fixed seed.
///
/// Every table in a channel shares the same hasher type without storing any
/// per-table state, which keeps an empty channel small.
#[derive(Clone, Copy, Debug, Default)]
pub struct FastHashBuilder;

impl BuildHasher for FastHashBuilder {
    type Hasher = FoldHasher<'static>;

    #[inline]
    fn build_hasher(&self) -> Self::Hasher {
        FixedState::with_seed(0x2d35_8dcc_aa6c_78a5).build_hasher()
    }
}
