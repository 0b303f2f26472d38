use core::hash::Hash;
use std::hash::Hasher;

#[cfg(feature = "std-hash")]
pub mod default {
    pub use std::collections::hash_map::DefaultHasher;

    #[inline]
    pub fn new() -> DefaultHasher {
        DefaultHasher::new()
    }
}

#[cfg(not(feature = "std-hash"))]
pub mod default {
    pub use ahash::AHasher as DefaultHasher;

    #[inline]
    pub fn new() -> DefaultHasher {
        DefaultHasher::default()
    }
}

/// Hashes a single value with whichever default hasher is active.
#[inline]
pub fn hash_one<T: Hash>(v: &T) -> u64 {
    let mut h = default::new();
    v.hash(&mut h);
    h.finish()
}

/// Derives a [`crate::tree::ShapeKey`] from any hashable template identity.
///
/// Shape keys only need to agree when two renders produced the same
/// template, so hashing the template's identity (a pointer, a name, a
/// source location) is sufficient.
#[inline]
pub fn shape_key_of<T: Hash>(identity: &T) -> crate::tree::ShapeKey {
    hash_one(identity)
}
