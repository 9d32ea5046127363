use std::hash::{Hash, Hasher};

use ahash::AHasher;

/// Hash of a value's data, used to detect modification between passes.
///
/// Implement it for your own types to control what counts as a change, for
/// example to skip caches or derived fields.
pub trait DataHash {
    fn data_hash(&self) -> u64;
}

/// Stable (per process) u64 hash of any `Hash` value.
pub fn compute_hash<T: Hash + ?Sized>(value: &T) -> u64 {
    let mut h = AHasher::default();
    value.hash(&mut h);
    h.finish()
}

pub fn hash_bytes(bytes: &[u8]) -> u64 {
    let mut h = AHasher::default();
    h.write(bytes);
    h.finish()
}

/// Combines a list of data hashes in order.
pub fn combine_hashes(hashes: impl IntoIterator<Item = u64>) -> u64 {
    let mut h = AHasher::default();
    for v in hashes {
        h.write_u64(v);
    }
    h.finish()
}

macro_rules! data_hash_via_hash {
    ($($t:ty),* $(,)?) => {
        $(impl DataHash for $t {
            fn data_hash(&self) -> u64 {
                compute_hash(self)
            }
        })*
    };
}

data_hash_via_hash!(
    bool, char, i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, str, String
);

impl DataHash for f32 {
    fn data_hash(&self) -> u64 {
        compute_hash(&self.to_bits())
    }
}

impl DataHash for f64 {
    fn data_hash(&self) -> u64 {
        compute_hash(&self.to_bits())
    }
}

impl<T: DataHash> DataHash for [T] {
    fn data_hash(&self) -> u64 {
        combine_hashes(std::iter::once(self.len() as u64).chain(self.iter().map(T::data_hash)))
    }
}

impl<T: DataHash> DataHash for Vec<T> {
    fn data_hash(&self) -> u64 {
        self.as_slice().data_hash()
    }
}

impl<T: DataHash> DataHash for Option<T> {
    fn data_hash(&self) -> u64 {
        match self {
            Some(v) => combine_hashes([1, v.data_hash()]),
            None => 0,
        }
    }
}

impl<T: DataHash + ?Sized> DataHash for &T {
    fn data_hash(&self) -> u64 {
        (**self).data_hash()
    }
}
