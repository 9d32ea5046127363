//! Component identity.
//!
//! A [`CompKey`] pairs a structural position id with an optional
//! [`IterKey`]. Build functions compute the position id at each call site by
//! combining a site constant with the running position hash carried in
//! [`crate::BuildIn`]; the iteration key disambiguates siblings produced by
//! the same site inside a loop.

use std::fmt;
use std::hash::BuildHasher;

use crate::hash::hash_bytes;

/// Iteration key for components created inside a repeated construct.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum IterKey {
    Int(i64),
    Uint(u64),
    Str(String),
}

impl fmt::Display for IterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IterKey::Int(v) => write!(f, "{v}"),
            IterKey::Uint(v) => write!(f, "{v}"),
            IterKey::Str(s) => write!(f, "{s:?}"),
        }
    }
}

macro_rules! iter_key_from {
    ($variant:ident, $target:ty: $($t:ty),*) => {
        $(impl From<$t> for IterKey {
            fn from(v: $t) -> Self {
                IterKey::$variant(v as $target)
            }
        })*
    };
}

iter_key_from!(Int, i64: i8, i16, i32, i64, isize);
iter_key_from!(Uint, u64: u8, u16, u32, u64, usize);

impl From<&str> for IterKey {
    fn from(v: &str) -> Self {
        IterKey::Str(v.to_owned())
    }
}

impl From<String> for IterKey {
    fn from(v: String) -> Self {
        IterKey::Str(v)
    }
}

impl From<&String> for IterKey {
    fn from(v: &String) -> Self {
        IterKey::Str(v.clone())
    }
}

/// Key used to identify and look up a component instance in the cache.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CompKey {
    /// Structural position id (site constant mixed with the position hash).
    pub id: u64,
    /// Distinguishes loop iterations of the same call site.
    pub iter: Option<IterKey>,
}

impl CompKey {
    pub fn new(id: u64, iter: Option<IterKey>) -> Self {
        Self { id, iter }
    }

    /// Key for a non-repeating call site.
    pub fn site(id: u64) -> Self {
        Self { id, iter: None }
    }

    /// Forms an id from unix seconds (upper 32 bits) and `data` (lower 32 bits).
    pub fn id_from_time(unix_secs: u64, data: u32) -> u64 {
        (unix_secs << 32) | u64::from(data)
    }

    /// Like [`CompKey::id_from_time`] with the lower bits taken from a hash of `bytes`.
    pub fn id_from_time_hash(unix_secs: u64, bytes: &[u8]) -> u64 {
        Self::id_from_time(unix_secs, hash_bytes(bytes) as u32)
    }

    /// Current time in the upper bits, randomized lower bits. Intended for
    /// code generators that embed site ids into generated build functions.
    pub fn id_now_rand() -> u64 {
        let now = web_time::SystemTime::now()
            .duration_since(web_time::UNIX_EPOCH)
            .unwrap_or_default();
        let low = ahash::RandomState::new().hash_one(now.as_nanos()) as u32;
        Self::id_from_time(now.as_secs(), low)
    }

    /// Position hash a component built under this key starts its own walk with.
    ///
    /// Seeding child walks from the parent key keeps call sites inside two
    /// instances of the same component type from colliding in the cache.
    pub fn position_seed(&self) -> u64 {
        let iter = self.iter.as_ref().map(crate::hash::compute_hash).unwrap_or(0);
        mix_position(self.id, iter)
    }
}

impl fmt::Display for CompKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.iter {
            Some(iter) => write!(f, "{:#018x}[{iter}]", self.id),
            None => write!(f, "{:#018x}", self.id),
        }
    }
}

/// Folds a site id into an enclosing position hash.
///
/// Splitmix-style finalizer: deterministic, and nearby inputs spread over
/// the whole word so XOR-ing site constants against the result stays unique.
pub fn mix_position(parent: u64, site: u64) -> u64 {
    let mut z = parent.rotate_left(29) ^ site.wrapping_add(0x9e37_79b9_7f4a_7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}
