use std::fmt;

/// Widest shard key accepted (16^6 = 16,777,216 artifacts per algorithm)
pub const MAX_SHARD_KEY_WIDTH: usize = 6;

/// Lowercase hex digit to its value (0-15)
#[inline]
fn hex_to_nibble(c: u8) -> u8 {
    match c {
        b'0'..=b'9' => c - b'0',
        b'a'..=b'f' => c - b'a' + 10,
        _ => panic!("not a lowercase hex digit: {}", c as char),
    }
}

/// Number of shards addressable by a key of `width` hex characters (16^width)
#[inline]
pub fn shard_count(width: usize) -> u32 {
    1 << (4 * width)
}

/// Address of one shard: the leading `width` hex characters of a digest,
/// held as their numeric value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShardKey {
    index: u32,
    width: u8,
}

impl ShardKey {
    pub fn new(index: u32, width: usize) -> Self {
        debug_assert!(width <= MAX_SHARD_KEY_WIDTH);
        debug_assert!(index < shard_count(width));
        Self { index, width: width as u8 }
    }

    /// Every key of the given width in ascending order.
    pub fn all(width: usize) -> impl Iterator<Item = ShardKey> {
        (0..shard_count(width)).map(move |index| ShardKey::new(index, width))
    }

    #[inline]
    pub fn index(&self) -> u32 {
        self.index
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width as usize
    }

    /// Artifact file name, e.g. `00af.json`
    pub fn file_name(&self) -> String {
        format!("{self}.json")
    }
}

impl fmt::Display for ShardKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:0width$x}", self.index, width = self.width())
    }
}

/// Split a hex digest into the shard it belongs to and the remainder stored
/// inside that shard.
///
/// # Panics
///
/// If `digest` is shorter than `width` or its first `width` characters are
/// not lowercase hex. Digests from [`crate::HashAlgorithm::digest`] under a
/// validated config always fit and leave a non-empty remainder.
#[inline]
pub fn partition(digest: &str, width: usize) -> (ShardKey, &str) {
    let (key, remainder) = digest.split_at(width);
    let index = key
        .bytes()
        .fold(0u32, |acc, c| (acc << 4) | hex_to_nibble(c) as u32);
    (ShardKey::new(index, width), remainder)
}
