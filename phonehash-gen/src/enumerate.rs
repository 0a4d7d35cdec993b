use compact_str::{CompactString, format_compact};

/// All identifiers formed by one prefix and every zero-padded decimal suffix
/// of a fixed width.
///
/// The space is cheap to clone and can be iterated any number of times;
/// iteration is ascending by suffix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierSpace {
    prefix: CompactString,
    suffix_width: usize,
}

impl IdentifierSpace {
    pub fn new(prefix: impl Into<CompactString>, suffix_width: usize) -> Self {
        Self { prefix: prefix.into(), suffix_width }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// 10^suffix_width
    pub fn len(&self) -> u64 {
        10u64.pow(self.suffix_width as u32)
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn iter(&self) -> Identifiers<'_> {
        Identifiers { space: self, next: 0, end: self.len() }
    }
}

impl<'a> IntoIterator for &'a IdentifierSpace {
    type Item = CompactString;
    type IntoIter = Identifiers<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Lazy iterator over an [`IdentifierSpace`].
#[derive(Debug, Clone)]
pub struct Identifiers<'a> {
    space: &'a IdentifierSpace,
    next: u64,
    end: u64,
}

impl Iterator for Identifiers<'_> {
    type Item = CompactString;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.end {
            return None;
        }
        let suffix = self.next;
        self.next += 1;
        Some(format_compact!(
            "{}{:0width$}",
            self.space.prefix,
            suffix,
            width = self.space.suffix_width
        ))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.end - self.next) as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Identifiers<'_> {}
