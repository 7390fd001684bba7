//! Participation bits for AND groups.
//!
//! Each member of each AND group owns one bit; a set bit means the member has
//! already been matched and was left for a sibling. Bits at or above
//! `clear_from` are always zero, so clearing a suffix only touches the bits
//! that were actually set since the last clear.

const WORD_BITS: usize = u64::BITS as usize;

#[derive(Debug, Clone)]
pub struct AndState {
    words: Vec<u64>,
    len: usize,
    clear_from: usize,
}

impl AndState {
    /// A state of `len` bits, all clear.
    pub fn new(len: usize) -> Self {
        Self {
            words: vec![0; len.div_ceil(WORD_BITS)],
            len,
            clear_from: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_clear(&self, i: usize) -> bool {
        i >= self.clear_from || !self.bit(i)
    }

    pub fn set(&mut self, i: usize) {
        assert!(i < self.len, "and-state bit {i} out of range {}", self.len);
        self.words[i / WORD_BITS] |= 1u64 << (i % WORD_BITS);
        if i >= self.clear_from {
            self.clear_from = i + 1;
        }
    }

    /// Clear every bit at index `i` or above.
    pub fn clear_from(&mut self, i: usize) {
        while self.clear_from > i {
            self.clear_from -= 1;
            let c = self.clear_from;
            self.words[c / WORD_BITS] &= !(1u64 << (c % WORD_BITS));
        }
    }

    fn bit(&self, i: usize) -> bool {
        self.words[i / WORD_BITS] & (1u64 << (i % WORD_BITS)) != 0
    }
}

impl PartialEq for AndState {
    fn eq(&self, other: &Self) -> bool {
        debug_assert_eq!(self.len, other.len);
        let upto = self.clear_from.max(other.clear_from);
        (0..upto).all(|i| self.bit(i) == other.bit(i))
    }
}

impl Eq for AndState {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_state_is_clear() {
        let s = AndState::new(5);
        assert!((0..5).all(|i| s.is_clear(i)));
        assert!(AndState::new(0).is_empty());
    }

    #[test]
    fn set_then_clear_suffix() {
        let mut s = AndState::new(6);
        s.set(1);
        s.set(4);
        assert!(!s.is_clear(1));
        assert!(!s.is_clear(4));
        s.clear_from(3);
        assert!(!s.is_clear(1));
        assert!(s.is_clear(4));
        s.clear_from(0);
        assert!(s.is_clear(1));
    }

    #[test]
    fn spans_multiple_words() {
        let mut s = AndState::new(130);
        s.set(129);
        s.set(64);
        assert!(!s.is_clear(129));
        assert!(!s.is_clear(64));
        assert!(s.is_clear(63));
        s.clear_from(65);
        assert!(s.is_clear(129));
        assert!(!s.is_clear(64));
    }

    #[test]
    fn equality_ignores_cleared_history() {
        let mut a = AndState::new(4);
        let b = AndState::new(4);
        a.set(2);
        assert_ne!(a, b);
        a.clear_from(0);
        assert_eq!(a, b);

        let mut c = AndState::new(4);
        let mut d = AndState::new(4);
        c.set(0);
        d.set(0);
        d.set(3);
        d.clear_from(1);
        assert_eq!(c, d);
    }
}
