use core::fmt;

#[cfg(not(feature = "narrow-words"))]
type Bits = usize;

#[cfg(feature = "narrow-words")]
type Bits = u16;

/// One operand stack slot.
///
/// Normally as wide as a pointer. The `narrow-words` feature shrinks it to
/// two bytes so that most values span several words.
#[derive(Clone, Copy, Default, PartialEq, Eq)]
#[repr(transparent)]
pub struct Word(Bits);

/// Size of a [`Word`] in bytes.
pub const WORD_SIZE: usize = size_of::<Word>();

const _: () = assert!(WORD_SIZE.is_power_of_two(), "word size must be a power of two");

/// Number of words needed to hold `bytes` bytes.
#[inline(always)]
pub const fn required_words(bytes: usize) -> usize {
    bytes.div_ceil(WORD_SIZE)
}

impl Word {
    pub const ZERO: Word = Word(0);
}

impl fmt::Debug for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Word({:#x})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_size_is_power_of_two() {
        assert!(WORD_SIZE.is_power_of_two());
        #[cfg(not(feature = "narrow-words"))]
        assert_eq!(WORD_SIZE, size_of::<usize>());
        #[cfg(feature = "narrow-words")]
        assert_eq!(WORD_SIZE, 2);
    }

    #[test]
    fn required_words_rounds_up() {
        assert_eq!(required_words(0), 0);
        assert_eq!(required_words(1), 1);
        assert_eq!(required_words(WORD_SIZE), 1);
        assert_eq!(required_words(WORD_SIZE + 1), 2);
        assert_eq!(required_words(16), 16 / WORD_SIZE);
    }
}
