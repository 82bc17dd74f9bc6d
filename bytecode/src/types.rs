use core::any::Any;
use core::fmt;
use std::sync::Arc;

use crate::decimal::Decimal;
use crate::word::required_words;

/// An externally owned reference-kind value.
///
/// The VM never looks inside; it only moves handles to these around.
pub type Object = Arc<dyn Any + Send + Sync>;

/// Size of a reference handle, both in constant pools and on the stack.
pub const HANDLE_SIZE: usize = size_of::<usize>();

/// Runtime representation tag of every value the VM can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BuiltInType {
    Bool = 0x00,
    Byte,
    SByte,
    Char,
    Decimal,
    Double,
    Float,
    Int,
    UInt,
    Long,
    ULong,
    Short,
    UShort,
    /// Reference kind: stored as a handle, never inline.
    Object,
}

impl BuiltInType {
    pub const COUNT: usize = BuiltInType::Object as usize + 1;

    pub const ALL: [BuiltInType; Self::COUNT] = [
        BuiltInType::Bool,
        BuiltInType::Byte,
        BuiltInType::SByte,
        BuiltInType::Char,
        BuiltInType::Decimal,
        BuiltInType::Double,
        BuiltInType::Float,
        BuiltInType::Int,
        BuiltInType::UInt,
        BuiltInType::Long,
        BuiltInType::ULong,
        BuiltInType::Short,
        BuiltInType::UShort,
        BuiltInType::Object,
    ];

    /// Size of the value in bytes. Reference kinds report the handle size.
    pub const fn size(self) -> usize {
        match self {
            BuiltInType::Bool => size_of::<bool>(),
            BuiltInType::Byte => size_of::<u8>(),
            BuiltInType::SByte => size_of::<i8>(),
            BuiltInType::Char => size_of::<char>(),
            BuiltInType::Decimal => size_of::<Decimal>(),
            BuiltInType::Double => size_of::<f64>(),
            BuiltInType::Float => size_of::<f32>(),
            BuiltInType::Int => size_of::<i32>(),
            BuiltInType::UInt => size_of::<u32>(),
            BuiltInType::Long => size_of::<i64>(),
            BuiltInType::ULong => size_of::<u64>(),
            BuiltInType::Short => size_of::<i16>(),
            BuiltInType::UShort => size_of::<u16>(),
            BuiltInType::Object => HANDLE_SIZE,
        }
    }

    /// Number of stack words one value occupies.
    #[inline(always)]
    pub const fn word_count(self) -> usize {
        required_words(self.size())
    }

    pub const fn is_reference(self) -> bool {
        matches!(self, BuiltInType::Object)
    }

    pub const fn name(self) -> &'static str {
        match self {
            BuiltInType::Bool => "bool",
            BuiltInType::Byte => "byte",
            BuiltInType::SByte => "sbyte",
            BuiltInType::Char => "char",
            BuiltInType::Decimal => "decimal",
            BuiltInType::Double => "double",
            BuiltInType::Float => "float",
            BuiltInType::Int => "int",
            BuiltInType::UInt => "uint",
            BuiltInType::Long => "long",
            BuiltInType::ULong => "ulong",
            BuiltInType::Short => "short",
            BuiltInType::UShort => "ushort",
            BuiltInType::Object => "object",
        }
    }
}

impl TryFrom<u8> for BuiltInType {
    type Error = u8;

    fn try_from(byte: u8) -> Result<Self, u8> {
        Self::ALL.get(byte as usize).copied().ok_or(byte)
    }
}

impl fmt::Display for BuiltInType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A value-kind built-in type that is copied byte for byte into words and
/// constant pools.
pub trait Primitive: Copy + PartialEq + fmt::Debug + fmt::Display + Send + Sync + 'static {
    const TYPE: BuiltInType;
    const SIZE: usize = size_of::<Self>();
    const WORDS: usize = required_words(Self::SIZE);

    /// Writes the value's raw bytes.
    ///
    /// # Safety
    ///
    /// `dst` must be valid for writes of `Self::SIZE` bytes. No alignment is
    /// required.
    unsafe fn store(self, dst: *mut u8);

    /// Reads a value back from raw bytes. Any bit pattern yields a valid
    /// value.
    ///
    /// # Safety
    ///
    /// `src` must be valid for reads of `Self::SIZE` bytes. No alignment is
    /// required.
    unsafe fn load(src: *const u8) -> Self;
}

macro_rules! plain_primitive {
    ($($ty:ty => $tag:ident),* $(,)?) => {
        $(
            impl Primitive for $ty {
                const TYPE: BuiltInType = BuiltInType::$tag;

                #[inline(always)]
                unsafe fn store(self, dst: *mut u8) {
                    // SAFETY: caller guarantees `dst` covers SIZE bytes
                    unsafe { dst.cast::<$ty>().write_unaligned(self) }
                }

                #[inline(always)]
                unsafe fn load(src: *const u8) -> Self {
                    // SAFETY: caller guarantees `src` covers SIZE bytes, every
                    // bit pattern of this type is valid
                    unsafe { src.cast::<$ty>().read_unaligned() }
                }
            }
        )*
    };
}

plain_primitive! {
    u8 => Byte,
    i8 => SByte,
    Decimal => Decimal,
    f64 => Double,
    f32 => Float,
    i32 => Int,
    u32 => UInt,
    i64 => Long,
    u64 => ULong,
    i16 => Short,
    u16 => UShort,
}

impl Primitive for bool {
    const TYPE: BuiltInType = BuiltInType::Bool;

    #[inline(always)]
    unsafe fn store(self, dst: *mut u8) {
        // SAFETY: caller guarantees one writable byte
        unsafe { dst.write(self as u8) }
    }

    #[inline(always)]
    unsafe fn load(src: *const u8) -> Self {
        // SAFETY: caller guarantees one readable byte
        unsafe { src.read() != 0 }
    }
}

impl Primitive for char {
    const TYPE: BuiltInType = BuiltInType::Char;

    #[inline(always)]
    unsafe fn store(self, dst: *mut u8) {
        // SAFETY: caller guarantees four writable bytes
        unsafe { dst.cast::<u32>().write_unaligned(self as u32) }
    }

    #[inline(always)]
    unsafe fn load(src: *const u8) -> Self {
        // SAFETY: caller guarantees four readable bytes
        let bits = unsafe { src.cast::<u32>().read_unaligned() };
        char::from_u32(bits).unwrap_or(char::REPLACEMENT_CHARACTER)
    }
}
