use thiserror::Error;

/// Errors raised while building or reading compiled artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BytecodeError {
    #[error("unknown opcode 0x{0:02x}")]
    UnknownOpcode(u8),

    #[error("unknown type tag 0x{0:02x}")]
    UnknownTypeTag(u8),

    #[error("constant pool read of {size} bytes at position {position} is not aligned")]
    Alignment { position: u16, size: usize },

    #[error("index {index} out of range for length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("constant pool is full ({len} bytes)")]
    ConstantPoolFull { len: usize },

    #[error("constant at position {position} is not a {expected}")]
    InvalidConstant {
        position: u16,
        expected: &'static str,
    },

    #[error("line {line} recorded after line {previous}")]
    LineOutOfOrder { line: u32, previous: u32 },

    #[error("instruction {offset} recorded after instruction {previous}")]
    OffsetOutOfOrder { offset: usize, previous: usize },
}
