/// Bytecode opcodes, stored in byte 0 of every instruction.
///
/// Every instruction is exactly four bytes. The three payload bytes are laid
/// out per opcode; positions are little-endian `u16` constant pool offsets
/// and local offsets are counted in words from the frame base.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Op {
    /// Push a constant pool value.
    /// Payload: `type:u8`, `position:u16`
    Constant = 0x00,

    /// Pop two values, push their sum.
    /// Payload: `type:u8`
    Add,

    /// Move the return words down to the frame base and pop the frame.
    /// Payload: none
    Return,

    /// Call a `Function` constant. Arguments are already on the stack.
    /// Payload: `_:u8`, `position:u16`
    Call,

    /// Discard the top value, releasing its handle for reference kinds.
    /// Payload: `type:u8`
    Pop,

    /// Pop a value into a frame slot.
    /// Payload: `type:u8`, `offset:u8`
    SetLocal,

    /// Push a copy of a frame slot. Reference kinds get a fresh handle.
    /// Payload: `type:u8`, `offset:u8`
    GetLocal,

    /// Call a host function constant through the native bridge.
    /// Payload: `_:u8`, `position:u16`
    ExternalCall,
}

impl Op {
    pub const COUNT: usize = Op::ExternalCall as usize + 1;

    /// Convert a raw byte to an opcode without a bounds check.
    ///
    /// # Safety
    ///
    /// `byte` must be a valid opcode value (`< Op::COUNT`).
    #[inline(always)]
    pub unsafe fn from_u8_unchecked(byte: u8) -> Self {
        debug_assert!(
            (byte as usize) < Self::COUNT,
            "invalid opcode: 0x{byte:02x}"
        );
        // SAFETY: Op is repr(u8) with contiguous variants starting at 0 and
        // the caller guarantees the range.
        unsafe { core::mem::transmute::<u8, Op>(byte) }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Op::Constant => "CONSTANT",
            Op::Add => "ADD",
            Op::Return => "RETURN",
            Op::Call => "CALL",
            Op::Pop => "POP",
            Op::SetLocal => "SET_LOCAL",
            Op::GetLocal => "GET_LOCAL",
            Op::ExternalCall => "EXTERNAL_CALL",
        }
    }

    /// Whether payload byte 1 carries a [`BuiltInType`](crate::BuiltInType).
    pub const fn has_type_operand(self) -> bool {
        matches!(
            self,
            Op::Constant | Op::Add | Op::Pop | Op::SetLocal | Op::GetLocal
        )
    }
}

impl TryFrom<u8> for Op {
    type Error = u8;

    fn try_from(byte: u8) -> Result<Self, u8> {
        if byte < Self::COUNT as u8 {
            // SAFETY: range checked above.
            Ok(unsafe { Self::from_u8_unchecked(byte) })
        } else {
            Err(byte)
        }
    }
}
