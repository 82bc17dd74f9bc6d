use core::fmt;

use crate::constants::ConstantPosition;
use crate::error::BytecodeError;
use crate::op::Op;
use crate::types::BuiltInType;

/// An encoded instruction exactly as it sits in a code block: opcode tag in
/// byte 0, payload in bytes 1..4.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
#[repr(C, align(4))]
pub struct RawInstruction([u8; 4]);

const _: () = assert!(size_of::<RawInstruction>() == 4);

impl RawInstruction {
    #[inline(always)]
    pub const fn from_bytes(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    #[inline(always)]
    pub const fn to_bytes(self) -> [u8; 4] {
        self.0
    }

    #[inline(always)]
    pub const fn tag(self) -> u8 {
        self.0[0]
    }
}

impl fmt::Debug for RawInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d] = self.0;
        write!(f, "RawInstruction({a:02x} {b:02x} {c:02x} {d:02x})")
    }
}

/// A decoded instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    Constant {
        ty: BuiltInType,
        position: ConstantPosition,
    },
    Add {
        ty: BuiltInType,
    },
    Return,
    Call {
        position: ConstantPosition,
    },
    Pop {
        ty: BuiltInType,
    },
    SetLocal {
        ty: BuiltInType,
        offset: u8,
    },
    GetLocal {
        ty: BuiltInType,
        offset: u8,
    },
    ExternalCall {
        position: ConstantPosition,
    },
}

impl Instruction {
    pub const fn op(&self) -> Op {
        match self {
            Self::Constant { .. } => Op::Constant,
            Self::Add { .. } => Op::Add,
            Self::Return => Op::Return,
            Self::Call { .. } => Op::Call,
            Self::Pop { .. } => Op::Pop,
            Self::SetLocal { .. } => Op::SetLocal,
            Self::GetLocal { .. } => Op::GetLocal,
            Self::ExternalCall { .. } => Op::ExternalCall,
        }
    }

    pub const fn encode(self) -> RawInstruction {
        let op = self.op() as u8;
        let bytes = match self {
            Self::Constant { ty, position } => {
                let [lo, hi] = position.to_le_bytes();
                [op, ty as u8, lo, hi]
            }
            Self::Add { ty } | Self::Pop { ty } => [op, ty as u8, 0, 0],
            Self::Return => [op, 0, 0, 0],
            Self::Call { position } | Self::ExternalCall { position } => {
                let [lo, hi] = position.to_le_bytes();
                [op, 0, lo, hi]
            }
            Self::SetLocal { ty, offset } | Self::GetLocal { ty, offset } => {
                [op, ty as u8, offset, 0]
            }
        };
        RawInstruction(bytes)
    }

    pub fn decode(raw: RawInstruction) -> Result<Self, BytecodeError> {
        let [tag, a, b, c] = raw.0;
        let op = Op::try_from(tag).map_err(BytecodeError::UnknownOpcode)?;
        let ty = || BuiltInType::try_from(a).map_err(BytecodeError::UnknownTypeTag);
        let position = ConstantPosition::from_le_bytes([b, c]);

        Ok(match op {
            Op::Constant => Self::Constant { ty: ty()?, position },
            Op::Add => Self::Add { ty: ty()? },
            Op::Return => Self::Return,
            Op::Call => Self::Call { position },
            Op::Pop => Self::Pop { ty: ty()? },
            Op::SetLocal => Self::SetLocal { ty: ty()?, offset: b },
            Op::GetLocal => Self::GetLocal { ty: ty()?, offset: b },
            Op::ExternalCall => Self::ExternalCall { position },
        })
    }
}

impl From<Instruction> for RawInstruction {
    fn from(instruction: Instruction) -> Self {
        instruction.encode()
    }
}

impl TryFrom<RawInstruction> for Instruction {
    type Error = BytecodeError;

    fn try_from(raw: RawInstruction) -> Result<Self, BytecodeError> {
        Self::decode(raw)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.op().name();
        match self {
            Self::Constant { ty, position } => write!(f, "{name} {ty} {position}"),
            Self::Add { ty } | Self::Pop { ty } => write!(f, "{name} {ty}"),
            Self::Return => f.write_str(name),
            Self::Call { position } | Self::ExternalCall { position } => {
                write!(f, "{name} {position}")
            }
            Self::SetLocal { ty, offset } | Self::GetLocal { ty, offset } => {
                write!(f, "{name} {ty} [{offset}]")
            }
        }
    }
}
