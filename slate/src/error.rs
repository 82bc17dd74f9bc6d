use bytecode::{BuiltInType, BytecodeError, Op};
use thiserror::Error;

/// Everything that can abort an execution.
///
/// None of these are recoverable inside the VM; the current call unwinds and
/// its pooled stack and frames go back to their pools.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VmError {
    #[error("operand stack overflow")]
    StackOverflow,

    #[error("operand stack underflow")]
    StackUnderflow,

    #[error("slot {slot} is not below the stack offset {offset}")]
    SlotOutOfRange { slot: usize, offset: usize },

    #[error("call stack overflow ({depth} frames)")]
    CallStackOverflow { depth: usize },

    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: BuiltInType,
        found: &'static str,
    },

    #[error("expected {expected} argument words, found {found}")]
    ArgumentCountMismatch { expected: usize, found: usize },

    #[error("{function} left {found} words on return, expected {expected}")]
    ReturnCountMismatch {
        function: String,
        expected: usize,
        found: usize,
    },

    #[error("cannot call `{function}` as `{found}`")]
    SignatureMismatch { function: String, found: String },

    #[error("invalid or released object handle {0:#x}")]
    InvalidHandle(usize),

    #[error("{} is not defined for {ty}", op.name())]
    InvalidOperand { op: Op, ty: BuiltInType },

    #[error("arithmetic overflow in {ty} {}", op.name())]
    ArithmeticOverflow { op: Op, ty: BuiltInType },

    #[error("native call failed: {0}")]
    NativeCall(String),

    #[error(transparent)]
    Bytecode(#[from] BytecodeError),
}

impl VmError {
    pub(crate) fn type_mismatch(expected: BuiltInType, found: Option<BuiltInType>) -> Self {
        VmError::TypeMismatch {
            expected,
            found: found.map_or("nothing", BuiltInType::name),
        }
    }
}
