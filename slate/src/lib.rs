/// Expands `$body` once per value type with `$T` bound to its Rust type, and
/// `$object` for the reference type.
macro_rules! dispatch_primitive {
    ($ty:expr, $T:ident => $body:expr, object => $object:expr $(,)?) => {
        match $ty {
            ::bytecode::BuiltInType::Bool => {
                type $T = bool;
                $body
            }
            ::bytecode::BuiltInType::Byte => {
                type $T = u8;
                $body
            }
            ::bytecode::BuiltInType::SByte => {
                type $T = i8;
                $body
            }
            ::bytecode::BuiltInType::Char => {
                type $T = char;
                $body
            }
            ::bytecode::BuiltInType::Decimal => {
                type $T = ::bytecode::Decimal;
                $body
            }
            ::bytecode::BuiltInType::Double => {
                type $T = f64;
                $body
            }
            ::bytecode::BuiltInType::Float => {
                type $T = f32;
                $body
            }
            ::bytecode::BuiltInType::Int => {
                type $T = i32;
                $body
            }
            ::bytecode::BuiltInType::UInt => {
                type $T = u32;
                $body
            }
            ::bytecode::BuiltInType::Long => {
                type $T = i64;
                $body
            }
            ::bytecode::BuiltInType::ULong => {
                type $T = u64;
                $body
            }
            ::bytecode::BuiltInType::Short => {
                type $T = i16;
                $body
            }
            ::bytecode::BuiltInType::UShort => {
                type $T = u16;
                $body
            }
            ::bytecode::BuiltInType::Object => $object,
        }
    };
}

mod error;
mod pool;
mod handles;
mod tags;
mod stack;
mod frame;
mod operand;
mod function;
mod native;
mod vm;
pub mod interpreter;

pub use bytecode;
pub use bytecode::{BuiltInType, Chunk, ChunkBuilder, Decimal, Object};

pub use error::VmError;
pub use pool::{Pool, PoolStats};
pub use handles::{HandleTable, NULL_HANDLE};
pub use tags::TypeTags;
pub use stack::{HANDLE_WORDS, OperandStack, StackPool, StackStorage};
pub use frame::{Frame, FramePool, FrameStack};
pub use operand::{Arguments, Operand, Returns};
pub use function::{Function, FunctionArgument, FunctionDefinition, TypedFunction};
pub use native::{ExternalFunction, NativeCall};
pub use vm::{VM, VMCreateInfo};
