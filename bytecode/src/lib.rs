mod word;
mod decimal;
mod types;
mod error;
mod op;
mod instruction;
mod constants;
mod code;
mod lines;
mod chunk;
mod builder;

pub use word::{Word, WORD_SIZE, required_words};
pub use decimal::Decimal;
pub use types::{BuiltInType, HANDLE_SIZE, Object, Primitive};
pub use error::BytecodeError;
pub use op::Op;
pub use instruction::{Instruction, RawInstruction};
pub use constants::{ConstantPool, ConstantPoolWriter, ConstantPosition};
pub use code::{CodeBlock, CodeBlockWriter};
pub use lines::LineTracker;
pub use chunk::Chunk;
pub use builder::ChunkBuilder;
