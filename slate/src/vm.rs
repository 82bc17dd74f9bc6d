use std::sync::Arc;

use crate::error::VmError;
use crate::frame::{FramePool, FrameStack};
use crate::function::Function;
use crate::interpreter;
use crate::operand::{Arguments, Returns};
use crate::pool::PoolStats;
use crate::stack::{OperandStack, StackPool};

#[derive(Debug, Clone)]
pub struct VMCreateInfo {
    /// Operand stack capacity in words.
    pub stack_depth: usize,
    /// Deepest call chain before `CallStackOverflow`.
    pub max_frames: usize,
    /// Operand stacks kept around for reuse.
    pub stack_pool_size: usize,
    /// Frame stacks kept around for reuse.
    pub frame_pool_size: usize,
}

impl Default for VMCreateInfo {
    fn default() -> Self {
        Self {
            stack_depth: 1024,
            max_frames: 512,
            stack_pool_size: 16,
            frame_pool_size: 12,
        }
    }
}

/// Host side of the VM.
///
/// Holds the pools that operand stacks and frame stacks are drawn from. Each
/// call gets its own stack and frames, so one `VM` can serve any number of
/// threads at once.
#[derive(Debug)]
pub struct VM {
    info: VMCreateInfo,
    stacks: Arc<StackPool>,
    frames: Arc<FramePool>,
}

impl VM {
    pub fn new(info: VMCreateInfo) -> Self {
        Self {
            stacks: Arc::new(StackPool::new(info.stack_pool_size)),
            frames: Arc::new(FramePool::new(info.frame_pool_size)),
            info,
        }
    }

    pub fn info(&self) -> &VMCreateInfo {
        &self.info
    }

    pub fn create_stack(&self) -> OperandStack {
        OperandStack::create(&self.stacks, self.info.stack_depth)
    }

    pub fn create_frames(&self) -> FrameStack {
        FrameStack::create(&self.frames, self.info.max_frames)
    }

    pub fn stack_pool_stats(&self) -> PoolStats {
        self.stacks.stats()
    }

    pub fn frame_pool_stats(&self) -> PoolStats {
        self.frames.stats()
    }

    /// Runs a function that takes no arguments and returns nothing.
    pub fn invoke(&self, function: &Arc<Function>) -> Result<(), VmError> {
        self.call::<(), ()>(function, ())
    }

    /// Checks `A -> R` against the function's definition, then runs it.
    pub fn call<A: Arguments, R: Returns>(
        &self,
        function: &Arc<Function>,
        args: A,
    ) -> Result<R, VmError> {
        function.definition().check_signature::<A, R>()?;
        self.call_unchecked(function, args)
    }

    pub(crate) fn call_unchecked<A: Arguments, R: Returns>(
        &self,
        function: &Arc<Function>,
        args: A,
    ) -> Result<R, VmError> {
        let mut stack = self.create_stack();
        let mut frames = self.create_frames();
        interpreter::execute(&mut frames, &mut stack, function, args)
    }
}

impl Default for VM {
    fn default() -> Self {
        Self::new(VMCreateInfo::default())
    }
}
