use core::mem;
use std::sync::Arc;

use crate::function::Function;
use crate::pool::Pool;

/// One activation: which function runs, where it is, and where its
/// arguments start on the operand stack.
#[derive(Debug, Clone)]
pub struct Frame {
    pub function: Arc<Function>,
    /// Index of the next instruction to execute.
    pub ip: usize,
    /// First operand stack slot of the frame's arguments.
    pub base: usize,
}

pub type FramePool = Pool<Vec<Frame>>;

/// Bounded call stack.
pub struct FrameStack {
    frames: Vec<Frame>,
    max_frames: usize,
    pool: Arc<FramePool>,
}

impl FrameStack {
    pub fn create(pool: &Arc<FramePool>, max_frames: usize) -> Self {
        let mut frames = pool.acquire(|| Vec::with_capacity(max_frames));
        frames.clear();
        Self {
            frames,
            max_frames,
            pool: Arc::clone(pool),
        }
    }

    pub fn with_capacity(max_frames: usize) -> Self {
        Self::create(&Arc::new(Pool::new(0)), max_frames)
    }

    /// Pushes `frame` unless the stack is full. A full stack leaves the
    /// existing frames untouched and returns `false`.
    #[inline]
    #[must_use]
    pub fn try_push(&mut self, frame: Frame) -> bool {
        if self.frames.len() >= self.max_frames {
            return false;
        }
        self.frames.push(frame);
        true
    }

    /// Pops the current frame. Returns whether any frames remain.
    #[inline]
    pub fn pop(&mut self) -> bool {
        self.frames.pop();
        !self.frames.is_empty()
    }

    #[inline(always)]
    pub fn current(&self) -> Option<&Frame> {
        self.frames.last()
    }

    #[inline(always)]
    pub fn current_mut(&mut self) -> Option<&mut Frame> {
        self.frames.last_mut()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn max_frames(&self) -> usize {
        self.max_frames
    }

    /// Drops every frame, innermost first.
    pub fn clear(&mut self) {
        self.frames.clear();
    }
}

impl Drop for FrameStack {
    fn drop(&mut self) {
        let mut frames = mem::take(&mut self.frames);
        frames.clear();
        self.pool.release(frames);
    }
}

impl core::fmt::Debug for FrameStack {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list()
            .entries(
                self.frames
                    .iter()
                    .map(|frame| (frame.function.name(), frame.ip, frame.base)),
            )
            .finish()
    }
}
