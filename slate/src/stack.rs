use core::fmt;
use core::mem;
use std::sync::Arc;

use bytecode::{BuiltInType, HANDLE_SIZE, Object, Primitive, WORD_SIZE, Word, required_words};

use crate::error::VmError;
use crate::handles::{HandleTable, NULL_HANDLE};
use crate::pool::Pool;
use crate::tags::TypeTags;

/// Words taken by one object handle.
pub const HANDLE_WORDS: usize = required_words(HANDLE_SIZE);

/// Backing memory of an [`OperandStack`], recycled through a [`StackPool`].
#[derive(Debug)]
pub struct StackStorage {
    words: Box<[Word]>,
    handles: HandleTable,
    tags: TypeTags,
}

impl StackStorage {
    pub fn new(capacity: usize) -> Self {
        Self {
            words: vec![Word::ZERO; capacity].into_boxed_slice(),
            handles: HandleTable::new(),
            tags: TypeTags::new(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.words.len()
    }
}

pub type StackPool = Pool<StackStorage>;

/// Fixed-capacity stack of [`Word`]s.
///
/// Values occupy `T::WORDS` consecutive words starting at the slot they were
/// pushed to. Object references are kept in a per-stack [`HandleTable`] and
/// the words only hold the handle.
pub struct OperandStack {
    words: Box<[Word]>,
    offset: usize,
    handles: HandleTable,
    tags: TypeTags,
    pool: Arc<StackPool>,
}

impl OperandStack {
    /// Takes storage for `capacity` words from `pool`, allocating on a miss.
    pub fn create(pool: &Arc<StackPool>, capacity: usize) -> Self {
        let storage = pool.acquire_where(
            |storage| storage.capacity() == capacity,
            || StackStorage::new(capacity),
        );
        Self {
            words: storage.words,
            offset: 0,
            handles: storage.handles,
            tags: storage.tags,
            pool: Arc::clone(pool),
        }
    }

    /// A stack that is not shared with any pool.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::create(&Arc::new(Pool::new(0)), capacity)
    }

    #[inline(always)]
    pub fn offset(&self) -> usize {
        self.offset
    }

    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offset == 0
    }

    /// Object handles allocated on this stack and not yet released.
    pub fn live_handles(&self) -> usize {
        self.handles.live()
    }

    #[inline(always)]
    fn ptr(&self, slot: usize) -> *const u8 {
        debug_assert!(slot <= self.words.len());
        // SAFETY: callers bounds-check `slot` against the capacity
        unsafe { self.words.as_ptr().cast::<u8>().add(slot * WORD_SIZE) }
    }

    #[inline(always)]
    fn ptr_mut(&mut self, slot: usize) -> *mut u8 {
        debug_assert!(slot <= self.words.len());
        // SAFETY: callers bounds-check `slot` against the capacity
        unsafe { self.words.as_mut_ptr().cast::<u8>().add(slot * WORD_SIZE) }
    }

    #[inline(always)]
    fn reserve(&self, words: usize) -> Result<usize, VmError> {
        let end = self.offset + words;
        if end > self.words.len() {
            return Err(VmError::StackOverflow);
        }
        Ok(end)
    }

    /// Only words below the offset hold live values; anything above is left
    /// over from popped values or from an earlier user of the storage.
    #[inline(always)]
    fn check_live(&self, slot: usize, words: usize) -> Result<(), VmError> {
        if slot.checked_add(words).is_none_or(|end| end > self.offset) {
            return Err(VmError::SlotOutOfRange {
                slot,
                offset: self.offset,
            });
        }
        Ok(())
    }

    // ── values ─────────────────────────────────────────────────────

    #[inline]
    pub fn push<T: Primitive>(&mut self, value: T) -> Result<(), VmError> {
        let end = self.reserve(T::WORDS)?;
        let slot = self.offset;
        // SAFETY: slot..end is inside the buffer and covers SIZE bytes
        unsafe { value.store(self.ptr_mut(slot)) };
        self.tags.record(slot, T::TYPE, T::WORDS);
        self.offset = end;
        Ok(())
    }

    #[inline]
    pub fn pop<T: Primitive>(&mut self) -> Result<T, VmError> {
        let slot = self
            .offset
            .checked_sub(T::WORDS)
            .ok_or(VmError::StackUnderflow)?;
        self.tags.check(slot, T::TYPE)?;
        self.offset = slot;
        // SAFETY: slot..slot + WORDS was below the old offset
        Ok(unsafe { T::load(self.ptr(slot)) })
    }

    /// Reads the live value starting at `slot` without moving the offset.
    #[inline]
    pub fn read_at<T: Primitive>(&self, slot: usize) -> Result<T, VmError> {
        self.check_live(slot, T::WORDS)?;
        self.tags.check(slot, T::TYPE)?;
        // SAFETY: bounds checked above
        Ok(unsafe { T::load(self.ptr(slot)) })
    }

    #[inline]
    pub fn write_at<T: Primitive>(&mut self, slot: usize, value: T) -> Result<(), VmError> {
        self.check_live(slot, T::WORDS)?;
        // SAFETY: bounds checked above
        unsafe { value.store(self.ptr_mut(slot)) };
        self.tags.record(slot, T::TYPE, T::WORDS);
        Ok(())
    }

    // ── objects ────────────────────────────────────────────────────

    /// Pushes a fresh handle for `object`, or the null handle for `None`.
    pub fn push_object(&mut self, object: Option<Object>) -> Result<(), VmError> {
        self.reserve(HANDLE_WORDS)?;
        let handle = match object {
            Some(object) => self.handles.alloc(object),
            None => NULL_HANDLE,
        };
        self.push_handle(handle)
    }

    /// Pops a handle and releases it, handing the reference to the caller.
    pub fn pop_object(&mut self) -> Result<Option<Object>, VmError> {
        let handle = self.pop_handle()?;
        self.handles.release(handle)
    }

    /// The object under the top handle, without releasing it.
    pub fn peek_object(&self) -> Result<Option<Object>, VmError> {
        let slot = self
            .offset
            .checked_sub(HANDLE_WORDS)
            .ok_or(VmError::StackUnderflow)?;
        let handle = self.read_handle_at(slot)?;
        Ok(self.handles.get(handle)?.cloned())
    }

    pub(crate) fn push_handle(&mut self, handle: usize) -> Result<(), VmError> {
        let end = self.reserve(HANDLE_WORDS)?;
        let slot = self.offset;
        // SAFETY: slot..end is inside the buffer and covers HANDLE_SIZE bytes
        unsafe { self.ptr_mut(slot).cast::<usize>().write_unaligned(handle) };
        self.tags.record(slot, BuiltInType::Object, HANDLE_WORDS);
        self.offset = end;
        Ok(())
    }

    pub(crate) fn pop_handle(&mut self) -> Result<usize, VmError> {
        let slot = self
            .offset
            .checked_sub(HANDLE_WORDS)
            .ok_or(VmError::StackUnderflow)?;
        let handle = self.read_handle_at(slot)?;
        self.offset = slot;
        Ok(handle)
    }

    pub(crate) fn read_handle_at(&self, slot: usize) -> Result<usize, VmError> {
        self.check_live(slot, HANDLE_WORDS)?;
        self.tags.check(slot, BuiltInType::Object)?;
        // SAFETY: bounds checked above
        Ok(unsafe { self.ptr(slot).cast::<usize>().read_unaligned() })
    }

    pub(crate) fn write_handle_at(&mut self, slot: usize, handle: usize) -> Result<(), VmError> {
        self.check_live(slot, HANDLE_WORDS)?;
        // SAFETY: bounds checked above
        unsafe { self.ptr_mut(slot).cast::<usize>().write_unaligned(handle) };
        self.tags.record(slot, BuiltInType::Object, HANDLE_WORDS);
        Ok(())
    }

    pub(crate) fn duplicate_handle(&mut self, handle: usize) -> Result<usize, VmError> {
        self.handles.duplicate(handle)
    }

    pub(crate) fn release_handle(&mut self, handle: usize) -> Result<(), VmError> {
        self.handles.release(handle).map(drop)
    }

    // ── frames ─────────────────────────────────────────────────────

    /// Copies `words` words from `src` down to `dst`, tags included.
    pub(crate) fn move_down(&mut self, src: usize, dst: usize, words: usize) {
        debug_assert!(dst <= src && src + words <= self.offset);
        self.words.copy_within(src..src + words, dst);
        self.tags.copy_within(src, dst, words);
    }

    pub(crate) fn set_offset(&mut self, offset: usize) {
        debug_assert!(offset <= self.words.len());
        self.offset = offset;
    }

    /// Renders the `ty` value at `slot` for trace output.
    pub(crate) fn describe_at(&self, slot: usize, ty: BuiltInType) -> String {
        let rendered = dispatch_primitive!(
            ty,
            T => self.read_at::<T>(slot).map(|value| value.to_string()),
            object => self.read_handle_at(slot).map(|handle| match handle {
                NULL_HANDLE => "null".to_string(),
                handle => format!("object@{handle:#x}"),
            }),
        );
        rendered.unwrap_or_else(|err| format!("<{err}>"))
    }
}

impl Drop for OperandStack {
    fn drop(&mut self) {
        let leaked = self.handles.clear();
        if leaked > 0 {
            log::warn!("recycling operand stack with {leaked} unreleased object handles");
        }
        self.tags.clear();
        let storage = StackStorage {
            words: mem::take(&mut self.words),
            handles: mem::take(&mut self.handles),
            tags: mem::take(&mut self.tags),
        };
        self.pool.release(storage);
    }
}

impl fmt::Debug for OperandStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperandStack")
            .field("offset", &self.offset)
            .field("capacity", &self.words.len())
            .field("live_handles", &self.handles.live())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytecode::Decimal;

    fn round_trip<T: Primitive>(stack: &mut OperandStack, value: T) {
        let before = stack.offset();
        stack.push(value).unwrap();
        assert_eq!(stack.offset(), before + T::WORDS);
        assert_eq!(stack.pop::<T>().unwrap(), value);
        assert_eq!(stack.offset(), before);
    }

    #[test]
    fn every_primitive_round_trips() {
        let mut stack = OperandStack::with_capacity(64);
        // something underneath so values do not start at slot 0
        stack.push(1u8).unwrap();

        round_trip(&mut stack, true);
        round_trip(&mut stack, 0xABu8);
        round_trip(&mut stack, -5i8);
        round_trip(&mut stack, 'ß');
        round_trip(&mut stack, Decimal::new(-12345, 3).unwrap());
        round_trip(&mut stack, core::f64::consts::PI);
        round_trip(&mut stack, -0.5f32);
        round_trip(&mut stack, i32::MIN);
        round_trip(&mut stack, u32::MAX);
        round_trip(&mut stack, i64::MIN + 1);
        round_trip(&mut stack, u64::MAX - 1);
        round_trip(&mut stack, -300i16);
        round_trip(&mut stack, 65000u16);

        assert_eq!(stack.pop::<u8>().unwrap(), 1);
        assert!(stack.is_empty());
    }

    #[test]
    fn values_stack_in_order() {
        let mut stack = OperandStack::with_capacity(32);
        stack.push(1i64).unwrap();
        stack.push(2.5f64).unwrap();
        stack.push(3i16).unwrap();

        assert_eq!(stack.pop::<i16>().unwrap(), 3);
        assert_eq!(stack.pop::<f64>().unwrap(), 2.5);
        assert_eq!(stack.pop::<i64>().unwrap(), 1);
    }

    #[test]
    fn overflow_at_capacity() {
        let mut stack = OperandStack::with_capacity(4);
        while stack.offset() + <i32 as Primitive>::WORDS <= stack.capacity() {
            stack.push(7i32).unwrap();
        }
        let offset = stack.offset();
        assert_eq!(stack.push(7i32), Err(VmError::StackOverflow));
        assert_eq!(stack.offset(), offset);
    }

    #[test]
    fn underflow_on_empty() {
        let mut stack = OperandStack::with_capacity(4);
        assert_eq!(stack.pop::<i32>(), Err(VmError::StackUnderflow));
        assert!(matches!(stack.pop_object(), Err(VmError::StackUnderflow)));
        assert_eq!(stack.offset(), 0);
    }

    #[test]
    fn locals_read_and_write_in_place() {
        let mut stack = OperandStack::with_capacity(16);
        stack.push(10i32).unwrap();
        stack.push(20i32).unwrap();

        let second = <i32 as Primitive>::WORDS;
        assert_eq!(stack.read_at::<i32>(second).unwrap(), 20);
        stack.write_at(0, 11i32).unwrap();
        assert_eq!(stack.read_at::<i32>(0).unwrap(), 11);
        assert_eq!(
            stack.read_at::<i32>(16),
            Err(VmError::SlotOutOfRange { slot: 16, offset: 2 * second })
        );
    }

    #[test]
    fn slots_above_the_offset_are_dead() {
        let mut stack = OperandStack::with_capacity(16);
        stack.push(10i32).unwrap();
        stack.push(20i32).unwrap();
        let top = stack.pop::<i32>().unwrap();
        assert_eq!(top, 20);

        let dead = <i32 as Primitive>::WORDS;
        let out_of_range = VmError::SlotOutOfRange { slot: dead, offset: dead };
        assert_eq!(stack.read_at::<i32>(dead), Err(out_of_range.clone()));
        assert_eq!(stack.write_at(dead, 1i32), Err(out_of_range.clone()));
        assert_eq!(stack.read_handle_at(dead), Err(out_of_range));
        assert_eq!(stack.offset(), dead);
    }

    #[test]
    fn recycled_storage_reads_as_empty() {
        let pool = Arc::new(StackPool::new(1));
        let mut first = OperandStack::create(&pool, 16);
        first.push(1234i32).unwrap();
        drop(first);

        let second = OperandStack::create(&pool, 16);
        assert_eq!(pool.stats().reuses, 1);
        assert_eq!(
            second.read_at::<i32>(0),
            Err(VmError::SlotOutOfRange { slot: 0, offset: 0 })
        );
        assert_eq!(second.tags.get(0), None);
    }

    #[test]
    fn mismatched_storage_is_counted_as_an_allocation() {
        let pool = Arc::new(StackPool::new(4));
        drop(OperandStack::create(&pool, 32));
        let wide = OperandStack::create(&pool, 64);

        assert_eq!(wide.capacity(), 64);
        assert_eq!(pool.stats().allocations, 2);
        assert_eq!(pool.stats().reuses, 0);
        assert_eq!(pool.idle(), 1);
    }

    #[cfg(any(debug_assertions, feature = "type-tags"))]
    #[test]
    fn reading_the_wrong_type_is_caught() {
        let mut stack = OperandStack::with_capacity(16);
        stack.push(1.0f64).unwrap();
        assert!(matches!(
            stack.pop::<i64>(),
            Err(VmError::TypeMismatch {
                expected: BuiltInType::Long,
                found: "double",
            })
        ));
        assert!(matches!(
            stack.pop_object(),
            Err(VmError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn object_handles_are_independent() {
        let object: Object = Arc::new(String::from("shared"));
        let mut stack = OperandStack::with_capacity(16);

        stack.push_object(Some(object.clone())).unwrap();
        let handle = stack.read_handle_at(0).unwrap();
        let copy = stack.duplicate_handle(handle).unwrap();
        stack.push_handle(copy).unwrap();

        assert_eq!(stack.offset(), 2 * HANDLE_WORDS);
        assert_eq!(stack.live_handles(), 2);
        assert_eq!(Arc::strong_count(&object), 3);

        let top = stack.pop_object().unwrap().unwrap();
        assert!(Arc::ptr_eq(&top, &object));
        drop(top);
        let bottom = stack.pop_object().unwrap().unwrap();
        drop(bottom);

        assert_eq!(stack.live_handles(), 0);
        assert_eq!(Arc::strong_count(&object), 1);
    }

    #[test]
    fn null_objects_round_trip() {
        let mut stack = OperandStack::with_capacity(8);
        stack.push_object(None).unwrap();
        assert_eq!(stack.live_handles(), 0);
        assert!(stack.peek_object().unwrap().is_none());
        assert!(stack.pop_object().unwrap().is_none());
    }

    #[test]
    fn leaked_handles_are_dropped_with_the_stack() {
        let object: Object = Arc::new(5u64);
        let mut stack = OperandStack::with_capacity(8);
        stack.push_object(Some(object.clone())).unwrap();
        stack.push_object(Some(object.clone())).unwrap();
        assert_eq!(stack.live_handles(), 2);

        drop(stack);
        assert_eq!(Arc::strong_count(&object), 1);
    }

    #[test]
    fn storage_is_reused_through_the_pool() {
        let pool = Arc::new(StackPool::new(4));
        let first: Vec<_> = (0..4).map(|_| OperandStack::create(&pool, 64)).collect();
        let mut before: Vec<_> = first.iter().map(|s| s.words.as_ptr()).collect();
        drop(first);
        assert_eq!(pool.idle(), 4);

        let second: Vec<_> = (0..4).map(|_| OperandStack::create(&pool, 64)).collect();
        let mut after: Vec<_> = second.iter().map(|s| s.words.as_ptr()).collect();

        before.sort();
        after.sort();
        assert_eq!(before, after);
        assert_eq!(pool.stats().allocations, 4);
        assert_eq!(pool.stats().reuses, 4);
        assert!(second.iter().all(|s| s.offset() == 0));
    }

    #[test]
    fn moving_down_keeps_values_readable() {
        let mut stack = OperandStack::with_capacity(16);
        stack.push(1i32).unwrap();
        stack.push(2i32).unwrap();
        stack.push(99i64).unwrap();

        let words = <i64 as Primitive>::WORDS;
        let src = stack.offset() - words;
        stack.move_down(src, 0, words);
        stack.set_offset(words);
        assert_eq!(stack.pop::<i64>().unwrap(), 99);
    }

    #[test]
    fn describe_renders_values() {
        let mut stack = OperandStack::with_capacity(16);
        stack.push(42i32).unwrap();
        stack.push_object(None).unwrap();
        assert_eq!(stack.describe_at(0, BuiltInType::Int), "42");
        let handle_slot = <i32 as Primitive>::WORDS;
        assert_eq!(stack.describe_at(handle_slot, BuiltInType::Object), "null");
    }
}
