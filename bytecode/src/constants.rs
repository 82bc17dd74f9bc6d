use core::any::{Any, type_name};
use core::fmt;
use std::sync::Arc;

use crate::error::BytecodeError;
use crate::types::{HANDLE_SIZE, Object, Primitive};

/// Byte offset of a value inside a constant pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct ConstantPosition(u16);

impl ConstantPosition {
    pub const fn new(offset: u16) -> Self {
        Self(offset)
    }

    pub const fn get(self) -> u16 {
        self.0
    }

    pub const fn to_le_bytes(self) -> [u8; 2] {
        self.0.to_le_bytes()
    }

    pub const fn from_le_bytes(bytes: [u8; 2]) -> Self {
        Self(u16::from_le_bytes(bytes))
    }
}

impl fmt::Display for ConstantPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Null handle; never points at an object.
const NULL_HANDLE: usize = 0;

/// Append-only constant pool under construction.
///
/// Every value starts at a multiple of its own size. Reference values are
/// stored as a one-word handle into the pool's object table.
#[derive(Debug)]
pub struct ConstantPoolWriter {
    buf: Vec<u8>,
    objects: Vec<Object>,
    handle_positions: Vec<ConstantPosition>,
}

impl ConstantPoolWriter {
    pub fn new() -> Self {
        Self::with_capacity(8)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity.max(1)),
            objects: Vec::new(),
            handle_positions: Vec::new(),
        }
    }

    /// Bytes written so far, padding included.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn write<T: Primitive>(&mut self, value: T) -> Result<ConstantPosition, BytecodeError> {
        let position = self.reserve(T::SIZE)?;
        let offset = position.get() as usize;
        // SAFETY: `reserve` grew the buffer to cover `offset..offset + SIZE`
        unsafe { value.store(self.buf.as_mut_ptr().add(offset)) };
        Ok(position)
    }

    /// Stores a handle to `object`. `None` stores the null handle.
    pub fn write_object(&mut self, object: Option<Object>) -> Result<ConstantPosition, BytecodeError> {
        let position = self.reserve(HANDLE_SIZE)?;
        let handle = match object {
            Some(object) => {
                self.objects.push(object);
                self.handle_positions.push(position);
                self.objects.len()
            }
            None => NULL_HANDLE,
        };
        let offset = position.get() as usize;
        self.buf[offset..offset + HANDLE_SIZE].copy_from_slice(&handle.to_ne_bytes());
        Ok(position)
    }

    /// Pads to a multiple of `size`, then extends the buffer by `size` zero
    /// bytes and returns where they start.
    fn reserve(&mut self, size: usize) -> Result<ConstantPosition, BytecodeError> {
        let len = self.buf.len();
        let start = len.next_multiple_of(size);
        let position = u16::try_from(start).map_err(|_| BytecodeError::ConstantPoolFull { len })?;

        let end = start + size;
        if end > self.buf.capacity() {
            let capacity = (self.buf.capacity() * 2).max(end);
            self.buf.reserve_exact(capacity - len);
        }
        self.buf.resize(end, 0);
        Ok(ConstantPosition(position))
    }

    /// Freezes the written bytes into their own exact-size allocation.
    pub fn finish(self) -> ConstantPool {
        ConstantPool {
            bytes: self.buf[..].into(),
            objects: self.objects.into_boxed_slice(),
            handle_positions: self.handle_positions.into_boxed_slice(),
        }
    }
}

impl Default for ConstantPoolWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Immutable constant pool referenced by executing code.
///
/// Dropping the pool releases every object handle it recorded, once.
#[derive(Debug, Default)]
pub struct ConstantPool {
    bytes: Box<[u8]>,
    objects: Box<[Object]>,
    handle_positions: Box<[ConstantPosition]>,
}

impl ConstantPool {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Positions of every non-null object handle, in write order.
    pub fn handle_positions(&self) -> &[ConstantPosition] {
        &self.handle_positions
    }

    fn check(&self, position: ConstantPosition, size: usize) -> Result<usize, BytecodeError> {
        let offset = position.get() as usize;
        if offset % size != 0 {
            return Err(BytecodeError::Alignment {
                position: position.get(),
                size,
            });
        }
        if offset + size > self.bytes.len() {
            return Err(BytecodeError::IndexOutOfRange {
                index: offset + size,
                len: self.bytes.len(),
            });
        }
        Ok(offset)
    }

    #[inline]
    pub fn read<T: Primitive>(&self, position: ConstantPosition) -> Result<T, BytecodeError> {
        let offset = self.check(position, T::SIZE)?;
        // SAFETY: `check` proved `offset..offset + SIZE` is in bounds
        Ok(unsafe { T::load(self.bytes.as_ptr().add(offset)) })
    }

    /// Reads an object handle; the null handle yields `None`.
    pub fn read_object(&self, position: ConstantPosition) -> Result<Option<Object>, BytecodeError> {
        let offset = self.check(position, HANDLE_SIZE)?;
        let mut raw = [0u8; HANDLE_SIZE];
        raw.copy_from_slice(&self.bytes[offset..offset + HANDLE_SIZE]);

        match usize::from_ne_bytes(raw) {
            NULL_HANDLE => Ok(None),
            handle => self
                .objects
                .get(handle - 1)
                .cloned()
                .map(Some)
                .ok_or(BytecodeError::InvalidConstant {
                    position: position.get(),
                    expected: "object handle",
                }),
        }
    }

    /// Reads a non-null object constant and downcasts it.
    pub fn read_as<T: Any + Send + Sync>(
        &self,
        position: ConstantPosition,
    ) -> Result<Arc<T>, BytecodeError> {
        let invalid = || BytecodeError::InvalidConstant {
            position: position.get(),
            expected: type_name::<T>(),
        };
        self.read_object(position)?
            .ok_or_else(invalid)?
            .downcast::<T>()
            .map_err(|_| invalid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decimal::Decimal;

    fn round_trip<T: Primitive>(value: T) {
        let mut writer = ConstantPoolWriter::with_capacity(8);
        let count = 512;
        let mut positions = Vec::with_capacity(count);
        for _ in 0..count {
            writer.write::<u8>(123).unwrap();
            positions.push(writer.write(value).unwrap());
            writer.write::<u8>(123).unwrap();
        }

        let pool = writer.finish();
        for position in positions {
            assert_eq!(position.get() as usize % T::SIZE, 0);
            assert_eq!(pool.read::<T>(position).unwrap(), value);
        }
    }

    #[test]
    fn write_and_read_back() {
        round_trip(0x1234_5678i32);
        round_trip(-2.5f64);
        round_trip(1.25f32);
        round_trip(u64::MAX);
        round_trip(true);
        round_trip('x');
        round_trip(Decimal::new(-31415, 4).unwrap());
    }

    #[test]
    fn misaligned_read_is_rejected() {
        let mut writer = ConstantPoolWriter::new();
        writer.write::<u8>(1).unwrap();
        let position = writer.write(7i32).unwrap();
        assert_eq!(position.get(), 4);

        let pool = writer.finish();
        let err = pool.read::<i32>(ConstantPosition::new(2)).unwrap_err();
        assert_eq!(err, BytecodeError::Alignment { position: 2, size: 4 });
    }

    #[test]
    fn out_of_range_read_is_rejected() {
        let mut writer = ConstantPoolWriter::new();
        writer.write(7i32).unwrap();
        let pool = writer.finish();

        assert_eq!(pool.len(), 4);
        assert!(matches!(
            pool.read::<i32>(ConstantPosition::new(4)),
            Err(BytecodeError::IndexOutOfRange { index: 8, len: 4 })
        ));
        assert!(matches!(
            pool.read::<i64>(ConstantPosition::new(0)),
            Err(BytecodeError::IndexOutOfRange { .. })
        ));
    }

    #[test]
    fn frozen_pool_is_exact_size() {
        let mut writer = ConstantPoolWriter::with_capacity(1024);
        writer.write(1u16).unwrap();
        writer.write(2u8).unwrap();
        let pool = writer.finish();
        assert_eq!(pool.len(), 3);
    }

    #[test]
    fn objects_live_until_pool_is_dropped() {
        let object: Object = Arc::new(String::from("constant"));
        let weak = Arc::downgrade(&object);

        let mut writer = ConstantPoolWriter::new();
        writer.write::<u8>(1).unwrap();
        let position = writer.write_object(Some(object)).unwrap();
        assert_eq!(position.get() as usize % HANDLE_SIZE, 0);

        let pool = writer.finish();
        assert_eq!(pool.handle_positions(), &[position]);

        let read = pool.read_as::<String>(position).unwrap();
        assert_eq!(read.as_str(), "constant");
        drop(read);

        assert!(weak.upgrade().is_some());
        drop(pool);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn null_object_is_not_recorded() {
        let mut writer = ConstantPoolWriter::new();
        let position = writer.write_object(None).unwrap();
        let pool = writer.finish();

        assert!(pool.handle_positions().is_empty());
        assert!(pool.read_object(position).unwrap().is_none());
        assert!(matches!(
            pool.read_as::<String>(position),
            Err(BytecodeError::InvalidConstant { .. })
        ));
    }

    #[test]
    fn downcast_to_wrong_type_fails() {
        let mut writer = ConstantPoolWriter::new();
        let position = writer.write_object(Some(Arc::new(5u32))).unwrap();
        let pool = writer.finish();

        assert!(pool.read_as::<String>(position).is_err());
        assert_eq!(*pool.read_as::<u32>(position).unwrap(), 5);
    }

    #[test]
    fn positions_beyond_u16_fail() {
        let mut writer = ConstantPoolWriter::new();
        for _ in 0..=u16::MAX as usize {
            writer.write(0u8).unwrap();
        }
        assert!(matches!(
            writer.write(0u8),
            Err(BytecodeError::ConstantPoolFull { len: 65536 })
        ));
    }
}
