use bytecode::Object;

use crate::error::VmError;

/// Handle value stored for a null reference.
pub const NULL_HANDLE: usize = 0;

const INDEX_BITS: u32 = usize::BITS / 2;
const INDEX_MASK: usize = (1 << INDEX_BITS) - 1;

#[derive(Debug, Default)]
struct Slot {
    generation: usize,
    object: Option<Object>,
}

/// Arena of object references owned by one operand stack.
///
/// Stack words only ever hold a packed `(index + 1, generation)` handle.
/// Every handle must be released exactly once; a released slot bumps its
/// generation so stale copies are caught instead of aliasing a newer object.
#[derive(Debug, Default)]
pub struct HandleTable {
    slots: Vec<Slot>,
    free: Vec<usize>,
    live: usize,
}

#[inline(always)]
fn pack(index: usize, generation: usize) -> usize {
    ((generation & INDEX_MASK) << INDEX_BITS) | (index + 1)
}

#[inline(always)]
fn unpack(handle: usize) -> Option<(usize, usize)> {
    let index = (handle & INDEX_MASK).checked_sub(1)?;
    Some((index, handle >> INDEX_BITS))
}

impl HandleTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of handles allocated and not yet released.
    pub fn live(&self) -> usize {
        self.live
    }

    pub fn alloc(&mut self, object: Object) -> usize {
        self.live += 1;
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index];
                slot.object = Some(object);
                pack(index, slot.generation)
            }
            None => {
                let index = self.slots.len();
                self.slots.push(Slot {
                    generation: 0,
                    object: Some(object),
                });
                pack(index, 0)
            }
        }
    }

    fn slot(&self, handle: usize) -> Result<(usize, &Object), VmError> {
        let (index, generation) = unpack(handle).ok_or(VmError::InvalidHandle(handle))?;
        match self.slots.get(index) {
            Some(Slot {
                generation: current,
                object: Some(object),
            }) if current & INDEX_MASK == generation => Ok((index, object)),
            _ => Err(VmError::InvalidHandle(handle)),
        }
    }

    /// Resolves a handle; the null handle yields `None`.
    pub fn get(&self, handle: usize) -> Result<Option<&Object>, VmError> {
        if handle == NULL_HANDLE {
            return Ok(None);
        }
        self.slot(handle).map(|(_, object)| Some(object))
    }

    /// Creates a second, independent handle to the same object.
    pub fn duplicate(&mut self, handle: usize) -> Result<usize, VmError> {
        match self.get(handle)? {
            Some(object) => {
                let object = object.clone();
                Ok(self.alloc(object))
            }
            None => Ok(NULL_HANDLE),
        }
    }

    /// Releases a handle and hands back the reference it held.
    pub fn release(&mut self, handle: usize) -> Result<Option<Object>, VmError> {
        if handle == NULL_HANDLE {
            return Ok(None);
        }
        let (index, _) = self.slot(handle)?;
        let slot = &mut self.slots[index];
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(index);
        self.live -= 1;
        Ok(slot.object.take())
    }

    /// Drops every outstanding reference and returns how many there were.
    pub fn clear(&mut self) -> usize {
        let leaked = self.live;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.object.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(index);
            }
        }
        self.live = 0;
        leaked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn object(text: &str) -> Object {
        Arc::new(text.to_string())
    }

    #[test]
    fn alloc_then_release() {
        let mut table = HandleTable::new();
        let handle = table.alloc(object("a"));
        assert_ne!(handle, NULL_HANDLE);
        assert_eq!(table.live(), 1);

        let released = table.release(handle).unwrap().unwrap();
        assert_eq!(released.downcast_ref::<String>().unwrap(), "a");
        assert_eq!(table.live(), 0);
    }

    #[test]
    fn double_release_is_caught() {
        let mut table = HandleTable::new();
        let handle = table.alloc(object("a"));
        table.release(handle).unwrap();
        assert!(matches!(
            table.release(handle),
            Err(VmError::InvalidHandle(h)) if h == handle
        ));
    }

    #[test]
    fn stale_handle_does_not_alias_reused_slot() {
        let mut table = HandleTable::new();
        let old = table.alloc(object("old"));
        table.release(old).unwrap();

        let new = table.alloc(object("new"));
        assert_ne!(old, new);
        assert!(table.get(old).is_err());
        let current = table.get(new).unwrap().unwrap();
        assert_eq!(current.downcast_ref::<String>().unwrap(), "new");
    }

    #[test]
    fn duplicates_are_independent() {
        let shared = object("shared");
        let mut table = HandleTable::new();
        let first = table.alloc(shared.clone());
        let second = table.duplicate(first).unwrap();

        assert_ne!(first, second);
        assert_eq!(table.live(), 2);
        assert_eq!(Arc::strong_count(&shared), 3);

        table.release(first).unwrap();
        assert!(table.get(second).unwrap().is_some());
        table.release(second).unwrap();
        assert_eq!(Arc::strong_count(&shared), 1);
    }

    #[test]
    fn null_handle_is_inert() {
        let mut table = HandleTable::new();
        assert!(table.get(NULL_HANDLE).unwrap().is_none());
        assert_eq!(table.duplicate(NULL_HANDLE), Ok(NULL_HANDLE));
        assert!(table.release(NULL_HANDLE).unwrap().is_none());
        assert_eq!(table.live(), 0);
    }

    #[test]
    fn clear_reports_leaks() {
        let shared = object("x");
        let mut table = HandleTable::new();
        let handle = table.alloc(shared.clone());
        table.alloc(shared.clone());

        assert_eq!(table.clear(), 2);
        assert_eq!(table.live(), 0);
        assert_eq!(Arc::strong_count(&shared), 1);
        assert!(table.get(handle).is_err());
    }
}
