//! Shadow type tags for operand stack slots.
//!
//! Debug builds (or the `type-tags` feature) remember which type was written
//! at each slot and check every read against it. Otherwise [`TypeTags`] is a
//! zero-sized type whose methods do nothing.

use bytecode::BuiltInType;

use crate::error::VmError;

#[cfg(any(debug_assertions, feature = "type-tags"))]
#[derive(Debug, Default)]
pub struct TypeTags {
    tags: Box<[Option<BuiltInType>]>,
}

#[cfg(any(debug_assertions, feature = "type-tags"))]
impl TypeTags {
    pub const ENABLED: bool = true;

    pub fn new(capacity: usize) -> Self {
        Self {
            tags: vec![None; capacity].into_boxed_slice(),
        }
    }

    /// Marks `slot` as the start of a `ty` value spanning `words` slots.
    #[inline]
    pub fn record(&mut self, slot: usize, ty: BuiltInType, words: usize) {
        if let Some(tags) = self.tags.get_mut(slot..slot + words) {
            if let Some((first, rest)) = tags.split_first_mut() {
                *first = Some(ty);
                rest.fill(None);
            }
        }
    }

    #[inline]
    pub fn check(&self, slot: usize, ty: BuiltInType) -> Result<(), VmError> {
        let found = self.tags.get(slot).copied().flatten();
        if found == Some(ty) {
            Ok(())
        } else {
            Err(VmError::type_mismatch(ty, found))
        }
    }

    #[inline]
    pub fn copy_within(&mut self, src: usize, dst: usize, words: usize) {
        self.tags.copy_within(src..src + words, dst);
    }

    pub fn get(&self, slot: usize) -> Option<BuiltInType> {
        self.tags.get(slot).copied().flatten()
    }

    /// Forgets every recorded tag.
    pub fn clear(&mut self) {
        self.tags.fill(None);
    }
}

#[cfg(not(any(debug_assertions, feature = "type-tags")))]
#[derive(Debug, Default)]
pub struct TypeTags;

#[cfg(not(any(debug_assertions, feature = "type-tags")))]
impl TypeTags {
    pub const ENABLED: bool = false;

    #[inline(always)]
    pub fn new(_capacity: usize) -> Self {
        TypeTags
    }

    #[inline(always)]
    pub fn record(&mut self, _slot: usize, _ty: BuiltInType, _words: usize) {}

    #[inline(always)]
    pub fn check(&self, _slot: usize, _ty: BuiltInType) -> Result<(), VmError> {
        Ok(())
    }

    #[inline(always)]
    pub fn copy_within(&mut self, _src: usize, _dst: usize, _words: usize) {}

    #[inline(always)]
    pub fn get(&self, _slot: usize) -> Option<BuiltInType> {
        None
    }

    #[inline(always)]
    pub fn clear(&mut self) {}
}
