use crate::error::BytecodeError;

/// Maps instruction indices to source lines.
///
/// Entries are appended in code order and line numbers never go backwards,
/// so a lookup is a binary search for the last entry at or before the index.
#[derive(Debug, Default, Clone)]
pub struct LineTracker {
    entries: Vec<(usize, u32)>,
    last_offset: Option<usize>,
}

impl LineTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that the instruction at `offset` comes from `line`. Repeating
    /// the previous line is a no-op, but the offset must still not go
    /// backwards.
    pub fn add(&mut self, offset: usize, line: u32) -> Result<(), BytecodeError> {
        if let Some(previous) = self.last_offset.filter(|&previous| offset < previous) {
            return Err(BytecodeError::OffsetOutOfOrder { offset, previous });
        }
        match self.entries.last() {
            Some(&(_, previous)) if line < previous => {
                return Err(BytecodeError::LineOutOfOrder { line, previous });
            }
            Some(&(_, previous)) if line == previous => {}
            _ => self.entries.push((offset, line)),
        }
        self.last_offset = Some(offset);
        Ok(())
    }

    pub fn line_for(&self, offset: usize) -> Option<u32> {
        let idx = self.entries.partition_point(|&(start, _)| start <= offset);
        idx.checked_sub(1).map(|i| self.entries[i].1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
