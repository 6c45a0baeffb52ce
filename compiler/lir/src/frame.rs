use std::collections::BTreeMap;

/// Bytes taken by one stack slot, every value is a 4 byte int
pub const SLOT_SIZE: i32 = 4;

/// The System V ABI keeps the stack pointer 16 byte aligned across calls
pub const FRAME_ALIGNMENT: i32 = 16;

/// Storage allocation table for one function.
///
/// Slots are handed out below the frame pointer, starting at -4 and moving
/// down 4 bytes per distinct name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StackFrame {
    offsets: BTreeMap<String, i32>,
    // Offset from rbp of the lowest slot handed out so far
    current_offset: i32,
}

impl StackFrame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up the slot of an already allocated name
    pub fn get(&self, name: &str) -> Option<i32> {
        self.offsets.get(name).copied()
    }

    /// Returns the slot for `name`, assigning the next free one on first sight
    pub fn allocate(&mut self, name: &str) -> i32 {
        if let Some(offset) = self.get(name) {
            return offset;
        }

        self.current_offset -= SLOT_SIZE;
        self.offsets.insert(name.to_string(), self.current_offset);

        self.current_offset
    }

    pub fn slot_count(&self) -> usize {
        self.offsets.len()
    }

    /// Most negative offset handed out, 0 when nothing was allocated
    pub fn lowest_offset(&self) -> i32 {
        self.current_offset
    }

    /// Size of the frame once rounded to the required alignment
    pub fn bytes_required(&self) -> i32 {
        -round_away_from_zero(FRAME_ALIGNMENT, self.current_offset)
    }
}

/// Rounds `value` to a multiple of `alignment`, moving away from zero
pub fn round_away_from_zero(alignment: i32, value: i32) -> i32 {
    let remainder = value % alignment;

    if remainder == 0 {
        value
    } else if value < 0 {
        value - alignment - remainder
    } else {
        value + alignment - remainder
    }
}
