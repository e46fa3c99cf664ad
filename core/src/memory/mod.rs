//! GPU memory management.
//!
//! This module provides the allocation model shared by command queues and
//! memory objects:
//! - [`GraphicsAllocation`] - A GPU-visible allocation with a simulated GPU address
//! - [`HostMemory`] - Caller-owned host memory that can back a zero-copy allocation
//! - [`MemoryManager`] - Allocation policy, implemented by [`OsAgnosticMemoryManager`]

mod allocation;
mod host;
mod manager;

pub use allocation::{AllocationKind, AllocationProperties, BackingStore, GraphicsAllocation};
pub use host::HostMemory;
pub use manager::{MemoryManager, MemoryStats, OsAgnosticMemoryManager};

/// One kilobyte.
pub const KILOBYTE: usize = 1024;

/// Regular page size.
pub const PAGE_SIZE: usize = 4 * KILOBYTE;

/// 64 KiB page size used for command buffers.
pub const PAGE_SIZE_64K: usize = 64 * KILOBYTE;

/// CPU cache line size.
pub const CACHE_LINE_SIZE: usize = 64;

/// Align a value up to the given alignment.
#[inline]
pub fn align_up(value: usize, alignment: usize) -> usize {
    debug_assert!(alignment.is_power_of_two());
    (value + alignment - 1) & !(alignment - 1)
}

/// Align a value down to the given alignment.
#[inline]
pub fn align_down(value: usize, alignment: usize) -> usize {
    debug_assert!(alignment.is_power_of_two());
    value & !(alignment - 1)
}

/// Number of bytes covered by the whole pages spanning `[address, address + size)`.
///
/// Saturates at the last page boundary of the address space.
pub fn align_size_whole_page(address: u64, size: usize) -> usize {
    let start = align_down(address as usize, PAGE_SIZE);
    let end = (address as usize)
        .saturating_add(size)
        .saturating_add(PAGE_SIZE - 1);
    align_down(end, PAGE_SIZE) - start
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::zero(0, 256, 0)]
    #[case::one(1, 256, 256)]
    #[case::below(255, 256, 256)]
    #[case::exact(256, 256, 256)]
    #[case::above(257, 256, 512)]
    #[case::cache_line(100, 64, 128)]
    fn test_align_up(#[case] value: usize, #[case] alignment: usize, #[case] expected: usize) {
        assert_eq!(align_up(value, alignment), expected);
    }

    #[rstest]
    #[case::zero(0, 0)]
    #[case::below_page(4095, 0)]
    #[case::above_page(4097, 4096)]
    fn test_align_down(#[case] value: usize, #[case] expected: usize) {
        assert_eq!(align_down(value, 4096), expected);
    }

    #[rstest]
    #[case::single_byte(0x1000, 1, PAGE_SIZE)]
    #[case::whole_page(0x1000, PAGE_SIZE, PAGE_SIZE)]
    #[case::straddles_boundary(0x1ff0, 0x20, 2 * PAGE_SIZE)]
    #[case::saturates(0x1000, usize::MAX, align_down(usize::MAX, PAGE_SIZE) - 0x1000)]
    fn test_align_size_whole_page(
        #[case] address: u64,
        #[case] size: usize,
        #[case] expected: usize,
    ) {
        assert_eq!(align_size_whole_page(address, size), expected);
    }
}
