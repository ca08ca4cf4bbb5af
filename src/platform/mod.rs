//! Platform abstraction layer
//!
//! Everything this crate learns about the host game comes from reading its
//! memory from the inside. This module provides:
//! - Memory reading (raw bytes, POD values, pointers, native strings)
//! - Module enumeration
//! - Address validation
//! - Pattern scanning for hook signatures

#[cfg(windows)]
mod windows;

#[cfg(unix)]
mod linux;

mod process;
pub use process::ProcessPlatform;

#[cfg(test)]
pub mod mock;

/// Size of a native pointer in the host process.
pub const POINTER_SIZE: usize = std::mem::size_of::<u64>();

/// Longest string the readers will follow before giving up.
pub const MAX_STRING_LENGTH: usize = 0x400;

/// Platform-specific errors
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    /// Failed to read memory at address
    #[error("Memory read failed at 0x{address:X} (size: {size}): {reason}")]
    MemoryReadFailed {
        address: usize,
        size: usize,
        reason: String,
    },

    /// Invalid address
    #[error("Invalid memory address: 0x{0:X}")]
    InvalidAddress(usize),

    /// Module not found
    #[error("Module not found: {0}")]
    ModuleNotFound(String),

    /// Malformed native string
    #[error("Invalid string at 0x{address:X}: {reason}")]
    InvalidString { address: usize, reason: String },

    /// Platform-specific error
    #[error("Platform error: {0}")]
    Other(String),
}

/// Information about a loaded module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleInfo {
    /// Base address of the module
    pub base_address: usize,
    /// Size of the module in bytes
    pub size: usize,
    /// Name of the module
    pub name: String,
    /// Full path to the module
    pub path: String,
}

impl ModuleInfo {
    /// First address past the end of the module image.
    #[inline]
    pub fn end(&self) -> usize {
        self.base_address.saturating_add(self.size)
    }
}

/// Memory region information
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryRegion {
    /// Start address of the region
    pub start: usize,
    /// End address of the region (exclusive)
    pub end: usize,
    /// Whether the region is readable
    pub readable: bool,
    /// Whether the region is writable
    pub writable: bool,
    /// Whether the region is executable
    pub executable: bool,
}

impl MemoryRegion {
    /// Get the size of this memory region
    #[inline]
    pub fn size(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// Check if an address is within this region
    #[inline]
    pub fn contains(&self, address: usize) -> bool {
        address >= self.start && address < self.end
    }
}

/// Pattern matching result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatternMatch {
    /// Address where the pattern was found
    pub address: usize,
    /// Offset within the searched range
    pub offset: usize,
}

/// Core trait for reading memory of the host process
///
/// The resource tree builder and the object table only ever talk to this
/// trait, so tests can hand them a [`mock::MockPlatform`] full of crafted
/// game objects instead of a live client.
pub trait MemoryReader: Send + Sync {
    /// Read raw bytes from memory
    fn read_bytes(&self, address: usize, size: usize) -> Result<Vec<u8>, PlatformError>;

    /// Check if an address is valid (readable)
    fn is_valid_address(&self, address: usize) -> bool;

    /// Read a POD (Plain Old Data) value from memory
    fn read<T: bytemuck::Pod>(&self, address: usize) -> Result<T, PlatformError>
    where
        Self: Sized,
    {
        let size = std::mem::size_of::<T>();
        let bytes = self.read_bytes(address, size)?;

        if bytes.len() != size {
            return Err(PlatformError::MemoryReadFailed {
                address,
                size,
                reason: format!("Expected {} bytes, got {}", size, bytes.len()),
            });
        }

        Ok(bytemuck::pod_read_unaligned(&bytes))
    }

    /// Read a native pointer. A null pointer is returned as `0`, not as an error.
    fn read_ptr(&self, address: usize) -> Result<usize, PlatformError>
    where
        Self: Sized,
    {
        self.read::<u64>(address).map(|value| value as usize)
    }

    /// Read a null-terminated string from memory
    ///
    /// Reads are clamped to the end of the readable range, so a short string
    /// sitting right before unmapped memory still decodes.
    fn read_cstring(&self, address: usize, max_length: usize) -> Result<String, PlatformError> {
        let mut length = max_length;
        let bytes = loop {
            match self.read_bytes(address, length) {
                Ok(bytes) => break bytes,
                Err(_) if length > 1 => length /= 2,
                Err(e) => return Err(e),
            }
        };

        let null_pos = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());

        String::from_utf8(bytes[..null_pos].to_vec()).map_err(|e| PlatformError::InvalidString {
            address,
            reason: format!("Invalid UTF-8 string: {}", e),
        })
    }

    /// Read an MSVC `std::string` object
    ///
    /// Layout: a 16-byte union of inline buffer / heap pointer, followed by
    /// the size and the capacity. Capacities of 16 and above live on the heap.
    fn read_std_string(&self, address: usize) -> Result<String, PlatformError>
    where
        Self: Sized,
    {
        const INLINE_CAPACITY: u64 = 15;

        let field = |offset: usize| {
            address
                .checked_add(offset)
                .ok_or(PlatformError::InvalidAddress(address))
        };
        let size = self.read::<u64>(field(0x10)?)? as usize;
        let capacity = self.read::<u64>(field(0x18)?)?;

        if size > MAX_STRING_LENGTH || (capacity as usize) < size {
            return Err(PlatformError::InvalidString {
                address,
                reason: format!("implausible size {} / capacity {}", size, capacity),
            });
        }
        if size == 0 {
            return Ok(String::new());
        }

        let data = if capacity > INLINE_CAPACITY {
            self.read_ptr(address)?
        } else {
            address
        };

        let bytes = self.read_bytes(data, size)?;
        String::from_utf8(bytes).map_err(|e| PlatformError::InvalidString {
            address,
            reason: format!("Invalid UTF-8 string: {}", e),
        })
    }

    /// Check if a memory range is valid
    fn is_valid_range(&self, address: usize, size: usize) -> bool {
        if size == 0 {
            return self.is_valid_address(address);
        }

        match address.checked_add(size - 1) {
            Some(last) => self.is_valid_address(address) && self.is_valid_address(last),
            None => false,
        }
    }
}

/// Extended platform operations
pub trait Platform: MemoryReader {
    /// Get all loaded modules in the host process
    fn get_modules(&self) -> Result<Vec<ModuleInfo>, PlatformError>;

    /// The module of the game executable itself, where hook signatures live
    fn main_module(&self) -> Result<ModuleInfo, PlatformError>;

    /// Get a specific module by name
    fn get_module(&self, name: &str) -> Result<ModuleInfo, PlatformError> {
        self.get_modules()?
            .into_iter()
            .find(|m| m.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| PlatformError::ModuleNotFound(name.to_string()))
    }

    /// Get all memory regions
    fn get_memory_regions(&self) -> Result<Vec<MemoryRegion>, PlatformError>;

    /// Find a pattern in memory
    ///
    /// # Arguments
    /// * `pattern` - Byte pattern to search for
    /// * `mask` - Mask string where 'x' means match, '?' means wildcard
    /// * `start` - Start address
    /// * `end` - End address (exclusive)
    fn find_pattern(
        &self,
        pattern: &[u8],
        mask: &str,
        start: usize,
        end: usize,
    ) -> Result<Vec<PatternMatch>, PlatformError> {
        if pattern.is_empty() || pattern.len() != mask.len() {
            return Err(PlatformError::Other(
                "Pattern and mask length mismatch".to_string(),
            ));
        }

        let mut results = Vec::new();
        for region in self.get_memory_regions()? {
            if !region.readable || region.end <= start || region.start >= end {
                continue;
            }

            let from = region.start.max(start);
            let to = region.end.min(end);
            scan_range(self, pattern, mask, from, to, start, &mut results);
        }

        results.sort_by_key(|m| m.address);
        Ok(results)
    }

    /// Scan a whole module for a pattern, returning the first hit
    fn scan_module(
        &self,
        module: &ModuleInfo,
        pattern: &[u8],
        mask: &str,
    ) -> Result<Option<PatternMatch>, PlatformError> {
        Ok(self
            .find_pattern(pattern, mask, module.base_address, module.end())?
            .into_iter()
            .next())
    }
}

/// Scan `[from, to)` in chunks, skipping chunks that can no longer be read.
fn scan_range<P: Platform + ?Sized>(
    platform: &P,
    pattern: &[u8],
    mask: &str,
    from: usize,
    to: usize,
    origin: usize,
    results: &mut Vec<PatternMatch>,
) {
    const CHUNK_SIZE: usize = 0x10000;

    let mut current = from;
    while current < to {
        let read_size = (to - current).min(CHUNK_SIZE + pattern.len() - 1);

        if let Ok(chunk) = platform.read_bytes(current, read_size) {
            for i in 0..=(chunk.len().saturating_sub(pattern.len())) {
                if pattern_matches(&chunk[i..], pattern, mask) {
                    results.push(PatternMatch {
                        address: current + i,
                        offset: current + i - origin,
                    });
                }
            }
        }

        current += CHUNK_SIZE;
    }
}

/// Helper function to check if a pattern matches at a specific position
#[inline]
pub fn pattern_matches(data: &[u8], pattern: &[u8], mask: &str) -> bool {
    if data.len() < pattern.len() || mask.len() != pattern.len() {
        return false;
    }

    pattern
        .iter()
        .zip(mask.bytes())
        .zip(data)
        .all(|((&expected, mask_char), &actual)| mask_char != b'x' || expected == actual)
}
