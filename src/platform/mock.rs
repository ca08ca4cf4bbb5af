//! Mock platform for testing
//!
//! Fake process memory that tests fill with hand-built game objects,
//! resource handles and code bytes, so the tree builder and the signature
//! scanner can run without a game client.

use super::{MemoryReader, MemoryRegion, ModuleInfo, Platform, PlatformError};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Mock memory storage, one byte vector per allocated block
#[derive(Default)]
struct MockMemory {
    blocks: BTreeMap<usize, Vec<u8>>,
}

impl MockMemory {
    fn block_containing(&self, address: usize) -> Option<(usize, &Vec<u8>)> {
        let (&base, data) = self.blocks.range(..=address).next_back()?;
        (address < base + data.len()).then_some((base, data))
    }

    fn write(&mut self, address: usize, data: &[u8]) {
        if let Some((base, _)) = self.block_containing(address) {
            let block = self.blocks.get_mut(&base).expect("block exists");
            let offset = address - base;
            if offset + data.len() <= block.len() {
                block[offset..offset + data.len()].copy_from_slice(data);
                return;
            }
        }
        self.blocks.insert(address, data.to_vec());
    }

    fn read(&self, address: usize, size: usize) -> Option<Vec<u8>> {
        let (base, data) = self.block_containing(address)?;
        let offset = address - base;
        (offset + size <= data.len()).then(|| data[offset..offset + size].to_vec())
    }
}

/// Mock platform implementation for testing
#[derive(Clone)]
pub struct MockPlatform {
    memory: Arc<RwLock<MockMemory>>,
    modules: Arc<RwLock<Vec<ModuleInfo>>>,
    next_alloc: Arc<AtomicUsize>,
}

impl MockPlatform {
    /// Create a new mock platform
    pub fn new() -> Self {
        Self {
            memory: Arc::new(RwLock::new(MockMemory::default())),
            modules: Arc::new(RwLock::new(Vec::new())),
            next_alloc: Arc::new(AtomicUsize::new(0x1000_0000)),
        }
    }

    /// Write data to mock memory
    pub fn write_memory(&self, address: usize, data: &[u8]) {
        self.memory.write().write(address, data);
    }

    /// Write a POD type to memory
    pub fn write_value<T: bytemuck::Pod>(&self, address: usize, value: &T) {
        self.write_memory(address, bytemuck::bytes_of(value));
    }

    /// Write a native pointer
    pub fn write_ptr(&self, address: usize, target: usize) {
        self.write_value(address, &(target as u64));
    }

    /// Reserve a zeroed block and return its address
    pub fn alloc(&self, size: usize) -> usize {
        let size = size.max(1);
        let address = self
            .next_alloc
            .fetch_add((size + 0xFFF) & !0xFFF, Ordering::Relaxed);
        self.write_memory(address, &vec![0u8; size]);
        address
    }

    /// Write an MSVC `std::string` object at `address`, spilling to a heap
    /// block when the text does not fit the inline buffer
    pub fn write_std_string(&self, address: usize, text: &str) {
        let bytes = text.as_bytes();
        if bytes.len() < 16 {
            let mut inline = [0u8; 16];
            inline[..bytes.len()].copy_from_slice(bytes);
            self.write_memory(address, &inline);
            self.write_value(address + 0x18, &15u64);
        } else {
            let heap = self.alloc(bytes.len() + 1);
            self.write_memory(heap, bytes);
            self.write_ptr(address, heap);
            self.write_value(address + 0x18, &(bytes.len() as u64));
        }
        self.write_value(address + 0x10, &(bytes.len() as u64));
    }

    /// Add a mock module
    pub fn add_module(&self, module: ModuleInfo) {
        self.modules.write().push(module);
    }

    /// Place `code` as the image of the main module
    pub fn with_main_module(code: &[u8]) -> Self {
        let platform = Self::new();
        let base = platform.alloc(code.len());
        platform.write_memory(base, code);
        platform.add_module(ModuleInfo {
            base_address: base,
            size: code.len(),
            name: "game.exe".to_string(),
            path: "C:\\Game\\game.exe".to_string(),
        });
        platform
    }
}

impl Default for MockPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryReader for MockPlatform {
    fn read_bytes(&self, address: usize, size: usize) -> Result<Vec<u8>, PlatformError> {
        if address == 0 {
            return Err(PlatformError::InvalidAddress(address));
        }

        self.memory
            .read()
            .read(address, size)
            .ok_or(PlatformError::MemoryReadFailed {
                address,
                size,
                reason: "Address not found in mock memory".to_string(),
            })
    }

    fn is_valid_address(&self, address: usize) -> bool {
        address != 0 && self.memory.read().block_containing(address).is_some()
    }
}

impl Platform for MockPlatform {
    fn get_modules(&self) -> Result<Vec<ModuleInfo>, PlatformError> {
        Ok(self.modules.read().clone())
    }

    fn main_module(&self) -> Result<ModuleInfo, PlatformError> {
        self.modules
            .read()
            .first()
            .cloned()
            .ok_or_else(|| PlatformError::ModuleNotFound("main executable".to_string()))
    }

    fn get_memory_regions(&self) -> Result<Vec<MemoryRegion>, PlatformError> {
        Ok(self
            .memory
            .read()
            .blocks
            .iter()
            .map(|(&start, data)| MemoryRegion {
                start,
                end: start + data.len(),
                readable: true,
                writable: true,
                executable: false,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_platform() {
        let platform = MockPlatform::new();

        let test_data = vec![0x01, 0x02, 0x03, 0x04, 0x05];
        platform.write_memory(0x1000, &test_data);

        let result = platform.read_bytes(0x1000, 5).unwrap();
        assert_eq!(result, test_data);

        let result = platform.read_bytes(0x1002, 2).unwrap();
        assert_eq!(result, vec![0x03, 0x04]);
    }

    #[test]
    fn test_write_into_existing_block() {
        let platform = MockPlatform::new();
        let block = platform.alloc(0x20);

        platform.write_ptr(block + 0x8, 0xDEADBEEF);

        assert_eq!(platform.read_ptr(block + 0x8).unwrap(), 0xDEADBEEF);
        assert_eq!(platform.read::<u64>(block).unwrap(), 0);
    }

    #[test]
    fn test_std_string_inline_and_heap() {
        let platform = MockPlatform::new();
        let short = platform.alloc(0x20);
        let long = platform.alloc(0x20);

        platform.write_std_string(short, "chara/a.tex");
        platform.write_std_string(long, "chara/equipment/e0001/material/v0001/mt_c0101e0001_top_a.mtrl");

        assert_eq!(platform.read_std_string(short).unwrap(), "chara/a.tex");
        assert_eq!(
            platform.read_std_string(long).unwrap(),
            "chara/equipment/e0001/material/v0001/mt_c0101e0001_top_a.mtrl"
        );
    }

    #[test]
    fn test_std_string_at_end_of_address_space() {
        let platform = MockPlatform::new();

        assert!(matches!(
            platform.read_std_string(usize::MAX - 4),
            Err(PlatformError::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_pattern_search() {
        let platform = MockPlatform::with_main_module(&[
            0x00, 0x11, 0x22, 0x33, 0xAA, 0xBB, 0xCC, 0xDD, 0x44, 0x55,
        ]);
        let module = platform.main_module().unwrap();

        let found = platform
            .scan_module(&module, &[0xAA, 0x00, 0xCC], "x?x")
            .unwrap()
            .unwrap();
        assert_eq!(found.address, module.base_address + 4);
        assert_eq!(found.offset, 4);
    }

    #[test]
    fn test_is_valid_address() {
        let platform = MockPlatform::new();
        platform.write_memory(0x1000, &[0x01, 0x02, 0x03]);

        assert!(platform.is_valid_address(0x1000));
        assert!(platform.is_valid_address(0x1002));
        assert!(!platform.is_valid_address(0x1003));
        assert!(!platform.is_valid_address(0));
    }
}
