//! In-process platform
//!
//! The crate runs inside the game client, so every read targets the current
//! process. Reads still go through the OS (`process_vm_readv` /
//! `ReadProcessMemory`) so that memory the game frees while a tree is being
//! walked turns into an error instead of a crash.

use super::{MemoryReader, MemoryRegion, ModuleInfo, Platform, PlatformError};
use parking_lot::RwLock;
use std::time::{Duration, Instant};

#[cfg(unix)]
use super::linux as os;
#[cfg(windows)]
use super::windows as os;

/// Cached region list used for address validation
struct RegionCache {
    regions: Vec<MemoryRegion>,
    last_update: Option<Instant>,
}

impl RegionCache {
    const CACHE_DURATION: Duration = Duration::from_secs(1);

    fn is_stale(&self) -> bool {
        self.last_update
            .map_or(true, |at| at.elapsed() > Self::CACHE_DURATION)
    }

    fn contains(&self, address: usize) -> bool {
        self.regions
            .iter()
            .any(|r| r.readable && r.contains(address))
    }
}

/// Platform implementation for the process this library is loaded into
pub struct ProcessPlatform {
    regions: RwLock<RegionCache>,
}

impl ProcessPlatform {
    /// Create a platform for the current process
    pub fn new() -> Result<Self, PlatformError> {
        let platform = Self {
            regions: RwLock::new(RegionCache {
                regions: Vec::new(),
                last_update: None,
            }),
        };
        platform.refresh_regions()?;
        Ok(platform)
    }

    /// Re-query the OS for the region list
    pub fn refresh_regions(&self) -> Result<(), PlatformError> {
        let regions = os::query_regions()?;
        let mut cache = self.regions.write();
        cache.regions = regions;
        cache.last_update = Some(Instant::now());
        Ok(())
    }
}

impl MemoryReader for ProcessPlatform {
    fn read_bytes(&self, address: usize, size: usize) -> Result<Vec<u8>, PlatformError> {
        if size == 0 {
            return Ok(Vec::new());
        }

        if !self.is_valid_address(address) {
            return Err(PlatformError::InvalidAddress(address));
        }

        let mut buffer = vec![0u8; size];
        os::read_memory(address, &mut buffer)?;
        Ok(buffer)
    }

    fn is_valid_address(&self, address: usize) -> bool {
        if address < 0x10000 {
            return false;
        }

        {
            let cache = self.regions.read();
            if cache.contains(address) {
                return true;
            }
            if !cache.is_stale() {
                return false;
            }
        }

        // A miss on a stale cache may just be a freshly mapped allocation.
        if let Err(e) = self.refresh_regions() {
            tracing::warn!("Could not refresh memory regions: {}", e);
            return false;
        }
        self.regions.read().contains(address)
    }
}

impl Platform for ProcessPlatform {
    fn get_modules(&self) -> Result<Vec<ModuleInfo>, PlatformError> {
        os::modules()
    }

    fn main_module(&self) -> Result<ModuleInfo, PlatformError> {
        os::main_module()
    }

    fn get_memory_regions(&self) -> Result<Vec<MemoryRegion>, PlatformError> {
        if self.regions.read().is_stale() {
            self.refresh_regions()?;
        }
        Ok(self.regions.read().regions.clone())
    }
}
