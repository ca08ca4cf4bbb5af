//! Linux backend for [`ProcessPlatform`](super::ProcessPlatform)
//!
//! Regions and modules come from `/proc/self/maps`, reads go through
//! `process_vm_readv` on our own pid.

use super::{MemoryRegion, ModuleInfo, PlatformError};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};

const MAPS_PATH: &str = "/proc/self/maps";

/// One parsed line of the maps file
struct MapsLine {
    region: MemoryRegion,
    path: Option<String>,
}

fn parse_line(line: &str) -> Option<MapsLine> {
    // "address perms offset dev inode pathname"
    // "7f1234567000-7f123456a000 r-xp 00000000 08:01 123456 /usr/lib/libc.so.6"
    let mut parts = line.split_whitespace();
    let (start, end) = parts.next()?.split_once('-')?;
    let perms = parts.next()?.as_bytes();

    let start = usize::from_str_radix(start, 16).ok()?;
    let end = usize::from_str_radix(end, 16).ok()?;

    let path: Vec<&str> = parts.skip(3).collect();
    let path = (!path.is_empty()).then(|| path.join(" "));

    Some(MapsLine {
        region: MemoryRegion {
            start,
            end,
            readable: perms.first() == Some(&b'r'),
            writable: perms.get(1) == Some(&b'w'),
            executable: perms.get(2) == Some(&b'x'),
        },
        path,
    })
}

fn read_maps() -> Result<Vec<MapsLine>, PlatformError> {
    let file = File::open(MAPS_PATH)
        .map_err(|e| PlatformError::Other(format!("Failed to open {}: {}", MAPS_PATH, e)))?;

    let mut lines = Vec::new();
    for line in BufReader::new(file).lines() {
        let line =
            line.map_err(|e| PlatformError::Other(format!("Failed to read maps: {}", e)))?;
        if let Some(parsed) = parse_line(&line) {
            lines.push(parsed);
        }
    }
    Ok(lines)
}

pub(super) fn query_regions() -> Result<Vec<MemoryRegion>, PlatformError> {
    Ok(read_maps()?.into_iter().map(|l| l.region).collect())
}

/// Modules are file-backed mappings with at least one executable segment;
/// their extent spans every mapping of the same file.
pub(super) fn modules() -> Result<Vec<ModuleInfo>, PlatformError> {
    let mut extents: BTreeMap<String, (usize, usize, bool)> = BTreeMap::new();

    for line in read_maps()? {
        let Some(path) = line.path else { continue };
        if path.starts_with('[') {
            continue;
        }

        let entry = extents
            .entry(path)
            .or_insert((line.region.start, line.region.end, false));
        entry.0 = entry.0.min(line.region.start);
        entry.1 = entry.1.max(line.region.end);
        entry.2 |= line.region.executable;
    }

    let mut modules: Vec<ModuleInfo> = extents
        .into_iter()
        .filter(|(_, (_, _, executable))| *executable)
        .map(|(path, (start, end, _))| ModuleInfo {
            base_address: start,
            size: end - start,
            name: std::path::Path::new(&path)
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("")
                .to_string(),
            path,
        })
        .collect();

    modules.sort_by_key(|m| m.base_address);
    Ok(modules)
}

pub(super) fn main_module() -> Result<ModuleInfo, PlatformError> {
    let exe = std::fs::read_link("/proc/self/exe")
        .map_err(|e| PlatformError::Other(format!("Failed to resolve /proc/self/exe: {}", e)))?;
    let exe = exe.to_string_lossy();

    modules()?
        .into_iter()
        .find(|m| m.path == exe)
        .ok_or_else(|| PlatformError::ModuleNotFound(exe.into_owned()))
}

pub(super) fn read_memory(address: usize, buffer: &mut [u8]) -> Result<(), PlatformError> {
    let local = libc::iovec {
        iov_base: buffer.as_mut_ptr().cast(),
        iov_len: buffer.len(),
    };
    let remote = libc::iovec {
        iov_base: address as *mut libc::c_void,
        iov_len: buffer.len(),
    };

    // SAFETY: both iovecs describe exactly one buffer; the kernel validates the remote side.
    let read = unsafe { libc::process_vm_readv(libc::getpid(), &local, 1, &remote, 1, 0) };

    if read < 0 {
        return Err(PlatformError::MemoryReadFailed {
            address,
            size: buffer.len(),
            reason: format!("process_vm_readv failed: {}", std::io::Error::last_os_error()),
        });
    }
    if read as usize != buffer.len() {
        return Err(PlatformError::MemoryReadFailed {
            address,
            size: buffer.len(),
            reason: format!("Expected to read {} bytes, got {}", buffer.len(), read),
        });
    }

    Ok(())
}
