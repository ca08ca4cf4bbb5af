//! Windows backend for [`ProcessPlatform`](super::ProcessPlatform)
//!
//! Uses `VirtualQuery` for the region list and `ReadProcessMemory` on the
//! pseudo handle of the current process for fault-tolerant reads.

use super::{MemoryRegion, ModuleInfo, PlatformError};
use std::ffi::OsString;
use std::os::windows::ffi::OsStringExt;
use windows::core::PCWSTR;
use windows::Win32::Foundation::HMODULE;
use windows::Win32::System::Diagnostics::Debug::ReadProcessMemory;
use windows::Win32::System::LibraryLoader::{GetModuleFileNameW, GetModuleHandleW};
use windows::Win32::System::Memory::{
    VirtualQuery, MEMORY_BASIC_INFORMATION, MEM_COMMIT, PAGE_EXECUTE, PAGE_EXECUTE_READ,
    PAGE_EXECUTE_READWRITE, PAGE_EXECUTE_WRITECOPY, PAGE_GUARD, PAGE_PROTECTION_FLAGS,
    PAGE_READONLY, PAGE_READWRITE, PAGE_WRITECOPY,
};
use windows::Win32::System::ProcessStatus::{EnumProcessModules, GetModuleInformation, MODULEINFO};
use windows::Win32::System::Threading::GetCurrentProcess;

pub(super) fn query_regions() -> Result<Vec<MemoryRegion>, PlatformError> {
    let mut regions = Vec::new();
    let mut address = 0usize;

    loop {
        let mut mbi = MEMORY_BASIC_INFORMATION::default();

        // SAFETY: mbi is a valid out buffer of the advertised size.
        let written = unsafe {
            VirtualQuery(
                Some(address as *const _),
                &mut mbi,
                std::mem::size_of::<MEMORY_BASIC_INFORMATION>(),
            )
        };
        if written == 0 {
            break;
        }

        let base = mbi.BaseAddress as usize;
        if mbi.State == MEM_COMMIT && (mbi.Protect & PAGE_GUARD).0 == 0 {
            let protect = mbi.Protect;
            let any = |flags: &[PAGE_PROTECTION_FLAGS]| flags.iter().any(|&f| (protect & f).0 != 0);

            regions.push(MemoryRegion {
                start: base,
                end: base + mbi.RegionSize,
                readable: any(&[
                    PAGE_READONLY,
                    PAGE_READWRITE,
                    PAGE_WRITECOPY,
                    PAGE_EXECUTE_READ,
                    PAGE_EXECUTE_READWRITE,
                    PAGE_EXECUTE_WRITECOPY,
                ]),
                writable: any(&[
                    PAGE_READWRITE,
                    PAGE_WRITECOPY,
                    PAGE_EXECUTE_READWRITE,
                    PAGE_EXECUTE_WRITECOPY,
                ]),
                executable: any(&[
                    PAGE_EXECUTE,
                    PAGE_EXECUTE_READ,
                    PAGE_EXECUTE_READWRITE,
                    PAGE_EXECUTE_WRITECOPY,
                ]),
            });
        }

        address = base + mbi.RegionSize;
        if address <= base {
            break;
        }
    }

    Ok(regions)
}

fn module_info(hmodule: HMODULE) -> Result<ModuleInfo, PlatformError> {
    let mut info = MODULEINFO::default();

    // SAFETY: info is a valid out buffer; hmodule came from the loader.
    unsafe {
        GetModuleInformation(
            GetCurrentProcess(),
            hmodule,
            &mut info,
            std::mem::size_of::<MODULEINFO>() as u32,
        )
    }
    .map_err(|e| PlatformError::Other(format!("GetModuleInformation failed: {}", e)))?;

    let mut path_buf = vec![0u16; 1024];
    // SAFETY: the buffer length is passed through the slice.
    let path_len = unsafe { GetModuleFileNameW(hmodule, &mut path_buf) } as usize;
    let path = OsString::from_wide(&path_buf[..path_len])
        .to_string_lossy()
        .into_owned();

    let name = std::path::Path::new(&path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("")
        .to_string();

    Ok(ModuleInfo {
        base_address: info.lpBaseOfDll as usize,
        size: info.SizeOfImage as usize,
        name,
        path,
    })
}

pub(super) fn modules() -> Result<Vec<ModuleInfo>, PlatformError> {
    let mut handles = vec![HMODULE::default(); 1024];
    let mut bytes_needed = 0u32;

    // SAFETY: the buffer size is passed in bytes as required.
    unsafe {
        EnumProcessModules(
            GetCurrentProcess(),
            handles.as_mut_ptr(),
            (handles.len() * std::mem::size_of::<HMODULE>()) as u32,
            &mut bytes_needed,
        )
    }
    .map_err(|e| PlatformError::Other(format!("EnumProcessModules failed: {}", e)))?;

    handles.truncate((bytes_needed as usize / std::mem::size_of::<HMODULE>()).min(1024));
    handles.into_iter().map(module_info).collect()
}

pub(super) fn main_module() -> Result<ModuleInfo, PlatformError> {
    // SAFETY: a null name asks for the executable that created the process.
    let hmodule = unsafe { GetModuleHandleW(PCWSTR::null()) }
        .map_err(|e| PlatformError::ModuleNotFound(format!("main executable: {}", e)))?;
    module_info(hmodule)
}

pub(super) fn read_memory(address: usize, buffer: &mut [u8]) -> Result<(), PlatformError> {
    let mut bytes_read = 0usize;

    // SAFETY: ReadProcessMemory validates the source range and fails instead of faulting.
    unsafe {
        ReadProcessMemory(
            GetCurrentProcess(),
            address as *const _,
            buffer.as_mut_ptr().cast(),
            buffer.len(),
            Some(&mut bytes_read),
        )
    }
    .map_err(|e| PlatformError::MemoryReadFailed {
        address,
        size: buffer.len(),
        reason: format!("ReadProcessMemory failed: {}", e),
    })?;

    if bytes_read != buffer.len() {
        return Err(PlatformError::MemoryReadFailed {
            address,
            size: buffer.len(),
            reason: format!("Expected to read {} bytes, got {}", buffer.len(), bytes_read),
        });
    }

    Ok(())
}
