use std::ptr::NonNull;

use tracing::warn;

use crate::error::{JitError, JitResult};

/// Readable, writable and executable mapping owned for its whole lifetime.
///
/// The region stays W+X; platforms that forbid such mappings fail at
/// [`ExecutableMemory::allocate`].
#[derive(Debug)]
pub struct ExecutableMemory {
    ptr: NonNull<u8>,
    len: usize,
}

impl ExecutableMemory {
    pub fn allocate(len: usize) -> JitResult<Self> {
        if len == 0 {
            return Err(JitError::Alloc(
                "cannot create executable region of zero bytes".to_string(),
            ));
        }
        let ptr = alloc_executable_region(len)?;
        let ptr = NonNull::new(ptr)
            .ok_or_else(|| JitError::Alloc("allocator returned a null region".to_string()))?;
        Ok(Self { ptr, len })
    }

    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Unmaps now instead of at drop.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for ExecutableMemory {
    fn drop(&mut self) {
        if let Err(err) = free_executable_region(self.ptr.as_ptr(), self.len) {
            warn!("failed to release {} byte executable region: {err}", self.len);
        }
    }
}

#[cfg(target_os = "macos")]
const MMAP_FLAGS: libc::c_int = libc::MAP_ANON | libc::MAP_PRIVATE | libc::MAP_JIT;
#[cfg(all(unix, not(target_os = "macos")))]
const MMAP_FLAGS: libc::c_int = libc::MAP_ANON | libc::MAP_PRIVATE;

#[cfg(unix)]
fn alloc_executable_region(len: usize) -> JitResult<*mut u8> {
    let prot = libc::PROT_READ | libc::PROT_WRITE | libc::PROT_EXEC;
    let region = unsafe { libc::mmap(std::ptr::null_mut(), len, prot, MMAP_FLAGS, -1, 0) };
    if region == libc::MAP_FAILED {
        let err = std::io::Error::last_os_error();
        return Err(JitError::Alloc(format!(
            "could not map {len} executable bytes: {err}"
        )));
    }
    Ok(region.cast())
}

#[cfg(unix)]
fn free_executable_region(ptr: *mut u8, len: usize) -> JitResult<()> {
    if ptr.is_null() {
        return Ok(());
    }
    if unsafe { libc::munmap(ptr.cast(), len) } != 0 {
        let err = std::io::Error::last_os_error();
        return Err(JitError::Alloc(format!("could not unmap {len} bytes: {err}")));
    }
    Ok(())
}

#[cfg(target_os = "windows")]
fn alloc_executable_region(len: usize) -> JitResult<*mut u8> {
    use windows_sys::Win32::System::Memory::{
        MEM_COMMIT, MEM_RESERVE, PAGE_EXECUTE_READWRITE, VirtualAlloc,
    };

    let region = unsafe {
        VirtualAlloc(
            std::ptr::null_mut(),
            len,
            MEM_COMMIT | MEM_RESERVE,
            PAGE_EXECUTE_READWRITE,
        )
    };
    if region.is_null() {
        let err = std::io::Error::last_os_error();
        return Err(JitError::Alloc(format!(
            "could not reserve {len} executable bytes: {err}"
        )));
    }
    Ok(region.cast())
}

#[cfg(target_os = "windows")]
fn free_executable_region(ptr: *mut u8, _len: usize) -> JitResult<()> {
    use windows_sys::Win32::System::Memory::{MEM_RELEASE, VirtualFree};

    if ptr.is_null() {
        return Ok(());
    }
    if unsafe { VirtualFree(ptr.cast(), 0, MEM_RELEASE) } == 0 {
        let err = std::io::Error::last_os_error();
        return Err(JitError::Alloc(format!("could not release region: {err}")));
    }
    Ok(())
}

#[cfg(not(any(unix, target_os = "windows")))]
fn alloc_executable_region(_len: usize) -> JitResult<*mut u8> {
    Err(JitError::Alloc(
        "executable memory allocation not implemented for this platform".to_string(),
    ))
}

#[cfg(not(any(unix, target_os = "windows")))]
fn free_executable_region(_ptr: *mut u8, _len: usize) -> JitResult<()> {
    Ok(())
}
