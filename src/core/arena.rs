// This module owns the single executable memory region that backs every compiled
// method for the lifetime of the process. CodeArena maps a fixed-capacity anonymous
// region and maintains a write cursor; write() appends bytes at the cursor and
// returns their address, flipping the whole region to read-write before copying and
// back to read-execute afterwards so the mapping is never writable and executable at
// the same time. with_position() temporarily redirects the cursor to an
// already-written offset so the branch linker can patch earlier bytes and then
// restores the append position, leaving later methods' code untouched. Capacity is
// enforced: an append that does not fit returns a typed ArenaExhausted error rather
// than writing past the mapping. The arena is a plain owned object; the compiler
// driver wraps it in a Mutex and treats each write as a critical section.

//! The executable code region.

use crate::core::error::{CompileError, CompileResult};

/// Default arena capacity: 1 MiB of code shared by all compiled methods.
pub const DEFAULT_CAPACITY: usize = 1024 * 1024;

/// A fixed-capacity write-XOR-execute memory region with a write cursor.
pub struct CodeArena {
    base: *mut u8,
    capacity: usize,
    cursor: usize,
}

// The arena is the sole owner of its mapping; the raw pointer never aliases
// another Rust object.
unsafe impl Send for CodeArena {}

impl CodeArena {
    pub fn new() -> CompileResult<Self> {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> CompileResult<Self> {
        let base = map_region(capacity).map_err(|source| CompileError::ArenaProtection {
            op: "map",
            source,
        })?;
        log::debug!("mapped {capacity} byte code arena at {:#x}", base as u64);
        Ok(Self {
            base,
            capacity,
            cursor: 0,
        })
    }

    /// Address of the first byte of the region.
    pub fn base(&self) -> u64 {
        self.base as u64
    }

    /// Address the next write will land at.
    pub fn position(&self) -> u64 {
        self.base as u64 + self.cursor as u64
    }

    /// One past the last mappable byte. Used as a worst-case-distance
    /// placeholder when sizing branch slots; never a valid jump target.
    pub fn end(&self) -> u64 {
        self.base as u64 + self.capacity as u64
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append bytes at the cursor and return their address.
    pub fn write(&mut self, bytes: &[u8]) -> CompileResult<u64> {
        let addr = self.position();
        if bytes.is_empty() {
            return Ok(addr);
        }
        let remaining = self.capacity - self.cursor;
        if bytes.len() > remaining {
            return Err(CompileError::ArenaExhausted {
                requested: bytes.len(),
                remaining,
            });
        }

        self.protect(true)?;
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), self.base.add(self.cursor), bytes.len());
        }
        self.protect(false)?;

        self.cursor += bytes.len();
        Ok(addr)
    }

    /// Run `f` with the cursor moved to an already-written address, then
    /// restore the append position. This is how earlier offsets get patched
    /// without disturbing where the next method's code will land.
    pub fn with_position<R>(
        &mut self,
        addr: u64,
        f: impl FnOnce(&mut Self) -> CompileResult<R>,
    ) -> CompileResult<R> {
        let offset = addr
            .checked_sub(self.base())
            .filter(|&o| o <= self.cursor as u64)
            .ok_or(CompileError::AddressOutOfArena { addr })? as usize;

        let saved = self.cursor;
        self.cursor = offset;
        let result = f(self);
        self.cursor = saved;
        result
    }

    /// The bytes written so far. Diagnostic reads only; the region stays
    /// read-execute.
    pub fn written(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.base, self.cursor) }
    }

    fn protect(&self, writable: bool) -> CompileResult<()> {
        protect_region(self.base, self.capacity, writable).map_err(|source| {
            CompileError::ArenaProtection {
                op: if writable { "unprotect" } else { "protect" },
                source,
            }
        })
    }
}

impl Drop for CodeArena {
    fn drop(&mut self) {
        unmap_region(self.base, self.capacity);
    }
}

#[cfg(unix)]
fn map_region(len: usize) -> std::io::Result<*mut u8> {
    let ptr = unsafe {
        libc::mmap(
            std::ptr::null_mut(),
            len,
            libc::PROT_READ | libc::PROT_EXEC,
            libc::MAP_ANON | libc::MAP_PRIVATE,
            -1,
            0,
        )
    };
    if ptr == libc::MAP_FAILED {
        return Err(std::io::Error::last_os_error());
    }
    Ok(ptr as *mut u8)
}

#[cfg(unix)]
fn protect_region(ptr: *mut u8, len: usize, writable: bool) -> std::io::Result<()> {
    let prot = if writable {
        libc::PROT_READ | libc::PROT_WRITE
    } else {
        libc::PROT_READ | libc::PROT_EXEC
    };
    let rc = unsafe { libc::mprotect(ptr as *mut _, len, prot) };
    if rc != 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(unix)]
fn unmap_region(ptr: *mut u8, len: usize) {
    if !ptr.is_null() {
        unsafe {
            libc::munmap(ptr as *mut _, len);
        }
    }
}

#[cfg(not(unix))]
fn map_region(_len: usize) -> std::io::Result<*mut u8> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "executable memory mapping is only implemented for unix targets",
    ))
}

#[cfg(not(unix))]
fn protect_region(_ptr: *mut u8, _len: usize, _writable: bool) -> std::io::Result<()> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "executable memory protection is only implemented for unix targets",
    ))
}

#[cfg(not(unix))]
fn unmap_region(_ptr: *mut u8, _len: usize) {}
