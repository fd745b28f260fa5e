//! Read-only access to named shared-memory segments.
//!
//! [`SharedSegment::open`] maps a segment another process has published.
//! The mapping is never writable and lives only as long as the value:
//! dropping it unmaps the view and closes the OS handle, on every path.
//! Callers copy out an owned [`snapshot_prefix`](SharedSegment::snapshot_prefix)
//! covering just the records they need and decode that, so no reference
//! into producer memory outlives the mapping.

use std::io;

use gputap_core::error::DecodeError;

/// A read-only view of a named shared-memory segment.
pub struct SharedSegment {
    name: String,
    view: sys::View,
}

impl SharedSegment {
    /// Open and map an existing segment.
    ///
    /// A missing segment, denied access, or a zero-length segment all map
    /// to [`DecodeError::SegmentUnavailable`].
    pub fn open(name: &str) -> Result<Self, DecodeError> {
        let view = sys::View::open(name).map_err(|source| DecodeError::SegmentUnavailable {
            name: name.to_owned(),
            source,
        })?;
        Ok(Self {
            name: name.to_owned(),
            view,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Length of the mapped region in bytes.
    pub fn len(&self) -> usize {
        self.view.len
    }

    pub fn is_empty(&self) -> bool {
        self.view.len == 0
    }

    /// Copy the whole mapped region into an owned buffer.
    pub fn snapshot(&self) -> Vec<u8> {
        self.snapshot_prefix(self.view.len)
    }

    /// Copy the first `len` bytes of the mapping, or all of it if shorter.
    ///
    /// The producer keeps writing while we copy, so individual records may
    /// be torn; every decoded field is validated afterwards anyway.
    pub fn snapshot_prefix(&self, len: usize) -> Vec<u8> {
        let len = len.min(self.view.len);
        let mut buf = vec![0u8; len];
        // Safety: `ptr` is valid for `view.len >= len` readable bytes until
        // the view is dropped, and `buf` is a distinct allocation.
        unsafe {
            std::ptr::copy_nonoverlapping(self.view.ptr.as_ptr(), buf.as_mut_ptr(), len);
        }
        buf
    }
}

impl std::fmt::Debug for SharedSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedSegment")
            .field("name", &self.name)
            .field("len", &self.view.len)
            .finish()
    }
}

fn empty_segment() -> io::Error {
    io::Error::new(io::ErrorKind::UnexpectedEof, "segment has zero length")
}

#[cfg(unix)]
mod sys {
    use std::ffi::CString;
    use std::io;
    use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
    use std::ptr::NonNull;

    pub(super) struct View {
        pub(super) ptr: NonNull<u8>,
        pub(super) len: usize,
        _fd: OwnedFd,
    }

    impl View {
        /// `shm_open` the segment read-only, size it with `fstat`, and map it.
        pub(super) fn open(name: &str) -> io::Result<Self> {
            let path = if name.starts_with('/') {
                name.to_owned()
            } else {
                format!("/{name}")
            };
            let c_name = CString::new(path)
                .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "invalid name"))?;

            let fd = unsafe { libc::shm_open(c_name.as_ptr(), libc::O_RDONLY, 0) };
            if fd < 0 {
                return Err(io::Error::last_os_error());
            }
            let fd = unsafe { OwnedFd::from_raw_fd(fd) };

            let mut stat: libc::stat = unsafe { std::mem::zeroed() };
            if unsafe { libc::fstat(fd.as_raw_fd(), &mut stat) } < 0 {
                return Err(io::Error::last_os_error());
            }
            let len = usize::try_from(stat.st_size)
                .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "negative segment size"))?;
            if len == 0 {
                return Err(super::empty_segment());
            }

            let ptr = unsafe {
                libc::mmap(
                    std::ptr::null_mut(),
                    len,
                    libc::PROT_READ,
                    libc::MAP_SHARED,
                    fd.as_raw_fd(),
                    0,
                )
            };
            if ptr == libc::MAP_FAILED {
                return Err(io::Error::last_os_error());
            }

            let ptr = NonNull::new(ptr.cast::<u8>())
                .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "mmap returned null"))?;
            Ok(Self { ptr, len, _fd: fd })
        }
    }

    impl Drop for View {
        fn drop(&mut self) {
            unsafe {
                libc::munmap(self.ptr.as_ptr().cast(), self.len);
            }
        }
    }
}

#[cfg(windows)]
mod sys {
    use std::ffi::OsStr;
    use std::io;
    use std::os::windows::ffi::OsStrExt;
    use std::ptr::NonNull;

    use windows_sys::Win32::Foundation::{CloseHandle, FALSE, HANDLE};
    use windows_sys::Win32::System::Memory::{
        MapViewOfFile, OpenFileMappingW, UnmapViewOfFile, VirtualQuery, FILE_MAP_READ,
        MEMORY_BASIC_INFORMATION, MEMORY_MAPPED_VIEW_ADDRESS,
    };

    pub(super) struct View {
        pub(super) ptr: NonNull<u8>,
        pub(super) len: usize,
        handle: HANDLE,
    }

    impl View {
        /// Open the named file mapping read-only and map the whole object.
        ///
        /// The view size is taken from `VirtualQuery`, which reports the
        /// page-rounded region size of the mapping.
        pub(super) fn open(name: &str) -> io::Result<Self> {
            let wide: Vec<u16> = OsStr::new(name).encode_wide().chain(Some(0)).collect();

            let handle = unsafe { OpenFileMappingW(FILE_MAP_READ, FALSE, wide.as_ptr()) };
            if handle.is_null() {
                return Err(io::Error::last_os_error());
            }

            let view = unsafe { MapViewOfFile(handle, FILE_MAP_READ, 0, 0, 0) };
            if view.Value.is_null() {
                let err = io::Error::last_os_error();
                unsafe { CloseHandle(handle) };
                return Err(err);
            }

            let mut info: MEMORY_BASIC_INFORMATION = unsafe { std::mem::zeroed() };
            let written = unsafe {
                VirtualQuery(
                    view.Value,
                    &mut info,
                    std::mem::size_of::<MEMORY_BASIC_INFORMATION>(),
                )
            };
            if written == 0 || info.RegionSize == 0 {
                let err = if written == 0 {
                    io::Error::last_os_error()
                } else {
                    super::empty_segment()
                };
                unsafe {
                    UnmapViewOfFile(view);
                    CloseHandle(handle);
                }
                return Err(err);
            }

            let ptr = NonNull::new(view.Value.cast::<u8>())
                .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "null view"))?;
            Ok(Self {
                ptr,
                len: info.RegionSize,
                handle,
            })
        }
    }

    impl Drop for View {
        fn drop(&mut self) {
            unsafe {
                UnmapViewOfFile(MEMORY_MAPPED_VIEW_ADDRESS {
                    Value: self.ptr.as_ptr().cast(),
                });
                CloseHandle(self.handle);
            }
        }
    }
}

#[cfg(not(any(unix, windows)))]
mod sys {
    use std::io;
    use std::ptr::NonNull;

    pub(super) struct View {
        pub(super) ptr: NonNull<u8>,
        pub(super) len: usize,
    }

    impl View {
        pub(super) fn open(_name: &str) -> io::Result<Self> {
            Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "named shared memory is not supported on this platform",
            ))
        }
    }
}
