use bitflags::bitflags;
use bytes::Bytes;
use std::any::Any;
use std::fmt;
use std::mem;
use std::ops::{Bound, RangeBounds};
use std::sync::Arc;

use crate::error::{AvError, Result};

/// Caller context handed back to a release callback.
pub type Opaque = Arc<dyn Any + Send + Sync>;

/// Callback run once when the last view of a buffer goes away.
///
/// It receives the buffer's opaque context and takes ownership of the memory.
pub type ReleaseFn = Box<dyn FnOnce(Option<Opaque>, Vec<u8>) + Send + Sync>;

bitflags! {
    /// Flags set on a raw buffer at creation.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct BufferFlags: u32 {
        /// The buffer is never writable, even through its only view.
        const READONLY = 1 << 0;
    }
}

struct RawBuffer {
    data: Vec<u8>,
    release: Option<ReleaseFn>,
    opaque: Option<Opaque>,
    flags: BufferFlags,
    reallocatable: bool,
}

impl Drop for RawBuffer {
    fn drop(&mut self) {
        let data = mem::take(&mut self.data);
        log::trace!("releasing raw buffer of {} bytes", data.len());
        if let Some(release) = self.release.take() {
            release(self.opaque.take(), data);
        }
    }
}

/// A view into a reference-counted raw buffer.
///
/// The view is exclusively writable iff it is the only live view of its raw
/// buffer. Mutable access always goes through [`BufferRef::data_mut`] or
/// [`BufferRef::make_mut`], which enforce that.
#[derive(Clone)]
pub struct BufferRef {
    buffer: Arc<RawBuffer>,
    offset: usize,
    len: usize,
}

pub(crate) fn try_alloc(size: usize) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    data.try_reserve_exact(size).map_err(|_| AvError::oom(size))?;
    data.resize(size, 0);
    Ok(data)
}

impl BufferRef {
    /// Wraps `data` in a new raw buffer with a reference count of one.
    ///
    /// `release` runs exactly once, after the last view is dropped. Without a
    /// callback the memory is simply freed.
    pub fn create(
        data: Vec<u8>,
        release: Option<ReleaseFn>,
        opaque: Option<Opaque>,
        flags: BufferFlags,
    ) -> Self {
        let len = data.len();
        BufferRef {
            buffer: Arc::new(RawBuffer {
                data,
                release,
                opaque,
                flags,
                reallocatable: false,
            }),
            offset: 0,
            len,
        }
    }

    /// Takes ownership of `data` without copying.
    pub fn from_vec(data: Vec<u8>) -> Self {
        Self::create(data, None, None, BufferFlags::empty())
    }

    /// Allocates a zero-initialised buffer of `size` bytes.
    pub fn alloc(size: usize) -> Result<Self> {
        Ok(Self::from_vec(try_alloc(size)?))
    }

    /// Bytes covered by this view.
    pub fn data(&self) -> &[u8] {
        &self.buffer.data[self.offset..self.offset + self.len]
    }

    /// Mutable bytes, only if this view is writable.
    pub fn data_mut(&mut self) -> Option<&mut [u8]> {
        if self.buffer.flags.contains(BufferFlags::READONLY) {
            return None;
        }
        let (start, end) = (self.offset, self.offset + self.len);
        Arc::get_mut(&mut self.buffer).map(|raw| &mut raw.data[start..end])
    }

    /// Copies on write if needed, then returns the mutable bytes.
    pub fn make_mut(&mut self) -> Result<&mut [u8]> {
        self.make_exclusive()?;
        self.data_mut()
            .ok_or_else(|| AvError::InvalidState("buffer still shared after copy".into()))
    }

    /// Bytes in this view.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the view is zero bytes long.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Start of this view, for identity checks.
    pub fn as_ptr(&self) -> *const u8 {
        self.data().as_ptr()
    }

    /// Number of live views of the raw buffer.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.buffer)
    }

    /// True iff no other view shares the raw buffer.
    pub fn is_exclusive(&self) -> bool {
        self.ref_count() == 1
    }

    /// Exclusive and not read-only.
    pub fn is_writable(&self) -> bool {
        !self.buffer.flags.contains(BufferFlags::READONLY) && self.is_exclusive()
    }

    /// Flags the raw buffer was created with.
    pub fn flags(&self) -> BufferFlags {
        self.buffer.flags
    }

    /// Context passed at creation, if any.
    pub fn opaque(&self) -> Option<&Opaque> {
        self.buffer.opaque.as_ref()
    }

    /// Whether both views share one raw buffer.
    pub fn ptr_eq(&self, other: &BufferRef) -> bool {
        Arc::ptr_eq(&self.buffer, &other.buffer)
    }

    /// Whether `ptr` lies inside the raw buffer behind this view.
    pub fn contains_ptr(&self, ptr: *const u8) -> bool {
        let range = self.buffer.data.as_ptr_range();
        range.contains(&ptr)
    }

    /// Ensures this view is the sole owner of writable memory.
    ///
    /// An exclusive view is left untouched. Otherwise the bytes are copied
    /// into a fresh allocation and this view's old reference is released.
    pub fn make_exclusive(&mut self) -> Result<()> {
        if self.is_writable() {
            return Ok(());
        }
        let mut data = try_alloc(self.len)?;
        data.copy_from_slice(self.data());
        *self = BufferRef::from_vec(data);
        Ok(())
    }

    /// A narrower view sharing the same raw buffer.
    pub fn slice(&self, range: impl RangeBounds<usize>) -> Result<BufferRef> {
        let start = match range.start_bound() {
            Bound::Included(&n) => n,
            Bound::Excluded(&n) => n + 1,
            Bound::Unbounded => 0,
        };
        let end = match range.end_bound() {
            Bound::Included(&n) => n + 1,
            Bound::Excluded(&n) => n,
            Bound::Unbounded => self.len,
        };
        if start > end {
            return Err(AvError::OutOfRange { index: start, len: end });
        }
        if end > self.len {
            return Err(AvError::OutOfRange { index: end, len: self.len });
        }
        Ok(BufferRef {
            buffer: Arc::clone(&self.buffer),
            offset: self.offset + start,
            len: end - start,
        })
    }

    /// Zero-copy conversion; the raw buffer lives as long as the `Bytes`.
    pub fn into_bytes(self) -> Bytes {
        Bytes::from_owner(self)
    }

    /// Points `dst` at the same data as `src`, or clears it when `src` is `None`.
    pub fn replace(dst: &mut Option<BufferRef>, src: Option<&BufferRef>) {
        let Some(src) = src else {
            unref(dst);
            return;
        };
        if let Some(current) = dst.as_mut() {
            if current.ptr_eq(src) && current.offset == src.offset {
                current.len = src.len;
                return;
            }
        }
        *dst = Some(src.clone());
    }

    /// Resizes the buffer in `slot`, allocating one if the slot is empty.
    ///
    /// Resizes in place when the buffer came from `realloc`, is writable and
    /// the view spans the whole allocation. Otherwise the bytes are copied
    /// into a new reallocatable buffer.
    pub fn realloc(slot: &mut Option<BufferRef>, size: usize) -> Result<()> {
        let Some(current) = slot.as_mut() else {
            let mut buf = BufferRef::alloc(size)?;
            if let Some(raw) = Arc::get_mut(&mut buf.buffer) {
                raw.reallocatable = true;
            }
            *slot = Some(buf);
            return Ok(());
        };

        if current.len == size {
            return Ok(());
        }

        let in_place = current.buffer.reallocatable
            && current.is_writable()
            && current.offset == 0
            && current.len == current.buffer.data.len();

        if in_place {
            if let Some(raw) = Arc::get_mut(&mut current.buffer) {
                if size > raw.data.len() {
                    let additional = size - raw.data.len();
                    raw.data
                        .try_reserve_exact(additional)
                        .map_err(|_| AvError::oom(size))?;
                }
                raw.data.resize(size, 0);
                current.len = size;
                return Ok(());
            }
        }

        let mut fresh = None;
        BufferRef::realloc(&mut fresh, size)?;
        if let Some(buf) = fresh.as_mut() {
            let n = size.min(current.len);
            if let Some(dst) = buf.data_mut() {
                dst[..n].copy_from_slice(&current.data()[..n]);
            }
        }
        *slot = fresh;
        Ok(())
    }
}

/// Releases the view in `slot`. A no-op on an empty slot.
pub fn unref(slot: &mut Option<BufferRef>) {
    slot.take();
}

impl AsRef<[u8]> for BufferRef {
    fn as_ref(&self) -> &[u8] {
        self.data()
    }
}

impl fmt::Debug for BufferRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferRef")
            .field("offset", &self.offset)
            .field("len", &self.len)
            .field("ref_count", &self.ref_count())
            .field("flags", &self.buffer.flags)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_slice_bounds() {
        let buf = BufferRef::from_vec((0u8..16).collect());
        let view = buf.slice(4..8).unwrap();
        assert_eq!(view.data(), &[4, 5, 6, 7]);
        assert_eq!(buf.ref_count(), 2);

        let inner = view.slice(1..=2).unwrap();
        assert_eq!(inner.data(), &[5, 6]);
        assert!(inner.ptr_eq(&buf));

        assert!(buf.slice(10..17).is_err());
        assert!(view.slice(3..2).is_err());
    }

    #[test]
    fn test_readonly_never_writable() {
        let mut buf = BufferRef::create(vec![1, 2, 3], None, None, BufferFlags::READONLY);
        assert!(buf.is_exclusive());
        assert!(!buf.is_writable());
        assert!(buf.data_mut().is_none());

        buf.make_mut().unwrap()[0] = 9;
        assert_eq!(buf.data(), &[9, 2, 3]);
        assert_eq!(buf.flags(), BufferFlags::empty());
    }

    #[test]
    fn test_realloc_grows_in_place() {
        let mut slot = None;
        BufferRef::realloc(&mut slot, 4).unwrap();
        slot.as_mut().unwrap().make_mut().unwrap().copy_from_slice(&[1, 2, 3, 4]);

        BufferRef::realloc(&mut slot, 6).unwrap();
        assert_eq!(slot.as_ref().unwrap().data(), &[1, 2, 3, 4, 0, 0]);

        BufferRef::realloc(&mut slot, 2).unwrap();
        assert_eq!(slot.as_ref().unwrap().data(), &[1, 2]);
    }

    #[test]
    fn test_realloc_copies_shared() {
        let mut slot = Some(BufferRef::from_vec(vec![7, 8, 9]));
        let other = slot.clone().unwrap();

        BufferRef::realloc(&mut slot, 5).unwrap();
        let grown = slot.unwrap();
        assert_eq!(grown.data(), &[7, 8, 9, 0, 0]);
        assert!(!grown.ptr_eq(&other));
        assert_eq!(other.ref_count(), 1);
    }

    #[test]
    fn test_replace() {
        let a = BufferRef::from_vec(vec![1; 8]);
        let mut dst = None;

        BufferRef::replace(&mut dst, Some(&a));
        assert_eq!(a.ref_count(), 2);

        // Same data again: no extra reference
        BufferRef::replace(&mut dst, Some(&a));
        assert_eq!(a.ref_count(), 2);

        BufferRef::replace(&mut dst, None);
        assert!(dst.is_none());
        assert_eq!(a.ref_count(), 1);
    }

    #[test]
    fn test_into_bytes_keeps_buffer_alive() {
        let buf = BufferRef::from_vec(b"payload".to_vec());
        let view = buf.clone();
        let bytes = buf.into_bytes();
        assert_eq!(&bytes[..], b"payload");
        assert_eq!(view.ref_count(), 2);
        drop(bytes);
        assert_eq!(view.ref_count(), 1);
    }
}
