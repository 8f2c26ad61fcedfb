//! # Reference-counted buffers
//!
//! A [`BufferRef`] is a cheap, independently owned view into a shared raw
//! allocation. Cloning a view bumps an atomic reference count; dropping the
//! last view runs the buffer's release callback exactly once.
//!
//! ```rust
//! use avcore::buffer::BufferRef;
//!
//! # fn main() -> avcore::Result<()> {
//! let mut buf = BufferRef::alloc(16)?;
//! buf.make_mut()?[0] = 0xff;
//!
//! let shared = buf.clone();
//! assert_eq!(buf.ref_count(), 2);
//! assert!(!buf.is_exclusive());
//!
//! // Writing through a shared view copies first
//! buf.make_mut()?[1] = 0x01;
//! assert_eq!(shared.data()[1], 0);
//! # Ok(())
//! # }
//! ```
//!
//! [`BufferPool`] recycles fixed-size allocations: a pooled view returns its
//! memory to the pool's free list instead of freeing it.

mod buffer_ref;
mod pool;

pub use buffer_ref::*;
pub use pool::*;

#[cfg(test)]
mod tests;
