use super::*;
use crate::error::AvError;
use pretty_assertions::assert_eq;
use quickcheck_macros::quickcheck;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

fn counted(size: usize) -> (BufferRef, Arc<AtomicUsize>) {
    let released = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&released);
    let buf = BufferRef::create(
        vec![0; size],
        Some(Box::new(move |_: Option<Opaque>, _: Vec<u8>| {
            counter.fetch_add(1, Ordering::SeqCst);
        })),
        None,
        BufferFlags::empty(),
    );
    (buf, released)
}

#[test]
fn test_clone_release_scenario() {
    let (buf, released) = counted(4096);
    let a = buf.clone();
    let b = a.clone();
    assert_eq!(buf.ref_count(), 3);

    drop(a);
    assert_eq!(buf.ref_count(), 2);
    assert!(!buf.is_exclusive());
    assert_eq!(released.load(Ordering::SeqCst), 0);

    drop(b);
    drop(buf);
    assert_eq!(released.load(Ordering::SeqCst), 1);
}

#[test]
fn test_release_callback_gets_opaque_and_data() {
    let seen = Arc::new(parking_lot::Mutex::new(None));
    let sink = Arc::clone(&seen);
    let opaque: Opaque = Arc::new(42u32);
    let buf = BufferRef::create(
        vec![5; 3],
        Some(Box::new(move |opaque: Option<Opaque>, data: Vec<u8>| {
            let tag = opaque.and_then(|o| o.downcast_ref::<u32>().copied());
            *sink.lock() = Some((tag, data));
        })),
        Some(opaque),
        BufferFlags::empty(),
    );
    assert_eq!(buf.opaque().and_then(|o| o.downcast_ref::<u32>()), Some(&42));
    drop(buf);
    assert_eq!(*seen.lock(), Some((Some(42), vec![5, 5, 5])));
}

#[test]
fn test_exclusivity_follows_clones() {
    let buf = BufferRef::alloc(8).unwrap();
    assert!(buf.is_exclusive());

    let other = buf.clone();
    assert!(!buf.is_exclusive());
    assert!(!other.is_exclusive());

    drop(other);
    assert!(buf.is_exclusive());
}

#[test]
fn test_unref_is_idempotent() {
    let (buf, released) = counted(16);
    let mut slot = Some(buf);
    unref(&mut slot);
    unref(&mut slot);
    assert!(slot.is_none());
    assert_eq!(released.load(Ordering::SeqCst), 1);

    let empty: Option<BufferRef> = None;
    assert!(empty.clone().is_none());
}

#[test]
fn test_make_exclusive_keeps_exclusive_buffer() {
    let mut buf = BufferRef::alloc(64).unwrap();
    let before = buf.as_ptr();
    buf.make_exclusive().unwrap();
    assert_eq!(buf.as_ptr(), before);
}

#[test]
fn test_make_exclusive_copies_shared_buffer() {
    let mut original = BufferRef::from_vec((0u8..32).collect());
    let mut a = original.clone();
    let mut b = original.clone();

    a.make_exclusive().unwrap();
    b.make_exclusive().unwrap();

    assert!(!a.ptr_eq(&b));
    assert!(!a.ptr_eq(&original));
    assert_eq!(a.data(), b.data());
    assert_eq!(a.data(), original.data());
    assert!(a.is_exclusive() && b.is_exclusive() && original.is_exclusive());

    a.data_mut().unwrap()[0] = 0xaa;
    assert_eq!(original.data_mut().unwrap()[0], 0);
}

#[test]
fn test_data_mut_gated_on_exclusivity() {
    let mut buf = BufferRef::alloc(4).unwrap();
    let shared = buf.clone();
    assert!(buf.data_mut().is_none());
    drop(shared);
    assert!(buf.data_mut().is_some());
}

#[test]
fn test_concurrent_clone_release() {
    let (buf, released) = counted(1024);
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let local = buf.clone();
            thread::spawn(move || {
                for _ in 0..1000 {
                    let extra = local.clone();
                    assert!(extra.ref_count() >= 2);
                    drop(extra);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(buf.ref_count(), 1);
    drop(buf);
    assert_eq!(released.load(Ordering::SeqCst), 1);
}

#[quickcheck]
fn prop_release_fires_once_after_last_drop(ops: Vec<bool>) -> bool {
    let (buf, released) = counted(4);
    let mut live = vec![buf];

    // true clones the last view, false drops one
    for op in ops {
        if op {
            if let Some(last) = live.last() {
                live.push(last.clone());
            }
        } else if live.len() > 1 {
            live.pop();
        }
        if released.load(Ordering::SeqCst) != 0 || live[0].ref_count() != live.len() {
            return false;
        }
    }

    live.clear();
    released.load(Ordering::SeqCst) == 1
}

#[test]
fn test_pool_reuses_returned_buffers() {
    let pool = BufferPool::with_limits(256, 8, |size| Ok(vec![0; size]));
    let first = pool.get().unwrap();
    let ptr = first.as_ptr();
    drop(first);

    assert_eq!(pool.free_count(), 1);
    let second = pool.get().unwrap();
    assert_eq!(second.as_ptr(), ptr);
    assert_eq!(pool.free_count(), 0);
}

#[test]
fn test_pool_refcount_round_trip() {
    let pool = BufferPool::new(128);
    assert_eq!(pool.ref_count(), 1);

    let bufs: Vec<_> = (0..5).map(|_| pool.get().unwrap()).collect();
    assert_eq!(pool.ref_count(), 6);

    drop(bufs);
    assert_eq!(pool.ref_count(), 1);
    assert!(pool.free_count() <= 5);
}

#[test]
fn test_pool_caps_free_list() {
    let pool = BufferPool::with_limits(16, 2, |size| Ok(vec![0; size]));
    let bufs: Vec<_> = (0..4).map(|_| pool.get().unwrap()).collect();
    drop(bufs);
    assert_eq!(pool.free_count(), 2);

    pool.flush();
    assert_eq!(pool.free_count(), 0);
}

#[test]
fn test_pool_outlives_owner_handle() {
    let allocations = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&allocations);
    let pool = BufferPool::with_allocator(32, move |size| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(vec![0; size])
    });
    assert_eq!(pool.state(), PoolState::Active);

    let mut buf = pool.get().unwrap();
    drop(pool);

    // The buffer stays usable after the owner is gone
    buf.make_mut().unwrap()[0] = 1;
    assert_eq!(buf.data()[0], 1);
    drop(buf);
    assert_eq!(allocations.load(Ordering::SeqCst), 1);
}

#[test]
fn test_pool_allocator_errors_propagate() {
    let pool = BufferPool::with_allocator(64, |size| Err(AvError::OutOfMemory { requested: size }));
    assert!(matches!(pool.get(), Err(AvError::OutOfMemory { requested: 64 })));
    assert_eq!(pool.ref_count(), 1);

    let short = BufferPool::with_allocator(64, |_| Ok(vec![0; 8]));
    assert!(matches!(short.get(), Err(AvError::InvalidState(_))));
}

#[test]
fn test_pool_allocator_closure_slices() {
    let pool = BufferPool::new(100);
    let mut alloc = pool.allocator();
    let buf = alloc(40).unwrap();
    assert_eq!(buf.len(), 40);
    assert!(matches!(alloc(101), Err(AvError::FormatMismatch(_))));
    drop(buf);
    assert_eq!(pool.free_count(), 1);
}

#[test]
fn test_pool_concurrent_checkout_and_teardown() {
    let pool = Arc::new(BufferPool::new(512));
    let outstanding: Vec<_> = (0..4).map(|_| pool.get().unwrap()).collect();

    let workers: Vec<_> = (0..4)
        .map(|_| {
            let pool = Arc::clone(&pool);
            thread::spawn(move || {
                for _ in 0..200 {
                    let mut buf = pool.get().unwrap();
                    buf.make_mut().unwrap()[0] = 7;
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }
    assert_eq!(pool.ref_count(), 5);

    let pool = Arc::try_unwrap(pool).unwrap();
    drop(pool);

    let returns: Vec<_> = outstanding
        .into_iter()
        .map(|buf| thread::spawn(move || drop(buf)))
        .collect();
    for handle in returns {
        handle.join().unwrap();
    }
}
