use crate::pool::BufferPool;
use crate::utils::FlockError;

#[test]
fn test_bucket_rounds_up_to_power_of_two() {
    assert_eq!(BufferPool::<usize>::bucket_for(0), Some(1));
    assert_eq!(BufferPool::<usize>::bucket_for(1), Some(1));
    assert_eq!(BufferPool::<usize>::bucket_for(3), Some(4));
    assert_eq!(BufferPool::<usize>::bucket_for(4), Some(4));
    assert_eq!(BufferPool::<usize>::bucket_for(5), Some(8));
    assert_eq!(BufferPool::<usize>::bucket_for(usize::MAX), None);
}

#[test]
fn test_borrow_view_has_requested_length() {
    let pool: BufferPool<usize> = BufferPool::new();
    let view = pool.borrow(13).expect("Failed to borrow");
    assert_eq!(view.len(), 13);
    assert_eq!(view.capacity(), 16);

    let empty = pool.borrow(0).expect("Failed to borrow");
    assert!(empty.is_empty());
    assert_eq!(empty.capacity(), 1);
}

#[test]
fn test_round_trip_reuses_backing_buffer() {
    let pool: BufferPool<usize> = BufferPool::new();
    let view = pool.borrow(9).expect("Failed to borrow");
    let identity = view.as_ptr();
    assert!(pool.release(view));
    assert_eq!(pool.free_buffers(16), 1);

    let again = pool.borrow(16).expect("Failed to borrow");
    assert_eq!(again.as_ptr(), identity, "Expected the recycled buffer");
    assert_eq!(pool.allocations(), 1);
    assert_eq!(pool.free_buffers(16), 0);
}

#[test]
fn test_other_bucket_allocates_new_buffer() {
    let pool: BufferPool<u32> = BufferPool::new();
    pool.borrow(4).expect("Failed to borrow").release();
    let bigger = pool.borrow(5).expect("Failed to borrow");
    assert_eq!(bigger.capacity(), 8);
    assert_eq!(pool.allocations(), 2);
    assert_eq!(pool.free_buffers(4), 1);
}

#[test]
fn test_drop_returns_buffer_exactly_once() {
    let pool: BufferPool<usize> = BufferPool::new();
    {
        let _view = pool.borrow(2).expect("Failed to borrow");
    }
    assert_eq!(pool.free_buffers(2), 1);

    let view = pool.borrow(2).expect("Failed to borrow");
    view.release();
    assert_eq!(pool.free_buffers(2), 1, "Explicit release followed by drop must not double-return");

    let a = pool.borrow(2).expect("Failed to borrow");
    let b = pool.borrow(2).expect("Failed to borrow");
    assert_ne!(a.as_ptr(), b.as_ptr());
    assert_eq!(pool.allocations(), 2);
}

#[test]
fn test_narrowed_view_releases_to_origin() {
    let pool: BufferPool<usize> = BufferPool::new();
    let mut view = pool.borrow(6).expect("Failed to borrow");
    for (i, slot) in view.iter_mut().enumerate() {
        *slot = i * 10;
    }
    let identity = view.as_ptr();

    let narrowed = view.narrow(3).narrow(5);
    assert_eq!(&narrowed[..], &[0, 10, 20]);
    assert_eq!(narrowed.as_ptr(), identity);
    assert!(narrowed.belongs_to(&pool));

    drop(narrowed);
    assert_eq!(pool.free_buffers(8), 1);
    assert_eq!(pool.borrow(8).expect("Failed to borrow").as_ptr(), identity);
}

#[test]
fn test_release_into_foreign_pool_is_noop() {
    let home: BufferPool<usize> = BufferPool::new();
    let foreign: BufferPool<usize> = BufferPool::new();

    let view = home.borrow(3).expect("Failed to borrow");
    assert!(!view.belongs_to(&foreign));
    assert!(!foreign.release(view));

    assert_eq!(foreign.idle_buffers(), 0);
    assert_eq!(home.free_buffers(4), 1);
}

#[test]
fn test_handle_outlives_pool() {
    let pool: BufferPool<usize> = BufferPool::new();
    let mut view = pool.borrow(2).expect("Failed to borrow");
    drop(pool);
    view[1] = 7;
    assert_eq!(view[1], 7);
    view.release();
}

#[test]
fn test_oversized_request_is_resource_exhaustion() {
    let pool: BufferPool<usize> = BufferPool::new();
    match pool.borrow(usize::MAX) {
        Err(FlockError::ResourceExhaustion(_)) => (),
        other => panic!("Expected ResourceExhaustion, got {:?}", other.map(|v| v.len())),
    }
    // 2^62 usize slots overflows the addressable byte count.
    match pool.borrow(1usize << 62) {
        Err(FlockError::ResourceExhaustion(_)) => (),
        other => panic!("Expected ResourceExhaustion, got {:?}", other.map(|v| v.len())),
    }
    assert_eq!(pool.allocations(), 0);
}

#[test]
fn test_concurrent_borrow_and_release() {
    let pool: BufferPool<usize> = BufferPool::new();

    std::thread::scope(|scope| {
        for worker in 0..8 {
            let pool = pool.clone();
            scope.spawn(move || {
                for round in 0..500 {
                    let mut view = pool.borrow((worker * 7 + round) % 40).expect("Failed to borrow");
                    view.iter_mut().for_each(|slot| *slot = worker);
                    assert!(view.iter().all(|&slot| slot == worker));
                }
            });
        }
    });

    // Every buffer that was ever allocated is back on a free list.
    assert_eq!(pool.idle_buffers(), pool.allocations());
    assert!(pool.allocations() <= 8 * 7, "Too many allocations: {}", pool.allocations());
}

#[test]
fn test_pool_usable_after_borrower_panics() {
    let pool = BufferPool::<usize>::new();
    let worker = pool.clone();
    let outcome = std::thread::spawn(move || {
        let _view = worker.borrow(6).expect("allocation failed");
        panic!("borrower failed");
    })
    .join();
    assert!(outcome.is_err());

    assert_eq!(pool.free_buffers(8), 1, "Unwinding must still return the buffer");
    let view = pool.borrow(6).expect("allocation failed");
    assert_eq!(view.len(), 6);
    assert_eq!(pool.allocations(), 1);
}
