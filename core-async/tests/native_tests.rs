//! Integration tests for the core-async façade.

use core_async::{sync, task, time};
use std::sync::Arc;

#[core_async::test]
async fn test_task_spawn() {
    let handle = task::spawn(async { 42 });
    assert_eq!(handle.await.unwrap(), 42);
}

#[core_async::test]
async fn test_timeout_failure() {
    let result = time::timeout(time::Duration::from_millis(10), async {
        time::sleep(time::Duration::from_millis(200)).await;
        42
    })
    .await;

    assert!(result.is_err());
}

#[core_async::test]
async fn test_mutex_across_tasks() {
    let mutex = Arc::new(sync::Mutex::new(0));
    let mut handles = Vec::new();

    for _ in 0..8 {
        let mutex = Arc::clone(&mutex);
        handles.push(task::spawn(async move {
            *mutex.lock().await += 1;
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(*mutex.lock().await, 8);
}

#[core_async::test]
async fn test_once_cell_initializes_once() {
    let cell = Arc::new(sync::OnceCell::<u32>::new());
    let calls = Arc::new(std::sync::atomic::AtomicU32::new(0));
    let mut handles = Vec::new();

    for _ in 0..5 {
        let cell = Arc::clone(&cell);
        let calls = Arc::clone(&calls);
        handles.push(task::spawn(async move {
            *cell
                .get_or_init(|| async {
                    calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                    time::sleep(time::Duration::from_millis(5)).await;
                    7
                })
                .await
        }));
    }

    for handle in handles {
        assert_eq!(handle.await.unwrap(), 7);
    }
    assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
}

#[core_async::test]
async fn test_cancellation_token() {
    let token = sync::CancellationToken::new();
    let child = token.clone();
    assert!(!child.is_cancelled());

    token.cancel();
    child.cancelled().await;
    assert!(child.is_cancelled());
}
