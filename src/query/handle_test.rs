use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::time::sleep;

use crate::query_operation;
use crate::KeyValueStore;
use crate::MemoryKeyValueStore;
use crate::QueryClient;
use crate::QueryOperation;
use crate::QueryOptions;

fn counting_operation(
    counter: Arc<AtomicUsize>,
    value: u32,
) -> QueryOperation<u32> {
    query_operation(move |_args| {
        counter.fetch_add(1, Ordering::SeqCst);
        async move { Ok(value) }
    })
}

fn slow_operation(
    counter: Arc<AtomicUsize>,
    value: u32,
    delay: Duration,
) -> QueryOperation<u32> {
    query_operation(move |_args| {
        counter.fetch_add(1, Ordering::SeqCst);
        async move {
            sleep(delay).await;
            Ok(value)
        }
    })
}

#[tokio::test]
async fn test_execute_fetches_and_returns_payload() {
    let client: QueryClient<u32> = QueryClient::new();
    let counter = Arc::new(AtomicUsize::new(0));
    let handle = client.query("dict", counting_operation(counter.clone(), 42), QueryOptions::default());

    let result = handle.execute(Vec::new()).await;

    assert_eq!(result, Some(42));
    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert!(handle.state().is_success);
}

#[tokio::test]
async fn test_execute_with_cache_short_circuits() {
    let client: QueryClient<u32> = QueryClient::new();
    let counter = Arc::new(AtomicUsize::new(0));
    let options = QueryOptions {
        cache: true,
        ..QueryOptions::default()
    };
    let handle = client.query("dict", counting_operation(counter.clone(), 42), options);

    assert_eq!(handle.execute(Vec::new()).await, Some(42));
    assert_eq!(handle.execute(Vec::new()).await, Some(42));

    assert_eq!(counter.load(Ordering::SeqCst), 1, "cached payload served without a fetch");
}

#[tokio::test]
async fn test_revalidate_bypasses_cache() {
    let client: QueryClient<u32> = QueryClient::new();
    let counter = Arc::new(AtomicUsize::new(0));
    let options = QueryOptions {
        cache: true,
        ..QueryOptions::default()
    };
    let handle = client.query("dict", counting_operation(counter.clone(), 42), options);

    handle.execute(Vec::new()).await;
    handle.revalidate(Vec::new()).await;

    assert_eq!(counter.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_invalidated_cache_refetches_on_execute() {
    let client: QueryClient<u32> = QueryClient::new();
    let counter = Arc::new(AtomicUsize::new(0));
    let options = QueryOptions {
        cache: true,
        ..QueryOptions::default()
    };
    let handle = client.query("dict", counting_operation(counter.clone(), 42), options);

    handle.execute(Vec::new()).await;
    client.store().invalidate(&[handle.identity()]);
    handle.execute(Vec::new()).await;

    assert_eq!(counter.load(Ordering::SeqCst), 2);
    assert!(!handle.state().is_invalidated, "success clears invalidation");
}

#[tokio::test]
async fn test_disabled_query_never_fetches() {
    let client: QueryClient<u32> = QueryClient::new();
    let counter = Arc::new(AtomicUsize::new(0));
    let options = QueryOptions {
        enable: false,
        ..QueryOptions::default()
    };
    let handle = client.query("dict", counting_operation(counter.clone(), 42), options);

    assert_eq!(handle.execute(Vec::new()).await, None);
    assert_eq!(handle.revalidate(Vec::new()).await, None);
    assert_eq!(counter.load(Ordering::SeqCst), 0);
    assert!(!handle.state().is_enabled, "flag propagated to the shared store");
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_handles_share_one_fetch() {
    let client: QueryClient<u32> = QueryClient::new();
    let counter = Arc::new(AtomicUsize::new(0));
    let operation = slow_operation(counter.clone(), 7, Duration::from_millis(50));
    let first = client.query("dict", operation.clone(), QueryOptions::default());
    let second = client.query("dict", operation, QueryOptions::default());

    let (a, b) = futures::join!(first.revalidate(Vec::new()), second.revalidate(Vec::new()));

    assert_eq!(a, Some(7));
    assert_eq!(b, Some(7));
    assert_eq!(counter.load(Ordering::SeqCst), 1, "both handles joined the same fetch");
}

#[tokio::test(start_paused = true)]
async fn test_abort_stops_waiting_but_fetch_still_settles() {
    let client: QueryClient<u32> = QueryClient::new();
    let counter = Arc::new(AtomicUsize::new(0));
    let operation = slow_operation(counter.clone(), 7, Duration::from_millis(100));
    let handle = client.query("dict", operation, QueryOptions::default());

    let (result, _) = futures::join!(handle.revalidate(Vec::new()), async {
        sleep(Duration::from_millis(10)).await;
        handle.abort();
    });

    assert_eq!(result, None, "aborted wait yields nothing");

    // The shared operation keeps running and its settlement still lands.
    sleep(Duration::from_millis(200)).await;
    assert_eq!(handle.state().data, Some(7));
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_retry_still_fires_after_an_aborted_wait() {
    let client: QueryClient<u32> = QueryClient::new();
    let counter = Arc::new(AtomicUsize::new(0));
    let operation = {
        let counter = counter.clone();
        query_operation(move |_args| {
            counter.fetch_add(1, Ordering::SeqCst);
            async move {
                sleep(Duration::from_millis(100)).await;
                Err::<u32, _>("slow failure".into())
            }
        })
    };
    let options = QueryOptions {
        retry_limit: 1,
        retry_time: Duration::from_millis(50),
        ..QueryOptions::default()
    };
    let handle = client.query("dict", operation, options);

    let (result, _) = futures::join!(handle.revalidate(Vec::new()), async {
        sleep(Duration::from_millis(10)).await;
        handle.abort();
    });
    assert_eq!(result, None, "aborted wait yields nothing");

    // The shared fetch fails at 100ms; the retry must still be armed and
    // fire 50ms later despite the aborted wait.
    sleep(Duration::from_millis(500)).await;
    assert_eq!(counter.load(Ordering::SeqCst), 2, "initial attempt plus the retry");
    assert_eq!(handle.state().error_count, 2);
}

#[tokio::test(start_paused = true)]
async fn test_failed_fetch_retries_after_delay() {
    let client: QueryClient<u32> = QueryClient::new();
    let counter = Arc::new(AtomicUsize::new(0));
    let operation = {
        let counter = counter.clone();
        query_operation(move |_args| {
            let attempt = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt == 0 {
                    Err("transient".into())
                } else {
                    Ok(1u32)
                }
            }
        })
    };
    let options = QueryOptions {
        retry_limit: 1,
        retry_time: Duration::from_millis(50),
        ..QueryOptions::default()
    };
    let handle = client.query("dict", operation, options);

    assert_eq!(handle.revalidate(Vec::new()).await, None);
    assert_eq!(handle.state().error_count, 1);

    sleep(Duration::from_millis(100)).await;

    assert_eq!(counter.load(Ordering::SeqCst), 2);
    let state = handle.state();
    assert_eq!(state.data, Some(1));
    assert_eq!(state.error_count, 0);
}

#[tokio::test(start_paused = true)]
async fn test_retries_stop_at_the_limit() {
    let client: QueryClient<u32> = QueryClient::new();
    let counter = Arc::new(AtomicUsize::new(0));
    let operation = {
        let counter = counter.clone();
        query_operation(move |_args| {
            counter.fetch_add(1, Ordering::SeqCst);
            async move { Err::<u32, _>("still broken".into()) }
        })
    };
    let options = QueryOptions {
        retry_limit: 1,
        retry_time: Duration::from_millis(50),
        ..QueryOptions::default()
    };
    let handle = client.query("dict", operation, options);

    handle.revalidate(Vec::new()).await;
    sleep(Duration::from_millis(500)).await;

    assert_eq!(counter.load(Ordering::SeqCst), 2, "initial attempt plus one retry");
    assert_eq!(handle.state().error_count, 2);
}

#[tokio::test(start_paused = true)]
async fn test_periodic_revalidation_refreshes_data() {
    let client: QueryClient<u32> = QueryClient::new();
    let counter = Arc::new(AtomicUsize::new(0));
    let options = QueryOptions {
        revalidation: true,
        revalidate_time: Duration::from_millis(100),
        ..QueryOptions::default()
    };
    let handle = client.query("dict", counting_operation(counter.clone(), 42), options);

    handle.execute(Vec::new()).await;
    assert_eq!(counter.load(Ordering::SeqCst), 1);

    sleep(Duration::from_millis(150)).await;
    assert_eq!(counter.load(Ordering::SeqCst), 2);

    sleep(Duration::from_millis(100)).await;
    assert_eq!(counter.load(Ordering::SeqCst), 3, "revalidation keeps rescheduling");
}

#[tokio::test(start_paused = true)]
async fn test_dropping_the_handle_cancels_background_work() {
    let client: QueryClient<u32> = QueryClient::new();
    let counter = Arc::new(AtomicUsize::new(0));
    let options = QueryOptions {
        revalidation: true,
        revalidate_time: Duration::from_millis(100),
        ..QueryOptions::default()
    };
    let handle = client.query("dict", counting_operation(counter.clone(), 42), options);

    handle.execute(Vec::new()).await;
    drop(handle);

    sleep(Duration::from_millis(500)).await;
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_auto_fetch_runs_once_on_activation() {
    let client: QueryClient<u32> = QueryClient::new();
    let counter = Arc::new(AtomicUsize::new(0));
    let operation = counting_operation(counter.clone(), 42);
    let options = || QueryOptions {
        auto_fetch: true,
        ..QueryOptions::default()
    };

    let first = client.query("dict", operation.clone(), options());
    sleep(Duration::from_millis(1)).await;
    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert_eq!(first.state().data, Some(42));

    // Already-fetched data suppresses the second activation fetch.
    let second = client.query("dict", operation, options());
    sleep(Duration::from_millis(1)).await;
    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert_eq!(second.state().data, Some(42));
}

#[tokio::test]
async fn test_revalidate_args_update_the_identity() {
    let client: QueryClient<u32> = QueryClient::new();
    let counter = Arc::new(AtomicUsize::new(0));
    let handle = client.query("dict", counting_operation(counter.clone(), 42), QueryOptions::default());
    assert_eq!(handle.identity(), "dict");

    handle.revalidate(vec![json!("en")]).await;

    assert_eq!(handle.identity(), "dict/[\"en\"]");
    assert_eq!(client.states("dict/[\"en\"]").data, Some(42));
}

#[tokio::test]
async fn test_store_option_lazy_loads_persisted_data_on_activation() {
    let persistence = Arc::new(MemoryKeyValueStore::new());
    persistence.set_item("dict", "11").expect("seed persisted value");
    let client: QueryClient<u32> = QueryClient::with_persistence(persistence);
    let counter = Arc::new(AtomicUsize::new(0));
    let options = QueryOptions {
        store: true,
        ..QueryOptions::default()
    };

    let handle = client.query("dict", counting_operation(counter.clone(), 42), options);

    assert_eq!(handle.state().data, Some(11), "persisted payload loaded at activation");
    assert_eq!(counter.load(Ordering::SeqCst), 0, "no operation call involved");
}

#[tokio::test]
async fn test_store_lazy_load_defers_to_in_memory_data() {
    let persistence = Arc::new(MemoryKeyValueStore::new());
    persistence.set_item("dict", "11").expect("seed persisted value");
    let client: QueryClient<u32> = QueryClient::with_persistence(persistence);
    client.store().set_data("dict", Some(99));
    let counter = Arc::new(AtomicUsize::new(0));
    let options = QueryOptions {
        store: true,
        ..QueryOptions::default()
    };

    let handle = client.query("dict", counting_operation(counter, 42), options);

    assert_eq!(handle.state().data, Some(99), "fresher in-memory data wins");
}

#[tokio::test]
async fn test_set_data_overwrites_the_cache() {
    let client: QueryClient<u32> = QueryClient::new();
    let counter = Arc::new(AtomicUsize::new(0));
    let handle = client.query("dict", counting_operation(counter, 42), QueryOptions::default());

    handle.set_data(Some(5));

    assert_eq!(handle.state().data, Some(5));
}
