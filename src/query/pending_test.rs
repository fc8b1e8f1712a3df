use futures::FutureExt;

use crate::PendingRegistry;
use crate::SharedFetch;

fn settled_fetch(value: Option<u32>) -> SharedFetch<u32> {
    futures::future::ready(value).boxed().shared()
}

#[tokio::test]
async fn test_join_or_start_installs_once() {
    let registry: PendingRegistry<u32> = PendingRegistry::new();
    let mut started = 0;

    let first = registry.join_or_start("k", || {
        started += 1;
        settled_fetch(Some(1))
    });
    let second = registry.join_or_start("k", || {
        started += 1;
        settled_fetch(Some(2))
    });

    assert_eq!(started, 1, "second caller joins instead of starting");
    assert_eq!(first.await, Some(1));
    assert_eq!(second.await, Some(1));
}

#[tokio::test]
async fn test_identities_are_independent() {
    let registry: PendingRegistry<u32> = PendingRegistry::new();

    let a = registry.join_or_start("a", || settled_fetch(Some(1)));
    let b = registry.join_or_start("b", || settled_fetch(Some(2)));

    assert_eq!(registry.len(), 2);
    assert_eq!(a.await, Some(1));
    assert_eq!(b.await, Some(2));
}

#[tokio::test]
async fn test_remove_allows_a_fresh_start() {
    let registry: PendingRegistry<u32> = PendingRegistry::new();

    let first = registry.join_or_start("k", || settled_fetch(Some(1)));
    registry.remove("k");
    let second = registry.join_or_start("k", || settled_fetch(Some(2)));

    assert_eq!(registry.len(), 1);
    assert_eq!(first.await, Some(1));
    assert_eq!(second.await, Some(2), "after removal a new fetch starts");
}

#[tokio::test]
async fn test_remove_unknown_identity_is_a_noop() {
    let registry: PendingRegistry<u32> = PendingRegistry::new();

    registry.remove("missing");

    assert_eq!(registry.len(), 0);
}
