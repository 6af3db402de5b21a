//! Integration tests for cart operations.
//!
//! These tests drive the store through its public handle and check both the
//! published snapshot and what ends up in storage.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::sync::Arc;

use go_market_cart::{
    CartConfig, CartError, CartStore, MemoryStorage, PersistOutcome, StoreStatus,
};
use go_market_core::{Price, ProductId};
use go_market_integration_tests::{
    CountingStorage, product, ready_store, storage_with, stored_cart,
};

// =============================================================================
// Startup
// =============================================================================

#[tokio::test]
async fn test_empty_storage_starts_empty() {
    let storage = Arc::new(MemoryStorage::new());
    let store = ready_store(&storage).await;

    assert_eq!(store.status(), StoreStatus::Ready);
    assert!(store.cart().products().unwrap().is_empty());
}

#[tokio::test]
async fn test_hydrates_stored_cart() {
    let storage =
        storage_with(r#"[{"id":"1","title":"A","image_url":"u","price":10,"quantity":2}]"#);
    let store = ready_store(&storage).await;

    let products = store.cart().products().unwrap();
    assert_eq!(products.len(), 1);
    let line = &products.items()[0];
    assert_eq!(line.id, ProductId::new("1"));
    assert_eq!(line.title, "A");
    assert_eq!(line.image_url, "u");
    assert_eq!(line.price, Price::from_cents(1000));
    assert_eq!(line.quantity, 2);
}

#[tokio::test]
async fn test_malformed_storage_starts_empty() {
    let storage = storage_with("{not json");
    let store = ready_store(&storage).await;

    assert_eq!(store.status(), StoreStatus::Ready);
    assert!(store.products().is_empty());
}

#[tokio::test]
async fn test_null_stored_line_is_skipped() {
    let storage = storage_with(
        r#"[{"id":"1","title":"A","image_url":"u","price":10,"quantity":2},null]"#,
    );
    let store = ready_store(&storage).await;

    let products = store.products();
    assert_eq!(products.len(), 1);
    assert_eq!(products.items()[0].id, ProductId::new("1"));
    assert_eq!(products.items()[0].quantity, 2);
}

#[tokio::test]
async fn test_negative_quantity_line_is_skipped() {
    let storage = storage_with(
        r#"[{"id":"1","title":"A","image_url":"u","price":10,"quantity":2},
            {"id":"2","title":"B","image_url":"u","price":5,"quantity":-1},
            {"id":"3","title":"C","image_url":"u","price":5,"quantity":0}]"#,
    );
    let store = ready_store(&storage).await;

    let products = store.products();
    assert_eq!(products.len(), 1);
    assert_eq!(products.items()[0].id, ProductId::new("1"));
}

#[tokio::test]
async fn test_out_of_range_price_line_is_skipped() {
    let storage = storage_with(
        r#"[{"id":"1","title":"A","image_url":"u","price":1e30,"quantity":1},
            {"id":"2","title":"B","image_url":"u","price":5,"quantity":3}]"#,
    );
    let store = ready_store(&storage).await;

    let products = store.products();
    assert_eq!(products.len(), 1);
    assert_eq!(products.items()[0].id, ProductId::new("2"));
    assert_eq!(products.items()[0].quantity, 3);
}

#[tokio::test]
async fn test_damaged_lines_are_cleaned_in_storage() {
    let storage = storage_with(
        r#"[{"id":"1","title":"A","image_url":"u","price":10,"quantity":2},null,"junk"]"#,
    );
    let store = ready_store(&storage).await;
    let expected = store.products();
    store.dispose().await;

    let stored = stored_cart(storage.as_ref()).await.unwrap();
    assert_eq!(stored, expected);
    assert_eq!(stored.len(), 1);
}

#[tokio::test]
async fn test_cart_readable_while_hydrating() {
    let storage =
        storage_with(r#"[{"id":"1","title":"A","image_url":"u","price":10,"quantity":2}]"#);
    let store = CartStore::start(storage, &CartConfig::default());

    // Nothing has been awaited yet, so the stored cart has not arrived.
    assert_eq!(store.status(), StoreStatus::Hydrating);
    assert!(store.cart().products().unwrap().is_empty());

    let mut rx = store.subscribe();
    store.ready().await;
    assert!(rx.has_changed().unwrap());
    assert_eq!(rx.borrow_and_update().len(), 1);
}

// =============================================================================
// Operations
// =============================================================================

#[tokio::test]
async fn test_add_new_product() {
    let storage = Arc::new(MemoryStorage::new());
    let store = ready_store(&storage).await;
    let cart = store.cart();

    cart.add_to_cart(product("2", "B", 500)).unwrap();

    let products = cart.products().unwrap();
    assert_eq!(products.len(), 1);
    assert_eq!(products.items()[0].id, ProductId::new("2"));
    assert_eq!(products.items()[0].title, "B");
    assert_eq!(products.items()[0].quantity, 1);
}

#[tokio::test]
async fn test_increment_persists_post_increment_state() {
    let storage =
        storage_with(r#"[{"id":"1","title":"A","image_url":"u","price":10,"quantity":1}]"#);
    let store = ready_store(&storage).await;
    let cart = store.cart();

    let outcome = cart
        .increment(&ProductId::new("1"))
        .unwrap()
        .wait()
        .await
        .unwrap();
    assert_eq!(outcome, PersistOutcome::Written);

    let products = cart.products().unwrap();
    assert_eq!(products.items()[0].quantity, 2);
    assert_eq!(stored_cart(storage.as_ref()).await.unwrap(), products);
}

#[tokio::test]
async fn test_decrement_to_zero_removes_item() {
    let storage =
        storage_with(r#"[{"id":"1","title":"A","image_url":"u","price":10,"quantity":1}]"#);
    let store = ready_store(&storage).await;
    let cart = store.cart();

    cart.decrement(&ProductId::new("1"))
        .unwrap()
        .wait()
        .await
        .unwrap();

    assert!(cart.products().unwrap().is_empty());
    assert!(stored_cart(storage.as_ref()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_decrement_missing_is_noop_without_write() {
    let storage = Arc::new(CountingStorage::new());
    let store = ready_store(&storage).await;
    let cart = store.cart();
    cart.add_to_cart(product("1", "A", 1000))
        .unwrap()
        .wait()
        .await
        .unwrap();
    let writes = storage.writes();
    let before = cart.products().unwrap();

    let receipt = cart.decrement(&ProductId::new("2")).unwrap();
    assert!(receipt.is_unchanged());
    assert_eq!(receipt.wait().await.unwrap(), PersistOutcome::Unchanged);
    assert_eq!(cart.products().unwrap(), before);

    store.dispose().await;
    assert_eq!(storage.writes(), writes);
}

#[tokio::test]
async fn test_increment_missing_is_noop() {
    let storage = Arc::new(CountingStorage::new());
    let store = ready_store(&storage).await;
    let cart = store.cart();

    let receipt = cart.increment(&ProductId::new("nope")).unwrap();
    assert!(receipt.is_unchanged());
    assert!(cart.products().unwrap().is_empty());

    store.dispose().await;
    assert_eq!(storage.writes(), 0);
}

#[tokio::test]
async fn test_ids_stay_unique() {
    let storage = Arc::new(MemoryStorage::new());
    let store = ready_store(&storage).await;
    let cart = store.cart();
    let a = ProductId::new("a");
    let b = ProductId::new("b");

    cart.add_to_cart(product("a", "A", 100)).unwrap();
    cart.add_to_cart(product("b", "B", 200)).unwrap();
    cart.add_to_cart(product("a", "A", 100)).unwrap();
    cart.increment(&b).unwrap();
    cart.decrement(&a).unwrap();
    cart.add_to_cart(product("a", "A", 100)).unwrap();
    cart.decrement(&b).unwrap();
    cart.decrement(&b).unwrap();
    cart.add_to_cart(product("b", "B", 200)).unwrap();

    let products = cart.products().unwrap();
    let mut ids: Vec<&str> = products.items().iter().map(|i| i.id.as_str()).collect();
    let total = ids.len();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), total);
    assert_eq!(products.get(&a).unwrap().quantity, 2);
    assert_eq!(products.get(&b).unwrap().quantity, 1);
    assert!(products.items().iter().all(|i| i.quantity > 0));
}

#[tokio::test]
async fn test_clear_empties_cart() {
    let storage = Arc::new(MemoryStorage::new());
    let store = ready_store(&storage).await;
    let cart = store.cart();
    cart.add_to_cart(product("1", "A", 100)).unwrap();

    cart.clear().unwrap().wait().await.unwrap();

    assert!(cart.products().unwrap().is_empty());
    assert!(stored_cart(storage.as_ref()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_totals_follow_operations() {
    let storage = Arc::new(MemoryStorage::new());
    let store = ready_store(&storage).await;
    let cart = store.cart();

    cart.add_to_cart(product("1", "A", 1000)).unwrap();
    cart.add_to_cart(product("2", "B", 250)).unwrap();
    cart.increment(&ProductId::new("2")).unwrap();

    let products = cart.products().unwrap();
    assert_eq!(products.item_count(), 3);
    assert_eq!(products.subtotal(), Price::from_cents(1500));
}

// =============================================================================
// Handles
// =============================================================================

#[tokio::test]
async fn test_handles_share_state() {
    let storage = Arc::new(MemoryStorage::new());
    let store = ready_store(&storage).await;
    let first = store.cart();
    let second = first.clone();

    first.add_to_cart(product("1", "A", 100)).unwrap();
    second.increment(&ProductId::new("1")).unwrap();

    assert_eq!(first.products().unwrap().items()[0].quantity, 2);
    assert_eq!(store.products(), second.products().unwrap());
}

#[tokio::test]
async fn test_handle_after_dispose_is_misuse() {
    let storage = Arc::new(MemoryStorage::new());
    let store = ready_store(&storage).await;
    let cart = store.cart();
    store.dispose().await;

    assert_eq!(cart.status(), StoreStatus::Disposed);
    assert_eq!(
        cart.add_to_cart(product("1", "A", 100)).unwrap_err(),
        CartError::ContextMisuse
    );
    assert_eq!(
        cart.decrement(&ProductId::new("1")).unwrap_err(),
        CartError::ContextMisuse
    );
    assert_eq!(cart.subscribe().unwrap_err(), CartError::ContextMisuse);
}

#[tokio::test]
async fn test_handles_usable_across_tasks() {
    let storage = Arc::new(MemoryStorage::new());
    let store = ready_store(&storage).await;

    let mut tasks = Vec::new();
    for n in 0..8 {
        let cart = store.cart();
        tasks.push(tokio::spawn(async move {
            cart.add_to_cart(product(&format!("p{}", n % 2), "P", 100))
                .unwrap()
                .wait()
                .await
                .unwrap();
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let products = store.products();
    assert_eq!(products.len(), 2);
    assert_eq!(products.item_count(), 8);

    store.dispose().await;
    assert_eq!(stored_cart(storage.as_ref()).await.unwrap(), products);
}
