//! Shared helpers for vendor client tests.

#![allow(dead_code)]

use axum::Router;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

/// Requests captured by a mock vendor, in arrival order.
pub type Captured<T> = Arc<Mutex<Vec<T>>>;

pub fn captured<T>() -> Captured<T> {
    Arc::new(Mutex::new(Vec::new()))
}

/// Serves `router` on an ephemeral local port and returns its base URL.
pub async fn spawn_mock(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}
