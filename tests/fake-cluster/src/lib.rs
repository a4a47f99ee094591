//! Fake MogileFS cluster for tests.
//!
//! [`FakeTracker`] speaks the tracker line protocol over a real TCP
//! listener and keeps domain/key metadata in memory. [`FakeStorage`] is an
//! HTTP storage node (PUT + ranged GET) with failure injection. Both shut
//! down when dropped.

mod tracker;

pub use storage::{FakeStorage, NodeMode};
pub use tracker::{FakeTracker, RecordedRequest};

use tokio::net::TcpListener;

/// Returns a `127.0.0.1` port that nothing listens on.
pub async fn dead_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let port = listener.local_addr().expect("local addr").port();
    drop(listener);
    port
}

/// Returns an HTTP base URL that refuses connections.
pub async fn dead_url() -> String {
    format!("http://127.0.0.1:{}", dead_port().await)
}

/// A tracker plus `n` healthy storage nodes, registered as devices
/// `1..=n` in order.
pub struct FakeCluster {
    pub tracker: FakeTracker,
    pub nodes: Vec<FakeStorage>,
}

impl FakeCluster {
    pub async fn start(domain: &str, nodes: usize) -> Self {
        let mut storage = Vec::with_capacity(nodes);
        for _ in 0..nodes {
            storage.push(FakeStorage::spawn().await);
        }
        let devices = storage
            .iter()
            .enumerate()
            .map(|(i, node)| (i as u64 + 1, node.base_url()))
            .collect();

        let tracker = FakeTracker::spawn(devices).await;
        tracker.add_domain(domain);

        Self {
            tracker,
            nodes: storage,
        }
    }

    /// Tracker address as `host:port`.
    pub fn tracker_host(&self) -> String {
        self.tracker.host()
    }
}
