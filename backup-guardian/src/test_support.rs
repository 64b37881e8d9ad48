//! Shared fixtures for in-crate tests.

use async_trait::async_trait;
use tokio::net::TcpListener;
use tokio::sync::Notify;

use crate::engine::Refresh;
use crate::model::{AggregateView, BackupRecord, SourceTag};
use crate::Result;
use std::sync::Arc;

/// Serve `router` on an ephemeral local port and return its base URL.
pub async fn spawn_server(router: axum::Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

/// Engine that always yields the same records, or never finishes.
pub struct StaticEngine {
    records: Vec<BackupRecord>,
    hang: bool,
    pub entered: Notify,
}

impl StaticEngine {
    pub fn new(records: Vec<BackupRecord>) -> Arc<Self> {
        Arc::new(Self {
            records,
            hang: false,
            entered: Notify::new(),
        })
    }

    pub fn hanging() -> Arc<Self> {
        Arc::new(Self {
            records: Vec::new(),
            hang: true,
            entered: Notify::new(),
        })
    }
}

#[async_trait]
impl Refresh for StaticEngine {
    async fn refresh(&self) -> Result<AggregateView> {
        self.entered.notify_one();
        if self.hang {
            std::future::pending::<()>().await;
        }
        Ok(AggregateView::build(self.records.clone(), &self.configured_sources(), Vec::new()))
    }

    fn configured_sources(&self) -> Vec<SourceTag> {
        SourceTag::ALL.to_vec()
    }
}
