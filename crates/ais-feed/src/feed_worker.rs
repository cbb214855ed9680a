use std::sync::Arc;

use ais_domain::geo::RegionFilter;
use common::status::CollectorStatus;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::client::{FeedClient, FeedConfig};
use crate::queue::EventQueue;
use crate::transport::WsTransport;

pub struct FeedWorker {
    client: FeedClient<WsTransport>,
}

impl FeedWorker {
    pub fn new(
        url: impl Into<String>,
        config: FeedConfig,
        region: Arc<RegionFilter>,
        queue: Arc<EventQueue>,
        status: CollectorStatus,
    ) -> Self {
        debug!("initializing feed worker module");
        Self {
            client: FeedClient::new(WsTransport::new(url), config, region, queue, status),
        }
    }

    #[allow(clippy::type_complexity)]
    pub fn into_runner_process(
        self,
    ) -> Box<
        dyn FnOnce(
                CancellationToken,
            ) -> std::pin::Pin<
                Box<dyn std::future::Future<Output = anyhow::Result<()>> + Send>,
            > + Send,
    > {
        Box::new({
            let client = self.client;
            move |ctx| Box::pin(async move { client.run(ctx).await })
        })
    }
}
