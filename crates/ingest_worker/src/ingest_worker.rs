use std::sync::Arc;

use ais_domain::repository::{UnknownVesselRepository, VesselRepository};
use ais_feed::queue::EventQueue;
use common::status::CollectorStatus;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::domain::{BatchConfig, BatchWriter, IngestProcess, VesselRouter};

pub struct IngestWorkerConfig {
    pub batch: BatchConfig,
    pub identity_cache_capacity: usize,
}

pub struct IngestWorker<V, U> {
    vessels: Arc<V>,
    unknowns: Arc<U>,
    queue: Arc<EventQueue>,
    status: CollectorStatus,
    config: IngestWorkerConfig,
}

impl<V, U> IngestWorker<V, U>
where
    V: VesselRepository + Send + Sync + 'static,
    U: UnknownVesselRepository + Send + Sync + 'static,
{
    pub fn new(
        vessels: Arc<V>,
        unknowns: Arc<U>,
        queue: Arc<EventQueue>,
        status: CollectorStatus,
        config: IngestWorkerConfig,
    ) -> Self {
        debug!("initializing ingest worker module");
        Self {
            vessels,
            unknowns,
            queue,
            status,
            config,
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
            let router = VesselRouter::new(self.vessels.clone(), self.config.identity_cache_capacity);
            let writer = BatchWriter::new(
                self.vessels,
                self.unknowns,
                self.config.batch,
                self.status,
            );
            let queue = self.queue;
            move |ctx| {
                let process = IngestProcess::new(router, writer, queue, ctx);
                Box::pin(async move { process.run().await })
            }
        })
    }
}
