use std::sync::Arc;

use ais_domain::repository::CorrectionRepository;
use common::status::CollectorStatus;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::domain::{CorrectionProcess, CorrectionProcessConfig};

pub struct CorrectionWorker<C> {
    repository: Arc<C>,
    config: CorrectionProcessConfig,
    status: CollectorStatus,
}

impl<C> CorrectionWorker<C>
where
    C: CorrectionRepository + Send + Sync + 'static,
{
    pub fn new(repository: Arc<C>, config: CorrectionProcessConfig, status: CollectorStatus) -> Self {
        debug!("initializing correction worker module");
        Self {
            repository,
            config,
            status,
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
            let repository = self.repository;
            let config = self.config;
            let status = self.status;
            move |ctx| {
                let process = CorrectionProcess::new(repository, config, status, ctx);
                Box::pin(async move { process.run().await })
            }
        })
    }
}
