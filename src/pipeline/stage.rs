//! Pipeline stage trait
//!
//! Each stage of the receive/decode pipeline runs as its own task and
//! processes data until its input ends or the pipeline is cancelled.

use anyhow::Result;
use async_trait::async_trait;
use log::error;

/// Trait for pipeline stages that process stream data
#[async_trait]
pub trait PipelineStage: Send {
    /// Run the stage until its input is exhausted or cancelled
    async fn run(&mut self) -> Result<()>;

    /// Name of this stage for logging
    fn name(&self) -> &'static str;
}

/// Spawn a stage on the pipeline runtime, logging its terminal error if any.
pub fn spawn_stage<S>(runtime: &tokio::runtime::Handle, mut stage: S)
where
    S: PipelineStage + 'static,
{
    runtime.spawn(async move {
        if let Err(e) = stage.run().await {
            error!("{}: {}", stage.name(), e);
        }
    });
}
