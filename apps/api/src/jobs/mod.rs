//! Analysis scheduling.
//!
//! Without Redis every analysis runs inside the request that triggered it. With
//! `REDIS_URL` set, image ids are pushed onto a list and drained by [`worker::run`].

pub mod worker;

use tracing::info;
use uuid::Uuid;

use crate::analysis::AnalysisPipeline;
use crate::errors::AppError;
use crate::models::analysis::AnalysisResult;

pub const QUEUE_KEY: &str = "roadhealth:analysis_jobs";

#[derive(Clone)]
pub enum AnalysisQueue {
    Inline,
    Redis(redis::Client),
}

/// What happened when an analysis was requested.
#[derive(Debug)]
pub enum Dispatch {
    Completed(AnalysisResult),
    Failed(AppError),
    Queued,
}

impl AnalysisQueue {
    pub fn from_url(redis_url: Option<&str>) -> anyhow::Result<Self> {
        match redis_url {
            Some(url) => {
                let client = redis::Client::open(url)?;
                info!("Analysis jobs will be queued on Redis list '{QUEUE_KEY}'");
                Ok(AnalysisQueue::Redis(client))
            }
            None => {
                info!("REDIS_URL not set; analyses run inline");
                Ok(AnalysisQueue::Inline)
            }
        }
    }

    /// Runs the analysis now, or queues it. Only queueing failures are returned as
    /// errors; an inline analysis failure comes back as [`Dispatch::Failed`].
    pub async fn dispatch(
        &self,
        pipeline: &AnalysisPipeline,
        image_id: Uuid,
    ) -> Result<Dispatch, AppError> {
        match self {
            AnalysisQueue::Inline => Ok(match pipeline.run(image_id).await {
                Ok(result) => Dispatch::Completed(result),
                Err(e) => Dispatch::Failed(e),
            }),
            AnalysisQueue::Redis(client) => {
                let mut conn = client.get_multiplexed_async_connection().await?;
                redis::cmd("LPUSH")
                    .arg(QUEUE_KEY)
                    .arg(image_id.to_string())
                    .query_async::<_, i64>(&mut conn)
                    .await?;
                info!("Queued analysis for image {image_id}");
                Ok(Dispatch::Queued)
            }
        }
    }
}
