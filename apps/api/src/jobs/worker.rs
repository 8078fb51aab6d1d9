use std::time::Duration;

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::QUEUE_KEY;
use crate::analysis::AnalysisPipeline;

/// Seconds each BRPOP blocks before looping.
const POLL_TIMEOUT_SECS: u64 = 5;
const RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// Drains the analysis list forever. Spawned once from `main` when Redis is configured.
pub async fn run(client: redis::Client, pipeline: AnalysisPipeline) {
    info!("Analysis worker listening on '{QUEUE_KEY}'");
    loop {
        let mut conn = match client.get_multiplexed_async_connection().await {
            Ok(conn) => conn,
            Err(e) => {
                error!("Analysis worker cannot reach Redis: {e}");
                tokio::time::sleep(RECONNECT_DELAY).await;
                continue;
            }
        };

        loop {
            let popped: Option<(String, String)> = match redis::cmd("BRPOP")
                .arg(QUEUE_KEY)
                .arg(POLL_TIMEOUT_SECS)
                .query_async(&mut conn)
                .await
            {
                Ok(popped) => popped,
                Err(e) => {
                    error!("BRPOP on '{QUEUE_KEY}' failed: {e}");
                    tokio::time::sleep(RECONNECT_DELAY).await;
                    break;
                }
            };

            let Some((_, payload)) = popped else {
                continue;
            };
            handle_job(&pipeline, &payload).await;
        }
    }
}

async fn handle_job(pipeline: &AnalysisPipeline, payload: &str) {
    let image_id = match parse_job(payload) {
        Some(id) => id,
        None => {
            warn!("Discarding malformed analysis job '{payload}'");
            return;
        }
    };

    debug!("Picked up analysis job for image {image_id}");
    if let Err(e) = pipeline.run(image_id).await {
        error!("Queued analysis of image {image_id} failed: {e}");
    }
}

fn parse_job(payload: &str) -> Option<Uuid> {
    Uuid::parse_str(payload.trim()).ok()
}
