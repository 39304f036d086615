//! Background analysis of newly created proposals.
//!
//! Producers hold an [`AnalysisQueue`] and enqueue proposal ids without
//! waiting. An [`AnalysisWorker`] drains the queue, runs up to
//! `max_concurrent` analyses at once, and writes each result back onto its
//! own proposal. A failed analysis is logged and leaves the record pending.

use std::sync::Arc;

use chrono::Utc;
use log::{debug, error, info, warn};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::db::{proposal_repo, rfp_repo, Database};
use crate::error::{Result, RfpError};
use crate::model::{ProposalStatus, VendorResponse};

use super::orchestrator::Analyzer;

/// Sending half of the analysis queue.
#[derive(Debug, Clone)]
pub struct AnalysisQueue {
    tx: mpsc::Sender<String>,
}

impl AnalysisQueue {
    /// Hands a proposal to the background worker. Never blocks.
    ///
    /// Returns false when the queue is full or the worker has stopped; the
    /// proposal stays pending and is picked up again on the next start.
    pub fn enqueue(&self, proposal_id: &str) -> bool {
        match self.tx.try_send(proposal_id.to_string()) {
            Ok(()) => {
                debug!("Queued proposal {} for analysis", proposal_id);
                true
            }
            Err(TrySendError::Full(_)) => {
                warn!("Analysis queue is full; proposal {} left pending", proposal_id);
                false
            }
            Err(TrySendError::Closed(_)) => {
                warn!("Analysis worker has stopped; proposal {} left pending", proposal_id);
                false
            }
        }
    }
}

/// Creates a bounded queue and its receiving half.
pub fn analysis_queue(capacity: usize) -> (AnalysisQueue, mpsc::Receiver<String>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (AnalysisQueue { tx }, rx)
}

#[derive(Clone)]
pub struct AnalysisWorker {
    db: Database,
    analyzer: Analyzer,
    max_concurrent: usize,
}

impl AnalysisWorker {
    pub fn new(db: Database, analyzer: Analyzer, max_concurrent: usize) -> Self {
        Self {
            db,
            analyzer,
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Consumes the queue until every sender is dropped, then waits for
    /// in-flight analyses to finish.
    pub async fn run(self, mut rx: mpsc::Receiver<String>) {
        let permits = Arc::new(Semaphore::new(self.max_concurrent));
        let mut tasks = JoinSet::new();
        info!(
            "Analysis worker started (max {} concurrent)",
            self.max_concurrent
        );

        while let Some(proposal_id) = rx.recv().await {
            let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
                break;
            };
            let worker = self.clone();
            tasks.spawn(async move {
                let _permit = permit;
                if let Err(e) = worker.process(&proposal_id).await {
                    error!("Analysis of proposal {} failed: {}", proposal_id, e);
                }
            });
            while tasks.try_join_next().is_some() {}
        }

        while tasks.join_next().await.is_some() {}
        info!("Analysis worker stopped");
    }

    /// Analyzes one queued proposal and stores the result.
    ///
    /// Returns the updated record, or `None` when there was nothing to do.
    pub async fn process(&self, proposal_id: &str) -> Result<Option<VendorResponse>> {
        let Some(proposal) = proposal_repo::find_by_id(&self.db, proposal_id)? else {
            warn!("Queued proposal {} no longer exists", proposal_id);
            return Ok(None);
        };
        if proposal.status != ProposalStatus::Pending {
            debug!(
                "Proposal {} is already {}; skipping queued analysis",
                proposal_id, proposal.status
            );
            return Ok(None);
        }
        let rfp = rfp_repo::find_by_id(&self.db, &proposal.rfp_id)?
            .ok_or_else(|| RfpError::not_found("RFP", proposal.rfp_id.clone()))?;

        let analysis = self.analyzer.analyze(&rfp, &proposal).await?;
        let updated = proposal_repo::record_analysis(&self.db, proposal_id, &analysis, Utc::now())?;
        if let Some(updated) = &updated {
            info!(
                "Proposal {} analyzed: score {}, {}",
                updated.id, analysis.score, analysis.recommendation
            );
        }
        Ok(updated)
    }
}

/// Re-enqueues every proposal still waiting for analysis.
pub fn requeue_pending(db: &Database, queue: &AnalysisQueue) -> Result<usize> {
    let ids = proposal_repo::list_pending_ids(db)?;
    let queued = ids.iter().filter(|id| queue.enqueue(id)).count();
    if queued > 0 {
        info!("Re-queued {} pending proposal(s) for analysis", queued);
    }
    Ok(queued)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_enqueue_reports_full_and_closed() {
        let (queue, rx) = analysis_queue(1);
        assert!(queue.enqueue("p1"));
        assert!(!queue.enqueue("p2"));
        drop(rx);
        assert!(!queue.enqueue("p3"));
    }

    #[tokio::test]
    async fn test_missing_proposal_is_skipped() {
        let db = Database::open_in_memory().unwrap();
        let worker = AnalysisWorker::new(db, Analyzer::default(), 1);
        assert!(worker.process("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_run_stops_when_senders_drop() {
        let db = Database::open_in_memory().unwrap();
        let (queue, rx) = analysis_queue(4);
        queue.enqueue("missing");
        drop(queue);
        AnalysisWorker::new(db, Analyzer::default(), 2).run(rx).await;
    }
}
