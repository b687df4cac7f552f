//! Signal delivery through a notifier.
//!
//! A score is marked delivered only after the notifier confirms the send,
//! so a failed send is retried on the next delivery pass.

use std::collections::HashMap;
use std::time::Duration;

use chrono::Local;
use serde::{Deserialize, Serialize};
use signaldesk_core::domain::{EvaluationScore, Signal, SignalId, UserId};

use crate::notify::{messages, Notifier, StatusUpdate};
use crate::pipeline::PipelineResult;
use crate::store::{RecordStore, StoreError};

/// Pause between consecutive sends in one pass.
pub const DEFAULT_SEND_PAUSE: Duration = Duration::from_secs(1);

/// Send one scored signal. Already-delivered scores are skipped.
pub async fn deliver_signal(
    notifier: &dyn Notifier,
    signal: &Signal,
    score: &mut EvaluationScore,
) -> bool {
    if score.delivered {
        return false;
    }
    let text = messages::analysis_signal(signal, score, Local::now());
    if notifier.send(&text).await {
        score.mark_delivered();
        true
    } else {
        false
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReport {
    pub attempted: usize,
    pub sent: usize,
    pub failed: usize,
    /// Scores whose signal is no longer in the store.
    pub missing_signal: usize,
}

/// Send every passed, undelivered, non-HOLD score of `user`.
pub async fn deliver_passed(
    notifier: &dyn Notifier,
    store: &dyn RecordStore,
    user: &UserId,
    pause: Duration,
) -> Result<DeliveryReport, StoreError> {
    let signals: HashMap<SignalId, Signal> = store
        .signals(user)
        .await?
        .into_iter()
        .map(|s| (s.id, s))
        .collect();
    let pending: Vec<EvaluationScore> = store
        .scores(user)
        .await?
        .into_iter()
        .filter(EvaluationScore::awaiting_delivery)
        .collect();

    let mut report = DeliveryReport::default();
    for mut score in pending {
        let Some(signal) = signals.get(&score.signal_id) else {
            tracing::warn!(symbol = %score.symbol, score = %score.id, "signal missing, not delivering");
            report.missing_signal += 1;
            continue;
        };
        if report.attempted > 0 && !pause.is_zero() {
            tokio::time::sleep(pause).await;
        }
        report.attempted += 1;

        if deliver_signal(notifier, signal, &mut score).await {
            report.sent += 1;
            if let Err(e) = store.mark_score_delivered(user, score.id).await {
                tracing::warn!(score = %score.id, error = %e, "sent but could not persist delivered flag");
            }
        } else {
            report.failed += 1;
        }
    }

    tracing::info!(
        notifier = notifier.name(),
        attempted = report.attempted,
        sent = report.sent,
        failed = report.failed,
        "delivery pass finished"
    );
    Ok(report)
}

/// Post-run totals; `sent` is how many signals the delivery pass sent.
pub fn status_for(result: &PipelineResult, sent: usize) -> StatusUpdate {
    StatusUpdate {
        total_analyses: result.summary.symbols_analyzed,
        strong_signals: result.summary.passed,
        sent_signals: sent,
        average_score: result.average_score(),
        success: true,
        error: None,
    }
}

/// Status message for a run that could not complete.
pub fn failed_status(error: impl std::fmt::Display) -> StatusUpdate {
    StatusUpdate {
        total_analyses: 0,
        strong_signals: 0,
        sent_signals: 0,
        average_score: 0.0,
        success: false,
        error: Some(error.to_string()),
    }
}

pub async fn send_status_update(notifier: &dyn Notifier, update: &StatusUpdate) -> bool {
    notifier
        .send(&messages::status_update(update, Local::now()))
        .await
}
