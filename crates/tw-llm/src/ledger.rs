//! Token and spend accounting across all providers.
//!
//! Appends are fire-and-forget: running totals are atomic counters updated
//! on the caller's thread, while the record itself goes through a bounded
//! queue to a drain task that keeps a short history for inspection. A full
//! queue drops the record rather than blocking a request.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::mpsc;
use tw_core::provider::{ProviderKind, TokenUsage};

/// Queue slots between request threads and the drain task.
const QUEUE_CAPACITY: usize = 256;

/// Records kept for `recent()`.
const HISTORY_CAPACITY: usize = 256;

#[derive(Debug, Error)]
#[error("cost ledger queue is full")]
pub struct LedgerFull;

/// One provider call's worth of accounting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostRecord {
    pub provider: String,
    pub model: String,
    pub usage: TokenUsage,
    /// USD, when pricing for the model is known.
    pub cost: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

/// Running totals since the ledger was created.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LedgerTotals {
    pub requests: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub cost_usd: f64,
}

struct LedgerInner {
    requests: AtomicU64,
    prompt_tokens: AtomicU64,
    completion_tokens: AtomicU64,
    /// Micro-dollars, so spend fits an atomic counter.
    cost_micro_usd: AtomicU64,
    recent: Mutex<VecDeque<CostRecord>>,
}

pub struct CostLedger {
    tx: mpsc::Sender<CostRecord>,
    inner: Arc<LedgerInner>,
}

impl std::fmt::Debug for CostLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let totals = self.totals();
        f.debug_struct("CostLedger")
            .field("requests", &totals.requests)
            .field("cost_usd", &totals.cost_usd)
            .finish()
    }
}

impl CostLedger {
    /// Must be called inside a tokio runtime; the drain task is spawned here.
    pub fn new() -> Arc<Self> {
        let (tx, mut rx) = mpsc::channel::<CostRecord>(QUEUE_CAPACITY);
        let inner = Arc::new(LedgerInner {
            requests: AtomicU64::new(0),
            prompt_tokens: AtomicU64::new(0),
            completion_tokens: AtomicU64::new(0),
            cost_micro_usd: AtomicU64::new(0),
            recent: Mutex::new(VecDeque::with_capacity(HISTORY_CAPACITY)),
        });

        let drain = Arc::clone(&inner);
        tokio::spawn(async move {
            while let Some(record) = rx.recv().await {
                if let Ok(mut recent) = drain.recent.lock() {
                    if recent.len() == HISTORY_CAPACITY {
                        recent.pop_front();
                    }
                    recent.push_back(record);
                }
            }
        });

        Arc::new(Self { tx, inner })
    }

    /// Append one record. Never blocks: a full queue returns [`LedgerFull`]
    /// and the record is not counted. On success the running totals reflect
    /// the call immediately, while the history entry lands once the drain
    /// task picks it up.
    pub fn record(&self, record: CostRecord) -> Result<(), LedgerFull> {
        self.tx.try_send(record.clone()).map_err(|_| LedgerFull)?;
        self.inner.requests.fetch_add(1, Ordering::Relaxed);
        self.inner
            .prompt_tokens
            .fetch_add(record.usage.prompt_tokens as u64, Ordering::Relaxed);
        self.inner
            .completion_tokens
            .fetch_add(record.usage.completion_tokens as u64, Ordering::Relaxed);
        if let Some(cost) = record.cost {
            let micro = (cost * 1_000_000.0).round().max(0.0) as u64;
            self.inner.cost_micro_usd.fetch_add(micro, Ordering::Relaxed);
        }
        Ok(())
    }

    pub fn totals(&self) -> LedgerTotals {
        LedgerTotals {
            requests: self.inner.requests.load(Ordering::Relaxed),
            prompt_tokens: self.inner.prompt_tokens.load(Ordering::Relaxed),
            completion_tokens: self.inner.completion_tokens.load(Ordering::Relaxed),
            cost_usd: self.inner.cost_micro_usd.load(Ordering::Relaxed) as f64 / 1_000_000.0,
        }
    }

    /// Most recent records, oldest first. May trail `totals()` briefly while
    /// the drain task catches up.
    pub fn recent(&self) -> Vec<CostRecord> {
        match self.inner.recent.lock() {
            Ok(recent) => recent.iter().cloned().collect(),
            Err(_) => Vec::new(),
        }
    }
}

// ============================================================
// Pricing
// ============================================================

/// USD per 1K tokens.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelPricing {
    pub input_per_1k: f64,
    pub output_per_1k: f64,
}

impl ModelPricing {
    pub fn cost(&self, usage: &TokenUsage) -> f64 {
        usage.prompt_tokens as f64 / 1000.0 * self.input_per_1k
            + usage.completion_tokens as f64 / 1000.0 * self.output_per_1k
    }
}

/// Pricing table. Longest-prefix match on the model name; local models have
/// no per-token price and return `None`.
pub fn pricing_for(kind: ProviderKind, model: &str) -> Option<ModelPricing> {
    let table: &[(&str, ModelPricing)] = match kind {
        ProviderKind::OpenAi => &[
            ("gpt-4o-mini", ModelPricing { input_per_1k: 0.000_15, output_per_1k: 0.000_6 }),
            ("gpt-4o", ModelPricing { input_per_1k: 0.002_5, output_per_1k: 0.01 }),
            ("gpt-4-turbo", ModelPricing { input_per_1k: 0.01, output_per_1k: 0.03 }),
            ("gpt-4", ModelPricing { input_per_1k: 0.03, output_per_1k: 0.06 }),
            ("gpt-3.5-turbo", ModelPricing { input_per_1k: 0.000_5, output_per_1k: 0.001_5 }),
        ],
        ProviderKind::Anthropic => &[
            ("claude-3-5-sonnet", ModelPricing { input_per_1k: 0.003, output_per_1k: 0.015 }),
            ("claude-3-5-haiku", ModelPricing { input_per_1k: 0.000_8, output_per_1k: 0.004 }),
            ("claude-3-opus", ModelPricing { input_per_1k: 0.015, output_per_1k: 0.075 }),
            ("claude-3-sonnet", ModelPricing { input_per_1k: 0.003, output_per_1k: 0.015 }),
            ("claude-3-haiku", ModelPricing { input_per_1k: 0.000_25, output_per_1k: 0.001_25 }),
        ],
        ProviderKind::Ollama => &[],
    };

    let lower = model.to_lowercase();
    let mut best: Option<(&str, ModelPricing)> = None;
    for &(name, pricing) in table {
        if lower.starts_with(name) {
            match best {
                Some((prev, _)) if prev.len() >= name.len() => {}
                _ => best = Some((name, pricing)),
            }
        }
    }
    best.map(|(_, pricing)| pricing)
}
