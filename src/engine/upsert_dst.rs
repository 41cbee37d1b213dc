//! Deterministic Simulation Testing for the mutation engines
//!
//! VOPR-style harness that drives random upserts and deletes against an
//! in-memory store and cross-checks the persisted table against a simple
//! ordered model after every operation:
//! - Deterministic random batch generation (seeded ChaCha8)
//! - Invariant checking after each operation
//! - Seed-based reproducibility for debugging

use super::delete::DeleteEngine;
use super::record::OperationRecord;
use super::upsert::UpsertEngine;
use crate::clock::{Clock, ManualClock};
use crate::config::ConfigRegistry;
use crate::data::{Frame, Row, Scalar};
use crate::history::HistoryLedger;
use crate::storage::{InMemoryTableStore, TableStore};
use chrono::{Duration, NaiveDate};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::HashSet;

const TABLE: &str = "events";

/// Seeded RNG for simulation runs
pub struct SimulatedRng {
    inner: ChaCha8Rng,
}

impl SimulatedRng {
    pub fn new(seed: u64) -> Self {
        SimulatedRng {
            inner: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn gen_range(&mut self, min: u64, max: u64) -> u64 {
        if min >= max {
            return min;
        }
        self.inner.gen_range(min..max)
    }

    pub fn gen_bool(&mut self, probability: f64) -> bool {
        self.inner.gen_bool(probability.clamp(0.0, 1.0))
    }
}

/// Configuration for upsert DST
#[derive(Debug, Clone)]
pub struct UpsertDSTConfig {
    /// Random seed for reproducibility
    pub seed: u64,
    /// Number of distinct dedup keys
    pub num_keys: u64,
    /// Largest batch size (batches may be empty)
    pub max_batch: u64,
    /// Number of distinct days in the date column
    pub num_days: u64,
    /// Probability of a delete by key
    pub delete_key_prob: f64,
    /// Probability of a delete by date range
    pub delete_date_prob: f64,
}

impl Default for UpsertDSTConfig {
    fn default() -> Self {
        UpsertDSTConfig {
            seed: 0,
            num_keys: 50,
            max_batch: 10,
            num_days: 30,
            delete_key_prob: 0.1,
            delete_date_prob: 0.05,
        }
    }
}

impl UpsertDSTConfig {
    pub fn new(seed: u64) -> Self {
        UpsertDSTConfig {
            seed,
            ..Default::default()
        }
    }

    /// Small key space (most incoming rows collide)
    pub fn small_keys(seed: u64) -> Self {
        UpsertDSTConfig {
            seed,
            num_keys: 5,
            max_batch: 12,
            ..Default::default()
        }
    }

    /// Lots of deletes
    pub fn high_churn(seed: u64) -> Self {
        UpsertDSTConfig {
            seed,
            num_keys: 20,
            delete_key_prob: 0.25,
            delete_date_prob: 0.2,
            ..Default::default()
        }
    }
}

/// Operation type for logging
#[derive(Debug, Clone)]
pub enum UpsertOp {
    Upsert { ids: Vec<i64> },
    DeleteByKey { id: i64 },
    DeleteByDate { first_day: i64, last_day: i64 },
}

/// Result of an upsert DST run
#[derive(Debug, Clone)]
pub struct UpsertDSTResult {
    pub seed: u64,
    pub total_operations: u64,
    pub upserts: u64,
    pub rows_inserted: u64,
    pub rows_updated: u64,
    pub deletes: u64,
    pub rows_deleted: u64,
    pub invariant_violations: Vec<String>,
    pub last_op: Option<UpsertOp>,
}

impl UpsertDSTResult {
    pub fn new(seed: u64) -> Self {
        UpsertDSTResult {
            seed,
            total_operations: 0,
            upserts: 0,
            rows_inserted: 0,
            rows_updated: 0,
            deletes: 0,
            rows_deleted: 0,
            invariant_violations: Vec::new(),
            last_op: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.invariant_violations.is_empty()
    }

    pub fn summary(&self) -> String {
        format!(
            "Seed {}: {} ops (upserts:{}, inserted:{}, updated:{}, deletes:{}, deleted:{}), {} violations",
            self.seed,
            self.total_operations,
            self.upserts,
            self.rows_inserted,
            self.rows_updated,
            self.deletes,
            self.rows_deleted,
            self.invariant_violations.len()
        )
    }
}

/// Model row: (id, value, day offset)
type ModelRow = (i64, i64, i64);

/// DST harness for the upsert and delete engines
pub struct UpsertDSTHarness {
    config: UpsertDSTConfig,
    rng: SimulatedRng,
    registry: ConfigRegistry,
    store: InMemoryTableStore,
    clock: ManualClock,
    ledger: HistoryLedger,
    result: UpsertDSTResult,
    /// Expected table contents, in table order
    model: Vec<ModelRow>,
    /// Whether the table file has been written at least once
    created: bool,
    next_value: i64,
}

impl UpsertDSTHarness {
    pub fn new(config: UpsertDSTConfig) -> Self {
        let mut registry = ConfigRegistry::new();
        // A fixed, valid definition cannot fail to register
        let _ = registry.register_table(TABLE, &["id"]);
        UpsertDSTHarness {
            rng: SimulatedRng::new(config.seed),
            result: UpsertDSTResult::new(config.seed),
            config,
            registry,
            store: InMemoryTableStore::new(),
            clock: ManualClock::from_millis(1_700_000_000_000),
            ledger: HistoryLedger::new(),
            model: Vec::new(),
            created: false,
            next_value: 0,
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self::new(UpsertDSTConfig::new(seed))
    }

    fn day(offset: i64) -> Scalar {
        let base = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default();
        Scalar::Date(base + Duration::days(offset))
    }

    fn random_batch(&mut self) -> Vec<ModelRow> {
        let len = self.rng.gen_range(0, self.config.max_batch + 1);
        (0..len)
            .map(|_| {
                let id = self.rng.gen_range(0, self.config.num_keys) as i64;
                let day = self.rng.gen_range(0, self.config.num_days) as i64;
                self.next_value += 1;
                (id, self.next_value, day)
            })
            .collect()
    }

    fn run_single_op(&mut self) {
        let roll = self.rng.gen_range(0, 1000) as f64 / 1000.0;
        let outcome = if self.created && roll < self.config.delete_key_prob {
            self.delete_by_key()
        } else if self.created && roll < self.config.delete_key_prob + self.config.delete_date_prob
        {
            self.delete_by_date()
        } else {
            self.upsert()
        };

        self.result.total_operations += 1;
        self.clock.advance_millis(1 + self.rng.gen_range(0, 5) as i64);

        let checked = outcome.and_then(|()| self.check_invariants());
        if let Err(violation) = checked {
            self.result.invariant_violations.push(format!(
                "Op #{}: {:?} - {}",
                self.result.total_operations, self.result.last_op, violation
            ));
        }
    }

    fn upsert(&mut self) -> Result<(), String> {
        let batch = self.random_batch();
        self.result.last_op = Some(UpsertOp::Upsert {
            ids: batch.iter().map(|r| r.0).collect(),
        });

        let frame = Frame::from_rows(batch.iter().map(|&(id, v, day)| {
            Row::new()
                .with("id", id)
                .with("value", v)
                .with("day", Self::day(day))
        }));

        let engine = UpsertEngine::new(&self.registry, &self.store, &self.clock);
        let record = engine
            .upsert(&mut self.ledger, TABLE, &frame)
            .map_err(|e| format!("upsert failed: {}", e))?;

        // Model: replace in place, append new keys in first-occurrence order
        let before: HashSet<i64> = self.model.iter().map(|r| r.0).collect();
        let mut distinct: HashSet<i64> = HashSet::new();
        for row in &batch {
            distinct.insert(row.0);
            match self.model.iter_mut().find(|m| m.0 == row.0) {
                Some(slot) => *slot = *row,
                None => self.model.push(*row),
            }
        }
        let expected_new = distinct.iter().filter(|id| !before.contains(id)).count();
        let expected_updated = distinct.len() - expected_new;

        let stats = record
            .insert_statistics()
            .ok_or("upsert produced delete statistics")?;
        if stats.rows_newly_inserted != expected_new || stats.rows_updated != expected_updated {
            return Err(format!(
                "Stats mismatch: new={} (expected {}), updated={} (expected {})",
                stats.rows_newly_inserted, expected_new, stats.rows_updated, expected_updated
            ));
        }
        if stats.duplicates_found != stats.input_rows - stats.rows_newly_inserted {
            return Err("duplicates_found != input_rows - rows_newly_inserted".to_string());
        }
        if stats.intra_batch_duplicates != batch.len() - distinct.len() {
            return Err(format!(
                "intra_batch_duplicates={} expected {}",
                stats.intra_batch_duplicates,
                batch.len() - distinct.len()
            ));
        }

        if !batch.is_empty() {
            self.created = true;
        }
        self.result.upserts += 1;
        self.result.rows_inserted += stats.rows_newly_inserted as u64;
        self.result.rows_updated += stats.rows_updated as u64;
        Ok(())
    }

    fn delete_by_key(&mut self) -> Result<(), String> {
        let id = self.rng.gen_range(0, self.config.num_keys) as i64;
        self.result.last_op = Some(UpsertOp::DeleteByKey { id });

        // Keys are passed as text half the time to exercise coercion
        let key: Scalar = if self.rng.gen_bool(0.5) {
            id.to_string().into()
        } else {
            id.into()
        };
        let engine = DeleteEngine::new(&self.registry, &self.store, &self.clock);
        let record = engine
            .delete_by_key(&mut self.ledger, TABLE, "id", key)
            .map_err(|e| format!("delete_by_key failed: {}", e))?;

        let before = self.model.len();
        self.model.retain(|r| r.0 != id);
        self.check_deleted(&record, before - self.model.len())
    }

    fn delete_by_date(&mut self) -> Result<(), String> {
        let a = self.rng.gen_range(0, self.config.num_days) as i64;
        let b = self.rng.gen_range(0, self.config.num_days) as i64;
        let (first_day, last_day) = (a.min(b), a.max(b));
        self.result.last_op = Some(UpsertOp::DeleteByDate {
            first_day,
            last_day,
        });

        let engine = DeleteEngine::new(&self.registry, &self.store, &self.clock);
        let record = engine
            .delete_by_date(
                &mut self.ledger,
                TABLE,
                "day",
                Self::day(first_day),
                Self::day(last_day),
            )
            .map_err(|e| format!("delete_by_date failed: {}", e))?;

        let before = self.model.len();
        self.model
            .retain(|r| r.2 < first_day || r.2 > last_day);
        self.check_deleted(&record, before - self.model.len())
    }

    fn check_deleted(&mut self, record: &OperationRecord, expected: usize) -> Result<(), String> {
        let stats = record
            .delete_statistics()
            .ok_or("delete produced insert statistics")?;
        if stats.rows_deleted != expected {
            return Err(format!(
                "rows_deleted={} expected {}",
                stats.rows_deleted, expected
            ));
        }
        if stats.rows_preserved + stats.rows_deleted != stats.old_table_size {
            return Err("rows_preserved + rows_deleted != old_table_size".to_string());
        }
        self.result.deletes += 1;
        self.result.rows_deleted += expected as u64;
        Ok(())
    }

    fn check_invariants(&self) -> Result<(), String> {
        let table = self
            .store
            .load(TABLE)
            .map_err(|e| format!("load failed: {}", e))?;

        // Invariant 1: size matches the model
        if table.height() != self.model.len() {
            return Err(format!(
                "Size mismatch: actual={}, expected={}",
                table.height(),
                self.model.len()
            ));
        }

        // Invariant 2: rows match the model, in order
        for (i, &(id, v, day)) in self.model.iter().enumerate() {
            let actual = (table.get(i, "id"), table.get(i, "value"), table.get(i, "day"));
            let expected = (Scalar::Int(id), Scalar::Int(v), Self::day(day));
            if actual != (Some(&expected.0), Some(&expected.1), Some(&expected.2)) {
                return Err(format!(
                    "Row {} mismatch: actual={:?}, expected={:?}",
                    i, actual, expected
                ));
            }
        }

        // Invariant 3: no repeated dedup key
        if let Some(ids) = table.column("id") {
            let mut seen = HashSet::new();
            for id in ids {
                if !seen.insert(id) {
                    return Err(format!("Duplicate key {:?} persisted", id));
                }
            }
        }

        // Invariant 4: every operation is recorded once, in clock order
        let history = self.ledger.history_for(TABLE);
        if history.len() as u64 != self.result.total_operations {
            return Err(format!(
                "History length {} != operations {}",
                history.len(),
                self.result.total_operations
            ));
        }
        if history.windows(2).any(|w| w[0].timestamp > w[1].timestamp) {
            return Err("History out of timestamp order".to_string());
        }
        if let Some(last) = history.last() {
            if last.timestamp > self.clock.now() {
                return Err("Record timestamp ahead of clock".to_string());
            }
        }

        Ok(())
    }

    pub fn run(&mut self, operations: usize) {
        for _ in 0..operations {
            self.run_single_op();
            if !self.result.invariant_violations.is_empty() {
                break;
            }
        }
    }

    pub fn result(&self) -> &UpsertDSTResult {
        &self.result
    }

    pub fn ledger(&self) -> &HistoryLedger {
        &self.ledger
    }

    pub fn store(&self) -> &InMemoryTableStore {
        &self.store
    }
}

/// Run a batch of DST tests
pub fn run_upsert_batch(
    start_seed: u64,
    num_seeds: usize,
    ops_per_seed: usize,
    config_fn: fn(u64) -> UpsertDSTConfig,
) -> Vec<UpsertDSTResult> {
    (0..num_seeds)
        .map(|i| {
            let seed = start_seed + i as u64;
            let mut harness = UpsertDSTHarness::new(config_fn(seed));
            harness.run(ops_per_seed);
            harness.result().clone()
        })
        .collect()
}

/// Summarize batch results
pub fn summarize_upsert_batch(results: &[UpsertDSTResult]) -> String {
    let total = results.len();
    let passed = results.iter().filter(|r| r.is_success()).count();
    let failed = total - passed;
    let total_ops: u64 = results.iter().map(|r| r.total_operations).sum();

    let mut summary = format!(
        "Upsert DST Summary\n\
         ==================\n\
         Seeds: {} total, {} passed, {} failed\n\
         Total operations: {}\n",
        total, passed, failed, total_ops
    );

    if failed > 0 {
        summary.push_str("\nFailed seeds:\n");
        for result in results.iter().filter(|r| !r.is_success()) {
            summary.push_str(&format!("  Seed {}: {}\n", result.seed, result.summary()));
            for violation in &result.invariant_violations {
                summary.push_str(&format!("    - {}\n", violation));
            }
        }
    }

    summary
}
