use backoffice_core::Money;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::str::FromStr;

/// The part of a bank or ledger row the matcher looks at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchableEntry {
    /// Position of the row in its source table.
    pub row: usize,
    pub date: Option<NaiveDate>,
    /// `None` for cells that were not numeric.
    pub amount: Option<Money>,
}

impl MatchableEntry {
    fn key(&self) -> Option<Money> {
        self.amount.filter(|m| !m.is_zero())
    }
}

fn date_gap(a: &MatchableEntry, b: &MatchableEntry) -> Option<i64> {
    Some((a.date? - b.date?).num_days().abs())
}

/// Picks which of several equal-amount ledger rows a bank row consumes.
pub trait TieBreak: Send + Sync {
    /// `candidates` are the unconsumed ledger rows carrying the bank row's
    /// amount, in ledger order, never empty. Returns an index into it.
    fn choose(&self, bank: &MatchableEntry, candidates: &[MatchableEntry]) -> usize;
}

/// The earliest remaining ledger row wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstAvailable;

impl TieBreak for FirstAvailable {
    fn choose(&self, _bank: &MatchableEntry, _candidates: &[MatchableEntry]) -> usize {
        0
    }
}

/// The ledger row with the smallest date gap wins; undated rows rank last
/// and equal gaps fall back to ledger order.
#[derive(Debug, Clone, Copy, Default)]
pub struct NearestDate;

impl TieBreak for NearestDate {
    fn choose(&self, bank: &MatchableEntry, candidates: &[MatchableEntry]) -> usize {
        candidates
            .iter()
            .enumerate()
            .min_by_key(|(_, c)| date_gap(bank, c).unwrap_or(i64::MAX))
            .map(|(i, _)| i)
            .unwrap_or(0)
    }
}

/// Configurable name for a [`TieBreak`] strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TieBreakKind {
    #[default]
    First,
    NearestDate,
}

impl TieBreakKind {
    pub fn strategy(self) -> Box<dyn TieBreak> {
        match self {
            TieBreakKind::First => Box::new(FirstAvailable),
            TieBreakKind::NearestDate => Box::new(NearestDate),
        }
    }
}

impl FromStr for TieBreakKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "first" | "first-available" => Ok(TieBreakKind::First),
            "nearest-date" | "nearest" => Ok(TieBreakKind::NearestDate),
            other => Err(format!("unknown tie-break '{other}' (expected first or nearest-date)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchPair {
    pub bank_row: usize,
    pub ledger_row: usize,
    pub amount: Money,
    /// Days between the two dates, when both rows have one.
    pub date_gap_days: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconciliationResult {
    pub matches: Vec<MatchPair>,
    /// Bank rows left over, in bank order.
    pub unmatched_bank: Vec<usize>,
    /// Ledger rows left over, in ledger order.
    pub unmatched_ledger: Vec<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReconcileSummary {
    pub matched: usize,
    pub unmatched_bank: usize,
    pub unmatched_ledger: usize,
}

impl ReconcileSummary {
    pub fn bank_rows(&self) -> usize {
        self.matched + self.unmatched_bank
    }

    pub fn ledger_rows(&self) -> usize {
        self.matched + self.unmatched_ledger
    }
}

impl fmt::Display for ReconcileSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} matched, {} bank and {} ledger rows unmatched",
            self.matched, self.unmatched_bank, self.unmatched_ledger
        )
    }
}

impl ReconciliationResult {
    pub fn summary(&self) -> ReconcileSummary {
        ReconcileSummary {
            matched: self.matches.len(),
            unmatched_bank: self.unmatched_bank.len(),
            unmatched_ledger: self.unmatched_ledger.len(),
        }
    }

    /// Matches whose dates are further apart than `days`.
    pub fn distant_matches(&self, days: i64) -> impl Iterator<Item = &MatchPair> {
        self.matches
            .iter()
            .filter(move |m| m.date_gap_days.is_some_and(|gap| gap > days))
    }
}

/// Single-pass, first-match-wins reconciliation by signed amount.
///
/// Bank rows are visited in order; each consumes at most one remaining ledger
/// row with exactly the same amount. A consumed ledger row is never offered
/// again and earlier decisions are never revisited.
pub struct ReconcileEngine {
    tie_break: Box<dyn TieBreak>,
}

impl Default for ReconcileEngine {
    fn default() -> Self {
        Self::new(Box::new(FirstAvailable))
    }
}

impl ReconcileEngine {
    pub fn new(tie_break: Box<dyn TieBreak>) -> Self {
        Self { tie_break }
    }

    pub fn reconcile(&self, bank: &[MatchableEntry], ledger: &[MatchableEntry]) -> ReconciliationResult {
        // amount -> (ledger positions, entries), both in ledger order
        let mut index: HashMap<Money, (VecDeque<usize>, VecDeque<MatchableEntry>)> = HashMap::new();
        for (pos, entry) in ledger.iter().enumerate() {
            if let Some(key) = entry.key() {
                let bucket = index.entry(key).or_default();
                bucket.0.push_back(pos);
                bucket.1.push_back(*entry);
            }
        }

        let mut consumed = vec![false; ledger.len()];
        let mut result = ReconciliationResult::default();

        for b in bank {
            let bucket = b.key().and_then(|key| index.get_mut(&key).map(|bucket| (key, bucket)));
            match bucket {
                Some((key, (positions, candidates))) if !candidates.is_empty() => {
                    let pick = self
                        .tie_break
                        .choose(b, candidates.make_contiguous())
                        .min(candidates.len() - 1);
                    let taken = if pick == 0 {
                        positions.pop_front().zip(candidates.pop_front())
                    } else {
                        positions.remove(pick).zip(candidates.remove(pick))
                    };
                    match taken {
                        Some((pos, l)) => {
                            consumed[pos] = true;
                            result.matches.push(MatchPair {
                                bank_row: b.row,
                                ledger_row: l.row,
                                amount: key,
                                date_gap_days: date_gap(b, &l),
                            });
                        }
                        None => result.unmatched_bank.push(b.row),
                    }
                }
                _ => result.unmatched_bank.push(b.row),
            }
        }

        result.unmatched_ledger = ledger
            .iter()
            .zip(&consumed)
            .filter(|(_, used)| !**used)
            .map(|(e, _)| e.row)
            .collect();

        tracing::debug!(summary = %result.summary(), "reconciled");
        result
    }
}
