//! Pure score math: loan balance aggregation, the multi-factor MMR formula,
//! signed-log normalization to the 0-1000 credit score, override application,
//! and the insurance fee tier table. No I/O anywhere in this module.

use std::collections::HashMap;

use crate::config::{MAX_LEAGUE_RANK, MAX_MMR, MIN_MMR};
use crate::types::{LoanTxn, OverrideEvent};

const MANA_PAYMENT: &str = "MANA_PAYMENT";
const USER_TYPE: &str = "USER";

/// Net outstanding loan balance for `user_id` across all counterparties.
///
/// Only user-to-user MANA_PAYMENT transfers count, and any transfer touching
/// `excluded_system_id` is skipped. Receiving mana from a counterparty drives
/// that counterparty's balance negative (debt); sending mana back raises it.
/// The result sums only the *negative* per-counterparty balances, so a user
/// who still owes anyone is penalized for each debt regardless of surplus
/// balances elsewhere. Always <= 0.
pub fn net_loan_balance(user_id: &str, txns: &[LoanTxn], excluded_system_id: &str) -> f64 {
    let mut balances: HashMap<&str, f64> = HashMap::new();

    for txn in txns {
        if txn.category != MANA_PAYMENT
            || txn.from_type != USER_TYPE
            || txn.to_type != USER_TYPE
        {
            continue;
        }
        if txn.from_id == excluded_system_id || txn.to_id == excluded_system_id {
            continue;
        }

        if txn.to_id == user_id {
            *balances.entry(txn.from_id.as_str()).or_insert(0.0) -= txn.amount;
        } else if txn.from_id == user_id {
            *balances.entry(txn.to_id.as_str()).or_insert(0.0) += txn.amount;
        }
    }

    balances.values().filter(|b| **b < 0.0).sum()
}

#[derive(Debug, Clone, Copy)]
pub struct MmrInputs {
    pub balance: f64,
    pub profit: f64,
    pub age_days: f64,
    pub rank: u32,
    pub txn_count: u32,
    pub net_loan_balance: f64,
}

/// Raw matchmaking-style rating. Unbounded; fed to [`map_to_credit_score`].
pub fn compute_mmr(inputs: MmrInputs) -> f64 {
    let rank_mmr = rank_mmr(inputs.rank);
    let txn_mmr = transaction_mmr(inputs.txn_count);

    inputs.balance * 0.10
        + inputs.net_loan_balance * 0.15
        + inputs.profit * 0.50
        + inputs.age_days * 0.05
        + rank_mmr * 0.10
        + txn_mmr * 0.10
}

/// Rank 1 maps to 1000, rank >= MAX_LEAGUE_RANK to 0, linear in between.
fn rank_mmr(rank: u32) -> f64 {
    let rank = rank.max(1) as f64;
    let max = MAX_LEAGUE_RANK as f64;
    let weight = (1.0 - (rank - 1.0) / (max - 1.0)).clamp(0.0, 1.0);
    weight * 1000.0
}

/// Activity floor: near-zero-activity accounts are catastrophically penalized
/// (sybil resistance), then the penalty relaxes piecewise and flattens out at
/// +1000 beyond a thousand transactions.
fn transaction_mmr(txn_count: u32) -> f64 {
    let n = txn_count as f64;
    if txn_count < 5 {
        -1_000_000.0
    } else if txn_count <= 20 {
        let t = (n - 5.0) / 15.0;
        -100_000.0 + t * 90_000.0
    } else if txn_count <= 100 {
        let t = (n - 20.0) / 80.0;
        -10_000.0 + t * 10_000.0
    } else if txn_count <= 1000 {
        (n - 100.0) / 900.0 * 1000.0
    } else {
        1000.0
    }
}

/// Symmetric log compression, defined for all reals: f(0) = 0, preserves sign
/// and ordering, diminishing sensitivity at the extremes.
fn signed_log10(x: f64) -> f64 {
    if x == 0.0 {
        return 0.0;
    }
    x.signum() * (1.0 + x.abs()).log10()
}

/// Normalize an unbounded MMR into the user-facing 0-1000 integer score.
pub fn map_to_credit_score(mmr: f64) -> i64 {
    let f_min = signed_log10(MIN_MMR);
    let f_max = signed_log10(MAX_MMR);
    let normalized = (signed_log10(mmr) - f_min) / (f_max - f_min);
    (normalized * 1000.0).clamp(0.0, 1000.0).round() as i64
}

/// Add every override whose effective date is at or before `as_of`, clamped
/// back into the score range. `as_of` is "now" for the live endpoint and the
/// snapshot's own timestamp when replaying history.
pub fn apply_overrides(base_score: i64, overrides: &[OverrideEvent], as_of: i64) -> i64 {
    let adjustment: i64 = overrides
        .iter()
        .filter(|o| o.date_of_infraction <= as_of)
        .map(|o| o.modifier)
        .sum();
    (base_score + adjustment).clamp(0, 1000)
}

/// Insurance fee tier for a score. `None` means the user could not be found
/// and gets the worst tier. Monotonically non-increasing in score.
pub fn fee_tier(score: Option<i64>) -> f64 {
    let Some(score) = score else { return 1.60 };
    match score {
        s if s >= 900 => 0.02,
        s if s >= 800 => 0.05,
        s if s >= 700 => 0.10,
        s if s >= 600 => 0.20,
        s if s >= 500 => 0.35,
        s if s >= 400 => 0.55,
        s if s >= 300 => 0.80,
        s if s >= 200 => 1.10,
        s if s >= 100 => 1.35,
        _ => 1.60,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn txn(from: &str, to: &str, amount: f64) -> LoanTxn {
        LoanTxn {
            from_id: from.to_string(),
            to_id: to.to_string(),
            amount,
            category: MANA_PAYMENT.to_string(),
            from_type: USER_TYPE.to_string(),
            to_type: USER_TYPE.to_string(),
        }
    }

    fn inputs() -> MmrInputs {
        MmrInputs {
            balance: 1000.0,
            profit: 500.0,
            age_days: 365.0,
            rank: 10,
            txn_count: 150,
            net_loan_balance: 0.0,
        }
    }

    #[test]
    fn mmr_is_deterministic() {
        let a = compute_mmr(inputs());
        let b = compute_mmr(inputs());
        assert_eq!(a, b);
        assert_eq!(map_to_credit_score(a), map_to_credit_score(b));
    }

    #[test]
    fn concrete_mmr_matches_hand_computation() {
        // rank 10 of 100 → rank_mmr ≈ 909.09, txn 150 → txn_mmr ≈ 55.56
        // 100 + 0 + 250 + 18.25 + 90.91 + 5.56 ≈ 464.72
        let mmr = compute_mmr(inputs());
        assert!((mmr - 464.72).abs() < 0.05, "mmr={mmr}");

        let score = map_to_credit_score(mmr);
        assert!(score > map_to_credit_score(MIN_MMR));
        assert!(score < map_to_credit_score(MAX_MMR));
    }

    #[test]
    fn score_bounds_at_normalization_endpoints() {
        assert_eq!(map_to_credit_score(MIN_MMR), 0);
        assert_eq!(map_to_credit_score(MAX_MMR), 1000);
        assert_eq!(map_to_credit_score(f64::MIN), 0);
        assert_eq!(map_to_credit_score(f64::MAX), 1000);
        let mid = map_to_credit_score(0.0);
        assert!((0..=1000).contains(&mid));
    }

    #[test]
    fn profit_increase_never_decreases_mmr() {
        let base = compute_mmr(inputs());
        for profit in [501.0, 1_000.0, 100_000.0, 10_000_000.0] {
            let mmr = compute_mmr(MmrInputs { profit, ..inputs() });
            assert!(mmr >= base, "profit={profit} mmr={mmr} base={base}");
        }
    }

    #[test]
    fn worse_rank_never_increases_mmr() {
        let mut prev = f64::INFINITY;
        for rank in 1..=120 {
            let mmr = compute_mmr(MmrInputs { rank, ..inputs() });
            assert!(mmr <= prev, "rank={rank}");
            prev = mmr;
        }
    }

    #[test]
    fn transaction_mmr_breakpoints() {
        assert_eq!(transaction_mmr(0), -1_000_000.0);
        assert_eq!(transaction_mmr(4), -1_000_000.0);
        assert_eq!(transaction_mmr(5), -100_000.0);
        assert_eq!(transaction_mmr(20), -10_000.0);
        assert_eq!(transaction_mmr(100), 0.0);
        assert_eq!(transaction_mmr(1000), 1000.0);
        assert_eq!(transaction_mmr(5000), 1000.0);
        // Interior points are linear within each segment
        assert!((transaction_mmr(150) - 55.555).abs() < 0.01);
    }

    #[test]
    fn loan_balance_counts_debt_only() {
        // Owes 100 to lender_a, holds +50 surplus against lender_b.
        let txns = vec![
            txn("lender_a", "me", 100.0),
            txn("me", "lender_b", 50.0),
        ];
        let net = net_loan_balance("me", &txns, "bank");
        assert_eq!(net, -100.0);

        // Fully repaid — no negative balances left.
        let txns = vec![txn("lender_a", "me", 100.0), txn("me", "lender_a", 100.0)];
        assert_eq!(net_loan_balance("me", &txns, "bank"), 0.0);

        // Net creditor overall.
        let txns = vec![txn("me", "borrower", 500.0)];
        assert_eq!(net_loan_balance("me", &txns, "bank"), 0.0);
    }

    #[test]
    fn loan_balance_skips_system_and_non_user_transfers() {
        let mut bank_txn = txn("bank", "me", 1000.0);
        bank_txn.from_type = "BANK".to_string();
        let system_txn = txn("bank", "me", 1000.0);
        let mut bonus = txn("lender_a", "me", 100.0);
        bonus.category = "UNIQUE_BETTOR_BONUS".to_string();

        let net = net_loan_balance("me", &[bank_txn, system_txn, bonus], "bank");
        assert_eq!(net, 0.0);
    }

    #[test]
    fn overrides_respect_effective_date_and_clamp() {
        let mk = |modifier: i64, date: i64| OverrideEvent {
            user_id: "u1".to_string(),
            username: "alice".to_string(),
            modifier,
            url: String::new(),
            description: String::new(),
            date_of_infraction: date,
            timestamp: date + 1_000_000,
        };

        let events = vec![mk(50, 999), mk(-100, 1001)];
        assert_eq!(apply_overrides(500, &events, 1000), 550);
        assert_eq!(apply_overrides(500, &events, 2000), 450);

        assert_eq!(apply_overrides(990, &[mk(50, 0)], 1000), 1000);
        assert_eq!(apply_overrides(20, &[mk(-100, 0)], 1000), 0);
    }

    #[test]
    fn fee_tiers_are_monotone() {
        assert_eq!(fee_tier(Some(950)), 0.02);
        assert_eq!(fee_tier(Some(900)), 0.02);
        assert_eq!(fee_tier(Some(50)), 1.60);
        assert_eq!(fee_tier(None), 1.60);

        // Lower score never pays less
        let mut prev = 0.0;
        for score in (0..=1000).step_by(25).map(|s| 1000 - s) {
            let fee = fee_tier(Some(score));
            assert!(fee >= prev, "score={score}");
            prev = fee;
        }
    }
}
