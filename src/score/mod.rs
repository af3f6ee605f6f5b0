mod formula;

pub use formula::{
    apply_overrides, compute_mmr, fee_tier, map_to_credit_score, net_loan_balance, MmrInputs,
};
