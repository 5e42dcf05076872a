//! Platform fee arithmetic.
//!
//! Every monetary value in the crate is an integer in minor currency units
//! (paise for INR). The fee is computed once when an enquiry is created and
//! frozen onto it; nothing in the crate re-derives it afterwards.

/// Fee retained by the platform, as a percentage of the gross budget.
pub const PLATFORM_FEE_RATE_PERCENT: i64 = 30;

/// Fee owed on a gross inspection budget, rounded half away from zero.
pub fn platform_fee(gross_budget_minor: i64) -> i64 {
    let scaled = gross_budget_minor * PLATFORM_FEE_RATE_PERCENT;
    let half = if scaled >= 0 { 50 } else { -50 };
    (scaled + half) / 100
}

/// Amount the customer sees for a bid: the inspector's net ask plus the fee.
pub fn customer_view(net_amount_minor: i64, platform_fee_minor: i64) -> i64 {
    net_amount_minor + platform_fee_minor
}

/// Amount the inspector sees for a budget: the gross budget minus the fee.
pub fn inspector_view(gross_budget_minor: i64, platform_fee_minor: i64) -> i64 {
    gross_budget_minor - platform_fee_minor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fee_is_thirty_percent_rounded_half_away_from_zero() {
        assert_eq!(platform_fee(0), 0);
        assert_eq!(platform_fee(100), 30);
        assert_eq!(platform_fee(1000), 300);
        // 30% of 105 = 31.5 -> rounds away from zero to 32
        assert_eq!(platform_fee(105), 32);
        // 30% of 101 = 30.3 -> 30
        assert_eq!(platform_fee(101), 30);
        // 30% of 103 = 30.9 -> 31
        assert_eq!(platform_fee(103), 31);
    }

    #[test]
    fn views_differ_exactly_by_the_fee() {
        let gross = 250_000;
        let fee = platform_fee(gross);
        assert_eq!(customer_view(inspector_view(gross, fee), fee), gross);
        assert_eq!(customer_view(70_000, fee), 70_000 + fee);
    }

    #[test]
    fn fee_handles_large_budgets_without_drift() {
        let gross = 9_999_999_999;
        assert_eq!(platform_fee(gross), 3_000_000_000);
        assert_eq!(
            platform_fee(crate::marketplace::domain::MAX_BUDGET_MINOR),
            300_000_000_000
        );
    }
}
