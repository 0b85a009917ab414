//! Fee estimation for pool operations.
//!
//! Fees are charged in basis points of the amount and always rounded down,
//! matching the settlement side's rule.

use crate::asset::AssetDescriptor;
use crate::core::constants::{
    BASIS_POINTS_DENOMINATOR, DEFAULT_DEPOSIT_FEE_BPS, DEFAULT_SWAP_FEE_BPS,
    DEFAULT_WITHDRAW_FEE_BPS,
};
use crate::error::{Result, ZertSdkError};
use crate::utils::{format_adaptive, parse_units};
use num_bigint::BigUint;
use num_traits::Zero;
use serde::{Deserialize, Serialize};

/// Fee rate in basis points (parts per 10,000)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FeeRate(u16);

impl FeeRate {
    pub const ZERO: FeeRate = FeeRate(0);

    pub fn new(bps: u32) -> Result<Self> {
        if bps > BASIS_POINTS_DENOMINATOR {
            return Err(ZertSdkError::InvalidFeeRate(bps));
        }
        Ok(Self(bps as u16))
    }

    pub fn bps(&self) -> u32 {
        u32::from(self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeeKind {
    Deposit,
    Withdraw,
    Swap,
}

/// Configured rate for each kind of operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeeSchedule {
    pub deposit_bps: u32,
    pub withdraw_bps: u32,
    pub swap_bps: u32,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            deposit_bps: DEFAULT_DEPOSIT_FEE_BPS,
            withdraw_bps: DEFAULT_WITHDRAW_FEE_BPS,
            swap_bps: DEFAULT_SWAP_FEE_BPS,
        }
    }
}

impl FeeSchedule {
    pub fn rate(&self, kind: FeeKind) -> Result<FeeRate> {
        let bps = match kind {
            FeeKind::Deposit => self.deposit_bps,
            FeeKind::Withdraw => self.withdraw_bps,
            FeeKind::Swap => self.swap_bps,
        };
        FeeRate::new(bps)
    }

    pub fn validate(&self) -> Result<()> {
        for kind in [FeeKind::Deposit, FeeKind::Withdraw, FeeKind::Swap] {
            self.rate(kind)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeeEstimate {
    /// Fee rendered for humans
    pub display: String,
    /// Fee in the asset's smallest unit
    pub raw: BigUint,
}

impl FeeEstimate {
    pub fn zero() -> Self {
        Self {
            display: "0".to_string(),
            raw: BigUint::zero(),
        }
    }
}

/// Estimate the fee on `amount` (a human decimal string) of `asset`.
///
/// Zero, negative or unparsable amounts produce a zero fee. A positive
/// amount whose fee floors to nothing still renders with two decimals.
pub fn estimate_fee(amount: &str, asset: &AssetDescriptor, rate: FeeRate) -> FeeEstimate {
    let amount_raw = match parse_units(amount, asset.decimals) {
        Some(raw) if !raw.is_zero() => raw,
        _ => return FeeEstimate::zero(),
    };

    let raw = amount_raw * rate.bps() / BASIS_POINTS_DENOMINATOR;

    FeeEstimate {
        display: format_adaptive(&raw, asset.decimals),
        raw,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::constants::{NATIVE_MINT, USDC_MINT};

    fn sol() -> AssetDescriptor {
        AssetDescriptor::new(NATIVE_MINT, 9, "SOL")
    }

    fn rate(bps: u32) -> FeeRate {
        FeeRate::new(bps).unwrap()
    }

    #[test]
    fn fee_is_floored_basis_points() {
        let fee = estimate_fee("1.00", &sol(), rate(25));
        assert_eq!(fee.raw, BigUint::from(2_500_000u64));
        assert_eq!(fee.display, "0.0025");
    }

    #[test]
    fn zero_and_negative_amounts_cost_nothing() {
        assert_eq!(estimate_fee("0", &sol(), rate(25)), FeeEstimate::zero());
        assert_eq!(estimate_fee("-5", &sol(), rate(25)), FeeEstimate::zero());
        assert_eq!(estimate_fee("", &sol(), rate(25)), FeeEstimate::zero());
        assert_eq!(estimate_fee("ten", &sol(), rate(25)), FeeEstimate::zero());
    }

    #[test]
    fn dust_fee_floors_to_zero() {
        let usdc = AssetDescriptor::new(USDC_MINT, 6, "USDC");
        // 0.000399 USDC * 25 bps = 0.99 units -> 0
        let fee = estimate_fee("0.000399", &usdc, rate(25));
        assert!(fee.raw.is_zero());
        assert_eq!(fee.display, "0.00");

        let free = estimate_fee("3", &sol(), FeeRate::ZERO);
        assert!(free.raw.is_zero());
        assert_eq!(free.display, "0.00");
    }

    #[test]
    fn large_amounts_do_not_overflow() {
        let fee = estimate_fee("100000000000", &sol(), rate(10_000));
        assert_eq!(fee.raw.to_string(), "100000000000000000000");
        assert_eq!(fee.display, "100000000000.00");
    }

    #[test]
    fn rate_bounds_are_enforced() {
        assert!(FeeRate::new(10_000).is_ok());
        assert!(matches!(
            FeeRate::new(10_001),
            Err(ZertSdkError::InvalidFeeRate(10_001))
        ));
    }

    #[test]
    fn schedule_resolves_each_kind() {
        let schedule = FeeSchedule::default();
        assert_eq!(schedule.rate(FeeKind::Deposit).unwrap(), FeeRate::ZERO);
        assert_eq!(schedule.rate(FeeKind::Withdraw).unwrap().bps(), 25);
        assert_eq!(schedule.rate(FeeKind::Swap).unwrap().bps(), 25);

        let broken = FeeSchedule {
            swap_bps: 20_000,
            ..schedule
        };
        assert!(broken.validate().is_err());
    }
}
