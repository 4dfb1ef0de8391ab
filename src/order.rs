//! Pending order aggregation.
//!
//! An [`Order`] is the set of position deltas and metadata recorded against
//! one settlement timestamp. The local variant aggregates one account's
//! actions for the current unsettled interval; the global variant is the
//! field-wise sum of all local orders for the market (see [`Order::add`]).
//! Position-increasing vs. -decreasing is always classified relative to the
//! current settled position's side magnitude, not relative to zero.

use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};
use crate::fixed::{self, Fixed6};
use crate::position::Position;
use crate::version::MarketParameter;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub timestamp: u32,
    /// Count of discrete position-changing actions aggregated here.
    pub orders: u32,
    /// Net deposit/withdraw delta for the interval (signed).
    pub collateral: Fixed6,
    pub maker_pos: Fixed6,
    pub maker_neg: Fixed6,
    pub long_pos: Fixed6,
    pub long_neg: Fixed6,
    pub short_pos: Fixed6,
    pub short_neg: Fixed6,
    /// Count of liquidation-induced actions aggregated here. A local order
    /// built by [`Order::from_delta`] carries 0 or 1; the global aggregate
    /// sums them so the liquidation fee scales with the number of protected
    /// accounts settling at the boundary.
    pub protection: u8,
    /// Count of firm position-moving actions, used to decide whether a
    /// not-yet-settled order must be voided when its oracle version is
    /// invalid.
    pub invalidation: u8,
    pub maker_referral: Fixed6,
    pub taker_referral: Fixed6,
}

impl Order {
    /// Fold one user action into a fresh single-action order.
    ///
    /// `maker_delta` and `taker_delta` are signed; a positive taker delta
    /// moves net exposure toward long, negative toward short. At most one of
    /// the two taker sides is produced per call unless the delta crosses
    /// zero, in which case it splits at the crossing point: the closing leg
    /// goes to the old side's `neg`, the re-opening remainder to the new
    /// side's `pos`.
    ///
    /// `protects` marks a liquidation-induced order; such an order carries no
    /// position delta and does not count toward `orders` or `invalidation`.
    /// `intent` orders (off-chain priced) never count toward `invalidation`.
    #[allow(clippy::too_many_arguments)]
    pub fn from_delta(
        timestamp: u32,
        position: &Position,
        maker_delta: Fixed6,
        taker_delta: Fixed6,
        collateral: Fixed6,
        protects: bool,
        intent: bool,
        referral_rate: Fixed6,
    ) -> Result<Order> {
        let mut order = Order {
            timestamp,
            collateral,
            ..Order::default()
        };

        if protects {
            order.protection = 1;
            order.validate()?;
            return Ok(order);
        }

        let mut moved = false;

        if !maker_delta.is_zero() {
            if maker_delta.is_positive() {
                order.maker_pos = maker_delta;
            } else {
                order.maker_neg = maker_delta.checked_neg()?;
            }
            order.maker_referral = referral_rate.checked_mul(maker_delta.checked_abs()?)?;
            moved = true;
        }

        if !taker_delta.is_zero() {
            let net = position.net();
            let new_net = net.checked_add(taker_delta)?;

            if !net.is_zero() && !new_net.is_zero() && net.is_positive() != new_net.is_positive() {
                // Crossing: close the old side fully, open the opposite side
                // with the remainder past zero.
                if net.is_positive() {
                    order.long_neg = net;
                    order.short_pos = new_net.checked_neg()?;
                } else {
                    order.short_neg = net.checked_neg()?;
                    order.long_pos = new_net;
                }
            } else if taker_delta.is_positive() {
                if net.is_negative() {
                    order.short_neg = taker_delta;
                } else {
                    order.long_pos = taker_delta;
                }
            } else if net.is_positive() {
                order.long_neg = taker_delta.checked_neg()?;
            } else {
                order.short_pos = taker_delta.checked_neg()?;
            }

            order.taker_referral = referral_rate.checked_mul(taker_delta.checked_abs()?)?;
            moved = true;
        }

        if moved {
            order.orders = 1;
            if !intent {
                order.invalidation = 1;
            }
        }

        order.validate()?;
        Ok(order)
    }

    /// Field-wise checked merge. Builds the global order from local orders
    /// and folds multiple actions of one account into its pending order.
    /// A blank `self` adopts `other`'s timestamp; otherwise the timestamps
    /// must agree (orders aggregate within a single settlement interval).
    pub fn add(&mut self, other: &Order) -> Result<()> {
        if self.timestamp != other.timestamp {
            if *self != Order::default() {
                return Err(LedgerError::Ordering);
            }
            self.timestamp = other.timestamp;
        }

        self.orders = self
            .orders
            .checked_add(other.orders)
            .ok_or(LedgerError::Overflow)?;
        self.collateral = self.collateral.checked_add(other.collateral)?;
        self.maker_pos = self.maker_pos.checked_add(other.maker_pos)?;
        self.maker_neg = self.maker_neg.checked_add(other.maker_neg)?;
        self.long_pos = self.long_pos.checked_add(other.long_pos)?;
        self.long_neg = self.long_neg.checked_add(other.long_neg)?;
        self.short_pos = self.short_pos.checked_add(other.short_pos)?;
        self.short_neg = self.short_neg.checked_add(other.short_neg)?;
        self.protection = self
            .protection
            .checked_add(other.protection)
            .ok_or(LedgerError::Range {
                field: "order.protection",
                bits: 8,
            })?;
        self.invalidation = self
            .invalidation
            .checked_add(other.invalidation)
            .ok_or(LedgerError::Range {
                field: "order.invalidation",
                bits: 8,
            })?;
        self.maker_referral = self.maker_referral.checked_add(other.maker_referral)?;
        self.taker_referral = self.taker_referral.checked_add(other.taker_referral)?;

        self.validate()
    }

    /// Void the position content of an order whose triggering oracle version
    /// turned out invalid. Collateral transfer and protection survive; the
    /// position deltas, action count and referrals are dropped.
    pub fn invalidate(&mut self) {
        self.orders = 0;
        self.maker_pos = Fixed6::ZERO;
        self.maker_neg = Fixed6::ZERO;
        self.long_pos = Fixed6::ZERO;
        self.long_neg = Fixed6::ZERO;
        self.short_pos = Fixed6::ZERO;
        self.short_neg = Fixed6::ZERO;
        self.maker_referral = Fixed6::ZERO;
        self.taker_referral = Fixed6::ZERO;
    }

    // ========================================
    // Predicates (pure, infallible)
    // ========================================

    /// The order's triggering oracle data is available.
    pub fn ready(&self, oracle_timestamp: u32) -> bool {
        oracle_timestamp >= self.timestamp
    }

    pub fn increases_position(&self) -> bool {
        !self.maker_pos.is_zero() || self.increases_taker()
    }

    /// Maker changes alone do not count.
    pub fn increases_taker(&self) -> bool {
        !self.long_pos.is_zero() || !self.short_pos.is_zero()
    }

    /// Net maker liquidity available to takers would shrink: maker liquidity
    /// falls, or absolute net taker exposure strictly grows. Equal exposure
    /// before and after is not a decrease.
    pub fn decreases_liquidity(&self, position: &Position) -> bool {
        if self.maker_neg > self.maker_pos {
            return true;
        }
        let before = position.net();
        let after = before + self.taker_net();
        after.checked_abs().unwrap_or(Fixed6::ZERO) > before.checked_abs().unwrap_or(Fixed6::ZERO)
    }

    /// Whether admission control must run a liquidity check for this order:
    /// never on a closed market, otherwise for net-increasing taker actions
    /// and maker-decreasing actions. Maker increases and pure taker
    /// decreases pass without one.
    pub fn liquidity_check_applicable(
        &self,
        position: &Position,
        market: &MarketParameter,
    ) -> bool {
        if market.closed {
            return false;
        }
        self.decreases_liquidity(position)
    }

    /// All six position-delta fields zero.
    pub fn is_empty(&self) -> bool {
        self.maker_pos.is_zero()
            && self.maker_neg.is_zero()
            && self.long_pos.is_zero()
            && self.long_neg.is_zero()
            && self.short_pos.is_zero()
            && self.short_neg.is_zero()
    }

    /// The order both closes one taker side fully and opens the opposite
    /// beyond zero within the same settlement window. Detected from the
    /// order's own fields: the long leg `long_pos - long_neg` and the
    /// de-shorting leg `short_neg - short_pos` point the same way only when
    /// a single directional move was split at the zero boundary.
    pub fn crosses_zero(&self) -> bool {
        let long_leg = self.long_pos - self.long_neg;
        let deshort_leg = self.short_neg - self.short_pos;
        !long_leg.is_zero()
            && !deshort_leg.is_zero()
            && long_leg.is_positive() == deshort_leg.is_positive()
    }

    // ========================================
    // Derived quantities
    // ========================================

    /// Signed net taker movement of this order.
    pub fn taker_net(&self) -> Fixed6 {
        (self.long_pos - self.long_neg) - (self.short_pos - self.short_neg)
    }

    /// Total taker magnitude moved, all four fields.
    pub fn taker_total(&self) -> Fixed6 {
        self.long_pos + self.long_neg + self.short_pos + self.short_neg
    }

    /// Total maker magnitude moved.
    pub fn maker_total(&self) -> Fixed6 {
        self.maker_pos + self.maker_neg
    }

    /// Order size increasing net exposure in the positive direction.
    pub fn pos_exposure(&self) -> Fixed6 {
        self.long_pos + self.short_neg
    }

    /// Order size increasing net exposure in the negative direction.
    pub fn neg_exposure(&self) -> Fixed6 {
        self.long_neg + self.short_pos
    }

    // ========================================
    // Write-boundary validation
    // ========================================

    /// Enforce the storage ranges. `timestamp`, `orders`, `protection` and
    /// `invalidation` are bounded by their integer types already; the two
    /// `u8` counters additionally fail `add` with a range error rather than
    /// wrapping.
    pub fn validate(&self) -> Result<()> {
        fixed::validate_signed(self.collateral, "order.collateral", 63)?;
        fixed::validate_unsigned(self.maker_pos, "order.maker_pos", 64)?;
        fixed::validate_unsigned(self.maker_neg, "order.maker_neg", 64)?;
        fixed::validate_unsigned(self.long_pos, "order.long_pos", 64)?;
        fixed::validate_unsigned(self.long_neg, "order.long_neg", 64)?;
        fixed::validate_unsigned(self.short_pos, "order.short_pos", 64)?;
        fixed::validate_unsigned(self.short_neg, "order.short_neg", 64)?;
        fixed::validate_unsigned(self.maker_referral, "order.maker_referral", 64)?;
        fixed::validate_unsigned(self.taker_referral, "order.taker_referral", 64)?;
        Ok(())
    }
}
