//! Per-account settlement checkpoints.
//!
//! A [`Checkpoint`] is the running ledger of an account's realized fees and
//! collateral. [`Checkpoint::accumulate`] computes the realized changes for
//! one settlement interval from immutable snapshots (the account's pending
//! order and guarantee, its settled position at the interval start, and the
//! two bounding versions) without touching any state. The caller folds the
//! result in via [`Checkpoint::next`], which range-validates before
//! returning, so a failed settlement leaves the prior checkpoint untouched.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{LedgerError, Result};
use crate::fixed::{self, Fixed6};
use crate::guarantee::Guarantee;
use crate::order::Order;
use crate::position::Position;
use crate::version::Version;

/// Opaque fee-exemption pass-through from the settlement orchestrator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementContext {
    pub charge_trade_fee: bool,
    pub charge_settlement_fee: bool,
}

impl Default for SettlementContext {
    fn default() -> Self {
        SettlementContext {
            charge_trade_fee: true,
            charge_settlement_fee: true,
        }
    }
}

/// Realized changes for one account over one settlement interval.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointAccumulation {
    /// Directional pnl plus received spread (market-derived collateral
    /// change, excluding the price override reported below).
    pub collateral: Fixed6,
    /// Intent-priced pnl: difference between the guarantee price and the
    /// clearing price.
    pub price_override: Fixed6,
    /// Positive charge: maker/taker proportional fees plus the spread
    /// component below.
    pub trade_fee: Fixed6,
    /// Price-impact portion of `trade_fee`.
    pub spread: Fixed6,
    /// Positive charge: per-order settlement fee plus the liquidation fee
    /// component below.
    pub settlement_fee: Fixed6,
    /// Liquidation portion of `settlement_fee` (protected orders only).
    pub liquidation_fee: Fixed6,
    /// Net deposit/withdraw carried on the order.
    pub transfer: Fixed6,
}

impl CheckpointAccumulation {
    /// Net change to the running collateral once fees are taken.
    pub fn collateral_change(&self) -> Result<Fixed6> {
        self.collateral
            .checked_add(self.price_override)?
            .checked_add(self.transfer)?
            .checked_sub(self.trade_fee)?
            .checked_sub(self.settlement_fee)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub trade_fee: Fixed6,
    pub settlement_fee: Fixed6,
    pub transfer: Fixed6,
    pub collateral: Fixed6,
}

impl Checkpoint {
    /// Compute the realized changes for the transition from
    /// `from_position`/`from_version` to `to_version` under `order` and its
    /// intent-priced `guarantee`.
    ///
    /// Pure: no state is mutated; persistence is the caller's job. Equal
    /// version timestamps are the degenerate no-op pairing (every
    /// accumulator delta is zero); a `from_version` later than `to_version`,
    /// or a non-contiguous position/order id pair, is an ordering error.
    #[allow(clippy::too_many_arguments)]
    pub fn accumulate(
        &self,
        ctx: &SettlementContext,
        order_id: u32,
        order: &Order,
        guarantee: &Guarantee,
        from_position: &Position,
        from_version: &Version,
        to_version: &Version,
    ) -> Result<CheckpointAccumulation> {
        if from_version.timestamp > to_version.timestamp {
            return Err(LedgerError::Ordering);
        }
        let expected = from_position
            .id
            .checked_add(1)
            .ok_or(LedgerError::Overflow)?;
        if order_id != expected {
            return Err(LedgerError::Ordering);
        }

        let mut acc = CheckpointAccumulation {
            transfer: order.collateral,
            ..CheckpointAccumulation::default()
        };

        // Intent-priced pnl against the clearing price.
        acc.price_override = guarantee.price_adjustment(to_version.price)?;

        // Directional pnl on the position held from the interval start.
        let mut collateral = Fixed6::ZERO;
        collateral = collateral.checked_add(
            to_version
                .maker_pre_value
                .accumulated(&from_version.maker_pre_value, from_position.maker)?,
        )?;
        collateral = collateral.checked_add(
            to_version
                .long_pre_value
                .accumulated(&from_version.long_pre_value, from_position.long)?,
        )?;
        collateral = collateral.checked_add(
            to_version
                .short_pre_value
                .accumulated(&from_version.short_pre_value, from_position.short)?,
        )?;

        // Received spread: closing sub-interval on the from-position, post
        // sub-interval on the position after this order.
        let to_position = from_position.after(order)?;
        collateral = collateral.checked_add(
            to_version
                .maker_close_value
                .accumulated(&from_version.maker_close_value, from_position.maker)?,
        )?;
        collateral = collateral.checked_add(
            to_version
                .long_close_value
                .accumulated(&from_version.long_close_value, from_position.long)?,
        )?;
        collateral = collateral.checked_add(
            to_version
                .short_close_value
                .accumulated(&from_version.short_close_value, from_position.short)?,
        )?;
        collateral = collateral.checked_add(
            to_version
                .maker_post_value
                .accumulated(&from_version.maker_post_value, to_position.maker)?,
        )?;
        collateral = collateral.checked_add(
            to_version
                .long_post_value
                .accumulated(&from_version.long_post_value, to_position.long)?,
        )?;
        collateral = collateral.checked_add(
            to_version
                .short_post_value
                .accumulated(&from_version.short_post_value, to_position.short)?,
        )?;
        acc.collateral = collateral;

        if ctx.charge_trade_fee {
            // Fee channels are negative deltas (fees owed), converted into a
            // positive charge. Referral portions ride on the order and are
            // reported by the caller, never charged a second time.
            let maker_amount = to_version
                .maker_fee
                .accumulated(&from_version.maker_fee, order.maker_total())?;

            let taker_units = order
                .taker_total()
                .checked_sub(guarantee.fee_exempt_units())?
                .max(Fixed6::ZERO);
            let taker_amount = to_version
                .taker_fee
                .accumulated(&from_version.taker_fee, taker_units)?;

            let spread_amount = to_version
                .spread_pos
                .accumulated(&from_version.spread_pos, order.pos_exposure())?
                .checked_add(
                    to_version
                        .spread_neg
                        .accumulated(&from_version.spread_neg, order.neg_exposure())?,
                )?;

            acc.trade_fee = maker_amount
                .checked_add(taker_amount)?
                .checked_add(spread_amount)?
                .checked_neg()?;
            acc.spread = spread_amount.checked_neg()?;
        }

        if ctx.charge_settlement_fee {
            let settlement_delta = to_version
                .settlement_fee
                .subtract(&from_version.settlement_fee)?;
            acc.settlement_fee = settlement_delta
                .checked_mul(Fixed6::from_int(order.orders as i64))?
                .checked_neg()?;

            if order.protection > 0 {
                let liquidation_delta = to_version
                    .liquidation_fee
                    .subtract(&from_version.liquidation_fee)?;
                acc.liquidation_fee = liquidation_delta
                    .checked_mul(Fixed6::from_int(order.protection as i64))?
                    .checked_neg()?;
                acc.settlement_fee = acc.settlement_fee.checked_add(acc.liquidation_fee)?;
            }
        }

        debug!(
            order_id,
            from = from_version.timestamp,
            to = to_version.timestamp,
            collateral = %acc.collateral,
            trade_fee = %acc.trade_fee,
            settlement_fee = %acc.settlement_fee,
            "checkpoint accumulated"
        );

        Ok(acc)
    }

    /// Fold an accumulation into the running checkpoint. The new checkpoint
    /// is range-validated before it is returned; on any error `self` is
    /// untouched and the settlement must not be applied.
    pub fn next(&self, acc: &CheckpointAccumulation) -> Result<Checkpoint> {
        let next = Checkpoint {
            trade_fee: self.trade_fee.checked_add(acc.trade_fee)?,
            settlement_fee: self.settlement_fee.checked_add(acc.settlement_fee)?,
            transfer: self.transfer.checked_add(acc.transfer)?,
            collateral: self.collateral.checked_add(acc.collateral_change()?)?,
        };
        next.validate()?;
        Ok(next)
    }

    /// Storage range contract for the persisted checkpoint fields.
    pub fn validate(&self) -> Result<()> {
        fixed::validate_signed(self.trade_fee, "checkpoint.trade_fee", 47)?;
        fixed::validate_signed(self.settlement_fee, "checkpoint.settlement_fee", 48)?;
        fixed::validate_signed(self.transfer, "checkpoint.transfer", 63)?;
        fixed::validate_signed(self.collateral, "checkpoint.collateral", 63)?;
        Ok(())
    }
}
