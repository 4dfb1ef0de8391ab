//! Global settlement versions.
//!
//! A [`Version`] is the per-timestamp bundle of global per-unit accumulators:
//! pnl, received spread, fees and the funding-rate controller state. Versions
//! are immutable once referenced by a settlement and only ever appended
//! forward in timestamp order; [`Version::advance`] derives the next snapshot
//! from the prior one plus the interval's aggregated global order, the global
//! position held over the interval, and the incoming oracle price.
//!
//! Anti-retroactivity: the controller rate stored on a version applies to the
//! interval that ends at the next version; the controller state advances only
//! after that interval's funding has accrued.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::accumulator::Accumulator;
use crate::error::{LedgerError, Result};
use crate::fixed::Fixed6;
use crate::order::Order;
use crate::position::Position;

/// Opaque oracle input: the price feed itself is an external collaborator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleVersion {
    pub timestamp: u32,
    pub price: Fixed6,
    /// Invalid oracle versions advance the clock but void the orders that
    /// were waiting on them.
    pub valid: bool,
}

/// Funding-rate controller tuning.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PControllerParameter {
    /// Rate drift per unit of skew per second.
    pub k: Fixed6,
    /// Absolute rate clamp.
    pub max: Fixed6,
}

/// Per-market fee and funding configuration, supplied by the external
/// market-parameter provider.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketParameter {
    pub closed: bool,
    /// Proportional fee on maker notional.
    pub maker_fee: Fixed6,
    /// Proportional fee on taker notional.
    pub taker_fee: Fixed6,
    /// Proportional price-impact charge on exposure notional.
    pub spread_fee: Fixed6,
    /// Fraction of collected spread credited to the closing sub-interval;
    /// the remainder goes to the post sub-interval.
    pub spread_close_share: Fixed6,
    /// Maker cut of each funding payment.
    pub funding_fee: Fixed6,
    /// Flat fee per settled order action.
    pub settlement_fee: Fixed6,
    /// Flat fee per protected (liquidation-induced) order.
    pub liquidation_fee: Fixed6,
    pub p_controller: PControllerParameter,
}

/// Funding-rate state carried between versions: the current per-second rate
/// and the skew it was last driven by.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PAccumulator {
    pub value: Fixed6,
    pub skew: Fixed6,
}

impl PAccumulator {
    /// Drift the rate toward the new skew over `elapsed` seconds, clamped to
    /// the parameter bound, and return the mean rate in effect across the
    /// interval (trapezoidal: the drift is linear in time).
    pub fn accumulate(
        &mut self,
        param: &PControllerParameter,
        skew: Fixed6,
        elapsed: Fixed6,
    ) -> Result<Fixed6> {
        let shift = param.k.checked_mul(skew)?.checked_mul(elapsed)?;
        let bound = param.max.checked_abs()?;
        let next = self
            .value
            .checked_add(shift)?
            .clamp(bound.checked_neg()?, bound);
        let mean = self
            .value
            .checked_add(next)?
            .checked_div(Fixed6::from_int(2))?;
        self.value = next;
        self.skew = skew;
        Ok(mean)
    }
}

/// Per-market amounts moved during one version advance, for the ledger layer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionAccumulation {
    pub settlement_fee: Fixed6,
    pub liquidation_fee: Fixed6,
    /// Maker and taker proportional fees computed over every unit the global
    /// order moved. Per-account guarantees are not visible here, so units
    /// that are fee-exempt at their checkpoints are still counted; the
    /// ledger layer reconciles collected taker fees against the aggregate
    /// exempt units it tracks.
    pub trade_fee: Fixed6,
    /// Total price-impact spread collected from the interval's orders.
    pub spread: Fixed6,
    /// Spread that found no liquidity-provision recipient (empty market);
    /// the ledger layer decides its sink.
    pub spread_residual: Fixed6,
    pub funding_maker: Fixed6,
    pub funding_long: Fixed6,
    pub funding_short: Fixed6,
    pub pnl_maker: Fixed6,
    pub pnl_long: Fixed6,
    pub pnl_short: Fixed6,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    pub timestamp: u32,
    pub valid: bool,
    /// Clearing/settlement price recorded at this timestamp.
    pub price: Fixed6,

    // Primary pnl reporting channels (sum of the sub-channels below).
    pub maker_value: Accumulator,
    pub long_value: Accumulator,
    pub short_value: Accumulator,

    // Pnl + funding accrued on positions held from the interval start.
    pub maker_pre_value: Accumulator,
    pub long_pre_value: Accumulator,
    pub short_pre_value: Accumulator,

    // Received spread, closing sub-interval.
    pub maker_close_value: Accumulator,
    pub long_close_value: Accumulator,
    pub short_close_value: Accumulator,

    // Received spread, post sub-interval.
    pub maker_post_value: Accumulator,
    pub long_post_value: Accumulator,
    pub short_post_value: Accumulator,

    // Fee channels; these only ever decrement (fees owed).
    pub maker_fee: Accumulator,
    pub taker_fee: Accumulator,
    pub settlement_fee: Accumulator,
    pub liquidation_fee: Accumulator,

    // Price-impact charge per unit of pos/neg exposure.
    pub spread_pos: Accumulator,
    pub spread_neg: Accumulator,

    // Order magnitudes the spread accumulators were divided by this interval.
    pub maker_pos_exposure: Fixed6,
    pub maker_neg_exposure: Fixed6,
    pub long_pos_exposure: Fixed6,
    pub long_neg_exposure: Fixed6,
    pub short_pos_exposure: Fixed6,
    pub short_neg_exposure: Fixed6,

    pub p_accumulator: PAccumulator,
}

impl Version {
    /// Genesis version at `timestamp` with an initial oracle price.
    pub fn genesis(timestamp: u32, price: Fixed6) -> Version {
        Version {
            timestamp,
            valid: true,
            price,
            ..Version::default()
        }
    }

    /// Derive the next version snapshot.
    ///
    /// `order` is the market-aggregated global order for the interval and
    /// `position` the settled global position held over it. Returns the new
    /// snapshot plus the per-market accumulation result; `self` is never
    /// mutated (published versions are frozen).
    pub fn advance(
        &self,
        order: &Order,
        position: &Position,
        to_oracle: &OracleVersion,
        market: &MarketParameter,
    ) -> Result<(Version, VersionAccumulation)> {
        if to_oracle.timestamp <= self.timestamp {
            return Err(LedgerError::Ordering);
        }

        let mut next = *self;
        next.timestamp = to_oracle.timestamp;
        next.price = to_oracle.price;
        next.valid = to_oracle.valid;
        next.maker_pos_exposure = Fixed6::ZERO;
        next.maker_neg_exposure = Fixed6::ZERO;
        next.long_pos_exposure = Fixed6::ZERO;
        next.long_neg_exposure = Fixed6::ZERO;
        next.short_pos_exposure = Fixed6::ZERO;
        next.short_neg_exposure = Fixed6::ZERO;

        if !to_oracle.valid {
            // Only the clock and price advance; the caller voids the orders
            // that were waiting on this oracle version.
            return Ok((next, VersionAccumulation::default()));
        }

        let to_position = position.after(order)?;
        next.maker_pos_exposure = order.maker_pos;
        next.maker_neg_exposure = order.maker_neg;
        next.long_pos_exposure = order.long_pos;
        next.long_neg_exposure = order.long_neg;
        next.short_pos_exposure = order.short_pos;
        next.short_neg_exposure = order.short_neg;
        let mut result = VersionAccumulation::default();

        Self::accumulate_settlement_fee(&mut next, order, market, &mut result)?;
        Self::accumulate_liquidation_fee(&mut next, order, market, &mut result)?;
        Self::accumulate_trade_fee(&mut next, order, to_oracle.price, market, &mut result)?;
        Self::accumulate_spread(
            &mut next,
            order,
            position,
            &to_position,
            to_oracle.price,
            market,
            &mut result,
        )?;
        self.accumulate_funding(&mut next, position, to_oracle, market, &mut result)?;
        self.accumulate_pnl(&mut next, position, to_oracle.price, &mut result)?;
        self.accumulate_values(&mut next)?;

        debug!(
            from = self.timestamp,
            to = to_oracle.timestamp,
            price = %to_oracle.price,
            orders = order.orders,
            trade_fee = %result.trade_fee,
            spread = %result.spread,
            pnl_maker = %result.pnl_maker,
            "version advanced"
        );

        Ok((next, result))
    }

    // ========================================
    // Sub-steps
    // ========================================

    /// Flat per-order charge, spread over the interval's action count so the
    /// accumulator delta is the per-order fee.
    fn accumulate_settlement_fee(
        next: &mut Version,
        order: &Order,
        market: &MarketParameter,
        result: &mut VersionAccumulation,
    ) -> Result<()> {
        if order.orders == 0 {
            return Ok(());
        }
        let orders = Fixed6::from_int(order.orders as i64);
        let total = market.settlement_fee.checked_mul(orders)?;
        next.settlement_fee.decrement(total, orders)?;
        result.settlement_fee = total;
        Ok(())
    }

    /// Charged per protected order, independent of `orders`. The global
    /// order carries the protected-order count, so the accumulator delta is
    /// the per-protection fee and the reported total covers every protected
    /// account settling at this boundary.
    fn accumulate_liquidation_fee(
        next: &mut Version,
        order: &Order,
        market: &MarketParameter,
        result: &mut VersionAccumulation,
    ) -> Result<()> {
        if order.protection == 0 {
            return Ok(());
        }
        let count = Fixed6::from_int(order.protection as i64);
        let total = market.liquidation_fee.checked_mul(count)?;
        next.liquidation_fee.decrement(total, count)?;
        result.liquidation_fee = total;
        Ok(())
    }

    /// Proportional fees on maker and taker notional moved this interval.
    fn accumulate_trade_fee(
        next: &mut Version,
        order: &Order,
        price: Fixed6,
        market: &MarketParameter,
        result: &mut VersionAccumulation,
    ) -> Result<()> {
        let maker_units = order.maker_total();
        if !maker_units.is_zero() {
            let fee = maker_units.checked_mul(price)?.checked_mul(market.maker_fee)?;
            next.maker_fee.decrement(fee, maker_units)?;
            result.trade_fee = result.trade_fee.checked_add(fee)?;
        }

        let taker_units = order.taker_total();
        if !taker_units.is_zero() {
            let fee = taker_units.checked_mul(price)?.checked_mul(market.taker_fee)?;
            next.taker_fee.decrement(fee, taker_units)?;
            result.trade_fee = result.trade_fee.checked_add(fee)?;
        }
        Ok(())
    }

    /// Price-impact charge on exposure change, redistributed to liquidity
    /// providers as received spread across the closing and post sub-intervals.
    #[allow(clippy::too_many_arguments)]
    fn accumulate_spread(
        next: &mut Version,
        order: &Order,
        from_position: &Position,
        to_position: &Position,
        price: Fixed6,
        market: &MarketParameter,
        result: &mut VersionAccumulation,
    ) -> Result<()> {
        let pos_exposure = order.pos_exposure();
        let neg_exposure = order.neg_exposure();
        if pos_exposure.is_zero() && neg_exposure.is_zero() {
            return Ok(());
        }

        let mut collected = Fixed6::ZERO;
        if !pos_exposure.is_zero() {
            let fee = pos_exposure
                .checked_mul(price)?
                .checked_mul(market.spread_fee)?;
            next.spread_pos.decrement(fee, pos_exposure)?;
            collected = collected.checked_add(fee)?;
        }
        if !neg_exposure.is_zero() {
            let fee = neg_exposure
                .checked_mul(price)?
                .checked_mul(market.spread_fee)?;
            next.spread_neg.decrement(fee, neg_exposure)?;
            collected = collected.checked_add(fee)?;
        }
        result.spread = collected;

        let close_part = collected.checked_mul(market.spread_close_share)?;
        let post_part = collected.checked_sub(close_part)?;

        result.spread_residual = result.spread_residual.checked_add(Self::credit_spread(
            from_position,
            close_part,
            &mut next.maker_close_value,
            &mut next.long_close_value,
            &mut next.short_close_value,
        )?)?;
        result.spread_residual = result.spread_residual.checked_add(Self::credit_spread(
            to_position,
            post_part,
            &mut next.maker_post_value,
            &mut next.long_post_value,
            &mut next.short_post_value,
        )?)?;
        Ok(())
    }

    /// Route a received-spread amount to the sub-interval's liquidity
    /// providers: makers first, else the major taker side. Returns the
    /// residual when the position is empty.
    fn credit_spread(
        position: &Position,
        amount: Fixed6,
        maker_channel: &mut Accumulator,
        long_channel: &mut Accumulator,
        short_channel: &mut Accumulator,
    ) -> Result<Fixed6> {
        if amount.is_zero() {
            return Ok(Fixed6::ZERO);
        }
        if !position.maker.is_zero() {
            maker_channel.increment(amount, position.maker)?;
            return Ok(Fixed6::ZERO);
        }
        let major = position.major();
        if !major.is_zero() {
            if position.long >= position.short {
                long_channel.increment(amount, major)?;
            } else {
                short_channel.increment(amount, major)?;
            }
            return Ok(Fixed6::ZERO);
        }
        Ok(amount)
    }

    /// Funding between the taker sides with a maker cut, driven by the rate
    /// controller. Uses the position held over the interval (`position`, the
    /// from-position) and the rate state stored on `self`.
    fn accumulate_funding(
        &self,
        next: &mut Version,
        position: &Position,
        to_oracle: &OracleVersion,
        market: &MarketParameter,
        result: &mut VersionAccumulation,
    ) -> Result<()> {
        let elapsed = Fixed6::from_int((to_oracle.timestamp - self.timestamp) as i64);

        let skew = if position.major().is_zero() {
            Fixed6::ZERO
        } else {
            let base = position.maker.max(position.major());
            position.net().checked_div(base)?
        };

        let mean = next
            .p_accumulator
            .accumulate(&market.p_controller, skew, elapsed)?;
        if mean.is_zero() {
            return Ok(());
        }

        // Per-unit charge on the paying side over the interval.
        let per_unit = mean
            .checked_abs()?
            .checked_mul(elapsed)?
            .checked_mul(to_oracle.price)?;

        // Positive rate: longs pay. Negative: shorts pay.
        let longs_pay = mean.is_positive();
        let (payer_size, receiver_size) = if longs_pay {
            (position.long, position.short)
        } else {
            (position.short, position.long)
        };

        if payer_size.is_zero() || (receiver_size.is_zero() && position.maker.is_zero()) {
            // Nobody on the other side of the payment; no funding accrues.
            return Ok(());
        }

        let total = per_unit.checked_mul(payer_size)?;
        let mut maker_cut = if position.maker.is_zero() {
            Fixed6::ZERO
        } else {
            total.checked_mul(market.funding_fee)?
        };
        let mut taker_part = total.checked_sub(maker_cut)?;
        if receiver_size.is_zero() {
            maker_cut = total;
            taker_part = Fixed6::ZERO;
        }

        if longs_pay {
            next.long_pre_value.decrement(total, position.long)?;
            next.short_pre_value.increment(taker_part, position.short)?;
            result.funding_long = total.checked_neg()?;
            result.funding_short = taker_part;
        } else {
            next.short_pre_value.decrement(total, position.short)?;
            next.long_pre_value.increment(taker_part, position.long)?;
            result.funding_short = total.checked_neg()?;
            result.funding_long = taker_part;
        }
        next.maker_pre_value.increment(maker_cut, position.maker)?;
        result.funding_maker = maker_cut;
        Ok(())
    }

    /// Directional pnl from price motion: longs gain what the price gained,
    /// shorts the opposite, makers absorb the net taker imbalance.
    fn accumulate_pnl(
        &self,
        next: &mut Version,
        position: &Position,
        to_price: Fixed6,
        result: &mut VersionAccumulation,
    ) -> Result<()> {
        let price_delta = to_price.checked_sub(self.price)?;
        if price_delta.is_zero() {
            return Ok(());
        }

        if !position.long.is_zero() {
            let pnl = price_delta.checked_mul(position.long)?;
            next.long_pre_value.increment(pnl, position.long)?;
            result.pnl_long = pnl;
        }
        if !position.short.is_zero() {
            let pnl = price_delta.checked_mul(position.short)?;
            next.short_pre_value.decrement(pnl, position.short)?;
            result.pnl_short = pnl.checked_neg()?;
        }
        if !position.maker.is_zero() {
            // Maker takes the other side of the net taker exposure.
            let imbalance = price_delta.checked_mul(position.short.checked_sub(position.long)?)?;
            next.maker_pre_value.increment(imbalance, position.maker)?;
            result.pnl_maker = imbalance;
        }
        Ok(())
    }

    /// Fold this interval's pre/close/post deltas into the per-side primary
    /// reporting channels.
    fn accumulate_values(&self, next: &mut Version) -> Result<()> {
        let maker = next
            .maker_pre_value
            .subtract(&self.maker_pre_value)?
            .checked_add(next.maker_close_value.subtract(&self.maker_close_value)?)?
            .checked_add(next.maker_post_value.subtract(&self.maker_post_value)?)?;
        let long = next
            .long_pre_value
            .subtract(&self.long_pre_value)?
            .checked_add(next.long_close_value.subtract(&self.long_close_value)?)?
            .checked_add(next.long_post_value.subtract(&self.long_post_value)?)?;
        let short = next
            .short_pre_value
            .subtract(&self.short_pre_value)?
            .checked_add(next.short_close_value.subtract(&self.short_close_value)?)?
            .checked_add(next.short_post_value.subtract(&self.short_post_value)?)?;

        next.maker_value.increment(maker, Fixed6::ONE)?;
        next.long_value.increment(long, Fixed6::ONE)?;
        next.short_value.increment(short, Fixed6::ONE)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_market() -> MarketParameter {
        MarketParameter::default()
    }

    fn position(maker: i64, long: i64, short: i64) -> Position {
        Position {
            id: 1,
            timestamp: 0,
            maker: Fixed6::from_int(maker),
            long: Fixed6::from_int(long),
            short: Fixed6::from_int(short),
            fee: Fixed6::ZERO,
        }
    }

    fn oracle(timestamp: u32, price: i64) -> OracleVersion {
        OracleVersion {
            timestamp,
            price: Fixed6::from_int(price),
            valid: true,
        }
    }

    #[test]
    fn ordering_enforced() {
        let v = Version::genesis(100, Fixed6::from_int(50));
        let err = v.advance(
            &Order::default(),
            &Position::default(),
            &oracle(100, 50),
            &flat_market(),
        );
        assert_eq!(err.unwrap_err(), LedgerError::Ordering);
    }

    #[test]
    fn pnl_per_unit_is_price_delta() {
        let v = Version::genesis(0, Fixed6::from_int(100));
        let pos = position(10, 4, 4);
        let (next, result) = v
            .advance(&Order { timestamp: 10, ..Order::default() }, &pos, &oracle(10, 110), &flat_market())
            .unwrap();
        assert_eq!(
            next.long_pre_value.subtract(&v.long_pre_value).unwrap(),
            Fixed6::from_int(10)
        );
        assert_eq!(
            next.short_pre_value.subtract(&v.short_pre_value).unwrap(),
            Fixed6::from_int(-10)
        );
        // balanced takers: maker absorbs nothing
        assert!(next
            .maker_pre_value
            .subtract(&v.maker_pre_value)
            .unwrap()
            .is_zero());
        assert_eq!(result.pnl_long, Fixed6::from_int(40));
        assert_eq!(result.pnl_short, Fixed6::from_int(-40));
        // zero-sum across sides
        assert!(result
            .pnl_long
            .checked_add(result.pnl_short)
            .unwrap()
            .checked_add(result.pnl_maker)
            .unwrap()
            .is_zero());
    }

    #[test]
    fn maker_absorbs_imbalance() {
        let v = Version::genesis(0, Fixed6::from_int(100));
        let pos = position(10, 6, 2);
        let (next, result) = v
            .advance(&Order { timestamp: 10, ..Order::default() }, &pos, &oracle(10, 110), &flat_market())
            .unwrap();
        // makers are net short 4 against the takers: -4 * 10 over 10 makers
        assert_eq!(
            next.maker_pre_value.subtract(&v.maker_pre_value).unwrap(),
            Fixed6::from_int(-4)
        );
        assert_eq!(result.pnl_maker, Fixed6::from_int(-40));
    }

    #[test]
    fn settlement_fee_is_per_order() {
        let market = MarketParameter {
            settlement_fee: Fixed6::from_int(4),
            ..flat_market()
        };
        let v = Version::genesis(0, Fixed6::from_int(100));
        let order = Order {
            timestamp: 10,
            orders: 3,
            ..Order::default()
        };
        let (next, result) = v
            .advance(&order, &Position::default(), &oracle(10, 100), &market)
            .unwrap();
        assert_eq!(
            next.settlement_fee.subtract(&v.settlement_fee).unwrap(),
            Fixed6::from_int(-4)
        );
        assert_eq!(result.settlement_fee, Fixed6::from_int(12));
    }

    #[test]
    fn trade_fee_per_unit() {
        let market = MarketParameter {
            taker_fee: Fixed6::from_parts(0, 10_000), // 1%
            ..flat_market()
        };
        let v = Version::genesis(0, Fixed6::from_int(100));
        let pos = position(10, 0, 0);
        let order = Order {
            timestamp: 10,
            orders: 1,
            long_pos: Fixed6::from_int(5),
            ..Order::default()
        };
        let (next, result) = v.advance(&order, &pos, &oracle(10, 100), &market).unwrap();
        // 5 units * price 100 * 1% = 5 total, 1 per unit
        assert_eq!(
            next.taker_fee.subtract(&v.taker_fee).unwrap(),
            Fixed6::from_int(-1)
        );
        assert_eq!(result.trade_fee, Fixed6::from_int(5));
    }

    #[test]
    fn spread_charged_and_redistributed() {
        let market = MarketParameter {
            spread_fee: Fixed6::from_parts(0, 10_000),        // 1%
            spread_close_share: Fixed6::from_parts(0, 500_000), // 50%
            ..flat_market()
        };
        let v = Version::genesis(0, Fixed6::from_int(100));
        let pos = position(10, 0, 0);
        let order = Order {
            timestamp: 10,
            orders: 1,
            long_pos: Fixed6::from_int(4),
            ..Order::default()
        };
        let (next, result) = v.advance(&order, &pos, &oracle(10, 100), &market).unwrap();
        // 4 units * 100 * 1% = 4 collected, 1 per unit of pos exposure
        assert_eq!(
            next.spread_pos.subtract(&v.spread_pos).unwrap(),
            Fixed6::from_int(-1)
        );
        assert_eq!(result.spread, Fixed6::from_int(4));
        assert!(result.spread_residual.is_zero());
        // 2 to close phase over 10 makers, 2 to post phase over 10 makers
        assert_eq!(
            next.maker_close_value.subtract(&v.maker_close_value).unwrap(),
            Fixed6::from_parts(0, 200_000)
        );
        assert_eq!(
            next.maker_post_value.subtract(&v.maker_post_value).unwrap(),
            Fixed6::from_parts(0, 200_000)
        );
        assert_eq!(next.long_pos_exposure, Fixed6::from_int(4));
    }

    #[test]
    fn spread_residual_on_empty_market() {
        let market = MarketParameter {
            spread_fee: Fixed6::from_parts(0, 10_000),
            spread_close_share: Fixed6::ONE,
            ..flat_market()
        };
        let v = Version::genesis(0, Fixed6::from_int(100));
        // no makers, no takers before; order only closes nothing -> use a
        // short_neg against an empty book is impossible, so exercise the
        // close-phase residual with a pure opening order on an empty market
        let order = Order {
            timestamp: 10,
            orders: 1,
            long_pos: Fixed6::from_int(4),
            ..Order::default()
        };
        let (_, result) = v
            .advance(&order, &Position::default(), &oracle(10, 100), &market)
            .unwrap();
        assert_eq!(result.spread, Fixed6::from_int(4));
        assert_eq!(result.spread_residual, Fixed6::from_int(4));
    }

    #[test]
    fn funding_flows_payer_to_receiver_with_maker_cut() {
        let market = MarketParameter {
            funding_fee: Fixed6::from_parts(0, 100_000), // 10% maker cut
            p_controller: PControllerParameter {
                k: Fixed6::from_parts(0, 2_000), // 0.002 rate per skew-second
                max: Fixed6::from_int(1),
            },
            ..flat_market()
        };
        let mut v = Version::genesis(0, Fixed6::from_int(100));
        // skew positive: longs > shorts -> rate drifts positive, longs pay
        let pos = position(10, 8, 2);
        let (next, result) = v
            .advance(&Order { timestamp: 10, ..Order::default() }, &pos, &oracle(10, 100), &market)
            .unwrap();
        assert!(result.funding_long.is_negative());
        assert!(result.funding_short.is_positive());
        assert!(result.funding_maker.is_positive());
        // conservation: payments balance
        assert!(result
            .funding_long
            .checked_add(result.funding_short)
            .unwrap()
            .checked_add(result.funding_maker)
            .unwrap()
            .is_zero());
        assert!(next.p_accumulator.value.is_positive());
        v = next;
        assert_eq!(v.p_accumulator.skew, Fixed6::from_parts(0, 600_000));
    }

    #[test]
    fn invalid_oracle_freezes_accumulators() {
        let v = Version::genesis(0, Fixed6::from_int(100));
        let pos = position(10, 5, 0);
        let order = Order {
            timestamp: 10,
            orders: 1,
            long_pos: Fixed6::from_int(3),
            ..Order::default()
        };
        let to = OracleVersion {
            timestamp: 10,
            price: Fixed6::from_int(250),
            valid: false,
        };
        let (next, result) = v.advance(&order, &pos, &to, &flat_market()).unwrap();
        assert!(!next.valid);
        assert_eq!(next.timestamp, 10);
        assert_eq!(next.price, Fixed6::from_int(250));
        assert_eq!(result, VersionAccumulation::default());
        assert_eq!(
            next.long_pre_value.subtract(&v.long_pre_value).unwrap(),
            Fixed6::ZERO
        );
    }

    #[test]
    fn values_track_sub_channels() {
        let v = Version::genesis(0, Fixed6::from_int(100));
        let pos = position(0, 5, 0);
        let (next, _) = v
            .advance(&Order { timestamp: 10, ..Order::default() }, &pos, &oracle(10, 120), &flat_market())
            .unwrap();
        assert_eq!(
            next.long_value.subtract(&v.long_value).unwrap(),
            next.long_pre_value.subtract(&v.long_pre_value).unwrap()
        );
    }
}
