//! Intent-priced order portions.
//!
//! A [`Guarantee`] identifies the part of an order's taker flow that was
//! priced at a pre-agreed (off-market) price instead of the clearing price
//! recorded on the settlement version. At settlement the price difference
//! between the two is realized separately from market-clearing pnl.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::fixed::Fixed6;
use crate::order::Order;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guarantee {
    pub orders: u32,
    /// Signed notional the intent flow was priced at: `taker_net * price`.
    pub notional: Fixed6,
    pub long_pos: Fixed6,
    pub long_neg: Fixed6,
    pub short_pos: Fixed6,
    pub short_neg: Fixed6,
    /// Taker units of this guarantee that still pay the taker trade fee.
    /// Intent flow is normally fee-exempt; a solver can opt a portion back in.
    pub fee_units: Fixed6,
    /// Solver referral share carried on the intent flow.
    pub referral: Fixed6,
}

impl Guarantee {
    /// Build the guarantee for an intent order executed at `price_override`.
    /// `chargeable` keeps the flow subject to the normal taker trade fee.
    pub fn from_order(
        order: &Order,
        price_override: Fixed6,
        chargeable: bool,
        referral_rate: Fixed6,
    ) -> Result<Guarantee> {
        let taker_net = order.taker_net();
        Ok(Guarantee {
            orders: order.orders,
            notional: taker_net.checked_mul(price_override)?,
            long_pos: order.long_pos,
            long_neg: order.long_neg,
            short_pos: order.short_pos,
            short_neg: order.short_neg,
            fee_units: if chargeable {
                order.taker_total()
            } else {
                Fixed6::ZERO
            },
            referral: referral_rate.checked_mul(order.taker_total())?,
        })
    }

    /// Signed net taker magnitude matched at the intent price.
    pub fn taker_net(&self) -> Fixed6 {
        (self.long_pos - self.long_neg) - (self.short_pos - self.short_neg)
    }

    pub fn taker_total(&self) -> Fixed6 {
        self.long_pos + self.long_neg + self.short_pos + self.short_neg
    }

    /// Taker units exempt from the trade fee because they were intent-priced.
    pub fn fee_exempt_units(&self) -> Fixed6 {
        self.taker_total() - self.fee_units.min(self.taker_total())
    }

    /// Realized difference between the intent price and the clearing price:
    /// `taker_net * price - notional`. Positive means the account received a
    /// better-than-market fill.
    pub fn price_adjustment(&self, price: Fixed6) -> Result<Fixed6> {
        self.taker_net().checked_mul(price)?.checked_sub(self.notional)
    }

    pub fn is_empty(&self) -> bool {
        self.taker_total().is_zero() && self.notional.is_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_adjustment_realizes_override() {
        // net 3 long priced at 100 (notional 300), clearing at 123
        let g = Guarantee {
            long_pos: Fixed6::from_int(5),
            long_neg: Fixed6::from_int(2),
            notional: Fixed6::from_int(300),
            ..Guarantee::default()
        };
        assert_eq!(g.taker_net(), Fixed6::from_int(3));
        assert_eq!(
            g.price_adjustment(Fixed6::from_int(123)).unwrap(),
            Fixed6::from_int(69)
        );
    }

    #[test]
    fn short_side_signs() {
        // net 4 short priced at 50 (notional -200), clearing at 40:
        // short gains 4 * 10 = 40
        let g = Guarantee {
            short_pos: Fixed6::from_int(4),
            notional: Fixed6::from_int(-200),
            ..Guarantee::default()
        };
        assert_eq!(
            g.price_adjustment(Fixed6::from_int(40)).unwrap(),
            Fixed6::from_int(40)
        );
    }

    #[test]
    fn fee_exemption_split() {
        let g = Guarantee {
            long_pos: Fixed6::from_int(10),
            fee_units: Fixed6::from_int(4),
            ..Guarantee::default()
        };
        assert_eq!(g.fee_exempt_units(), Fixed6::from_int(6));
    }

    #[test]
    fn from_order_captures_taker_flow() {
        let o = Order {
            orders: 1,
            long_pos: Fixed6::from_int(5),
            long_neg: Fixed6::from_int(2),
            ..Order::default()
        };
        let g = Guarantee::from_order(&o, Fixed6::from_int(100), false, Fixed6::ZERO).unwrap();
        assert_eq!(g.notional, Fixed6::from_int(300));
        assert_eq!(g.fee_exempt_units(), Fixed6::from_int(7));
        assert!(g.price_adjustment(Fixed6::from_int(100)).unwrap().is_zero());
    }
}
