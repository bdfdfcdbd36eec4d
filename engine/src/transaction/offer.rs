//! Offer requests: amount/price derivation and descriptions.
//!
//! Callers describe an offer as "sell X of A for Y of B". The ledger wants
//! an amount and a price, so the price is `buy / sell`. A sell amount of
//! zero against an existing offer deletes it.

use super::error::CompositionError;
use super::operation::ManageOfferOp;
use super::types::{Amount, Asset, Price};

/// A manage-offer operation plus the description shown to signers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfferPlan {
    pub op: ManageOfferOp,
    pub description: String,
}

/// Offer ids arrive as optional strings; absent, empty and `"0"` all mean
/// "new offer".
pub fn parse_offer_id(raw: Option<&str>) -> Result<u64, CompositionError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(0),
        Some(id) => id
            .parse::<u64>()
            .map_err(|_| CompositionError::InvalidOfferId(id.to_string())),
    }
}

/// Turns a sell/buy request into a ledger offer.
pub fn plan_offer(
    selling: Asset,
    sell_amount: &str,
    buying: Asset,
    buy_amount: &str,
    offer_id: Option<&str>,
) -> Result<OfferPlan, CompositionError> {
    let sell = Amount::parse_field("sellAmount", sell_amount)?;
    let buy = Amount::parse_field("buyAmount", buy_amount)?;
    let offer_id = parse_offer_id(offer_id)?;

    if sell.is_zero() {
        if offer_id == 0 {
            return Err(CompositionError::InvalidOfferDelete);
        }
        return Ok(OfferPlan {
            op: ManageOfferOp {
                selling,
                buying,
                amount: Amount::ZERO,
                price: Price::ONE,
                offer_id,
            },
            description: format!("Deleting offer {}", offer_id),
        });
    }

    let price = Price::from_amounts(sell, buy)?;
    let terms = format!(
        "sell {} {} for {} {}",
        sell,
        selling.code(),
        buy,
        buying.code()
    );
    let description = if offer_id == 0 {
        format!("New offer to {}", terms)
    } else {
        format!("Updating offer {} to {}", offer_id, terms)
    };

    Ok(OfferPlan {
        op: ManageOfferOp {
            selling,
            buying,
            amount: sell,
            price,
            offer_id,
        },
        description,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::LedgerKeypair;

    fn usd() -> Asset {
        Asset::from_code("USD", Some(LedgerKeypair::generate().account_id().as_str())).unwrap()
    }

    #[test]
    fn even_offer_prices_at_one() {
        let plan = plan_offer(Asset::Native, "100", usd(), "100", None).unwrap();
        assert_eq!(plan.op.price.to_string(), "1.0000000");
        assert_eq!(plan.op.amount.to_string(), "100.0000000");
        assert!(plan.op.is_new_offer());
        assert_eq!(
            plan.description,
            "New offer to sell 100.0000000 XLM for 100.0000000 USD"
        );
    }

    #[test]
    fn uneven_offer_truncates_price() {
        let plan = plan_offer(Asset::Native, "33", usd(), "11", Some("0")).unwrap();
        assert_eq!(plan.op.price.to_string(), "0.3333333");
        assert_eq!(plan.op.amount.to_string(), "33.0000000");
    }

    #[test]
    fn update_keeps_offer_id() {
        let plan = plan_offer(Asset::Native, "10", usd(), "20", Some("77")).unwrap();
        assert_eq!(plan.op.offer_id, 77);
        assert!(plan.description.starts_with("Updating offer 77 to sell"));
    }

    #[test]
    fn delete_with_offer_id() {
        let plan = plan_offer(Asset::Native, "0", usd(), "0", Some("12")).unwrap();
        assert_eq!(plan.op.amount, Amount::ZERO);
        assert_eq!(plan.op.price, Price::ONE);
        assert_eq!(plan.op.offer_id, 12);
        assert_eq!(plan.description, "Deleting offer 12");
    }

    #[test]
    fn delete_without_offer_id_fails() {
        for id in [None, Some(""), Some("0")] {
            assert_eq!(
                plan_offer(Asset::Native, "0", usd(), "5", id).unwrap_err(),
                CompositionError::InvalidOfferDelete
            );
        }
    }

    #[test]
    fn negative_amounts_fail() {
        assert!(matches!(
            plan_offer(Asset::Native, "-1", usd(), "5", None),
            Err(CompositionError::NegativeAmount { field: "sellAmount", .. })
        ));
        assert!(matches!(
            plan_offer(Asset::Native, "1", usd(), "-5", None),
            Err(CompositionError::NegativeAmount { field: "buyAmount", .. })
        ));
    }

    #[test]
    fn garbage_offer_id_fails() {
        assert_eq!(
            plan_offer(Asset::Native, "1", usd(), "1", Some("abc")).unwrap_err(),
            CompositionError::InvalidOfferId("abc".to_string())
        );
    }
}
