use crate::core::clock::Clock;
use crate::core::error::{EngineError, Result};
use crate::core::money::{ensure_unit_price, CURRENCY_DP};
use crate::core::partner::{PartnerId, ProductId};
use crate::pricing::catalog::{Catalog, PartnerProduct};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Cost, selling price and margin of one product on one storefront.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub cost_price: Decimal,
    pub selling_price: Decimal,
    /// `selling_price - cost_price`
    pub margin: Decimal,
    /// Margin as a percentage of cost, rounded to two places.
    pub margin_percent: Decimal,
}

impl PriceQuote {
    fn new(cost_price: Decimal, selling_price: Decimal) -> Self {
        let margin = selling_price - cost_price;
        let margin_percent = (margin / cost_price * Decimal::ONE_HUNDRED).round_dp(CURRENCY_DP);
        Self {
            cost_price,
            selling_price,
            margin,
            margin_percent,
        }
    }
}

/// Resolves admin cost against partner selling price.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use storefront_ledger::core::clock::SystemClock;
/// use storefront_ledger::pricing::{Catalog, PriceResolver};
/// use storefront_ledger::prelude::*;
/// use rust_decimal_macros::dec;
///
/// let catalog = Arc::new(Catalog::new());
/// catalog.upsert_product(ProductId::new("burger"), dec!(20.00), true).unwrap();
/// let resolver = PriceResolver::new(catalog, Arc::new(SystemClock));
///
/// let partner = PartnerId::new("burger-lab");
/// resolver.set_selling_price(&partner, &ProductId::new("burger"), dec!(28.00)).unwrap();
///
/// let quote = resolver.resolve(&partner, &ProductId::new("burger")).unwrap();
/// assert_eq!(quote.margin, dec!(8.00));
/// assert_eq!(quote.margin_percent, dec!(40.00));
/// ```
pub struct PriceResolver {
    catalog: Arc<Catalog>,
    clock: Arc<dyn Clock>,
}

impl PriceResolver {
    pub fn new(catalog: Arc<Catalog>, clock: Arc<dyn Clock>) -> Self {
        Self { catalog, clock }
    }

    pub fn resolve(&self, partner: &PartnerId, product: &ProductId) -> Result<PriceQuote> {
        let cost_price = self.catalog.cost_price(product)?;
        let entry = self
            .catalog
            .partner_product(partner, product)
            .ok_or_else(|| EngineError::NotConfigured {
                partner: partner.clone(),
                product: product.clone(),
            })?;
        Ok(PriceQuote::new(cost_price, entry.selling_price))
    }

    /// Put a product on a partner's storefront, or reprice it.
    ///
    /// The price floor is checked against today's cost only. A later cost
    /// increase does not invalidate prices already set.
    pub fn set_selling_price(
        &self,
        partner: &PartnerId,
        product: &ProductId,
        selling_price: Decimal,
    ) -> Result<PriceQuote> {
        let cost_price = self.catalog.cost_price(product)?;
        if selling_price <= cost_price {
            return Err(EngineError::InvalidPrice {
                selling: selling_price,
                cost: cost_price,
            });
        }
        ensure_unit_price(format_args!("selling price for {}", product), selling_price)?;

        let active = self
            .catalog
            .partner_product(partner, product)
            .map(|existing| existing.active)
            .unwrap_or(true);
        self.catalog.put_partner_product(PartnerProduct {
            partner_id: partner.clone(),
            product_id: product.clone(),
            selling_price,
            active,
            updated_at: self.clock.now(),
        });
        log::debug!(
            "partner {} priced {} at {} (cost {})",
            partner,
            product,
            selling_price,
            cost_price
        );
        Ok(PriceQuote::new(cost_price, selling_price))
    }
}
