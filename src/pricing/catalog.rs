use crate::core::error::{EngineError, Result};
use crate::core::money::ensure_unit_price;
use crate::core::partner::{PartnerId, ProductId};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A product in the admin-owned catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    /// Admin-set baseline price. Partner profit is the margin above it.
    pub cost_price: Decimal,
    pub active: bool,
}

/// A partner's opt-in to a catalog product, with its own selling price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartnerProduct {
    pub partner_id: PartnerId,
    pub product_id: ProductId,
    pub selling_price: Decimal,
    /// Whether the product is visible on the partner's storefront.
    pub active: bool,
    pub updated_at: DateTime<Utc>,
}

/// Read-mostly catalog data shared by the resolver and the order desk.
#[derive(Debug, Default)]
pub struct Catalog {
    products: DashMap<ProductId, Product>,
    partner_products: DashMap<(PartnerId, ProductId), PartnerProduct>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace a product. Cost prices must be positive.
    pub fn upsert_product(&self, id: ProductId, cost_price: Decimal, active: bool) -> Result<()> {
        if cost_price <= Decimal::ZERO {
            return Err(EngineError::InvalidAmount(format!(
                "cost price for {} must be positive, got {}",
                id, cost_price
            )));
        }
        ensure_unit_price(format_args!("cost price for {}", id), cost_price)?;
        self.products.insert(
            id.clone(),
            Product {
                id,
                cost_price,
                active,
            },
        );
        Ok(())
    }

    /// Change a product's cost price.
    ///
    /// Existing partner selling prices are not re-validated.
    pub fn set_cost_price(&self, id: &ProductId, cost_price: Decimal) -> Result<()> {
        if cost_price <= Decimal::ZERO {
            return Err(EngineError::InvalidAmount(format!(
                "cost price for {} must be positive, got {}",
                id, cost_price
            )));
        }
        ensure_unit_price(format_args!("cost price for {}", id), cost_price)?;
        let mut product = self
            .products
            .get_mut(id)
            .ok_or_else(|| EngineError::UnknownProduct(id.clone()))?;
        product.cost_price = cost_price;
        Ok(())
    }

    pub fn set_product_active(&self, id: &ProductId, active: bool) -> Result<()> {
        let mut product = self
            .products
            .get_mut(id)
            .ok_or_else(|| EngineError::UnknownProduct(id.clone()))?;
        product.active = active;
        Ok(())
    }

    pub fn product(&self, id: &ProductId) -> Result<Product> {
        self.products
            .get(id)
            .map(|p| p.clone())
            .ok_or_else(|| EngineError::UnknownProduct(id.clone()))
    }

    /// Current admin cost price of a product.
    pub fn cost_price(&self, id: &ProductId) -> Result<Decimal> {
        self.products
            .get(id)
            .map(|p| p.cost_price)
            .ok_or_else(|| EngineError::UnknownProduct(id.clone()))
    }

    pub fn partner_product(
        &self,
        partner: &PartnerId,
        product: &ProductId,
    ) -> Option<PartnerProduct> {
        self.partner_products
            .get(&(partner.clone(), product.clone()))
            .map(|pp| pp.clone())
    }

    /// Everything a partner has on its storefront, sorted by product.
    pub fn partner_products(&self, partner: &PartnerId) -> Vec<PartnerProduct> {
        let mut products: Vec<PartnerProduct> = self
            .partner_products
            .iter()
            .filter(|entry| &entry.key().0 == partner)
            .map(|entry| entry.value().clone())
            .collect();
        products.sort_by(|a, b| a.product_id.cmp(&b.product_id));
        products
    }

    pub fn set_partner_product_active(
        &self,
        partner: &PartnerId,
        product: &ProductId,
        active: bool,
    ) -> Result<()> {
        let mut entry = self
            .partner_products
            .get_mut(&(partner.clone(), product.clone()))
            .ok_or_else(|| EngineError::NotConfigured {
                partner: partner.clone(),
                product: product.clone(),
            })?;
        entry.active = active;
        Ok(())
    }

    /// Take a product off a partner's storefront. Returns whether it was there.
    pub fn remove_partner_product(&self, partner: &PartnerId, product: &ProductId) -> bool {
        self.partner_products
            .remove(&(partner.clone(), product.clone()))
            .is_some()
    }

    pub(crate) fn put_partner_product(&self, entry: PartnerProduct) {
        self.partner_products
            .insert((entry.partner_id.clone(), entry.product_id.clone()), entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_upsert_and_read_cost() {
        let catalog = Catalog::new();
        catalog
            .upsert_product(ProductId::new("pizza"), dec!(30.00), true)
            .unwrap();
        assert_eq!(catalog.cost_price(&ProductId::new("pizza")).unwrap(), dec!(30.00));
    }

    #[test]
    fn test_non_positive_cost_rejected() {
        let catalog = Catalog::new();
        let result = catalog.upsert_product(ProductId::new("free"), Decimal::ZERO, true);
        assert!(matches!(result, Err(EngineError::InvalidAmount(_))));
    }

    #[test]
    fn test_cost_above_cap_rejected() {
        let catalog = Catalog::new();
        let huge = crate::core::money::MAX_UNIT_PRICE * dec!(10);
        let result = catalog.upsert_product(ProductId::new("gold"), huge, true);
        assert!(matches!(result, Err(EngineError::InvalidAmount(_))));
        assert!(catalog.product(&ProductId::new("gold")).is_err());
    }

    #[test]
    fn test_unknown_product() {
        let catalog = Catalog::new();
        let result = catalog.set_cost_price(&ProductId::new("ghost"), dec!(1));
        assert_eq!(
            result.unwrap_err(),
            EngineError::UnknownProduct(ProductId::new("ghost"))
        );
    }

    #[test]
    fn test_partner_products_filtered_and_sorted() {
        let catalog = Catalog::new();
        let p = PartnerId::new("p");
        for (partner, product) in [("p", "b"), ("p", "a"), ("q", "a")] {
            catalog.put_partner_product(PartnerProduct {
                partner_id: PartnerId::new(partner),
                product_id: ProductId::new(product),
                selling_price: dec!(10),
                active: true,
                updated_at: Utc::now(),
            });
        }
        let listed: Vec<_> = catalog
            .partner_products(&p)
            .into_iter()
            .map(|pp| pp.product_id.to_string())
            .collect();
        assert_eq!(listed, vec!["a", "b"]);
        assert!(catalog.remove_partner_product(&p, &ProductId::new("a")));
        assert!(!catalog.remove_partner_product(&p, &ProductId::new("a")));
    }
}
