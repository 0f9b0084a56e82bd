//! Random load generation for benchmarks and smoke runs.
//!
//! Produces a [`Scenario`] with a small catalog, partner prices above cost,
//! a stream of orders that mostly get delivered, and a few withdrawals
//! once the holding period has passed.

use crate::core::order::OrderStatus;
use crate::core::partner::{PartnerId, ProductId};
use crate::simulation::scenario::{ItemInput, Scenario, Step};
use crate::withdrawal::model::Decision;
use rand::Rng;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// Configuration for a random scenario.
#[derive(Debug, Clone)]
pub struct LoadConfig {
    pub partner_count: usize,
    pub product_count: usize,
    pub order_count: usize,
    pub max_quantity: u32,
    /// Cost prices are drawn from `[min_cost, max_cost)` in whole centavos.
    pub min_cost: Decimal,
    pub max_cost: Decimal,
    /// Share of orders that end up cancelled instead of delivered.
    pub cancel_ratio: f64,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            partner_count: 5,
            product_count: 20,
            order_count: 200,
            max_quantity: 4,
            min_cost: Decimal::from(5),
            max_cost: Decimal::from(80),
            cancel_ratio: 0.1,
        }
    }
}

fn random_amount(rng: &mut impl Rng, min: Decimal, max: Decimal) -> Decimal {
    let min_cents = (min * Decimal::ONE_HUNDRED).trunc().to_i64().unwrap_or(1);
    let max_cents = (max * Decimal::ONE_HUNDRED).trunc().to_i64().unwrap_or(min_cents);
    let cents = if max_cents > min_cents {
        rng.gen_range(min_cents..max_cents)
    } else {
        min_cents
    };
    Decimal::new(cents.max(1), 2)
}

pub fn partner_name(i: usize) -> PartnerId {
    PartnerId::new(format!("PARTNER-{:03}", i))
}

pub fn product_name(i: usize) -> ProductId {
    ProductId::new(format!("PRODUCT-{:03}", i))
}

/// Generate a random, replayable scenario.
pub fn generate_scenario(config: &LoadConfig) -> Scenario {
    let mut rng = rand::thread_rng();
    let mut steps = Vec::new();
    let partner_count = config.partner_count.max(1);
    let product_count = config.product_count.max(1);

    let mut costs = Vec::with_capacity(product_count);
    for i in 0..product_count {
        let cost = random_amount(&mut rng, config.min_cost, config.max_cost);
        costs.push(cost);
        steps.push(Step::Product {
            id: product_name(i),
            cost,
            active: true,
        });
    }

    for p in 0..partner_count {
        for (i, cost) in costs.iter().enumerate() {
            let markup = Decimal::new(rng.gen_range(110..160), 2);
            steps.push(Step::Price {
                partner: partner_name(p),
                product: product_name(i),
                price: (*cost * markup).round_dp(2),
            });
        }
    }

    for n in 0..config.order_count {
        let label = format!("order-{}", n);
        let partner = if rng.gen_bool(0.1) {
            None
        } else {
            Some(partner_name(rng.gen_range(0..partner_count)))
        };
        let lines = rng.gen_range(1..=3);
        let items = (0..lines)
            .map(|_| ItemInput {
                product: product_name(rng.gen_range(0..product_count)),
                quantity: rng.gen_range(1..=config.max_quantity.max(1)),
            })
            .collect();
        steps.push(Step::Order {
            label: label.clone(),
            partner,
            items,
        });
        let status = if rng.gen_bool(config.cancel_ratio.clamp(0.0, 1.0)) {
            OrderStatus::Cancelled
        } else {
            OrderStatus::Delivered
        };
        steps.push(Step::Status {
            order: label,
            status,
        });
    }

    steps.push(Step::AdvanceDays { days: 30 });
    steps.push(Step::Sweep);

    for p in 0..partner_count {
        let label = format!("withdrawal-{}", p);
        steps.push(Step::Withdraw {
            label: label.clone(),
            partner: partner_name(p),
            amount: Decimal::from(50),
            pix_key: format!("{}@pix", partner_name(p).as_str().to_lowercase()),
        });
        let decision = if rng.gen_bool(0.8) {
            Decision::Pay
        } else {
            Decision::Reject
        };
        steps.push(Step::Resolve {
            withdrawal: label,
            decision,
            notes: None,
        });
    }

    Scenario {
        settings: None,
        start: None,
        steps,
    }
}
