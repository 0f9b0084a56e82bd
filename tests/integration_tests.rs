use chrono::Duration;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::thread;
use storefront_ledger::prelude::*;

struct Harness {
    services: Services,
    clock: Arc<ManualClock>,
    partner: PartnerId,
}

/// A burger costing 20.00 that `burger-lab` sells at 28.00.
fn harness(settings: PaymentSettings) -> Harness {
    let clock = Arc::new(ManualClock::default());
    let services = Services::new(settings, clock.clone());
    let partner = PartnerId::new("burger-lab");
    services
        .catalog
        .upsert_product(ProductId::new("burger"), dec!(20.00), true)
        .unwrap();
    services
        .resolver
        .set_selling_price(&partner, &ProductId::new("burger"), dec!(28.00))
        .unwrap();
    Harness {
        services,
        clock,
        partner,
    }
}

fn deliver(h: &Harness, partner: Option<&PartnerId>, qty: u32) -> OrderId {
    let order = h
        .services
        .orders
        .place_order(partner.cloned(), &[(ProductId::new("burger"), qty)])
        .unwrap();
    h.services
        .orders
        .update_status(order.id(), OrderStatus::Delivered)
        .unwrap();
    order.id()
}

/// Give the partner `amount` of withdrawable balance via matured sales.
fn fund(h: &Harness, amount: Decimal) {
    // 8.00 profit per burger.
    let burgers = (amount / dec!(8)).trunc();
    let qty: u32 = burgers.to_string().parse().unwrap();
    deliver(h, Some(&h.partner), qty);
    let rest = amount - burgers * dec!(8);
    if rest > Decimal::ZERO {
        h.services.ledger.adjust(&h.partner, rest, "top-up").unwrap();
    }
    h.clock.advance(Duration::days(8)).unwrap();
    let balance = h.services.ledger.get_balance(&h.partner).unwrap();
    assert_eq!(balance.available_balance, amount);
}

#[test]
fn scenario_a_delivery_posts_margin_to_pending() {
    let h = harness(PaymentSettings::default());
    let order_id = deliver(&h, Some(&h.partner), 3);

    let balance = h.services.ledger.get_balance(&h.partner).unwrap();
    assert_eq!(balance.pending_balance, dec!(24.00));
    assert_eq!(balance.available_balance, Decimal::ZERO);
    assert_eq!(balance.total_earned, dec!(24.00));

    let history = h
        .services
        .ledger
        .list_transactions(&h.partner, DateRange::all())
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].kind, TransactionKind::Sale);
    assert_eq!(history[0].amount, dec!(24.00));
    assert_eq!(history[0].balance_after, dec!(24.00));
    assert_eq!(
        history[0].reference,
        storefront_ledger::ledger::TransactionRef::Order(order_id)
    );
}

#[test]
fn scenario_b_withdrawal_beyond_available_fails() {
    let h = harness(PaymentSettings::default());
    fund(&h, dec!(100.00));

    let err = h
        .services
        .withdrawals
        .request_withdrawal(&h.partner, dec!(150.00), "lab@pix")
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::InsufficientFunds {
            available: dec!(100.00),
            requested: dec!(150.00)
        }
    );
    let balance = h.services.ledger.get_balance(&h.partner).unwrap();
    assert_eq!(balance.available_balance, dec!(100.00));
    assert_eq!(balance.reserved_balance, Decimal::ZERO);
}

#[test]
fn scenario_c_withdrawal_paid() {
    let h = harness(PaymentSettings::default());
    fund(&h, dec!(100.00));

    let w = h
        .services
        .withdrawals
        .request_withdrawal(&h.partner, dec!(60.00), "lab@pix")
        .unwrap();
    assert_eq!(w.status, WithdrawalStatus::Pending);
    let balance = h.services.ledger.get_balance(&h.partner).unwrap();
    assert_eq!(balance.available_balance, dec!(40.00));

    let paid = h
        .services
        .withdrawals
        .resolve_withdrawal(w.id, Decision::Pay, Some("sent".into()))
        .unwrap();
    assert_eq!(paid.status, WithdrawalStatus::Paid);
    assert!(paid.processed_at.is_some());

    let balance = h.services.ledger.get_balance(&h.partner).unwrap();
    assert_eq!(balance.total_withdrawn, dec!(60.00));
    assert_eq!(balance.available_balance, dec!(40.00));
    assert!(balance.is_consistent());

    let history = h
        .services
        .ledger
        .list_transactions(&h.partner, DateRange::all())
        .unwrap();
    assert_eq!(history[0].kind, TransactionKind::Withdrawal);
    assert_eq!(history[0].amount, dec!(-60.00));
    assert!(h.services.ledger.reconcile(&h.partner).unwrap().is_consistent());
}

#[test]
fn scenario_d_withdrawal_rejected() {
    let h = harness(PaymentSettings::default());
    fund(&h, dec!(100.00));

    let w = h
        .services
        .withdrawals
        .request_withdrawal(&h.partner, dec!(60.00), "lab@pix")
        .unwrap();
    let rejected = h
        .services
        .withdrawals
        .resolve_withdrawal(w.id, Decision::Reject, None)
        .unwrap();
    assert_eq!(rejected.status, WithdrawalStatus::Rejected);

    let balance = h.services.ledger.get_balance(&h.partner).unwrap();
    assert_eq!(balance.available_balance, dec!(100.00));
    assert_eq!(balance.total_withdrawn, Decimal::ZERO);

    // Already resolved.
    let again = h
        .services
        .withdrawals
        .resolve_withdrawal(w.id, Decision::Pay, None);
    assert!(matches!(again, Err(EngineError::InvalidTransition { .. })));
}

#[test]
fn scenario_e_direct_sale_touches_no_balance() {
    let h = harness(PaymentSettings::default());
    deliver(&h, None, 5);
    assert!(h.services.store.partners().is_empty());
    assert_eq!(
        h.services.ledger.get_balance(&h.partner).unwrap(),
        PartnerBalance::empty(h.partner.clone())
    );
}

#[test]
fn duplicate_delivery_posts_once() {
    let h = harness(PaymentSettings::default());
    let order_id = deliver(&h, Some(&h.partner), 2);
    let change = h
        .services
        .orders
        .update_status(order_id, OrderStatus::Delivered)
        .unwrap();
    assert_eq!(change.settlement, Some(SettlementOutcome::AlreadyDelivered));

    let history = h
        .services
        .ledger
        .list_transactions(&h.partner, DateRange::all())
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(
        h.services.ledger.get_balance(&h.partner).unwrap().total_earned,
        dec!(16.00)
    );
}

#[test]
fn loss_making_order_posts_nothing() {
    let h = harness(PaymentSettings::default());
    let order = h
        .services
        .orders
        .place_order(Some(h.partner.clone()), &[(ProductId::new("burger"), 2)])
        .unwrap();
    // Admin raises cost above the partner's frozen price before delivery.
    h.services
        .catalog
        .set_cost_price(&ProductId::new("burger"), dec!(30.00))
        .unwrap();
    let change = h
        .services
        .orders
        .update_status(order.id(), OrderStatus::Delivered)
        .unwrap();
    assert_eq!(
        change.settlement,
        Some(SettlementOutcome::NoProfit {
            profit: dec!(-4.00)
        })
    );
    assert!(!h.services.store.contains(&h.partner));
}

#[test]
fn frozen_cost_basis_ignores_later_cost_change() {
    let h = harness(PaymentSettings {
        cost_basis: CostBasis::FrozenAtOrder,
        ..Default::default()
    });
    let order = h
        .services
        .orders
        .place_order(Some(h.partner.clone()), &[(ProductId::new("burger"), 2)])
        .unwrap();
    h.services
        .catalog
        .set_cost_price(&ProductId::new("burger"), dec!(30.00))
        .unwrap();
    h.services
        .orders
        .update_status(order.id(), OrderStatus::Delivered)
        .unwrap();
    assert_eq!(
        h.services.ledger.get_balance(&h.partner).unwrap().pending_balance,
        dec!(16.00)
    );
}

#[test]
fn funds_mature_per_sale() {
    let h = harness(PaymentSettings::default());
    deliver(&h, Some(&h.partner), 1);
    h.clock.advance(Duration::days(4)).unwrap();
    deliver(&h, Some(&h.partner), 2);

    h.clock.advance(Duration::days(3)).unwrap();
    let balance = h.services.ledger.get_balance(&h.partner).unwrap();
    assert_eq!(balance.available_balance, dec!(8.00));
    assert_eq!(balance.pending_balance, dec!(16.00));

    h.clock.advance(Duration::days(4)).unwrap();
    let report = h.services.ledger.sweep_matured().unwrap();
    assert_eq!(report.amount_matured, dec!(16.00));
    let balance = h.services.ledger.get_balance(&h.partner).unwrap();
    assert_eq!(balance.available_balance, dec!(24.00));
    assert_eq!(balance.pending_balance, Decimal::ZERO);
}

#[test]
fn pending_funds_cannot_be_withdrawn() {
    let h = harness(PaymentSettings::default());
    deliver(&h, Some(&h.partner), 10);
    let err = h
        .services
        .withdrawals
        .request_withdrawal(&h.partner, dec!(60.00), "lab@pix")
        .unwrap_err();
    assert!(matches!(err, EngineError::InsufficientFunds { .. }));
}

#[test]
fn concurrent_deliveries_lose_no_credit() {
    let h = harness(PaymentSettings::default());
    let orders: Vec<OrderId> = (0..64)
        .map(|_| {
            h.services
                .orders
                .place_order(Some(h.partner.clone()), &[(ProductId::new("burger"), 1)])
                .unwrap()
                .id()
        })
        .collect();

    thread::scope(|s| {
        for chunk in orders.chunks(8) {
            let services = &h.services;
            s.spawn(move || {
                for id in chunk {
                    services
                        .orders
                        .update_status(*id, OrderStatus::Delivered)
                        .unwrap();
                }
            });
        }
    });

    let balance = h.services.ledger.get_balance(&h.partner).unwrap();
    assert_eq!(balance.total_earned, dec!(512.00));
    assert_eq!(balance.pending_balance, dec!(512.00));
    assert!(h.services.ledger.reconcile(&h.partner).unwrap().is_consistent());
}

#[test]
fn concurrent_duplicate_delivery_of_one_order_posts_once() {
    let h = harness(PaymentSettings::default());
    let order = h
        .services
        .orders
        .place_order(Some(h.partner.clone()), &[(ProductId::new("burger"), 3)])
        .unwrap();

    thread::scope(|s| {
        for _ in 0..8 {
            let services = &h.services;
            let id = order.id();
            s.spawn(move || {
                services
                    .orders
                    .update_status(id, OrderStatus::Delivered)
                    .unwrap();
            });
        }
    });

    let history = h
        .services
        .ledger
        .list_transactions(&h.partner, DateRange::all())
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].amount, dec!(24.00));
}

#[test]
fn racing_withdrawals_cannot_double_spend() {
    let h = harness(PaymentSettings::default());
    fund(&h, dec!(100.00));

    let successes: usize = thread::scope(|s| {
        let handles: Vec<_> = (0..10)
            .map(|_| {
                let services = &h.services;
                let partner = &h.partner;
                s.spawn(move || {
                    services
                        .withdrawals
                        .request_withdrawal(partner, dec!(60.00), "lab@pix")
                        .is_ok()
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().unwrap() as usize)
            .sum()
    });

    assert_eq!(successes, 1);
    let balance = h.services.ledger.get_balance(&h.partner).unwrap();
    assert_eq!(balance.available_balance, dec!(40.00));
    assert_eq!(balance.reserved_balance, dec!(60.00));
}

#[test]
fn racing_resolutions_apply_once() {
    let h = harness(PaymentSettings::default());
    fund(&h, dec!(100.00));
    let w = h
        .services
        .withdrawals
        .request_withdrawal(&h.partner, dec!(60.00), "lab@pix")
        .unwrap();

    let outcomes: Vec<bool> = thread::scope(|s| {
        let handles: Vec<_> = [Decision::Pay, Decision::Reject, Decision::Pay, Decision::Reject]
            .into_iter()
            .map(|decision| {
                let services = &h.services;
                s.spawn(move || {
                    services
                        .withdrawals
                        .resolve_withdrawal(w.id, decision, None)
                        .is_ok()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(outcomes.iter().filter(|ok| **ok).count(), 1);
    let balance = h.services.ledger.get_balance(&h.partner).unwrap();
    assert!(balance.is_consistent());
    assert_eq!(balance.reserved_balance, Decimal::ZERO);
    let final_status = h.services.withdrawals.withdrawal(w.id).unwrap().status;
    match final_status {
        WithdrawalStatus::Paid => assert_eq!(balance.total_withdrawn, dec!(60.00)),
        WithdrawalStatus::Rejected => assert_eq!(balance.available_balance, dec!(100.00)),
        other => panic!("unexpected status {}", other),
    }
}

#[test]
fn price_floor_enforced() {
    let h = harness(PaymentSettings::default());
    let burger = ProductId::new("burger");
    let other = PartnerId::new("other");
    assert!(matches!(
        h.services.resolver.set_selling_price(&other, &burger, dec!(20.00)),
        Err(EngineError::InvalidPrice { .. })
    ));
    assert!(h
        .services
        .resolver
        .set_selling_price(&other, &burger, dec!(20.01))
        .is_ok());
}

#[test]
fn unreachable_holding_period_fails_settlement_cleanly() {
    let h = harness(PaymentSettings {
        min_days_to_withdraw: 200_000_000,
        ..Default::default()
    });
    let order = h
        .services
        .orders
        .place_order(Some(h.partner.clone()), &[(ProductId::new("burger"), 1)])
        .unwrap();
    let err = h
        .services
        .orders
        .update_status(order.id(), OrderStatus::Delivered)
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidConfig(_)));
    assert_eq!(
        h.services.orders.order(order.id()).unwrap().status(),
        OrderStatus::Pending
    );
    assert!(!h.services.store.contains(&h.partner));

    // The admin cannot store such a policy through the settings handle.
    let bad = PaymentSettings {
        min_days_to_withdraw: 200_000_000,
        ..Default::default()
    };
    assert!(h.services.settings.update(bad).is_err());
}

#[test]
fn failed_adjustment_does_not_create_partner() {
    let h = harness(PaymentSettings::default());
    let stranger = PartnerId::new("stranger");
    let err = h
        .services
        .ledger
        .adjust(&stranger, dec!(-5.00), "charge back")
        .unwrap_err();
    assert!(matches!(err, EngineError::InsufficientFunds { .. }));
    assert!(!h.services.store.contains(&stranger));
    assert!(h.services.store.partners().is_empty());
}
