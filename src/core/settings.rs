use crate::core::error::{EngineError, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

/// Longest holding period accepted, in days.
pub const MAX_DAYS_TO_WITHDRAW: u32 = 3650;

/// Which cost price settlement subtracts from the price sold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostBasis {
    /// The product's cost price at the moment the order is delivered.
    #[default]
    CurrentAtDelivery,
    /// The cost price captured on the line item when the order was placed.
    FrozenAtOrder,
}

/// Admin-owned payout policy.
///
/// # Examples
///
/// ```
/// use storefront_ledger::core::settings::PaymentSettings;
///
/// let settings: PaymentSettings =
///     serde_json::from_str(r#"{ "min_withdrawal_amount": "20.00" }"#).unwrap();
/// assert_eq!(settings.min_days_to_withdraw, 7);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentSettings {
    /// Smallest amount a partner may request in one withdrawal.
    pub min_withdrawal_amount: Decimal,
    /// Days a sale's profit stays pending before it can be withdrawn.
    pub min_days_to_withdraw: u32,
    pub cost_basis: CostBasis,
}

impl Default for PaymentSettings {
    fn default() -> Self {
        Self {
            min_withdrawal_amount: dec!(50.00),
            min_days_to_withdraw: 7,
            cost_basis: CostBasis::CurrentAtDelivery,
        }
    }
}

impl PaymentSettings {
    pub fn validate(&self) -> Result<()> {
        if self.min_withdrawal_amount < Decimal::ZERO {
            return Err(EngineError::InvalidConfig(format!(
                "min_withdrawal_amount must not be negative, got {}",
                self.min_withdrawal_amount
            )));
        }
        if self.min_days_to_withdraw > MAX_DAYS_TO_WITHDRAW {
            return Err(EngineError::InvalidConfig(format!(
                "min_days_to_withdraw must be at most {}, got {}",
                MAX_DAYS_TO_WITHDRAW, self.min_days_to_withdraw
            )));
        }
        Ok(())
    }

    /// Load settings from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            EngineError::InvalidConfig(format!("reading {}: {}", path.display(), e))
        })?;
        let settings: PaymentSettings = serde_json::from_str(&content).map_err(|e| {
            EngineError::InvalidConfig(format!("parsing {}: {}", path.display(), e))
        })?;
        settings.validate()?;
        Ok(settings)
    }
}

/// Shared, admin-editable handle to the current [`PaymentSettings`].
#[derive(Debug, Clone, Default)]
pub struct SettingsHandle {
    inner: Arc<RwLock<PaymentSettings>>,
}

impl SettingsHandle {
    pub fn new(settings: PaymentSettings) -> Self {
        Self {
            inner: Arc::new(RwLock::new(settings)),
        }
    }

    /// Snapshot of the current settings.
    pub fn current(&self) -> PaymentSettings {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn update(&self, settings: PaymentSettings) -> Result<()> {
        settings.validate()?;
        log::info!(
            "payment settings updated: min withdrawal {}, holding {} days, cost basis {:?}",
            settings.min_withdrawal_amount,
            settings.min_days_to_withdraw,
            settings.cost_basis
        );
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = settings;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let settings: PaymentSettings =
            serde_json::from_str(r#"{ "cost_basis": "frozen_at_order" }"#).unwrap();
        assert_eq!(settings.min_withdrawal_amount, dec!(50.00));
        assert_eq!(settings.cost_basis, CostBasis::FrozenAtOrder);
    }

    #[test]
    fn test_negative_minimum_rejected() {
        let handle = SettingsHandle::default();
        let result = handle.update(PaymentSettings {
            min_withdrawal_amount: dec!(-1),
            ..Default::default()
        });
        assert!(matches!(result, Err(EngineError::InvalidConfig(_))));
        assert_eq!(handle.current(), PaymentSettings::default());
    }

    #[test]
    fn test_holding_period_bounded() {
        let mut settings = PaymentSettings {
            min_days_to_withdraw: MAX_DAYS_TO_WITHDRAW,
            ..Default::default()
        };
        assert!(settings.validate().is_ok());
        settings.min_days_to_withdraw = 200_000_000;
        assert!(matches!(settings.validate(), Err(EngineError::InvalidConfig(_))));
        let handle = SettingsHandle::default();
        assert!(handle.update(settings).is_err());
        assert_eq!(handle.current().min_days_to_withdraw, 7);
    }

    #[test]
    fn test_update_is_visible_to_clones() {
        let handle = SettingsHandle::default();
        let other = handle.clone();
        handle
            .update(PaymentSettings {
                min_days_to_withdraw: 0,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(other.current().min_days_to_withdraw, 0);
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let result = PaymentSettings::from_json_file("/nonexistent/settings.json");
        assert!(matches!(result, Err(EngineError::InvalidConfig(_))));
    }
}
