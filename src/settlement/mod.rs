pub mod engine;

pub use engine::{DeliveryEvent, SettlementEngine, SettlementOutcome};
