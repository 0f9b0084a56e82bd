pub mod manager;
pub mod model;

pub use manager::WithdrawalManager;
pub use model::{Decision, PixKey, Withdrawal, WithdrawalStatus};
