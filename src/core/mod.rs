pub mod clock;
pub mod error;
pub mod ids;
pub mod money;
pub mod order;
pub mod partner;
pub mod settings;
