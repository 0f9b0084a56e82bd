pub mod desk;

pub use desk::{OrderDesk, StatusChange};
