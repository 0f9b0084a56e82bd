pub mod load;
pub mod scenario;
