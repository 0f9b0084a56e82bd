pub mod catalog;
pub mod resolver;

pub use catalog::{Catalog, PartnerProduct, Product};
pub use resolver::{PriceQuote, PriceResolver};
