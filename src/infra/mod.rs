pub mod store;
pub mod worldbank;
