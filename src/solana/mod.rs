pub mod endpoints;
pub mod wallet;
