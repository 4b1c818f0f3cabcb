pub mod instruction;
pub mod layout;
pub mod pool_keys;
pub mod quote;
