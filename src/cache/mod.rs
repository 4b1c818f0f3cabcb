pub mod avoid_list;
pub mod market;
pub mod pool;
pub mod snipe_list;

pub use avoid_list::AvoidListCache;
pub use market::MarketCache;
pub use pool::PoolCache;
pub use snipe_list::SnipeListCache;
