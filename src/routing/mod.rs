pub mod optimizer;
pub mod travel;

pub use optimizer::RouteOptimizer;
pub use travel::{haversine_km, travel_time};
