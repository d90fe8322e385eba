pub mod cache;
pub mod params;
pub mod postgres;

pub use cache::{Clock, ManualClock, QueryCache, SystemClock};
pub use params::{ParamValue, QueryParams, QueryRequest};
