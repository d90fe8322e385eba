pub mod connection;
pub mod dashboard;
pub mod metadata;
pub mod query;
pub mod table;

pub use connection::*;
pub use dashboard::*;
pub use metadata::*;
pub use query::*;
pub use table::*;
