pub mod connection;
pub mod dashboard;
pub mod result;
pub mod schema;
pub mod settings;

pub use connection::*;
pub use dashboard::*;
pub use result::*;
pub use schema::*;
pub use settings::*;
