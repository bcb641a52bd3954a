//! Data model for the configuration workbook

mod configuration;
pub mod resource_type;
pub mod row;

pub use configuration::*;
pub use resource_type::ResourceType;
pub use row::ConfigRow;
