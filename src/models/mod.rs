pub mod location;
pub mod order;
pub mod store_status;
