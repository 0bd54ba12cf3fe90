pub mod inventory;
pub mod queries;

pub use inventory::InventoryService;
pub use queries::QueryService;
