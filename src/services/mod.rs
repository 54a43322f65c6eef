pub mod bom;
pub mod consumption;
pub mod inventory;
pub mod master_data;
pub mod order_numbers;
pub mod orders;
pub mod scheduling;
pub mod serialized_units;
