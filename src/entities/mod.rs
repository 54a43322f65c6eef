pub mod bom_line;
pub mod inventory_balance;
pub mod ledger_entry;
pub mod location;
pub mod part;
pub mod production_order;
pub mod production_step;
pub mod serialized_unit;
pub mod work_center;
pub mod work_center_allocation;
