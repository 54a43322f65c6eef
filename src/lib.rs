//! Shopfloor API Library
//!
//! Production execution core: the order/step lifecycle state machine, the
//! idempotent and reversible material consumption ledger with its canonical
//! inventory balance, and the work-center scheduling conflict detector.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod logging;
pub mod migrator;
pub mod services;

use std::sync::Arc;

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::events::EventSender;
use crate::services::bom::BomService;
use crate::services::consumption::ConsumptionService;
use crate::services::inventory::InventoryService;
use crate::services::master_data::MasterDataService;
use crate::services::order_numbers::{OrderNumberGenerator, SequentialOrderNumberGenerator};
use crate::services::orders::OrderService;
use crate::services::scheduling::SchedulingService;
use crate::services::serialized_units::SerializedUnitService;

/// The wired service bundle callers embed into their transport of choice.
#[derive(Clone)]
pub struct AppServices {
    pub master_data: Arc<MasterDataService>,
    pub inventory: Arc<InventoryService>,
    pub serialized_units: Arc<SerializedUnitService>,
    pub bom: Arc<BomService>,
    pub consumption: Arc<ConsumptionService>,
    pub orders: Arc<OrderService>,
    pub scheduling: Arc<SchedulingService>,
}

impl AppServices {
    /// Wires all services with the default order-number generator.
    pub fn build(db: Arc<DbPool>, config: &AppConfig, event_sender: Option<EventSender>) -> Self {
        Self::build_with_numbering(
            db,
            config,
            event_sender,
            Arc::new(SequentialOrderNumberGenerator::default()),
        )
    }

    /// Wires all services with a caller-provided order-number generator.
    pub fn build_with_numbering(
        db: Arc<DbPool>,
        config: &AppConfig,
        event_sender: Option<EventSender>,
        order_numbers: Arc<dyn OrderNumberGenerator>,
    ) -> Self {
        let consumption = Arc::new(ConsumptionService::new(db.clone(), event_sender.clone()));
        let orders = Arc::new(OrderService::new(
            db.clone(),
            consumption.clone(),
            order_numbers,
            event_sender.clone(),
        ));

        Self {
            master_data: Arc::new(MasterDataService::new(db.clone())),
            inventory: Arc::new(InventoryService::new(db.clone(), event_sender.clone())),
            serialized_units: Arc::new(SerializedUnitService::new(db.clone())),
            bom: Arc::new(BomService::new(db.clone())),
            consumption,
            orders,
            scheduling: Arc::new(SchedulingService::new(
                db,
                event_sender,
                config.scheduling.clone(),
            )),
        }
    }
}
