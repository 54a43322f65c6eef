#![allow(dead_code)]

use std::sync::Arc;

use rust_decimal::Decimal;
use uuid::Uuid;

use shopfloor_api::config::AppConfig;
use shopfloor_api::db::{self, DbPool};
use shopfloor_api::entities::{location, part, work_center};
use shopfloor_api::services::master_data::{CreateLocation, CreatePart, CreateWorkCenter};
use shopfloor_api::AppServices;

/// Fresh named in-memory SQLite database with the full schema applied.
/// Shared-cache mode keeps every pooled connection on the same database.
pub async fn setup() -> (Arc<DbPool>, AppServices) {
    let url = format!(
        "sqlite:file:{}?mode=memory&cache=shared",
        Uuid::new_v4().simple()
    );
    let pool = db::establish_connection(&url)
        .await
        .expect("Failed to connect to test database");
    db::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");

    let db = Arc::new(pool);
    let services = AppServices::build(db.clone(), &AppConfig::default(), None);
    (db, services)
}

pub fn dec(value: i64) -> Decimal {
    Decimal::from(value)
}

pub async fn seed_part(services: &AppServices, part_number: &str) -> part::Model {
    services
        .master_data
        .create_part(CreatePart {
            part_number: part_number.to_string(),
            description: None,
            unit_of_measure: "EA".to_string(),
            standard_cost: Some(dec(25)),
            is_serialized: false,
        })
        .await
        .expect("Failed to create part")
}

pub async fn seed_serialized_part(services: &AppServices, part_number: &str) -> part::Model {
    services
        .master_data
        .create_part(CreatePart {
            part_number: part_number.to_string(),
            description: None,
            unit_of_measure: "EA".to_string(),
            standard_cost: Some(dec(900)),
            is_serialized: true,
        })
        .await
        .expect("Failed to create serialized part")
}

pub async fn seed_location(services: &AppServices, code: &str) -> location::Model {
    services
        .master_data
        .create_location(CreateLocation {
            code: code.to_string(),
            name: format!("{} warehouse", code),
        })
        .await
        .expect("Failed to create location")
}

pub async fn seed_work_center(services: &AppServices, code: &str) -> work_center::Model {
    services
        .master_data
        .create_work_center(CreateWorkCenter {
            code: code.to_string(),
            name: format!("{} cell", code),
        })
        .await
        .expect("Failed to create work center")
}
