#[macro_use]
extern crate rocket;

#[macro_use]
extern crate log;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{Build, Rocket};

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod scheduled_task;

pub use config::Config;

/// Assemble the full server: routes plus the fairings that load config,
/// connect to MongoDB (creating the unique indexes that back the vote
/// ledger), set up notification publishing, and schedule election closures.
pub fn build() -> Rocket<Build> {
    rocket::build()
        .mount("/", api::routes())
        .attach(logging::LoggerFairing)
        .attach(config::ConfigFairing)
        .attach(config::DatabaseFairing)
        .attach(config::AwsFairing)
        .attach(model::db::election::ElectionFinalizerFairing)
}

/// Test hooks used by the `#[backend_test]` macro.
#[cfg(test)]
pub(crate) async fn db_client() -> mongodb::Client {
    let db_uri = rocket::build()
        .figment()
        .extract_inner::<String>("db_uri")
        .expect("`db_uri` not set");
    mongodb::Client::with_uri_str(&db_uri)
        .await
        .expect("Could not connect to the test database")
}

/// A random database name, so concurrent tests never collide.
#[cfg(test)]
pub(crate) fn database() -> String {
    let random: u32 = rand::random();
    format!("test{random}")
}

/// Build a rocket for the given database and notifier, skipping the
/// connection fairings but keeping everything else production-shaped,
/// including the ledger's unique indexes.
#[cfg(test)]
pub(crate) async fn rocket_for_db_and_notifier(
    db_client: mongodb::Client,
    db_name: &str,
    notifier: aws_sdk_sns::Client,
) -> Rocket<Build> {
    let db = db_client.database(db_name);
    model::mongodb::ensure_indexes_exist(&db)
        .await
        .expect("Failed to create indexes");

    rocket::build()
        .mount("/", api::routes())
        .attach(config::ConfigFairing)
        .attach(model::db::election::ElectionFinalizerFairing)
        .manage(db_client)
        .manage(db)
        .manage(notifier)
}
