pub mod fixtures;

mod error;

pub use error::{Error, Result};

use std::{env, str::FromStr, sync::Mutex, thread, time::Duration};

use qdrant_client::Qdrant;
use sqlx::{
	ConnectOptions, Connection, Executor,
	postgres::{PgConnectOptions, PgConnection},
};
use tokio::{runtime::Builder, time};
use uuid::Uuid;

const QDRANT_DELETE_TIMEOUT: Duration = Duration::from_secs(10);

/// A throwaway Postgres database, plus the Qdrant collections named through it.
///
/// Call [`TestDatabase::cleanup`] at the end of a test; dropping without it still tears down on a
/// helper thread.
pub struct TestDatabase {
	database: String,
	dsn: String,
	admin_options: PgConnectOptions,
	collections: Mutex<Vec<String>>,
	cleaned: bool,
}
impl TestDatabase {
	pub async fn new(base_dsn: &str) -> Result<Self> {
		let base_options = PgConnectOptions::from_str(base_dsn)
			.map_err(|err| Error::Message(format!("Failed to parse LORE_PG_DSN: {err}.")))?;
		let admin_options = base_options.clone().database("postgres");
		let database = format!("lore_test_{}", Uuid::new_v4().simple());
		let mut admin = PgConnection::connect_with(&admin_options)
			.await
			.map_err(|err| Error::Message(format!("Failed to reach the admin database: {err}.")))?;

		admin
			.execute(format!(r#"CREATE DATABASE "{database}""#).as_str())
			.await
			.map_err(|err| Error::Message(format!("Failed to create test database: {err}.")))?;

		let dsn = base_options.database(&database).to_url_lossy().to_string();

		Ok(Self {
			database,
			dsn,
			admin_options,
			collections: Mutex::new(Vec::new()),
			cleaned: false,
		})
	}

	pub fn dsn(&self) -> &str {
		&self.dsn
	}

	/// Returns a Qdrant collection name unique to this database and deletes it on teardown.
	pub fn collection_name(&self, prefix: &str) -> String {
		let collection = format!("{prefix}_{}", self.database);

		self.collections.lock().unwrap_or_else(|err| err.into_inner()).push(collection.clone());

		collection
	}

	pub async fn cleanup(mut self) -> Result<()> {
		self.teardown().run().await?;

		self.cleaned = true;

		Ok(())
	}

	fn teardown(&self) -> Teardown {
		Teardown {
			database: self.database.clone(),
			admin_options: self.admin_options.clone(),
			collections: self.collections.lock().unwrap_or_else(|err| err.into_inner()).clone(),
		}
	}
}
impl Drop for TestDatabase {
	fn drop(&mut self) {
		if self.cleaned {
			return;
		}

		let teardown = self.teardown();
		let handle = thread::spawn(move || {
			let result = Builder::new_current_thread()
				.enable_all()
				.build()
				.map_err(|err| Error::Message(format!("Failed to start cleanup runtime: {err}.")))
				.and_then(|runtime| runtime.block_on(teardown.run()));

			if let Err(err) = result {
				eprintln!("Test teardown failed: {err}");
			}
		});
		let _ = handle.join();
	}
}

/// Everything a [`TestDatabase`] created, detached so it can outlive the handle.
struct Teardown {
	database: String,
	admin_options: PgConnectOptions,
	collections: Vec<String>,
}
impl Teardown {
	async fn run(self) -> Result<()> {
		let qdrant_result = self.drop_collections().await;

		self.drop_database().await?;

		qdrant_result
	}

	async fn drop_database(&self) -> Result<()> {
		let mut admin = PgConnection::connect_with(&self.admin_options).await?;

		sqlx::query(
			"\
SELECT pg_terminate_backend(pid)
FROM pg_stat_activity
WHERE datname = $1 AND pid <> pg_backend_pid()",
		)
		.bind(&self.database)
		.fetch_all(&mut admin)
		.await?;
		admin
			.execute(format!(r#"DROP DATABASE IF EXISTS "{}""#, self.database).as_str())
			.await
			.map_err(|err| Error::Message(format!("Failed to drop test database: {err}.")))?;

		Ok(())
	}

	async fn drop_collections(&self) -> Result<()> {
		if self.collections.is_empty() {
			return Ok(());
		}

		let Some(qdrant_url) = env_qdrant_url() else {
			eprintln!("Skipping Qdrant cleanup; set LORE_QDRANT_URL to delete test collections.");

			return Ok(());
		};
		let client = Qdrant::from_url(&qdrant_url).build()?;

		for collection in &self.collections {
			time::timeout(QDRANT_DELETE_TIMEOUT, client.delete_collection(collection.clone()))
				.await
				.map_err(|_| {
					Error::Message(format!("Timed out deleting Qdrant collection {collection}."))
				})??;
		}

		Ok(())
	}
}

pub fn env_dsn() -> Option<String> {
	env::var("LORE_PG_DSN").ok()
}

pub fn env_qdrant_url() -> Option<String> {
	env::var("LORE_QDRANT_URL").ok()
}
