use std::sync::Arc;

use lore_service::RetrievalService;
use lore_storage::{db::Db, qdrant::QdrantStore};

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<RetrievalService>,
}
impl AppState {
	/// Connects both stores and bootstraps their schema before serving.
	pub async fn new(config: lore_config::Config) -> color_eyre::Result<Self> {
		let db = Db::connect(&config.storage.postgres).await?;

		db.ensure_schema().await?;

		let qdrant = QdrantStore::new(&config.storage.qdrant)?;

		qdrant.ensure_collection().await?;

		Ok(Self::from_service(RetrievalService::new(config, db, qdrant)))
	}

	pub fn from_service(service: RetrievalService) -> Self {
		Self { service: Arc::new(service) }
	}
}
