pub use super::game::Entity as Game;
pub use super::sync_progress::Entity as SyncProgress;
