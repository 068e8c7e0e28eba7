//! Common library for the pet mood diary
//!
//! This crate provides the pieces shared by every service: PostgreSQL and
//! Redis connectivity, mood labels, the diary model with its storage
//! backends, presentation data (tips, chart series) and error types.
//!
//! Example usage of the diary with the remote backend:
//!
//! ```rust,no_run
//! use common::database::{DatabaseConfig, init_pool, run_migrations};
//! use common::diary::{DiaryScope, DiaryStore, NewDiaryEntry, PgDiaryStore, SortOrder};
//! use common::mood::MoodLabel;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = DatabaseConfig::from_env()?;
//!     let pool = init_pool(&config).await?;
//!     run_migrations(&pool).await?;
//!
//!     let store = PgDiaryStore::new(pool);
//!     let scope = DiaryScope::User(uuid::Uuid::new_v4());
//!     store.append(NewDiaryEntry::new(scope, MoodLabel::new("happy")?)).await?;
//!     println!("{:?}", store.list(scope, SortOrder::Desc).await?);
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod database;
pub mod diary;
pub mod error;
pub mod mood;
pub mod presentation;
pub mod session;
pub mod token;

pub use diary::{DeleteOutcome, DiaryEntry, DiaryScope, DiaryStore, NewDiaryEntry, SortOrder};
pub use error::{PersistenceError, PersistenceResult};
pub use mood::{IntensityLevel, LabelSet, MoodLabel};
pub use session::UserSession;
