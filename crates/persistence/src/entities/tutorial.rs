//! Tutorial entity (database row mapping).

use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Database row mapping for the tutorials table.
#[derive(Debug, Clone, FromRow)]
pub struct TutorialEntity {
    pub id: i32,
    pub title: String,
    pub description: Option<String>,
    pub published: bool,
    #[sqlx(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[sqlx(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl From<TutorialEntity> for domain::models::Tutorial {
    fn from(entity: TutorialEntity) -> Self {
        Self {
            id: entity.id,
            title: entity.title,
            description: entity.description,
            published: entity.published,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}
