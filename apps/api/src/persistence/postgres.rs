use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use tracing::info;
use uuid::Uuid;

use super::{new_document, DocumentPersistence, PersistenceError, SaveReceipt};
use crate::models::{Content, Document, DocumentFields, NewDocument, Visibility};

#[derive(Debug, FromRow)]
struct DocumentRow {
    id: Uuid,
    title: String,
    slug: String,
    content: Json<Content>,
    tags: Vec<String>,
    is_public: bool,
    is_locked: bool,
    password: Option<String>,
    owner_id: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<DocumentRow> for Document {
    fn from(row: DocumentRow) -> Self {
        Document {
            id: row.id,
            title: row.title,
            slug: row.slug,
            content: row.content.0,
            tags: row.tags,
            visibility: Visibility {
                public: row.is_public,
            },
            locked: row.is_locked,
            password: row.password,
            owner_id: row.owner_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Documents table access. Schema: `migrations/0001_create_documents.sql`.
#[derive(Clone)]
pub struct PgDocumentRepository {
    pool: PgPool,
}

impl PgDocumentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a connection pool to `database_url`.
    pub async fn connect(database_url: &str) -> Result<Self, PersistenceError> {
        info!("Connecting to PostgreSQL...");
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        info!("PostgreSQL connection pool established");
        Ok(Self::new(pool))
    }
}

#[async_trait]
impl DocumentPersistence for PgDocumentRepository {
    async fn create(&self, new: NewDocument) -> Result<Document, PersistenceError> {
        let doc = new_document(new, Utc::now())?;
        let row = sqlx::query_as::<_, DocumentRow>(
            r#"
            INSERT INTO documents
                (id, title, slug, content, tags, is_public, is_locked, password,
                 owner_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(doc.id)
        .bind(&doc.title)
        .bind(&doc.slug)
        .bind(Json(&doc.content))
        .bind(&doc.tags)
        .bind(doc.visibility.public)
        .bind(doc.locked)
        .bind(&doc.password)
        .bind(doc.owner_id)
        .bind(doc.created_at)
        .bind(doc.updated_at)
        .fetch_one(&self.pool)
        .await?;

        info!("Created document {} for owner {}", row.id, row.owner_id);
        Ok(row.into())
    }

    async fn load(&self, id: Uuid) -> Result<Document, PersistenceError> {
        sqlx::query_as::<_, DocumentRow>("SELECT * FROM documents WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Document::from)
            .ok_or(PersistenceError::NotFound(id))
    }

    async fn save(
        &self,
        id: Uuid,
        fields: DocumentFields,
    ) -> Result<SaveReceipt, PersistenceError> {
        let updated_at: Option<DateTime<Utc>> = sqlx::query_scalar(
            r#"
            UPDATE documents
            SET title = $2, slug = $3, content = $4, tags = $5, is_public = $6,
                is_locked = $7, password = $8, updated_at = now()
            WHERE id = $1
            RETURNING updated_at
            "#,
        )
        .bind(id)
        .bind(&fields.title)
        .bind(&fields.slug)
        .bind(Json(&fields.content))
        .bind(&fields.tags)
        .bind(fields.visibility.public)
        .bind(fields.locked)
        .bind(&fields.password)
        .fetch_optional(&self.pool)
        .await?;

        updated_at
            .map(|updated_at| SaveReceipt { updated_at })
            .ok_or(PersistenceError::NotFound(id))
    }
}
