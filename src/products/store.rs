use chrono::{SecondsFormat, Utc};
use sqlx::{QueryBuilder, SqlitePool};
use thiserror::Error;
use uuid::Uuid;

use crate::types::{
    CreateProductRequest, Product, ProductStatus, ProductUpdateEntry, UpdateProductRequest,
};

/// SQLite caps bound parameters per statement; id lists are chunked
/// well under that.
const ID_CHUNK: usize = 500;

#[derive(Debug, Error)]
pub enum ProductStoreError {
    #[error("database error: {0}")]
    Db(sqlx::Error),
    #[error("product not found")]
    NotFound,
    #[error("{0}")]
    Conflict(String),
    #[error("invalid stored product: {0}")]
    Parse(String),
}

impl From<sqlx::Error> for ProductStoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err
            && db_err.is_unique_violation()
        {
            return ProductStoreError::Conflict("sku already exists".to_string());
        }
        ProductStoreError::Db(err)
    }
}

#[derive(Debug, Clone)]
pub struct ProductCursor {
    pub updated_at: String,
    pub id: Uuid,
}

#[derive(Debug, Clone)]
pub struct ListProductsParams {
    pub limit: i64,
    pub before: Option<ProductCursor>,
    pub status: Option<ProductStatus>,
    pub search: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ListProductsResult {
    pub products: Vec<Product>,
    pub next_before: Option<ProductCursor>,
}

pub async fn create_product(
    pool: &SqlitePool,
    req: &CreateProductRequest,
) -> Result<Product, ProductStoreError> {
    let now = format_utc(Utc::now());
    let product = Product {
        id: Uuid::new_v4(),
        sku: req.sku.trim().to_string(),
        name: req.name.trim().to_string(),
        description: req.description.clone(),
        status: req.status.unwrap_or(ProductStatus::Active),
        created_at: now.clone(),
        updated_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO products (id, sku, name, description, status, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(product.id.to_string())
    .bind(&product.sku)
    .bind(&product.name)
    .bind(&product.description)
    .bind(product.status.as_str())
    .bind(&product.created_at)
    .bind(&product.updated_at)
    .execute(pool)
    .await?;

    Ok(product)
}

pub async fn get_product(pool: &SqlitePool, id: Uuid) -> Result<Product, ProductStoreError> {
    let row = sqlx::query_as::<_, ProductRow>(
        r#"
        SELECT id, sku, name, description, status, created_at, updated_at
        FROM products
        WHERE id = ?
        "#,
    )
    .bind(id.to_string())
    .fetch_optional(pool)
    .await?
    .ok_or(ProductStoreError::NotFound)?;

    row.try_into()
}

pub async fn update_product(
    pool: &SqlitePool,
    id: Uuid,
    req: &UpdateProductRequest,
) -> Result<Product, ProductStoreError> {
    let mut product = get_product(pool, id).await?;

    if let Some(sku) = &req.sku {
        product.sku = sku.trim().to_string();
    }
    if let Some(name) = &req.name {
        product.name = name.trim().to_string();
    }
    if let Some(description) = &req.description {
        product.description = description.clone();
    }
    if let Some(status) = req.status {
        product.status = status;
    }
    product.updated_at = format_utc(Utc::now());

    let result = sqlx::query(
        r#"
        UPDATE products
        SET sku = ?, name = ?, description = ?, status = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&product.sku)
    .bind(&product.name)
    .bind(&product.description)
    .bind(product.status.as_str())
    .bind(&product.updated_at)
    .bind(id.to_string())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ProductStoreError::NotFound);
    }

    Ok(product)
}

/// Delete one product, returning the removed record so the caller can
/// put it in the `product.deleted` payload.
pub async fn delete_product(pool: &SqlitePool, id: Uuid) -> Result<Product, ProductStoreError> {
    let product = get_product(pool, id).await?;

    sqlx::query("DELETE FROM products WHERE id = ?")
        .bind(id.to_string())
        .execute(pool)
        .await?;

    Ok(product)
}

pub async fn list_products(
    pool: &SqlitePool,
    params: &ListProductsParams,
) -> Result<ListProductsResult, ProductStoreError> {
    let mut query = QueryBuilder::new(
        "SELECT id, sku, name, description, status, created_at, updated_at \
         FROM products \
         WHERE 1 = 1",
    );

    if let Some(status) = params.status {
        query.push(" AND status = ");
        query.push_bind(status.as_str());
    }

    if let Some(search) = params.search.as_deref() {
        let pattern = format!("%{}%", search.replace('%', "\\%").replace('_', "\\_"));
        query.push(" AND (sku LIKE ");
        query.push_bind(pattern.clone());
        query.push(" ESCAPE '\\' OR name LIKE ");
        query.push_bind(pattern);
        query.push(" ESCAPE '\\')");
    }

    if let Some(cursor) = &params.before {
        query.push(" AND (updated_at < ");
        query.push_bind(&cursor.updated_at);
        query.push(" OR (updated_at = ");
        query.push_bind(&cursor.updated_at);
        query.push(" AND id < ");
        query.push_bind(cursor.id.to_string());
        query.push("))");
    }

    query.push(" ORDER BY updated_at DESC, id DESC LIMIT ");
    query.push_bind(params.limit + 1);

    let rows: Vec<ProductRow> = query.build_query_as().fetch_all(pool).await?;

    let has_more = rows.len() > params.limit as usize;
    let take_count = if has_more {
        params.limit as usize
    } else {
        rows.len()
    };

    let mut products = Vec::with_capacity(take_count);
    for row in rows.into_iter().take(take_count) {
        products.push(Product::try_from(row)?);
    }

    let next_before = if has_more {
        products.last().map(|product| ProductCursor {
            updated_at: product.updated_at.clone(),
            id: product.id,
        })
    } else {
        None
    };

    Ok(ListProductsResult {
        products,
        next_before,
    })
}

pub async fn all_product_ids(pool: &SqlitePool) -> Result<Vec<Uuid>, ProductStoreError> {
    let ids: Vec<(String,)> = sqlx::query_as("SELECT id FROM products ORDER BY id ASC")
        .fetch_all(pool)
        .await?;

    ids.into_iter()
        .map(|(id,)| {
            Uuid::parse_str(&id)
                .map_err(|err| ProductStoreError::Parse(format!("invalid product id: {err}")))
        })
        .collect()
}

/// Delete by id list, returning how many rows actually went away
/// (absent ids are counted as zero, not errors).
pub async fn delete_by_ids(pool: &SqlitePool, ids: &[Uuid]) -> Result<i64, ProductStoreError> {
    let mut deleted = 0;

    for chunk in ids.chunks(ID_CHUNK) {
        let mut query = QueryBuilder::new("DELETE FROM products WHERE id IN (");
        let mut id_list = query.separated(", ");
        for id in chunk {
            id_list.push_bind(id.to_string());
        }
        id_list.push_unseparated(")");

        deleted += query.build().execute(pool).await?.rows_affected() as i64;
    }

    Ok(deleted)
}

/// Apply a batch of partial updates. Entries naming unknown ids are
/// skipped; the returned count is the number of products changed.
pub async fn apply_update_entries(
    pool: &SqlitePool,
    entries: &[ProductUpdateEntry],
) -> Result<i64, ProductStoreError> {
    let mut updated = 0;

    for entry in entries {
        if entry.sku.is_none()
            && entry.name.is_none()
            && entry.description.is_none()
            && entry.status.is_none()
        {
            continue;
        }

        let mut query = QueryBuilder::new("UPDATE products SET updated_at = ");
        query.push_bind(format_utc(Utc::now()));
        if let Some(sku) = &entry.sku {
            query.push(", sku = ");
            query.push_bind(sku.trim());
        }
        if let Some(name) = &entry.name {
            query.push(", name = ");
            query.push_bind(name.trim());
        }
        if let Some(description) = &entry.description {
            query.push(", description = ");
            query.push_bind(description);
        }
        if let Some(status) = entry.status {
            query.push(", status = ");
            query.push_bind(status.as_str());
        }
        query.push(" WHERE id = ");
        query.push_bind(entry.id.to_string());

        updated += query.build().execute(pool).await?.rows_affected() as i64;
    }

    Ok(updated)
}

/// Insert-or-update keyed on sku; used by the CSV import job. Returns
/// whether a new row was created.
pub async fn upsert_by_sku(
    pool: &SqlitePool,
    sku: &str,
    name: &str,
    description: &str,
    status: ProductStatus,
) -> Result<bool, ProductStoreError> {
    let now = format_utc(Utc::now());

    let existing: Option<(String,)> = sqlx::query_as("SELECT id FROM products WHERE sku = ?")
        .bind(sku)
        .fetch_optional(pool)
        .await?;

    sqlx::query(
        r#"
        INSERT INTO products (id, sku, name, description, status, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(sku) DO UPDATE SET
            name = excluded.name,
            description = excluded.description,
            status = excluded.status,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(sku)
    .bind(name)
    .bind(description)
    .bind(status.as_str())
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    Ok(existing.is_none())
}

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: String,
    sku: String,
    name: String,
    description: String,
    status: String,
    created_at: String,
    updated_at: String,
}

impl TryFrom<ProductRow> for Product {
    type Error = ProductStoreError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        Ok(Product {
            id: Uuid::parse_str(&row.id)
                .map_err(|err| ProductStoreError::Parse(format!("invalid product id: {err}")))?,
            sku: row.sku,
            name: row.name,
            description: row.description,
            status: ProductStatus::parse(&row.status).ok_or_else(|| {
                ProductStoreError::Parse(format!("unknown product status: {}", row.status))
            })?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn format_utc(dt: chrono::DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}
