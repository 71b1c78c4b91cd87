use serde::{Deserialize, Serialize};
use specta::Type;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus {
    Active,
    Inactive,
}

impl ProductStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ProductStatus::Active => "active",
            ProductStatus::Inactive => "inactive",
        }
    }

    pub fn parse(value: &str) -> Option<ProductStatus> {
        match value {
            "active" => Some(ProductStatus::Active),
            "inactive" => Some(ProductStatus::Inactive),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Type)]
pub struct Product {
    pub id: Uuid,
    pub sku: String,
    pub name: String,
    pub description: String,
    pub status: ProductStatus,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Type)]
pub struct CreateProductRequest {
    pub sku: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub status: Option<ProductStatus>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Type)]
pub struct UpdateProductRequest {
    pub sku: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub status: Option<ProductStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Type)]
pub struct ListProductsResponse {
    pub products: Vec<Product>,
    pub next_before: Option<String>,
}

/// One entry of a bulk edit request: the target id plus the fields to
/// change. Also serialized as-is into the `product.bulk_updated` payload.
#[derive(Debug, Clone, Serialize, Deserialize, Type)]
pub struct ProductUpdateEntry {
    pub id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ProductStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Type)]
pub struct BulkUpdateRequest {
    pub updates: Vec<ProductUpdateEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Type)]
pub struct BulkDeleteRequest {
    #[serde(default)]
    pub ids: Vec<Uuid>,
    #[serde(default)]
    pub delete_all: bool,
}

/// Small bulk deletes complete inline; large ones are accepted and
/// tracked as a background task.
#[derive(Debug, Clone, Serialize, Deserialize, Type)]
#[serde(untagged)]
pub enum BulkDeleteResponse {
    Completed(BulkDeleteSummary),
    Accepted(BulkAccepted),
}

#[derive(Debug, Clone, Serialize, Deserialize, Type)]
pub struct BulkDeleteSummary {
    pub deleted: i64,
    pub total: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Type)]
#[serde(untagged)]
pub enum BulkUpdateResponse {
    Completed(BulkUpdateSummary),
    Accepted(BulkAccepted),
}

#[derive(Debug, Clone, Serialize, Deserialize, Type)]
pub struct BulkUpdateSummary {
    pub updated: i64,
    pub total: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Type)]
pub struct BulkAccepted {
    pub task_id: Uuid,
    pub total: i64,
}
