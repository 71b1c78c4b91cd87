pub mod products;
pub mod tasks;
pub mod uploads;
pub mod webhooks;

use axum::{
    Router, middleware,
    routing::{get, post},
};

use crate::{auth::admin_auth, state::AppState};

/// The full HTTP surface. The webhook management routes sit behind the
/// optional admin bearer token; everything else is open.
pub fn api_router(state: AppState) -> Router {
    let webhook_routes = Router::new()
        .route(
            "/api/webhooks",
            get(webhooks::list_webhooks_handler).post(webhooks::create_webhook_handler),
        )
        .route(
            "/api/webhooks/:id",
            get(webhooks::get_webhook_handler)
                .patch(webhooks::update_webhook_handler)
                .delete(webhooks::delete_webhook_handler),
        )
        .route("/api/webhooks/:id/test", post(webhooks::test_webhook_handler))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth));

    Router::new()
        .route(
            "/api/products",
            get(products::list_products_handler).post(products::create_product_handler),
        )
        .route(
            "/api/products/:id",
            get(products::get_product_handler)
                .patch(products::update_product_handler)
                .delete(products::delete_product_handler),
        )
        .route("/api/products/edit", post(products::bulk_update_handler))
        .route("/api/products/bulk-delete", post(products::bulk_delete_handler))
        .route("/api/products/upload", post(uploads::upload_chunk_handler))
        .route("/api/tasks/:task_id/status", get(tasks::task_status_handler))
        .merge(webhook_routes)
        .with_state(state)
}
