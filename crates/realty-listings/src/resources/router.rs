use axum::routing::get;
use axum::Router;

use super::handlers::{create_record, delete_record, get_record, list_records, update_record};
use super::Resource;
use crate::store::SharedStore;

/// Collection routes at `R::PATH` and item routes at `R::PATH/:id`.
pub fn resource_router<R: Resource>() -> Router<SharedStore> {
    Router::new()
        .route(R::PATH, get(list_records::<R>).post(create_record::<R>))
        .route(
            &format!("{}/:id", R::PATH),
            get(get_record::<R>)
                .put(update_record::<R>)
                .delete(delete_record::<R>),
        )
}
