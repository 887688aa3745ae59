#[cfg(feature = "admin")]
pub mod admin;
pub mod bookings;
pub mod movies;

use axum::Router;
use std::sync::Arc;

pub fn routes() -> Router<Arc<crate::AppState>> {
    let router = Router::new()
        .merge(movies::routes())
        .merge(bookings::routes());

    #[cfg(feature = "admin")]
    let router = router.nest("/admin", admin::routes());

    router
}
