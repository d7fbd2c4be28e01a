//! Admin console. Every route requires an access token of a user whose
//! stored role is `admin`.

mod categories;
pub mod dto;
mod orders;
mod products;
mod users;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(categories::routes())
        .merge(products::routes())
        .merge(users::routes())
        .merge(orders::routes())
}
