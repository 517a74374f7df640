pub mod auth;
pub mod channels;
pub mod health;
pub mod pubsub;
pub mod watchlists;

use axum::Router;

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(health::router(state.clone()))
        .merge(auth::router(state.clone()))
        .merge(watchlists::router(state.clone()))
        .merge(channels::router(state.clone()))
        .merge(pubsub::router(state))
}
