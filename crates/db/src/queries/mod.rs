pub mod channels;
pub mod revoked_tokens;
pub mod subscriptions;
pub mod users;
pub mod watchlists;
