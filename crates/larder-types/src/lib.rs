pub mod api;
pub mod bucket;
pub mod events;
pub mod models;
