pub mod auth;
pub mod donations;
pub mod error;
pub mod extract;
pub mod farmers;
pub mod food;
pub mod mailer;
pub mod messages;
pub mod middleware;
pub mod notifications;
pub mod profile;
pub mod state;
pub mod suggestions;
pub mod vision;
pub mod wastage;

pub use error::ApiError;
pub use state::{AppState, AppStateInner};
