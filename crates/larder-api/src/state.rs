use std::sync::Arc;

use larder_db::Database;
use larder_gateway::Dispatcher;

use crate::mailer::Mailer;
use crate::vision::VisionClient;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub dispatcher: Dispatcher,
    pub jwt_secret: String,
    /// Bearer key accepted by the internal expiry-scan endpoint.
    pub cron_key: String,
    pub mailer: Arc<dyn Mailer>,
    /// `None` when no image-recognition key is configured.
    pub vision: Option<VisionClient>,
}
