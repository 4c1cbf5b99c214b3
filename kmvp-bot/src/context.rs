use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use common::conversation::Conversation;

use crate::admin::Operators;
use crate::cookies::CookieSync;
use crate::logging::LogControl;

pub struct AppContext {
    pub conversation: Conversation,
    pub operators: Operators,
    pub log: LogControl,
    pub cookies_file: PathBuf,
    pub cookie_sync: Arc<CookieSync>,
    pub started: Instant,
}
