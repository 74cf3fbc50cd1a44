//! The normative timeouts from the concurrency & resource model, collected in
//! one place so every crate reads the same numbers instead of re-guessing them.
use std::time::Duration;

pub const HTTP_REQUEST_DEADLINE: Duration = Duration::from_secs(30);
pub const EMPTY_TRASH_DEADLINE: Duration = Duration::from_secs(60);
pub const EVENT_PUBLISH_DEADLINE: Duration = Duration::from_millis(200);
pub const PLUGIN_VALIDATE_TOKEN_DEADLINE: Duration = Duration::from_millis(200);
pub const PLUGIN_LAUNCH_DEADLINE: Duration = Duration::from_secs(5);
pub const PLUGIN_HEALTH_CHECK_DEADLINE: Duration = Duration::from_secs(5);

pub const THUMBNAIL_RETRY_BASE_DELAY: Duration = Duration::from_secs(1);
pub const THUMBNAIL_MAX_ADDITIONAL_ATTEMPTS: u32 = 3;
