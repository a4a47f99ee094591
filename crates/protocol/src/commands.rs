//! Tracker command names.

pub const CREATE_OPEN: &str = "create_open";
pub const CREATE_CLOSE: &str = "create_close";
pub const GET_PATHS: &str = "get_paths";
pub const RENAME: &str = "rename";
pub const DELETE: &str = "delete";
pub const LIST_KEYS: &str = "list_keys";
pub const SLEEP: &str = "sleep";
