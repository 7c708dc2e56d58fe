use std::collections::HashMap;
use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

use crate::ai::CompletionClient;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    /// Session token -> student id, issued by auth.login.
    pub sessions: HashMap<String, String>,
    /// Injected completion client; None runs every narrative surface on its
    /// fallback path.
    pub client: Option<Box<dyn CompletionClient>>,
}
