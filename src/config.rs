use std::path::{Path, PathBuf};

pub const DEFAULT_API_BASE: &str = "http://localhost:4000";

const SESSION_DIR: &str = ".teacher-insights";
const SESSION_FILE: &str = "session.json";

#[derive(Debug, Clone)]
pub struct Config {
    pub api_base: String,
    pub session_file: PathBuf,
}

impl Config {
    pub fn new(api_base: &str, session_file: Option<PathBuf>) -> Self {
        let home = std::env::var_os("HOME").map(PathBuf::from);
        Self {
            api_base: normalize_base(api_base),
            session_file: session_file
                .unwrap_or_else(|| default_session_file(home.as_deref())),
        }
    }
}

fn normalize_base(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        DEFAULT_API_BASE.to_string()
    } else {
        trimmed.to_string()
    }
}

pub fn default_session_file(home: Option<&Path>) -> PathBuf {
    match home {
        Some(dir) if !dir.as_os_str().is_empty() => dir.join(SESSION_DIR).join(SESSION_FILE),
        _ => PathBuf::from(SESSION_DIR).join(SESSION_FILE),
    }
}
