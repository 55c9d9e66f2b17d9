//! Session discovery (supplemented feature, SPEC_FULL.md §4): enumerate Claude Code
//! transcript sessions for the current project, for `ccmem show sessions` and manual
//! extraction runs.
//!
//! Carried over almost verbatim from wm's `session.rs`: the `~/.claude/projects/<id>`
//! layout and the project-id-by-slash-replacement convention are Claude Code's on-disk
//! format, not something this crate invents.

use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub session_id: String,
    pub transcript_path: PathBuf,
    pub modified: std::time::SystemTime,
}

/// Claude Code replaces path separators with `-` to derive a project id from an absolute
/// path, e.g. `/home/user/repo` -> `-home-user-repo`.
pub fn compute_project_id(project_path: &Path) -> String {
    project_path.to_string_lossy().replace('/', "-")
}

pub fn claude_projects_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".claude").join("projects"))
}

pub fn current_project_path() -> PathBuf {
    std::env::var("CLAUDE_PROJECT_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
}

/// Discover all `.jsonl` transcript sessions for the current project, most-recently
/// modified first.
pub fn discover_sessions() -> std::io::Result<Vec<SessionInfo>> {
    let project_id = compute_project_id(&current_project_path());
    let dir = match claude_projects_dir() {
        Some(d) => d.join(project_id),
        None => return Ok(Vec::new()),
    };
    discover_sessions_in_dir(&dir)
}

pub fn discover_sessions_in_dir(dir: &Path) -> std::io::Result<Vec<SessionInfo>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut sessions = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("jsonl") {
            continue;
        }
        let session_id = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let modified = entry.metadata()?.modified()?;
        sessions.push(SessionInfo { session_id, transcript_path: path, modified });
    }

    sessions.sort_by(|a, b| b.modified.cmp(&a.modified));
    Ok(sessions)
}
