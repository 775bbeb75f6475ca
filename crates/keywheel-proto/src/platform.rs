use std::path::PathBuf;

/// Socket the service binds; the UI peer sends filter commands here.
pub const DEFAULT_SERVICE_SOCKET: &str = "/tmp/LiveMusicBrowser.src.socket";

/// Socket the UI peer binds; the service sends snapshots here.
pub const DEFAULT_UI_SOCKET: &str = "/tmp/LiveMusicBrowser.ui.socket";

const UI_BINARY_NAMES: &[&str] = &["keywheel-ui"];

pub fn data_dir() -> PathBuf {
    // ~/.local/share/keywheel on every unix, including macOS
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join(".local")
        .join("share")
        .join("keywheel")
}

pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("keywheel")
}

/// Default library base: where `query:UserLibrary#` URIs point.
pub fn default_library_base() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Music")
        .join("Ableton")
        .join("User Library")
}

fn find_beside_exe(names: &[&str]) -> Option<PathBuf> {
    let current_exe = std::env::current_exe().ok()?;
    let dir = current_exe.parent()?;
    for name in names {
        let p = dir.join(name);
        if p.exists() {
            return Some(p);
        }
    }
    None
}

fn find_on_path(names: &[&str]) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&path) {
        for name in names {
            let p = dir.join(name);
            if p.exists() {
                return Some(p);
            }
        }
    }
    None
}

/// Find the UI peer binary.
/// Checks: `KEYWHEEL_UI` env override, beside the current exe, then PATH.
pub fn find_ui_binary() -> Option<PathBuf> {
    if let Some(p) = std::env::var_os("KEYWHEEL_UI") {
        let path = PathBuf::from(p);
        if path.exists() {
            return Some(path);
        }
    }

    if let Some(p) = find_beside_exe(UI_BINARY_NAMES) {
        return Some(p);
    }

    find_on_path(UI_BINARY_NAMES)
}
