//! Library traversal: turns the host's library tree into an ordered list of
//! `TrackRecord`s.

use keywheel_proto::config::LibraryConfig;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use tracing::{debug, info, warn};

use crate::track::{ItemHandle, TagReader, TrackRecord};

/// A node of the host's library tree.
#[derive(Debug, Clone, PartialEq)]
pub enum LibraryNode {
    Folder {
        name: String,
        children: Vec<LibraryNode>,
    },
    Item {
        uri: String,
        handle: ItemHandle,
    },
}

/// The host application's view of its library.
pub trait CatalogSource {
    /// Root of the user library.
    fn user_library(&self) -> &LibraryNode;

    /// Start auditioning an item.
    fn preview_item(&mut self, handle: &ItemHandle);

    /// Load an item onto the host's active deck.
    fn load_item(&mut self, handle: &ItemHandle);
}

/// Map a library URI to a file path: the configured prefix becomes the base
/// directory, every remaining `:` becomes `/`, then percent-escapes are
/// decoded.
pub fn resolve_uri(uri: &str, settings: &LibraryConfig) -> PathBuf {
    let substituted = match uri.strip_prefix(settings.uri_prefix.as_str()) {
        Some(rest) => {
            let base = settings.base_dir.to_string_lossy();
            format!("{}/{}", base.trim_end_matches('/'), rest)
        }
        None => uri.to_string(),
    };
    let separated = substituted.replace(':', "/");
    let decoded = match urlencoding::decode(&separated) {
        Ok(s) => s.into_owned(),
        Err(_) => separated.clone(),
    };
    PathBuf::from(decoded)
}

/// True when the URI ends in `.<ext>` for one of `extensions`.
pub fn is_audio_uri(uri: &str, extensions: &[String]) -> bool {
    let uri = uri.to_ascii_lowercase();
    extensions.iter().any(|ext| {
        let ext = ext.trim().trim_start_matches('.').to_ascii_lowercase();
        !ext.is_empty() && uri.ends_with(&format!(".{}", ext))
    })
}

/// Depth-first walk of `root`.  Traversal order is catalog order.
pub fn scan(root: &LibraryNode, settings: &LibraryConfig, reader: &dyn TagReader) -> Vec<TrackRecord> {
    let mut records = Vec::new();
    visit(root, settings, reader, &mut records);
    info!("Catalog scan found {} tracks", records.len());
    records
}

fn visit(
    node: &LibraryNode,
    settings: &LibraryConfig,
    reader: &dyn TagReader,
    records: &mut Vec<TrackRecord>,
) {
    match node {
        LibraryNode::Folder { children, .. } => {
            for child in children {
                visit(child, settings, reader, records);
            }
        }
        LibraryNode::Item { uri, handle } => {
            if !is_audio_uri(uri, &settings.extensions) {
                return;
            }
            let path = resolve_uri(uri, settings);
            debug!("Catalog: {} -> {:?}", uri, path);
            records.push(TrackRecord::read(path, reader, Some(handle.clone())));
        }
    }
}

// ── filesystem-backed source ─────────────────────────────────────────────────

/// A `CatalogSource` over a plain directory, for running without a host
/// application.  Item URIs use the same scheme the host would, so they go
/// through `resolve_uri` like any other.
pub struct DirectorySource {
    root: LibraryNode,
    preview_command: Option<PathBuf>,
    preview: Option<Child>,
}

impl DirectorySource {
    pub fn open(settings: &LibraryConfig, preview_command: Option<PathBuf>) -> io::Result<Self> {
        let name = settings
            .base_dir
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let children = read_folder(&settings.base_dir, &mut Vec::new(), settings)?;
        Ok(Self {
            root: LibraryNode::Folder { name, children },
            preview_command,
            preview: None,
        })
    }

    fn stop_preview(&mut self) {
        if let Some(mut child) = self.preview.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

fn item_uri(settings: &LibraryConfig, components: &[String]) -> String {
    let encoded: Vec<String> = components
        .iter()
        .map(|c| urlencoding::encode(c).into_owned())
        .collect();
    format!("{}{}", settings.uri_prefix, encoded.join(":"))
}

fn read_folder(
    dir: &Path,
    components: &mut Vec<String>,
    settings: &LibraryConfig,
) -> io::Result<Vec<LibraryNode>> {
    let mut entries: Vec<_> = std::fs::read_dir(dir)?.filter_map(Result::ok).collect();
    entries.sort_by_key(|e| e.file_name());

    let mut nodes = Vec::new();
    for entry in entries {
        let name = entry.file_name().to_string_lossy().into_owned();
        if is_hidden(&name) {
            continue;
        }
        let path = entry.path();
        components.push(name.clone());
        if path.is_dir() {
            match read_folder(&path, components, settings) {
                Ok(children) => nodes.push(LibraryNode::Folder { name, children }),
                Err(e) => warn!("Skipping unreadable folder {:?}: {}", path, e),
            }
        } else {
            nodes.push(LibraryNode::Item {
                uri: item_uri(settings, components),
                handle: ItemHandle::new(path.to_string_lossy()),
            });
        }
        components.pop();
    }
    Ok(nodes)
}

impl CatalogSource for DirectorySource {
    fn user_library(&self) -> &LibraryNode {
        &self.root
    }

    fn preview_item(&mut self, handle: &ItemHandle) {
        self.stop_preview();
        let Some(program) = self.preview_command.as_ref() else {
            info!("Preview requested for {} (no preview command configured)", handle.as_str());
            return;
        };
        match Command::new(program)
            .arg(handle.as_str())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
        {
            Ok(child) => {
                info!("Previewing {}", handle.as_str());
                self.preview = Some(child);
            }
            Err(e) => warn!("Failed to start preview {:?}: {}", program, e),
        }
    }

    fn load_item(&mut self, handle: &ItemHandle) {
        info!("Load requested for {}", handle.as_str());
        println!("load {}", handle.as_str());
    }
}

impl Drop for DirectorySource {
    fn drop(&mut self) {
        self.stop_preview();
    }
}
