//! Playlists: ordered, bookmarked curve collections with an LRU window of
//! resident curve data.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use hk_core::Info;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::command_stack::CommandStack;
use crate::curve::Curve;
use crate::driver::DriverRegistry;
use crate::error::{CurveError, CurveResult};

pub const PLAYLIST_HEADER: &str = "# Hooke playlist version 0.2";
pub const DEFAULT_MAX_LOADED: usize = 100;

#[derive(Serialize, Deserialize)]
struct PlaylistFile {
    #[serde(default)]
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    base_path: Option<PathBuf>,
    #[serde(default = "relative_default")]
    relative_curve_paths: bool,
    #[serde(default)]
    index: Option<usize>,
    #[serde(default = "max_loaded_default")]
    max_loaded: usize,
    #[serde(default)]
    info: Info,
    #[serde(default)]
    curves: Vec<CurveEntry>,
}

#[derive(Serialize, Deserialize)]
struct CurveEntry {
    path: PathBuf,
    #[serde(default, skip_serializing_if = "Info::is_empty")]
    info: Info,
    #[serde(default, skip_serializing_if = "CommandStack::is_empty")]
    command_stack: CommandStack,
}

fn relative_default() -> bool {
    true
}

fn max_loaded_default() -> usize {
    DEFAULT_MAX_LOADED
}

#[derive(Clone, Debug)]
pub struct Playlist {
    pub name: String,
    /// Where the playlist was last loaded from or saved to.
    pub path: Option<PathBuf>,
    /// Root for relative curve paths; defaults to the playlist's directory.
    pub base_path: Option<PathBuf>,
    pub relative_curve_paths: bool,
    pub max_loaded: usize,
    pub info: Info,
    curves: Vec<Curve>,
    index: Option<usize>,
    /// Resident curve indices, least recently used first.
    loaded: VecDeque<usize>,
    saved_digest: Option<String>,
}

impl Playlist {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: None,
            base_path: None,
            relative_curve_paths: true,
            max_loaded: DEFAULT_MAX_LOADED,
            info: Info::new(),
            curves: Vec::new(),
            index: None,
            loaded: VecDeque::new(),
            saved_digest: None,
        }
    }

    pub fn len(&self) -> usize {
        self.curves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.curves.is_empty()
    }

    pub fn curves(&self) -> &[Curve] {
        &self.curves
    }

    pub fn curve(&self, index: usize) -> CurveResult<&Curve> {
        let len = self.len();
        self.curves.get(index).ok_or(CurveError::IndexOob {
            what: "playlist",
            index,
            len,
        })
    }

    pub fn curve_mut(&mut self, index: usize) -> CurveResult<&mut Curve> {
        let len = self.len();
        self.curves.get_mut(index).ok_or(CurveError::IndexOob {
            what: "playlist",
            index,
            len,
        })
    }

    /// Index of the current curve; `None` only for an empty playlist.
    pub fn index(&self) -> Option<usize> {
        self.index
    }

    pub fn current(&self) -> CurveResult<&Curve> {
        let i = self.index.ok_or(CurveError::EmptyPlaylist)?;
        self.curve(i)
    }

    pub fn current_mut(&mut self) -> CurveResult<&mut Curve> {
        let i = self.index.ok_or(CurveError::EmptyPlaylist)?;
        self.curve_mut(i)
    }

    pub fn append(&mut self, curve: Curve) -> usize {
        self.curves.push(curve);
        if self.index.is_none() {
            self.index = Some(0);
        }
        if self.curves[self.len() - 1].is_loaded() {
            self.touch(self.len() - 1);
        }
        self.len() - 1
    }

    pub fn remove(&mut self, index: usize) -> CurveResult<Curve> {
        self.curve(index)?;
        let curve = self.curves.remove(index);
        self.loaded.retain(|i| *i != index);
        for i in self.loaded.iter_mut() {
            if *i > index {
                *i -= 1;
            }
        }
        self.index = match self.index {
            _ if self.curves.is_empty() => None,
            Some(cur) if cur > index => Some(cur - 1),
            Some(cur) if cur >= self.len() => Some(0),
            other => other,
        };
        Ok(curve)
    }

    pub fn jump(&mut self, index: usize) -> CurveResult<()> {
        self.curve(index)?;
        self.index = Some(index);
        Ok(())
    }

    /// Advance with wrap-around.
    pub fn next(&mut self) -> CurveResult<usize> {
        let i = self.index.ok_or(CurveError::EmptyPlaylist)?;
        let next = (i + 1) % self.len();
        self.index = Some(next);
        Ok(next)
    }

    pub fn previous(&mut self) -> CurveResult<usize> {
        let i = self.index.ok_or(CurveError::EmptyPlaylist)?;
        let prev = (i + self.len() - 1) % self.len();
        self.index = Some(prev);
        Ok(prev)
    }

    /// Make curve `index` resident. Returns `true` when its data was read
    /// from disk just now (so derived columns need rebuilding).
    pub fn load_curve(&mut self, index: usize, drivers: &DriverRegistry) -> CurveResult<bool> {
        let curve = self.curve_mut(index)?;
        let fresh = !curve.is_loaded();
        if fresh {
            curve.load(drivers)?;
        }
        self.touch(index);
        Ok(fresh)
    }

    /// Drop curve `index`'s data and its place in the LRU window.
    pub fn unload_curve(&mut self, index: usize) -> CurveResult<()> {
        self.curve_mut(index)?.unload();
        self.loaded.retain(|i| *i != index);
        Ok(())
    }

    /// Mark `index` most recently used and evict beyond `max_loaded`.
    fn touch(&mut self, index: usize) {
        self.loaded.retain(|i| *i != index);
        self.loaded.push_back(index);
        while self.loaded.len() > self.max_loaded.max(1) {
            if let Some(evict) = self.loaded.pop_front() {
                debug!(playlist = %self.name, curve = evict, "evicting curve data");
                self.curves[evict].unload();
            }
        }
    }

    pub fn loaded_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.loaded.iter().copied()
    }

    /// New playlist holding clones of the curves at `indices`, in order.
    pub fn subset(&self, name: impl Into<String>, indices: &[usize]) -> CurveResult<Playlist> {
        let mut out = Playlist::new(name);
        out.base_path = self.base_path.clone();
        out.relative_curve_paths = self.relative_curve_paths;
        out.max_loaded = self.max_loaded;
        for &i in indices {
            let mut curve = self.curve(i)?.clone();
            curve.unload();
            out.append(curve);
        }
        Ok(out)
    }

    fn resolve_base(&self) -> Option<PathBuf> {
        self.base_path.clone().or_else(|| {
            self.path
                .as_deref()
                .and_then(Path::parent)
                .map(Path::to_path_buf)
        })
    }

    pub fn to_yaml(&self) -> CurveResult<String> {
        let base = self.resolve_base();
        let curves = self
            .curves
            .iter()
            .map(|c| {
                let path = match (&base, self.relative_curve_paths) {
                    (Some(base), true) => c
                        .path
                        .strip_prefix(base)
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|_| c.path.clone()),
                    _ => c.path.clone(),
                };
                CurveEntry {
                    path,
                    info: c.info.clone(),
                    command_stack: c.command_stack.clone(),
                }
            })
            .collect();
        let file = PlaylistFile {
            name: self.name.clone(),
            base_path: self.base_path.clone(),
            relative_curve_paths: self.relative_curve_paths,
            index: self.index,
            max_loaded: self.max_loaded,
            info: self.info.clone(),
            curves,
        };
        Ok(format!("{PLAYLIST_HEADER}\n{}", serde_yaml::to_string(&file)?))
    }

    /// Parse playlist text. Relative curve paths resolve against the stored
    /// base path, else `default_base`.
    pub fn from_yaml(text: &str, default_base: Option<&Path>) -> CurveResult<Playlist> {
        let format_err = |what: String| CurveError::Format {
            path: default_base.map(Path::to_path_buf).unwrap_or_default(),
            what,
        };
        let first = text.lines().next().unwrap_or_default();
        if first.trim() != PLAYLIST_HEADER {
            return Err(format_err(format!(
                "expected '{PLAYLIST_HEADER}' on the first line, found '{first}'"
            )));
        }
        let file: PlaylistFile = serde_yaml::from_str(text)?;
        let base = file
            .base_path
            .clone()
            .or_else(|| default_base.map(Path::to_path_buf));

        let mut playlist = Playlist::new(file.name);
        playlist.base_path = file.base_path;
        playlist.relative_curve_paths = file.relative_curve_paths;
        playlist.max_loaded = file.max_loaded;
        playlist.info = file.info;
        for entry in file.curves {
            let path = match &base {
                Some(base) if entry.path.is_relative() => base.join(&entry.path),
                _ => entry.path,
            };
            let mut curve = Curve::new(path);
            curve.info = entry.info;
            curve.command_stack = entry.command_stack;
            playlist.append(curve);
        }
        playlist.index = match file.index {
            _ if playlist.is_empty() => None,
            Some(i) if i < playlist.len() => Some(i),
            _ => Some(0),
        };
        Ok(playlist)
    }

    pub fn load(path: &Path) -> CurveResult<Playlist> {
        let text = std::fs::read_to_string(path)?;
        let mut playlist = Self::from_yaml(&text, path.parent())?;
        if playlist.name.is_empty() {
            playlist.name = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
        }
        playlist.path = Some(path.to_path_buf());
        playlist.saved_digest = Some(playlist.digest()?);
        info!(playlist = %playlist.name, curves = playlist.len(), "playlist loaded");
        Ok(playlist)
    }

    /// Write to `path`, or back to where it came from.
    pub fn save(&mut self, path: Option<&Path>) -> CurveResult<PathBuf> {
        let target = path
            .map(Path::to_path_buf)
            .or_else(|| self.path.clone())
            .ok_or_else(|| CurveError::Format {
                path: PathBuf::new(),
                what: format!("playlist '{}' has no file name yet", self.name),
            })?;
        self.path = Some(target.clone());
        let text = self.to_yaml()?;
        std::fs::write(&target, &text)?;
        self.saved_digest = Some(hex_digest(&text));
        info!(playlist = %self.name, path = %target.display(), "playlist saved");
        Ok(target)
    }

    /// SHA-256 of the serialized playlist.
    pub fn digest(&self) -> CurveResult<String> {
        Ok(hex_digest(&self.to_yaml()?))
    }

    pub fn is_saved(&self) -> bool {
        match (&self.saved_digest, self.digest()) {
            (Some(saved), Ok(now)) => *saved == now,
            _ => false,
        }
    }
}

fn hex_digest(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Data;

    fn playlist(n: usize) -> Playlist {
        let mut p = Playlist::new("test");
        for i in 0..n {
            p.append(Curve::new(format!("/data/curve{i}")));
        }
        p
    }

    #[test]
    fn navigation_wraps() {
        let mut p = playlist(3);
        assert_eq!(p.index(), Some(0));
        assert_eq!(p.previous().unwrap(), 2);
        assert_eq!(p.next().unwrap(), 0);
        p.jump(1).unwrap();
        assert_eq!(p.current().unwrap().name, "curve1");
        assert!(p.jump(3).is_err());
    }

    #[test]
    fn removal_keeps_index_valid() {
        let mut p = playlist(3);
        p.jump(2).unwrap();
        p.remove(2).unwrap();
        assert_eq!(p.index(), Some(0));
        p.jump(1).unwrap();
        p.remove(0).unwrap();
        assert_eq!(p.index(), Some(0));
        assert_eq!(p.current().unwrap().name, "curve1");
        p.remove(0).unwrap();
        assert_eq!(p.index(), None);
        assert!(matches!(p.next(), Err(CurveError::EmptyPlaylist)));
    }

    #[test]
    fn relative_paths_resolve_against_base_path() {
        let text = format!(
            "{PLAYLIST_HEADER}\nname: test\nbase_path: /path/to\ncurves:\n- path: curve/one\n- path: curve/two\n"
        );
        let p = Playlist::from_yaml(&text, None).unwrap();
        assert_eq!(p.len(), 2);
        assert_eq!(p.curve(0).unwrap().path, PathBuf::from("/path/to/curve/one"));
        assert_eq!(p.curve(1).unwrap().path, PathBuf::from("/path/to/curve/two"));
        assert_eq!(p.index(), Some(0));
    }

    #[test]
    fn missing_header_is_rejected() {
        let err = Playlist::from_yaml("name: test\n", None).unwrap_err();
        assert!(matches!(err, CurveError::Format { .. }));
    }

    #[test]
    fn lru_window_evicts_oldest_file_curve() {
        let dir = tempfile::tempdir().unwrap();
        let drivers = DriverRegistry::default();
        let mut p = Playlist::new("lru");
        p.max_loaded = 2;
        for i in 0..3 {
            let path = dir.path().join(format!("c{i}.txt"));
            let block = Data::from_columns("b", vec![("x (m)".into(), vec![i as f64])]).unwrap();
            crate::driver::write_curve(&path, &[block], &Info::new()).unwrap();
            p.append(Curve::new(path));
        }
        assert!(p.load_curve(0, &drivers).unwrap());
        assert!(p.load_curve(1, &drivers).unwrap());
        assert!(!p.load_curve(0, &drivers).unwrap());
        assert!(p.load_curve(2, &drivers).unwrap());
        assert!(p.curve(0).unwrap().is_loaded());
        assert!(!p.curve(1).unwrap().is_loaded());
        assert!(p.curve(2).unwrap().is_loaded());
        assert_eq!(p.loaded_indices().collect::<Vec<_>>(), vec![0, 2]);

        p.unload_curve(2).unwrap();
        assert!(!p.curve(2).unwrap().is_loaded());
        assert_eq!(p.loaded_indices().collect::<Vec<_>>(), vec![0]);
        assert!(p.load_curve(1, &drivers).unwrap());
        assert!(p.curve(0).unwrap().is_loaded());
    }
}
