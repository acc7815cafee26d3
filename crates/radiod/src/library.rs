//! Station playlists from the encoded-track cache.
//!
//! Every directory on a track's relative path names a station the track
//! belongs to, so `rock/live/a.mp3` plays on both `rock` and `live`. Files at
//! the cache root belong to no station.

use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Station name -> ordered track paths.
pub type StationPlaylists = BTreeMap<String, Vec<PathBuf>>;

/// Scan the cache root and group tracks with the `format` extension by station.
pub fn scan_stations(root: &Path, format: &str) -> Result<StationPlaylists> {
    let root = root
        .canonicalize()
        .with_context(|| format!("canonicalize cache dir {:?}", root))?;
    if !root.is_dir() {
        return Err(anyhow::anyhow!("cache dir is not a directory: {:?}", root));
    }

    tracing::info!(root = %root.display(), format, "scanning cache");

    let mut tracks = Vec::new();
    collect_tracks(&root, &root, format, &mut tracks)?;
    tracks.sort();

    let mut stations = StationPlaylists::new();
    for track in tracks {
        let Some(parent) = track.parent() else {
            continue;
        };
        let Ok(rel_dir) = parent.strip_prefix(&root) else {
            continue;
        };
        for component in rel_dir.iter() {
            let name = component.to_string_lossy().to_string();
            stations.entry(name).or_default().push(track.clone());
        }
    }

    tracing::info!(
        root = %root.display(),
        stations = stations.len(),
        "cache scan complete"
    );
    Ok(stations)
}

fn collect_tracks(root: &Path, dir: &Path, format: &str, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir).with_context(|| format!("read_dir {:?}", dir))? {
        let entry = entry.context("read_dir entry")?;
        let path = entry.path();
        if path.is_dir() {
            let canon = path
                .canonicalize()
                .with_context(|| format!("canonicalize {:?}", path))?;
            if canon.starts_with(root) && canon != root {
                collect_tracks(root, &canon, format, out)?;
            } else {
                tracing::warn!(path = %path.display(), "skipping directory outside cache root");
            }
            continue;
        }
        if !path.is_file() {
            continue;
        }
        let ext = path
            .extension()
            .and_then(OsStr::to_str)
            .unwrap_or("")
            .to_ascii_lowercase();
        if ext == format {
            out.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_root(tag: &str) -> PathBuf {
        let root = std::env::temp_dir().join(format!(
            "radiod-library-{tag}-{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        std::fs::create_dir_all(&root).expect("create temp dir");
        root
    }

    fn touch(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).expect("create dir");
        std::fs::write(path, b"test").expect("write file");
    }

    #[test]
    fn scan_groups_tracks_by_directory() {
        let root = temp_root("group");
        touch(&root.join("rock/b.mp3"));
        touch(&root.join("rock/a.mp3"));
        touch(&root.join("jazz/c.mp3"));

        let stations = scan_stations(&root, "mp3").expect("scan cache");
        assert_eq!(stations.keys().collect::<Vec<_>>(), vec!["jazz", "rock"]);
        let rock = &stations["rock"];
        let names = rock
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["a.mp3", "b.mp3"]);
    }

    #[test]
    fn nested_tracks_join_every_parent_station() {
        let root = temp_root("nested");
        touch(&root.join("rock/live/x.mp3"));

        let stations = scan_stations(&root, "mp3").expect("scan cache");
        assert_eq!(stations["rock"].len(), 1);
        assert_eq!(stations["live"].len(), 1);
        assert_eq!(stations["rock"][0], stations["live"][0]);
    }

    #[test]
    fn root_files_and_other_formats_are_ignored() {
        let root = temp_root("ignore");
        touch(&root.join("loose.mp3"));
        touch(&root.join("rock/cover.jpg"));
        touch(&root.join("rock/song.ogg"));

        let stations = scan_stations(&root, "mp3").expect("scan cache");
        assert!(stations.is_empty());

        let ogg = scan_stations(&root, "ogg").expect("scan cache");
        assert_eq!(ogg["rock"].len(), 1);
    }

    #[test]
    fn extension_match_is_case_insensitive() {
        let root = temp_root("case");
        touch(&root.join("pop/LOUD.MP3"));
        let stations = scan_stations(&root, "mp3").expect("scan cache");
        assert_eq!(stations["pop"].len(), 1);
    }

    #[test]
    fn missing_cache_dir_is_an_error() {
        let root = temp_root("missing").join("nope");
        assert!(scan_stations(&root, "mp3").is_err());
    }
}
