//! Workspace indexer - maps AL objects to the files declaring them

use anyhow::{Context, Result};
use log::{debug, info, warn};
use rayon::prelude::*;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use walkdir::WalkDir;

use crate::object::{AlObject, ObjectType};
use crate::parser::{with_parser, ParsedFile};
use crate::resolver::normalize_object_name;

/// Object index of all workspace folders
#[derive(Default)]
pub struct Indexer {
    /// (type, normalized name) -> object
    objects: HashMap<(ObjectType, String), AlObject>,
    /// file -> object it declares, duplicates included
    files: HashMap<PathBuf, AlObject>,
}

impl Indexer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index all AL and `.dal` files in a directory
    pub fn index_directory(&mut self, root: &Path) -> Result<()> {
        let total_start = Instant::now();
        info!("Indexing directory: {}", root.display());

        let al_files: Vec<PathBuf> = WalkDir::new(root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| is_al_file(e.path()))
            .map(|e| e.path().to_path_buf())
            .collect();
        debug!("Found {} AL files", al_files.len());

        // Parse files in parallel
        let parsed_files: Vec<(PathBuf, Result<ParsedFile>)> = al_files
            .par_iter()
            .map(|path| (path.clone(), parse_file(path)))
            .collect();

        for (path, result) in parsed_files {
            match result {
                Ok(parsed) => self.add_file(&path, &parsed),
                Err(e) => warn!("Failed to parse {}: {}", path.display(), e),
            }
        }

        info!(
            "Indexed {} objects from {} files in {:.1}ms",
            self.objects.len(),
            al_files.len(),
            total_start.elapsed().as_secs_f64() * 1000.0
        );

        Ok(())
    }

    fn add_file(&mut self, path: &Path, parsed: &ParsedFile) {
        let Some(object) = AlObject::from_parsed(path, parsed) else {
            debug!("No object found in {}", path.display());
            return;
        };

        let key = object_key(&object);
        if let Some(existing) = self.objects.get(&key) {
            if existing.file != object.file {
                warn!(
                    "{} is declared in both {} and {}",
                    object,
                    existing.file.display(),
                    object.file.display()
                );
            }
        }
        self.files.insert(path.to_path_buf(), object.clone());
        self.objects.insert(key, object);
    }

    /// Forget the file's object; another file declaring the same object takes over
    fn remove_file(&mut self, path: &Path) {
        let Some(removed) = self.files.remove(path) else {
            return;
        };
        let key = object_key(&removed);
        if self.objects.get(&key).is_some_and(|o| o.file != path) {
            return;
        }

        let remaining = self
            .files
            .values()
            .filter(|object| object_key(object) == key)
            .min_by(|a, b| a.file.cmp(&b.file))
            .cloned();
        match remaining {
            Some(object) => {
                debug!("{} is now taken from {}", object, object.file.display());
                self.objects.insert(key, object);
            }
            None => {
                self.objects.remove(&key);
            }
        }
    }

    /// Re-index a single file (for incremental updates)
    pub fn reindex_file(&mut self, path: &Path) -> Result<()> {
        self.remove_file(path);

        if path.exists() {
            let parsed = parse_file(path)?;
            self.add_file(path, &parsed);
        }

        Ok(())
    }

    pub fn find_object(&self, object_type: ObjectType, name: &str) -> Option<AlObject> {
        self.objects
            .get(&(object_type, normalize_object_name(name)))
            .cloned()
    }

    /// Any object with this name that can take procedures
    pub fn find_object_by_name(&self, name: &str) -> Option<AlObject> {
        let normalized = normalize_object_name(name);
        self.objects
            .iter()
            .filter(|((object_type, key), _)| {
                *key == normalized && object_type.can_contain_procedures()
            })
            .map(|(_, object)| object)
            .min_by_key(|object| object.file.clone())
            .cloned()
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }
}

fn object_key(object: &AlObject) -> (ObjectType, String) {
    (object.object_type, normalize_object_name(&object.name))
}

/// AL sources and the symbol-only `.dal` files of dependencies
pub fn is_al_file(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("al") || ext.eq_ignore_ascii_case("dal"))
        .unwrap_or(false)
}

/// Parse a single file using the thread-local parser
fn parse_file(path: &Path) -> Result<ParsedFile> {
    let source =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    with_parser(|parser| parser.parse_file(path, &source))
}
