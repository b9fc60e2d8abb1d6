//! In-memory repository and catalog shared by the integration tests

#![allow(dead_code)]

use appcat_package::{
    Catalog, CatalogError, CatalogPackage, Fetch, HttpError, PackageData, Prompter,
};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::io::{self, Cursor, Write};
use zip::write::FileOptions;
use zip::ZipWriter;

pub const BASE_URL: &str = "http://repo.test";

/// Zip bytes for a package with the given requirements
pub fn package_zip(full_name: &str, version: &str, requires: &[(&str, Option<&str>)]) -> Vec<u8> {
    let mut manifest = format!(
        "Format: MuranoPL/1.0\nType: Application\nFullName: {}\nVersion: \"{}\"\n",
        full_name, version
    );
    if !requires.is_empty() {
        manifest.push_str("Require:\n");
        for (name, constraint) in requires {
            match constraint {
                Some(c) => manifest.push_str(&format!("  {}: \"{}\"\n", name, c)),
                None => manifest.push_str(&format!("  {}:\n", name)),
            }
        }
    }

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    zip.start_file("manifest.yaml", FileOptions::default()).unwrap();
    zip.write_all(manifest.as_bytes()).unwrap();
    zip.finish().unwrap().into_inner()
}

pub fn app_url(name: &str) -> String {
    format!("{}/apps/{}.zip", BASE_URL, name)
}

/// Package repository keyed by URL; unknown URLs answer 404
#[derive(Default)]
pub struct MockRepo {
    files: HashMap<String, Vec<u8>>,
    pub requests: RefCell<Vec<String>>,
}

impl MockRepo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve a package at `{BASE_URL}/apps/{name}.zip`
    pub fn with_package(self, name: &str, requires: &[(&str, Option<&str>)]) -> Self {
        let bytes = package_zip(name, "1.0.0", requires);
        self.with_file(&app_url(name), bytes)
    }

    pub fn with_file(mut self, url: &str, bytes: Vec<u8>) -> Self {
        self.files.insert(url.to_string(), bytes);
        self
    }

    pub fn requested(&self, url: &str) -> usize {
        self.requests.borrow().iter().filter(|u| *u == url).count()
    }
}

impl Fetch for MockRepo {
    fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, HttpError> {
        self.requests.borrow_mut().push(url.to_string());
        self.files.get(url).cloned().ok_or(HttpError::Status {
            status: 404,
            body: "Not Found".to_string(),
        })
    }
}

/// Catalog recording every call; names in `existing` conflict on create
#[derive(Default)]
pub struct MockCatalog {
    existing: RefCell<HashSet<String>>,
    foreign: HashSet<String>,
    always_conflict: bool,
    pub creates: RefCell<Vec<String>>,
    pub deletes: RefCell<Vec<String>>,
    pub data: RefCell<Vec<PackageData>>,
}

impl MockCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// A package owned by the caller already exists
    pub fn with_existing(self, name: &str) -> Self {
        self.existing.borrow_mut().insert(name.to_string());
        self
    }

    /// A package owned by someone else already exists
    pub fn with_foreign(mut self, name: &str) -> Self {
        self.existing.borrow_mut().insert(name.to_string());
        self.foreign.insert(name.to_string());
        self
    }

    /// Creates conflict even after the existing package was deleted
    pub fn racing(mut self) -> Self {
        self.always_conflict = true;
        self
    }

    pub fn create_calls(&self) -> Vec<String> {
        self.creates.borrow().clone()
    }

    pub fn delete_calls(&self) -> Vec<String> {
        self.deletes.borrow().clone()
    }
}

impl Catalog for MockCatalog {
    fn create_package(
        &self,
        full_name: &str,
        data: &PackageData,
        payload: Vec<u8>,
    ) -> Result<CatalogPackage, CatalogError> {
        assert!(!payload.is_empty(), "empty upload for {}", full_name);
        self.creates.borrow_mut().push(full_name.to_string());
        self.data.borrow_mut().push(data.clone());

        if self.always_conflict || !self.existing.borrow_mut().insert(full_name.to_string()) {
            return Err(CatalogError::Conflict {
                name: full_name.to_string(),
                reason: "Package already exists".to_string(),
            });
        }

        Ok(CatalogPackage {
            id: format!("id-{}", full_name),
            full_name: full_name.to_string(),
            name: full_name.to_string(),
            version: None,
            is_public: data.is_public,
            categories: data.categories.clone(),
        })
    }

    fn find_owned(
        &self,
        full_name: &str,
        _version: Option<&str>,
    ) -> Result<Vec<CatalogPackage>, CatalogError> {
        if self.foreign.contains(full_name) || !self.existing.borrow().contains(full_name) {
            return Ok(Vec::new());
        }
        Ok(vec![CatalogPackage {
            id: format!("old-{}", full_name),
            full_name: full_name.to_string(),
            name: full_name.to_string(),
            version: None,
            is_public: false,
            categories: Vec::new(),
        }])
    }

    fn delete_package(&self, id: &str) -> Result<(), CatalogError> {
        self.deletes.borrow_mut().push(id.to_string());
        let name = id.trim_start_matches("old-");
        self.existing.borrow_mut().remove(name);
        Ok(())
    }
}

/// Prompter answering from a script; an exhausted script reads as Ctrl-C
#[derive(Default)]
pub struct ScriptedPrompter {
    answers: VecDeque<String>,
    pub asked: usize,
}

impl ScriptedPrompter {
    pub fn new(answers: &[&str]) -> Self {
        Self {
            answers: answers.iter().map(|a| a.to_string()).collect(),
            asked: 0,
        }
    }
}

impl Prompter for &mut ScriptedPrompter {
    fn choose(&mut self, _message: &str) -> io::Result<String> {
        self.asked += 1;
        self.answers
            .pop_front()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Interrupted, "interrupted"))
    }
}
