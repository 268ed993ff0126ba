//! Module artifacts produced by the contract build.
//!
//! Artifacts are Truffle/Hardhat-style JSON files with `abi`, `bytecode` and
//! optionally `linkReferences`. Library references in the bytecode are
//! 40-character placeholders, either `__BytesUtils_____...` or
//! `__$<34 hex chars>$__`. They are converted here into zero-filled payload
//! slots described by a typed slot table.

use async_trait::async_trait;
use regex::Regex;
use rns_core::{hex, ModuleDefinition, ADDRESS_LEN};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::debug;

use crate::error::{OrchestratorError, Result};

const PLACEHOLDER_LEN: usize = 2 * ADDRESS_LEN;

static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();

fn placeholder_pattern() -> &'static Regex {
    PLACEHOLDER.get_or_init(|| {
        Regex::new(r"__[A-Za-z0-9_$./:]{36}__").expect("Invalid placeholder regex pattern")
    })
}

#[async_trait]
pub trait ArtifactSource: Send + Sync {
    /// Load the module called `name`, with unresolved slots zero-filled.
    async fn load(&self, name: &str) -> Result<ModuleDefinition>;
}

/// Reads `<dir>/<Name>.json`.
#[derive(Debug, Clone)]
pub struct DirectoryArtifacts {
    dir: PathBuf,
}

impl DirectoryArtifacts {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.json", name))
    }
}

#[async_trait]
impl ArtifactSource for DirectoryArtifacts {
    async fn load(&self, name: &str) -> Result<ModuleDefinition> {
        let path = self.path_for(name);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(OrchestratorError::artifact(
                    name,
                    format!("not found at {}", path.display()),
                ));
            }
            Err(e) => return Err(e.into()),
        };
        debug!(module = %name, path = %path.display(), "Loaded artifact");
        parse_artifact(name, &content)
    }
}

/// Artifacts held in memory, keyed by module name.
#[derive(Debug, Clone, Default)]
pub struct InMemoryArtifacts {
    modules: HashMap<String, ModuleDefinition>,
}

impl InMemoryArtifacts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, module: ModuleDefinition) {
        self.modules.insert(module.name.clone(), module);
    }

    pub fn with_module(mut self, module: ModuleDefinition) -> Self {
        self.insert(module);
        self
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

#[async_trait]
impl ArtifactSource for InMemoryArtifacts {
    async fn load(&self, name: &str) -> Result<ModuleDefinition> {
        self.modules
            .get(name)
            .cloned()
            .ok_or_else(|| OrchestratorError::artifact(name, "not registered"))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawArtifact {
    #[serde(default)]
    abi: serde_json::Value,
    bytecode: String,
    /// source file -> library -> occurrences
    #[serde(default)]
    link_references: BTreeMap<String, BTreeMap<String, Vec<LinkReference>>>,
}

#[derive(Debug, Deserialize)]
struct LinkReference {
    start: usize,
    length: usize,
}

/// Parse an artifact's JSON into a module definition.
pub fn parse_artifact(name: &str, json: &str) -> Result<ModuleDefinition> {
    let raw: RawArtifact = serde_json::from_str(json)
        .map_err(|e| OrchestratorError::artifact(name, format!("invalid JSON: {}", e)))?;
    let text = raw.bytecode.trim();
    let text = text.strip_prefix("0x").unwrap_or(text);
    if text.is_empty() {
        return Err(OrchestratorError::artifact(name, "empty bytecode"));
    }

    let declared = declared_offsets(name, &raw.link_references)?;

    let mut slots: Vec<(String, usize)> = Vec::new();
    let mut hex_text = String::with_capacity(text.len());
    let mut cursor = 0;
    for found in placeholder_pattern().find_iter(text) {
        if found.start() % 2 != 0 {
            return Err(OrchestratorError::artifact(
                name,
                format!("placeholder at odd position {}", found.start()),
            ));
        }
        let offset = found.start() / 2;
        let library = match declared.get(&offset) {
            Some(library) => library.clone(),
            None if declared.is_empty() => library_from_placeholder(name, found.as_str())?,
            None => {
                return Err(OrchestratorError::artifact(
                    name,
                    format!("placeholder at byte {} missing from linkReferences", offset),
                ))
            }
        };
        slots.push((library, offset));

        hex_text.push_str(&text[cursor..found.start()]);
        hex_text.push_str(&"0".repeat(PLACEHOLDER_LEN));
        cursor = found.end();
    }
    hex_text.push_str(&text[cursor..]);

    if !declared.is_empty() && declared.len() != slots.len() {
        return Err(OrchestratorError::artifact(
            name,
            format!(
                "linkReferences declare {} slot(s), bytecode has {}",
                declared.len(),
                slots.len()
            ),
        ));
    }

    let payload = hex::decode(&hex_text)
        .map_err(|e| OrchestratorError::artifact(name, format!("invalid bytecode: {}", e)))?;

    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for (library, _) in &slots {
        *counts.entry(library.as_str()).or_default() += 1;
    }
    let mut module = ModuleDefinition::new(name, payload).with_abi(raw.abi);
    for (library, count) in counts {
        module = module.declare_library(library, count);
    }
    for (library, offset) in slots {
        module = module.with_link_slot(library, offset);
    }
    Ok(module)
}

fn declared_offsets(
    name: &str,
    references: &BTreeMap<String, BTreeMap<String, Vec<LinkReference>>>,
) -> Result<HashMap<usize, String>> {
    let mut offsets = HashMap::new();
    for libraries in references.values() {
        for (library, occurrences) in libraries {
            for occurrence in occurrences {
                if occurrence.length != ADDRESS_LEN {
                    return Err(OrchestratorError::artifact(
                        name,
                        format!("link reference of length {}", occurrence.length),
                    ));
                }
                offsets.insert(occurrence.start, library.clone());
            }
        }
    }
    Ok(offsets)
}

fn library_from_placeholder(name: &str, placeholder: &str) -> Result<String> {
    let library = placeholder.trim_matches('_');
    if library.starts_with('$') || library.is_empty() {
        return Err(OrchestratorError::artifact(
            name,
            format!("hashed placeholder {} needs linkReferences", placeholder),
        ));
    }
    // Fully qualified names look like `contracts/BytesUtils.sol:BytesUtils`.
    Ok(library.rsplit(':').next().unwrap_or(library).to_string())
}
