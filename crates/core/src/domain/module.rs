use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::arg::Arg;

/// Width in bytes of a library address written into a payload slot.
pub const ADDRESS_LEN: usize = 20;

/// A position in a module payload reserved for a library address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkSlot {
    pub library: String,
    pub offset: usize,
}

/// A deployable module as loaded from its build artifact.
///
/// Unresolved library slots are zero-filled in `payload`; `link_slots` says
/// where they are and `libraries` says how many slots each declared library
/// dependency is expected to occupy. `linked` records the libraries already
/// written into the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDefinition {
    pub name: String,
    #[serde(default)]
    pub abi: serde_json::Value,
    pub payload: Vec<u8>,
    #[serde(default)]
    pub link_slots: Vec<LinkSlot>,
    #[serde(default)]
    pub libraries: BTreeMap<String, usize>,
    #[serde(default)]
    pub linked: BTreeMap<String, Address>,
    #[serde(default)]
    pub constructor: Vec<Arg>,
}

impl ModuleDefinition {
    pub fn new(name: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            abi: serde_json::Value::Array(Vec::new()),
            payload,
            link_slots: Vec::new(),
            libraries: BTreeMap::new(),
            linked: BTreeMap::new(),
            constructor: Vec::new(),
        }
    }

    pub fn with_abi(mut self, abi: serde_json::Value) -> Self {
        self.abi = abi;
        self
    }

    pub fn with_constructor(mut self, args: Vec<Arg>) -> Self {
        self.constructor = args;
        self
    }

    pub fn with_arg(mut self, arg: Arg) -> Self {
        self.constructor.push(arg);
        self
    }

    /// Declare a library dependency occupying `expected_slots` payload slots.
    pub fn declare_library(mut self, library: impl Into<String>, expected_slots: usize) -> Self {
        self.libraries.insert(library.into(), expected_slots);
        self
    }

    pub fn with_link_slot(mut self, library: impl Into<String>, offset: usize) -> Self {
        self.link_slots.push(LinkSlot {
            library: library.into(),
            offset,
        });
        self
    }

    /// Slots in the payload reserved for `library`.
    pub fn slots_for<'a>(&'a self, library: &'a str) -> impl Iterator<Item = &'a LinkSlot> + 'a {
        self.link_slots
            .iter()
            .filter(move |slot| slot.library == library)
    }

    pub fn depends_on_library(&self, library: &str) -> bool {
        self.libraries.contains_key(library)
    }

    pub fn library_names(&self) -> impl Iterator<Item = &str> {
        self.libraries.keys().map(String::as_str)
    }

    pub fn linked_address(&self, library: &str) -> Option<Address> {
        self.linked.get(library).copied()
    }

    /// Declared libraries that have not been linked yet.
    pub fn unresolved_libraries(&self) -> Vec<String> {
        self.libraries
            .keys()
            .filter(|library| !self.linked.contains_key(*library))
            .cloned()
            .collect()
    }

    pub fn is_fully_linked(&self) -> bool {
        self.unresolved_libraries().is_empty()
    }

    /// Modules whose addresses appear in the constructor arguments.
    pub fn address_dependencies(&self) -> Vec<&str> {
        self.constructor.iter().filter_map(Arg::module_ref).collect()
    }

    /// Every module that must be deployed before this one: constructor
    /// references first, then libraries, without duplicates.
    pub fn dependencies(&self) -> Vec<&str> {
        let mut deps: Vec<&str> = Vec::new();
        for dep in self.address_dependencies().into_iter().chain(self.library_names()) {
            if !deps.contains(&dep) {
                deps.push(dep);
            }
        }
        deps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registrar() -> ModuleDefinition {
        ModuleDefinition::new("FIFSRegistrar", vec![0u8; 64])
            .with_constructor(vec![Arg::module("RIF"), Arg::module("RSKOwner"), Arg::Sender])
            .declare_library("BytesUtils", 1)
            .with_link_slot("BytesUtils", 10)
    }

    #[test]
    fn test_dependencies_include_libraries() {
        let module = registrar();
        assert_eq!(module.address_dependencies(), vec!["RIF", "RSKOwner"]);
        assert_eq!(module.dependencies(), vec!["RIF", "RSKOwner", "BytesUtils"]);
    }

    #[test]
    fn test_dependencies_are_deduplicated() {
        let module = ModuleDefinition::new("MultiChainResolver", vec![])
            .with_constructor(vec![Arg::module("RNS"), Arg::module("RNS")]);
        assert_eq!(module.dependencies(), vec!["RNS"]);
    }

    #[test]
    fn test_unresolved_libraries() {
        let mut module = registrar();
        assert!(!module.is_fully_linked());
        assert_eq!(module.unresolved_libraries(), vec!["BytesUtils".to_string()]);

        module
            .linked
            .insert("BytesUtils".to_string(), Address::repeat_byte(0x11));
        assert!(module.is_fully_linked());
    }

    #[test]
    fn test_module_without_libraries_is_linked() {
        let module = ModuleDefinition::new("RNS", vec![0x60, 0x80]);
        assert!(module.is_fully_linked());
        assert_eq!(module.slots_for("BytesUtils").count(), 0);
    }
}
