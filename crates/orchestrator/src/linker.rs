use rns_core::{Address, DeploymentManifest, LinkSlot, ModuleDefinition, ADDRESS_LEN};
use tracing::debug;

use crate::error::LinkError;

/// Writes library addresses into the reserved slots of a module payload.
///
/// Linking never mutates its input. Re-linking a library with the address it
/// already carries returns an identical module.
pub struct ArtifactLinker;

impl ArtifactLinker {
    pub fn link(
        module: &ModuleDefinition,
        library: &str,
        address: Address,
    ) -> Result<ModuleDefinition, LinkError> {
        let expected = *module
            .libraries
            .get(library)
            .ok_or_else(|| LinkError::UnknownLibrary {
                module: module.name.clone(),
                library: library.to_string(),
            })?;

        if let Some(existing) = module.linked_address(library) {
            if existing == address {
                return Ok(module.clone());
            }
            return Err(LinkError::AlreadyLinked {
                module: module.name.clone(),
                library: library.to_string(),
                existing,
                requested: address,
            });
        }

        let slots: Vec<&LinkSlot> = module.slots_for(library).collect();
        if slots.len() != expected {
            return Err(LinkError::SlotCountMismatch {
                module: module.name.clone(),
                library: library.to_string(),
                expected,
                found: slots.len(),
            });
        }

        let mut linked = module.clone();
        for slot in slots {
            let end = slot.offset + ADDRESS_LEN;
            let target = linked
                .payload
                .get_mut(slot.offset..end)
                .ok_or_else(|| LinkError::SlotOutOfBounds {
                    module: module.name.clone(),
                    library: library.to_string(),
                    offset: slot.offset,
                    len: module.payload.len(),
                })?;
            target.copy_from_slice(address.as_slice());
        }
        linked.linked.insert(library.to_string(), address);

        debug!(
            module = %module.name,
            library = %library,
            address = %address,
            slots = expected,
            "Library linked"
        );
        Ok(linked)
    }

    /// Link every unresolved library of `module` from the manifest.
    pub fn link_from_manifest(
        module: &ModuleDefinition,
        manifest: &DeploymentManifest,
    ) -> Result<ModuleDefinition, LinkError> {
        let mut linked = module.clone();
        for library in module.unresolved_libraries() {
            let address = manifest
                .address(&library)
                .ok_or_else(|| LinkError::MissingLibrary {
                    module: module.name.clone(),
                    library: library.clone(),
                })?;
            linked = Self::link(&linked, &library, address)?;
        }
        Ok(linked)
    }
}
