//! Name hashing for the registry.

use alloy_primitives::{keccak256, B256};

/// Top level domain every registered label lives under.
pub const TLD: &str = "rsk";

/// Hash of a single label.
pub fn labelhash(label: &str) -> B256 {
    keccak256(label.as_bytes())
}

/// Recursive name hash: `node(a.b) = keccak(node(b) ++ keccak(a))`, with the
/// empty name mapping to the zero node.
pub fn namehash(name: &str) -> B256 {
    let mut node = B256::ZERO;
    if name.is_empty() {
        return node;
    }

    for label in name.rsplit('.') {
        let mut buf = [0u8; 64];
        buf[..32].copy_from_slice(node.as_slice());
        buf[32..].copy_from_slice(labelhash(label).as_slice());
        node = keccak256(buf);
    }
    node
}

/// Node of `label.rsk`, computed from the label hash alone.
pub fn node_for_label(label_hash: B256) -> B256 {
    let mut buf = [0u8; 64];
    buf[..32].copy_from_slice(namehash(TLD).as_slice());
    buf[32..].copy_from_slice(label_hash.as_slice());
    keccak256(buf)
}
