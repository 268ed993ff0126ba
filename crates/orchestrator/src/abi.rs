//! Call and constructor encoding.
//!
//! Calls are described by a canonical signature such as
//! `"setSubnodeOwner(bytes32,bytes32,address)"` plus typed [`Arg`]s. Module
//! references and the sender placeholder are resolved against the manifest at
//! encoding time.

use alloy_dyn_abi::DynSolValue;
use chain::selector;
use rns_core::{Address, Arg, DeploymentManifest, ModuleDefinition, B256, U256};

use crate::error::{LinkError, OrchestratorError, Result};

/// Resolve one argument into an ABI value.
pub fn resolve(arg: &Arg, manifest: &DeploymentManifest, sender: Address) -> Result<DynSolValue> {
    Ok(match arg {
        Arg::Address(address) => DynSolValue::Address(*address),
        Arg::Module(name) => DynSolValue::Address(
            manifest
                .address(name)
                .ok_or_else(|| OrchestratorError::ModuleNotDeployed(name.clone()))?,
        ),
        Arg::Sender => DynSolValue::Address(sender),
        Arg::Bytes32(word) => DynSolValue::FixedBytes(*word, 32),
        Arg::Bytes32Array(words) => DynSolValue::Array(
            words
                .iter()
                .map(|word| DynSolValue::FixedBytes(*word, 32))
                .collect(),
        ),
        Arg::Uint(value) => DynSolValue::Uint(*value, 256),
        Arg::String(value) => DynSolValue::String(value.clone()),
        Arg::Bool(value) => DynSolValue::Bool(*value),
    })
}

/// ABI-encode `args` as a parameter list (no selector).
pub fn encode_args(args: &[Arg], manifest: &DeploymentManifest, sender: Address) -> Result<Vec<u8>> {
    if args.is_empty() {
        return Ok(Vec::new());
    }
    let values = args
        .iter()
        .map(|arg| resolve(arg, manifest, sender))
        .collect::<Result<Vec<_>>>()?;
    Ok(DynSolValue::Tuple(values).abi_encode_params())
}

/// Selector followed by the encoded arguments.
pub fn encode_call(
    signature: &str,
    args: &[Arg],
    manifest: &DeploymentManifest,
    sender: Address,
) -> Result<Vec<u8>> {
    let expected = param_count(signature)?;
    if expected != args.len() {
        return Err(OrchestratorError::Encoding(format!(
            "{} takes {} argument(s), got {}",
            signature,
            expected,
            args.len()
        )));
    }
    let mut data = selector(signature).to_vec();
    data.extend(encode_args(args, manifest, sender)?);
    Ok(data)
}

/// Creation payload: the linked code followed by the encoded constructor.
pub fn encode_creation(
    module: &ModuleDefinition,
    manifest: &DeploymentManifest,
    sender: Address,
) -> Result<Vec<u8>> {
    let unresolved = module.unresolved_libraries();
    if !unresolved.is_empty() {
        return Err(LinkError::Unresolved {
            module: module.name.clone(),
            libraries: unresolved,
        }
        .into());
    }
    let mut data = module.payload.clone();
    data.extend(encode_args(&module.constructor, manifest, sender)?);
    Ok(data)
}

/// Number of top-level parameters in a canonical signature.
fn param_count(signature: &str) -> Result<usize> {
    let params = signature
        .split_once('(')
        .and_then(|(_, rest)| rest.strip_suffix(')'))
        .ok_or_else(|| OrchestratorError::Encoding(format!("malformed signature {}", signature)))?;
    if params.is_empty() {
        return Ok(0);
    }

    let mut depth = 0usize;
    let mut count = 1;
    for c in params.chars() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => count += 1,
            _ => {}
        }
    }
    Ok(count)
}

/// First 32-byte word of a call result.
pub fn decode_word(data: &[u8]) -> Result<B256> {
    data.get(..32)
        .map(B256::from_slice)
        .ok_or_else(|| OrchestratorError::Encoding(format!("expected a word, got {} bytes", data.len())))
}

pub fn decode_address(data: &[u8]) -> Result<Address> {
    Ok(Address::from_word(decode_word(data)?))
}

pub fn decode_uint(data: &[u8]) -> Result<U256> {
    Ok(U256::from_be_bytes(decode_word(data)?.0))
}
