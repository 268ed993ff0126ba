use rns_core::{labelhash, Arg, B256};
use serde::{Deserialize, Serialize};

/// One administrative call against a deployed module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WiringStep {
    pub description: String,
    /// Module receiving the call.
    pub target: String,
    pub signature: String,
    pub args: Vec<Arg>,
}

impl WiringStep {
    pub fn new(
        description: impl Into<String>,
        target: impl Into<String>,
        signature: impl Into<String>,
        args: Vec<Arg>,
    ) -> Self {
        Self {
            description: description.into(),
            target: target.into(),
            signature: signature.into(),
            args,
        }
    }

    pub fn set_default_resolver(registry: &str, resolver: &str) -> Self {
        Self::new(
            format!("{}.setDefaultResolver({})", registry, resolver),
            registry,
            "setDefaultResolver(address)",
            vec![Arg::module(resolver)],
        )
    }

    /// Give `label` under `parent` to a deployed module.
    pub fn set_subnode_owner(registry: &str, parent: B256, label: &str, owner: &str) -> Self {
        Self::new(
            format!("{}.setSubnodeOwner({}, {})", registry, label, owner),
            registry,
            "setSubnodeOwner(bytes32,bytes32,address)",
            vec![
                Arg::Bytes32(parent),
                Arg::Bytes32(labelhash(label)),
                Arg::module(owner),
            ],
        )
    }

    pub fn run(module: &str) -> Self {
        Self::new(format!("{}.run()", module), module, "run()", Vec::new())
    }

    pub fn add_registrar(owner: &str, registrar: &str) -> Self {
        Self::new(
            format!("{}.addRegistrar({})", owner, registrar),
            owner,
            "addRegistrar(address)",
            vec![Arg::module(registrar)],
        )
    }

    pub fn add_renewer(owner: &str, renewer: &str) -> Self {
        Self::new(
            format!("{}.addRenewer({})", owner, renewer),
            owner,
            "addRenewer(address)",
            vec![Arg::module(renewer)],
        )
    }

    /// Modules that must be deployed before this step runs.
    pub fn dependencies(&self) -> Vec<&str> {
        let mut deps = vec![self.target.as_str()];
        for dep in self.args.iter().filter_map(Arg::module_ref) {
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

    #[test]
    fn test_set_subnode_owner_hashes_label() {
        let step = WiringStep::set_subnode_owner("RNS", B256::ZERO, "rsk", "TokenRegistrar");
        assert_eq!(step.signature, "setSubnodeOwner(bytes32,bytes32,address)");
        assert_eq!(step.args[1], Arg::Bytes32(labelhash("rsk")));
        assert_eq!(step.dependencies(), vec!["RNS", "TokenRegistrar"]);
    }

    #[test]
    fn test_run_has_no_arguments() {
        let step = WiringStep::run("ReverseSetup");
        assert!(step.args.is_empty());
        assert_eq!(step.dependencies(), vec!["ReverseSetup"]);
    }
}
