use chain::{CallRequest, TxOverrides};
use events::Event;
use rns_core::{DeploymentManifest, DeploymentRecord, ModuleDefinition};
use std::collections::HashSet;
use tracing::{debug, info};

use crate::abi;
use crate::error::{OrchestratorError, Result, TransactionError};
use crate::executor::TransactionExecutor;
use crate::linker::ArtifactLinker;
use crate::wiring::WiringStep;

/// Deploys modules in dependency order and wires them together.
///
/// Owns the manifest of the run. Any failure is fatal: the first error is
/// returned and nothing after it is attempted.
pub struct DeploymentOrchestrator {
    executor: TransactionExecutor,
    manifest: DeploymentManifest,
    overrides: TxOverrides,
}

impl DeploymentOrchestrator {
    pub fn new(executor: TransactionExecutor) -> Self {
        Self {
            executor,
            manifest: DeploymentManifest::new(),
            overrides: TxOverrides::default(),
        }
    }

    pub fn with_overrides(mut self, overrides: TxOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn manifest(&self) -> &DeploymentManifest {
        &self.manifest
    }

    pub fn into_manifest(self) -> DeploymentManifest {
        self.manifest
    }

    pub fn executor(&self) -> &TransactionExecutor {
        &self.executor
    }

    /// Order `definitions` so every module follows its dependencies.
    ///
    /// Ties keep input order. Modules already in `deployed` satisfy
    /// dependencies without being part of the plan.
    pub fn plan(
        definitions: &[ModuleDefinition],
        deployed: &DeploymentManifest,
    ) -> Result<Vec<usize>> {
        let mut names = HashSet::new();
        for definition in definitions {
            if !names.insert(definition.name.as_str()) || deployed.contains(&definition.name) {
                return Err(OrchestratorError::Plan(format!(
                    "module {} defined twice",
                    definition.name
                )));
            }
        }
        for definition in definitions {
            if let Some(unknown) = definition
                .dependencies()
                .into_iter()
                .find(|dep| !names.contains(dep) && !deployed.contains(dep))
            {
                return Err(OrchestratorError::Plan(format!(
                    "module {} depends on unknown module {}",
                    definition.name, unknown
                )));
            }
        }

        let mut placed: HashSet<&str> = deployed.names().collect();
        let mut remaining: Vec<usize> = (0..definitions.len()).collect();
        let mut order = Vec::with_capacity(definitions.len());
        while !remaining.is_empty() {
            let ready = remaining.iter().position(|&i| {
                definitions[i]
                    .dependencies()
                    .iter()
                    .all(|dep| placed.contains(dep))
            });
            match ready {
                Some(position) => {
                    let index = remaining.remove(position);
                    placed.insert(definitions[index].name.as_str());
                    order.push(index);
                }
                None => {
                    let cycle: Vec<&str> = remaining
                        .iter()
                        .map(|&i| definitions[i].name.as_str())
                        .collect();
                    return Err(OrchestratorError::Plan(format!(
                        "dependency cycle among {}",
                        cycle.join(", ")
                    )));
                }
            }
        }
        Ok(order)
    }

    /// Deploy `definitions`, recording each address before the next module.
    pub async fn deploy(&mut self, definitions: Vec<ModuleDefinition>) -> Result<&DeploymentManifest> {
        let order = Self::plan(&definitions, &self.manifest)?;
        debug!(modules = order.len(), "Deployment plan ready");

        for index in order {
            self.deploy_module(&definitions[index]).await?;
        }
        Ok(&self.manifest)
    }

    async fn deploy_module(&mut self, definition: &ModuleDefinition) -> Result<()> {
        let name = definition.name.clone();
        info!(module = %name, "Deploying module");
        self.executor.emit(Event::ModuleDeploying {
            module: name.clone(),
        });

        let module = if definition.is_fully_linked() {
            definition.clone()
        } else {
            let linked = ArtifactLinker::link_from_manifest(definition, &self.manifest)?;
            for library in definition.unresolved_libraries() {
                if let Some(address) = linked.linked_address(&library) {
                    self.executor.emit(Event::LibraryLinked {
                        module: name.clone(),
                        library,
                        address: address.to_string(),
                    });
                }
            }
            linked
        };

        let data = abi::encode_creation(&module, &self.manifest, self.executor.sender())?;
        let description = format!("deploy {}", name);
        let receipt = self
            .executor
            .execute_and_wait(description.clone(), CallRequest::create(data), self.overrides)
            .await?;
        let address = receipt.contract_address.ok_or_else(|| {
            OrchestratorError::transaction(
                description,
                TransactionError::MissingContractAddress {
                    tx_hash: receipt.tx_hash,
                },
            )
        })?;

        self.manifest
            .insert(DeploymentRecord::new(name.clone(), address, receipt.tx_hash))?;
        info!(module = %name, address = %address, tx_hash = %receipt.tx_hash, "Module deployed");
        self.executor.emit(Event::ModuleDeployed {
            module: name,
            address: address.to_string(),
            tx_hash: receipt.tx_hash.to_string(),
        });
        Ok(())
    }

    /// Run `steps` one after another against deployed modules.
    pub async fn wire(&self, steps: &[WiringStep]) -> Result<()> {
        for step in steps {
            let target = self
                .manifest
                .address(&step.target)
                .ok_or_else(|| OrchestratorError::ModuleNotDeployed(step.target.clone()))?;
            let data = abi::encode_call(
                &step.signature,
                &step.args,
                &self.manifest,
                self.executor.sender(),
            )?;
            self.executor
                .execute_and_wait(
                    step.description.clone(),
                    CallRequest::call(target, data),
                    self.overrides,
                )
                .await?;

            info!(step = %step.description, "Wiring step completed");
            self.executor.emit(Event::WiringStepCompleted {
                step: step.description.clone(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chain::testing::{FailureRule, FailureStage, MockChain};
    use chain::ChainClient;
    use rns_core::{Arg, B256};
    use std::sync::Arc;

    fn module(name: &str, deps: &[&str]) -> ModuleDefinition {
        let mut payload = vec![0x60];
        payload.extend_from_slice(name.as_bytes());
        ModuleDefinition::new(name, payload)
            .with_constructor(deps.iter().map(|d| Arg::module(*d)).collect())
    }

    fn names(definitions: &[ModuleDefinition], order: &[usize]) -> Vec<String> {
        order.iter().map(|&i| definitions[i].name.clone()).collect()
    }

    fn orchestrator(chain: &MockChain) -> DeploymentOrchestrator {
        DeploymentOrchestrator::new(TransactionExecutor::new(Arc::new(chain.clone())))
    }

    #[test]
    fn test_plan_is_stable_topological_order() {
        let definitions = vec![
            module("PublicResolver", &["RNS"]),
            module("RNS", &[]),
            module("NamePrice", &[]),
            module("MultiChainResolver", &["RNS", "PublicResolver"]),
        ];
        let order = DeploymentOrchestrator::plan(&definitions, &DeploymentManifest::new()).unwrap();
        assert_eq!(
            names(&definitions, &order),
            vec!["RNS", "PublicResolver", "NamePrice", "MultiChainResolver"]
        );
    }

    #[test]
    fn test_plan_rejects_cycles_unknown_and_duplicates() {
        let empty = DeploymentManifest::new();

        let cycle = vec![module("A", &["B"]), module("B", &["A"])];
        let err = DeploymentOrchestrator::plan(&cycle, &empty).unwrap_err();
        assert!(err.to_string().contains("cycle"));

        let unknown = vec![module("A", &["Missing"])];
        let err = DeploymentOrchestrator::plan(&unknown, &empty).unwrap_err();
        assert!(err.to_string().contains("unknown module Missing"));

        let duplicate = vec![module("A", &[]), module("A", &[])];
        let err = DeploymentOrchestrator::plan(&duplicate, &empty).unwrap_err();
        assert!(matches!(err, OrchestratorError::Plan(_)));
    }

    #[test]
    fn test_library_dependencies_order_the_plan() {
        let definitions = vec![
            ModuleDefinition::new("Renewer", vec![0u8; 24])
                .declare_library("BytesUtils", 1)
                .with_link_slot("BytesUtils", 2),
            module("BytesUtils", &[]),
        ];
        let order = DeploymentOrchestrator::plan(&definitions, &DeploymentManifest::new()).unwrap();
        assert_eq!(names(&definitions, &order), vec!["BytesUtils", "Renewer"]);
    }

    #[tokio::test]
    async fn test_deploy_records_dependencies_first() {
        let chain = MockChain::new();
        let mut orchestrator = orchestrator(&chain);
        let manifest = orchestrator
            .deploy(vec![module("PublicResolver", &["RNS"]), module("RNS", &[])])
            .await
            .unwrap();

        let names: Vec<&str> = manifest.names().collect();
        assert_eq!(names, vec!["RNS", "PublicResolver"]);
        assert_eq!(manifest.address("RNS"), Some(chain.sender().create(0)));

        // The resolver's constructor carries the registry address.
        let creation = &chain.transactions()[1];
        let rns = chain.sender().create(0);
        assert!(creation.data.ends_with(rns.into_word().as_slice()));
    }

    #[tokio::test]
    async fn test_deploy_links_libraries() {
        let chain = MockChain::new();
        let mut orchestrator = orchestrator(&chain);
        let renewer = ModuleDefinition::new("Renewer", vec![0xaa; 30])
            .declare_library("BytesUtils", 1)
            .with_link_slot("BytesUtils", 5);
        orchestrator
            .deploy(vec![renewer, module("BytesUtils", &[])])
            .await
            .unwrap();

        let library = orchestrator.manifest().address("BytesUtils").unwrap();
        let creation = &chain.transactions()[1];
        assert_eq!(&creation.data[5..25], library.as_slice());
    }

    #[tokio::test]
    async fn test_first_failure_halts_deployment() {
        let chain = MockChain::new();
        chain.fail(FailureRule::creation(FailureStage::Receipt, b"\x60Broken".to_vec()));
        let mut orchestrator = orchestrator(&chain);

        let err = orchestrator
            .deploy(vec![
                module("RNS", &[]),
                module("Broken", &["RNS"]),
                module("After", &["RNS"]),
            ])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            OrchestratorError::Transaction {
                source: TransactionError::Reverted { .. },
                ..
            }
        ));
        assert_eq!(orchestrator.manifest().len(), 1);
        assert_eq!(chain.creations(), 2);
    }

    #[tokio::test]
    async fn test_wire_runs_steps_in_order() {
        let chain = MockChain::new();
        let mut orchestrator = orchestrator(&chain);
        orchestrator
            .deploy(vec![module("RNS", &[]), module("TokenRegistrar", &["RNS"])])
            .await
            .unwrap();

        orchestrator
            .wire(&[WiringStep::set_subnode_owner(
                "RNS",
                B256::ZERO,
                "rsk",
                "TokenRegistrar",
            )])
            .await
            .unwrap();
        assert_eq!(
            chain.owner_of(rns_core::namehash("rsk")),
            orchestrator.manifest().address("TokenRegistrar")
        );
    }

    #[tokio::test]
    async fn test_wire_against_missing_module_fails() {
        let chain = MockChain::new();
        let orchestrator = orchestrator(&chain);
        let err = orchestrator
            .wire(&[WiringStep::run("ReverseSetup")])
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::ModuleNotDeployed(ref m) if m == "ReverseSetup"));
        assert!(chain.transactions().is_empty());
    }
}
