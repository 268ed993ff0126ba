//! First-come-first-served registrations.
//!
//! Each name goes through commit, wait, approve and register. Commitments for
//! a batch are made together and share one clock advance; registrations
//! then run one by one since each approval replaces the previous allowance.

use chain::{CallRequest, Clock, TxOverrides};
use events::Event;
use futures::future::join_all;
use rns_core::{
    full_name, labelhash, node_for_label, Address, Arg, DeploymentManifest, RegistrationKind,
    B256, U256,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::abi;
use crate::error::{OrchestratorError, Result};
use crate::executor::TransactionExecutor;
use crate::suite::{FIFS_ADDR_REGISTRAR, FIFS_REGISTRAR, RIF_TOKEN, RNS};

const MAKE_COMMITMENT: &str = "makeCommitment(bytes32,address,bytes32)";
const COMMIT: &str = "commit(bytes32)";
const PRICE: &str = "price(string,uint256,uint256)";
const APPROVE: &str = "approve(address,uint256)";
const REGISTER: &str = "register(string,address,bytes32,uint256)";
const REGISTER_WITH_ADDR: &str = "register(string,address,bytes32,uint256,address)";
const OWNER: &str = "owner(bytes32)";
const RESOLVER: &str = "resolver(bytes32)";
const ADDR: &str = "addr(bytes32)";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationEntry {
    pub name: String,
    pub kind: RegistrationKind,
    pub owner: Option<Address>,
    /// Resolved address, read back for address-bound names only.
    pub addr: Option<Address>,
    pub error: Option<String>,
}

impl RegistrationEntry {
    fn pending(name: &str, kind: RegistrationKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            owner: None,
            addr: None,
            error: None,
        }
    }

    pub fn is_registered(&self) -> bool {
        self.error.is_none() && self.owner.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationReport {
    pub entries: Vec<RegistrationEntry>,
}

impl RegistrationReport {
    pub fn entry(&self, name: &str) -> Option<&RegistrationEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn registered(&self) -> impl Iterator<Item = &RegistrationEntry> {
        self.entries.iter().filter(|e| e.is_registered())
    }

    pub fn failed(&self) -> impl Iterator<Item = &RegistrationEntry> {
        self.entries.iter().filter(|e| e.error.is_some())
    }

    pub fn extend(&mut self, entries: Vec<RegistrationEntry>) {
        self.entries.extend(entries);
    }
}

pub struct RegistrationCoordinator {
    executor: TransactionExecutor,
    clock: Arc<dyn Clock>,
    manifest: DeploymentManifest,
    overrides: TxOverrides,
    /// Years requested per registration.
    duration: u64,
    commitment_age: Duration,
}

impl RegistrationCoordinator {
    pub fn new(
        executor: TransactionExecutor,
        clock: Arc<dyn Clock>,
        manifest: DeploymentManifest,
    ) -> Result<Self> {
        for module in [RNS, RIF_TOKEN] {
            if !manifest.contains(module) {
                return Err(OrchestratorError::ModuleNotDeployed(module.to_string()));
            }
        }
        Ok(Self {
            executor,
            clock,
            manifest,
            overrides: TxOverrides::default(),
            duration: 1,
            commitment_age: Duration::from_secs(60),
        })
    }

    pub fn with_overrides(mut self, overrides: TxOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn with_duration(mut self, years: u64) -> Self {
        self.duration = years;
        self
    }

    pub fn with_commitment_age(mut self, age: Duration) -> Self {
        self.commitment_age = age;
        self
    }

    fn request(&self, module: &str, signature: &str, args: Vec<Arg>) -> Result<CallRequest> {
        let target = self
            .manifest
            .address(module)
            .ok_or_else(|| OrchestratorError::ModuleNotDeployed(module.to_string()))?;
        let data = abi::encode_call(signature, &args, &self.manifest, self.executor.sender())?;
        Ok(CallRequest::call(target, data))
    }

    async fn send(&self, description: String, request: Result<CallRequest>) -> Result<()> {
        self.executor
            .execute_and_wait(description, request?, self.overrides)
            .await
            .map(|_| ())
    }

    async fn read(&self, request: Result<CallRequest>) -> Result<Vec<u8>> {
        Ok(self.executor.read(request?).await?.to_vec())
    }

    /// Register `names` through the registrar matching `kind`.
    ///
    /// Never fails as a whole: each name ends up registered or carrying the
    /// error that stopped it.
    pub async fn register(&self, kind: RegistrationKind, names: &[String]) -> Vec<RegistrationEntry> {
        let mut entries: Vec<RegistrationEntry> = names
            .iter()
            .map(|name| RegistrationEntry::pending(name, kind))
            .collect();
        if names.is_empty() {
            return entries;
        }

        let registrar = match kind {
            RegistrationKind::Direct => FIFS_REGISTRAR,
            RegistrationKind::AddressBound => FIFS_ADDR_REGISTRAR,
            RegistrationKind::Auction => {
                for entry in &mut entries {
                    self.reject(entry, "auction names are registered by the auction".to_string());
                }
                return entries;
            }
        };

        let secrets: Vec<B256> = names.iter().map(|_| B256::random()).collect();
        let commits = join_all(
            names
                .iter()
                .zip(&secrets)
                .map(|(name, secret)| self.commit(registrar, name, *secret)),
        )
        .await;
        for (entry, result) in entries.iter_mut().zip(commits) {
            if let Err(e) = result {
                self.reject(entry, e.to_string());
            }
        }

        if entries.iter().all(|e| e.error.is_some()) {
            return entries;
        }
        if let Err(e) = self
            .executor
            .advance_clock(self.clock.as_ref(), self.commitment_age)
            .await
        {
            let message = e.to_string();
            for entry in entries.iter_mut().filter(|e| e.error.is_none()) {
                self.reject(entry, message.clone());
            }
            return entries;
        }

        for (entry, secret) in entries.iter_mut().zip(&secrets) {
            if entry.error.is_some() {
                continue;
            }
            match self.complete(kind, registrar, &entry.name, *secret).await {
                Ok((owner, addr)) => {
                    info!(name = %full_name(&entry.name), owner = %owner, "Name registered");
                    self.executor.emit(Event::NameRegistered {
                        name: full_name(&entry.name),
                        owner: owner.to_string(),
                    });
                    entry.owner = Some(owner);
                    entry.addr = addr;
                }
                Err(e) => self.reject(entry, e.to_string()),
            }
        }
        entries
    }

    fn reject(&self, entry: &mut RegistrationEntry, error: String) {
        warn!(name = %full_name(&entry.name), error = %error, "Registration failed");
        self.executor.emit(Event::RegistrationFailed {
            name: full_name(&entry.name),
            error: error.clone(),
        });
        entry.error = Some(error);
    }

    async fn commit(&self, registrar: &str, name: &str, secret: B256) -> Result<()> {
        let commitment = abi::decode_word(
            &self
                .read(self.request(
                    registrar,
                    MAKE_COMMITMENT,
                    vec![Arg::Bytes32(labelhash(name)), Arg::Sender, Arg::Bytes32(secret)],
                ))
                .await?,
        )?;
        self.send(
            format!("commit {}", full_name(name)),
            self.request(registrar, COMMIT, vec![Arg::Bytes32(commitment)]),
        )
        .await
    }

    async fn complete(
        &self,
        kind: RegistrationKind,
        registrar: &str,
        name: &str,
        secret: B256,
    ) -> Result<(Address, Option<Address>)> {
        let duration = Arg::uint(self.duration);
        let price = abi::decode_uint(
            &self
                .read(self.request(
                    registrar,
                    PRICE,
                    vec![Arg::string(name), Arg::Uint(U256::ZERO), duration.clone()],
                ))
                .await?,
        )?;
        self.send(
            format!("approve {} for {}", price, full_name(name)),
            self.request(RIF_TOKEN, APPROVE, vec![Arg::module(registrar), Arg::Uint(price)]),
        )
        .await?;

        let mut args = vec![Arg::string(name), Arg::Sender, Arg::Bytes32(secret), duration];
        let signature = if kind == RegistrationKind::AddressBound {
            args.push(Arg::Sender);
            REGISTER_WITH_ADDR
        } else {
            REGISTER
        };
        self.send(
            format!("register {}", full_name(name)),
            self.request(registrar, signature, args),
        )
        .await?;

        let node = node_for_label(labelhash(name));
        let owner = abi::decode_address(
            &self
                .read(self.request(RNS, OWNER, vec![Arg::Bytes32(node)]))
                .await?,
        )?;
        let addr = if kind == RegistrationKind::AddressBound {
            self.resolve_addr(node).await?
        } else {
            None
        };
        Ok((owner, addr))
    }

    /// Read `addr(node)` from whichever resolver the registry holds for
    /// `node`. `None` when no resolver is set.
    async fn resolve_addr(&self, node: B256) -> Result<Option<Address>> {
        let resolver = abi::decode_address(
            &self
                .read(self.request(RNS, RESOLVER, vec![Arg::Bytes32(node)]))
                .await?,
        )?;
        if resolver == Address::ZERO {
            warn!(node = %node, "Registered name has no resolver");
            return Ok(None);
        }
        let sender = self.executor.sender();
        let data = abi::encode_call(ADDR, &[Arg::Bytes32(node)], &self.manifest, sender)?;
        let addr = abi::decode_address(&self.read(Ok(CallRequest::call(resolver, data))).await?)?;
        Ok(Some(addr))
    }
}
