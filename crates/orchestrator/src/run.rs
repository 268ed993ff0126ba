use chain::{ChainClient, Clock};
use events::{Event, EventBus};
use rns_core::{RegistrationKind, RegistrationNames};
use std::sync::Arc;
use tracing::{error, info};

use crate::artifacts::ArtifactSource;
use crate::auction::{AuctionCoordinator, AuctionReport};
use crate::config::DeployConfig;
use crate::deployer::DeploymentOrchestrator;
use crate::error::Result;
use crate::executor::TransactionExecutor;
use crate::registrar::{RegistrationCoordinator, RegistrationReport};
use crate::report::RunReport;
use crate::suite;

/// One complete deployment: the suite, its wiring, the auction batch and
/// the FIFS registrations.
///
/// Deployment and wiring errors end the run. Auction and registration
/// problems are collected in the returned [`RunReport`].
pub struct DeploymentRun {
    client: Arc<dyn ChainClient>,
    artifacts: Arc<dyn ArtifactSource>,
    clock: Arc<dyn Clock>,
    config: DeployConfig,
    event_bus: Option<EventBus>,
}

impl DeploymentRun {
    pub fn new(
        client: Arc<dyn ChainClient>,
        artifacts: Arc<dyn ArtifactSource>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            client,
            artifacts,
            clock,
            config: DeployConfig::default(),
            event_bus: None,
        }
    }

    pub fn with_config(mut self, config: DeployConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.event_bus = Some(bus);
        self
    }

    pub async fn execute(&self, names: &RegistrationNames) -> Result<RunReport> {
        let result = self.run(names).await;
        if let Err(e) = &result {
            error!(error = %e, "Deployment run failed");
            if let Some(bus) = &self.event_bus {
                bus.emit(Event::Error {
                    message: e.to_string(),
                    context: Some("deployment run".to_string()),
                });
            }
        }
        result
    }

    async fn run(&self, names: &RegistrationNames) -> Result<RunReport> {
        names.validate()?;

        let mut executor = TransactionExecutor::new(self.client.clone());
        if let Some(bus) = &self.event_bus {
            executor = executor.with_event_bus(bus.clone());
        }
        let overrides = self.config.overrides;

        let definitions = suite::load_suite(self.artifacts.as_ref()).await?;
        let mut orchestrator =
            DeploymentOrchestrator::new(executor.clone()).with_overrides(overrides);
        orchestrator.deploy(definitions).await?;
        orchestrator.wire(&suite::core_wiring()).await?;
        info!(modules = orchestrator.manifest().len(), "Suite deployed and wired");

        let auction = if names.auction.is_empty() {
            AuctionReport::not_attempted()
        } else {
            AuctionCoordinator::new(
                executor.clone(),
                self.clock.clone(),
                orchestrator.manifest().clone(),
                self.config.auction.clone(),
                &names.auction,
            )?
            .with_overrides(overrides)
            .run()
            .await
        };
        info!(status = ?auction.status(), "Auction batch done");

        orchestrator.wire(&suite::handover_wiring()).await?;
        let manifest = orchestrator.into_manifest();

        let registrar = RegistrationCoordinator::new(executor, self.clock.clone(), manifest.clone())?
            .with_overrides(overrides)
            .with_duration(self.config.registration_duration)
            .with_commitment_age(self.config.commitment_age);
        let mut registrations = RegistrationReport::default();
        registrations.extend(registrar.register(RegistrationKind::Direct, &names.direct).await);
        registrations.extend(
            registrar
                .register(RegistrationKind::AddressBound, &names.address_bound)
                .await,
        );
        info!(
            registered = registrations.registered().count(),
            failed = registrations.failed().count(),
            "Registrations done"
        );

        Ok(RunReport {
            manifest,
            auction,
            registrations,
        })
    }
}
