// src/pipeline/engine.rs

//! Check-cycle engine.
//!
//! The engine is the single long-lived owner of the module registry, the
//! delivery ledger and the portal session. Registry and ledger mutations
//! all go through it, so wrapping it in one lock serializes them.
//! Both documents are re-read at the start of every cycle and before
//! every registry change, so edits made by other processes sharing the
//! data directory are picked up.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};

use crate::error::{AppError, Result};
use crate::models::{Config, Destination, Module};
use crate::pipeline::schedule::StopSignal;
use crate::services::{AuthSession, Channel, ChangeMonitor, DeliveryOutcome, Dispatcher};
use crate::storage::{DeliveryLedger, LocalStorage, ModuleRegistry};

/// Message sent to the admin chat when a scheduled cycle cannot log in.
pub const LOGIN_FAILURE_NOTICE: &str = "❌ Scheduled check failed: Login error";

/// What started a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Manual,
    Scheduled,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Manual => f.write_str("manual"),
            Self::Scheduled => f.write_str("scheduled"),
        }
    }
}

/// Summary of one check cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    pub modules_checked: usize,
    pub modules_failed: usize,
    pub delivered: usize,
    pub failed: usize,
    pub deferred: usize,
    /// The cycle ended early because a stop was requested
    pub stopped: bool,
}

impl CycleReport {
    fn begin() -> Self {
        let now = Local::now();
        Self {
            started_at: now,
            finished_at: now,
            modules_checked: 0,
            modules_failed: 0,
            delivered: 0,
            failed: 0,
            deferred: 0,
            stopped: false,
        }
    }

    fn count(&mut self, outcome: DeliveryOutcome) {
        match outcome {
            DeliveryOutcome::Delivered => self.delivered += 1,
            DeliveryOutcome::Failed => self.failed += 1,
            DeliveryOutcome::Deferred => self.deferred += 1,
        }
    }
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} modules checked ({} failed), {} delivered, {} failed, {} deferred in {}s",
            self.modules_checked,
            self.modules_failed,
            self.delivered,
            self.failed,
            self.deferred,
            (self.finished_at - self.started_at).num_seconds()
        )?;
        if self.stopped {
            f.write_str(" (stopped early)")?;
        }
        Ok(())
    }
}

/// Owns all monitor state and runs check cycles.
pub struct Engine {
    config: Arc<Config>,
    storage: LocalStorage,
    session: AuthSession,
    monitor: ChangeMonitor,
    dispatcher: Dispatcher,
    registry: ModuleRegistry,
    ledger: DeliveryLedger,
}

impl Engine {
    /// Open the engine over the configured data directory.
    pub async fn open(config: Arc<Config>, channel: Arc<dyn Channel>) -> Result<Self> {
        let storage = LocalStorage::new(&config.paths.data_dir);
        Self::with_storage(config, storage, channel).await
    }

    pub async fn with_storage(
        config: Arc<Config>,
        storage: LocalStorage,
        channel: Arc<dyn Channel>,
    ) -> Result<Self> {
        let registry = ModuleRegistry::load(&storage).await;
        let ledger = DeliveryLedger::load(&storage).await;
        let session = AuthSession::open(Arc::clone(&config), storage.clone()).await?;

        log::info!(
            "Engine ready: {} modules registered, data in {:?}",
            registry.len(),
            storage.root()
        );

        Ok(Self {
            monitor: ChangeMonitor::new(Arc::clone(&config)),
            dispatcher: Dispatcher::new(Arc::clone(&config), channel),
            config,
            storage,
            session,
            registry,
            ledger,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn session(&self) -> &AuthSession {
        &self.session
    }

    pub fn ledger(&self) -> &DeliveryLedger {
        &self.ledger
    }

    /// Registered modules, ordered by id.
    pub fn modules(&self) -> Vec<Module> {
        self.registry.modules()
    }

    /// Register (or replace) a module and persist the registry.
    ///
    /// Returns the module that was replaced, if any.
    pub async fn register_module(
        &mut self,
        id: &str,
        name: &str,
        url: &str,
        destination: Destination,
    ) -> Result<Option<Module>> {
        if id.trim().is_empty() {
            return Err(AppError::validation("module id is empty"));
        }
        url::Url::parse(url).map_err(|e| AppError::validation(format!("module url: {e}")))?;
        self.reload().await;

        let previous = self
            .registry
            .register(Module::new(id, name, url, destination));
        self.ledger.ensure(id, &destination);

        self.registry.save(&self.storage).await?;
        self.ledger.save(&self.storage).await?;
        log::info!("Registered module {} ({}) -> {}", id, name, destination);
        Ok(previous)
    }

    /// Stop monitoring a module, optionally dropping its delivery history.
    pub async fn remove_module(&mut self, id: &str, purge_history: bool) -> Result<Option<Module>> {
        self.reload().await;
        let Some(removed) = self.registry.remove(id) else {
            return Ok(None);
        };
        self.registry.save(&self.storage).await?;

        if purge_history && self.ledger.purge_module(id) {
            self.ledger.save(&self.storage).await?;
        }
        log::info!("Removed module {} ({})", id, removed.name);
        Ok(Some(removed))
    }

    /// Log in once and report the result.
    pub async fn test_login(&self) -> Result<()> {
        self.session.login().await
    }

    /// Run one full check cycle.
    ///
    /// Fails only when the portal session cannot be established; module
    /// and delivery problems are logged and counted in the report.
    pub async fn run_cycle(&mut self, trigger: Trigger, stop: &StopSignal) -> Result<CycleReport> {
        log::info!("Starting {} check cycle", trigger);
        let mut report = CycleReport::begin();
        self.reload().await;

        if let Err(e) = self.authenticate().await {
            log::error!("Check cycle aborted: {}", e);
            if trigger == Trigger::Scheduled {
                self.notify_admin(LOGIN_FAILURE_NOTICE).await;
            }
            return Err(e);
        }

        let delivery = self.config.delivery.clone();
        let send_delay = Duration::from_secs(delivery.send_delay_secs);
        let module_delay = Duration::from_secs(delivery.module_delay_secs);

        for module in self.registry.modules() {
            if stop.is_stopped() {
                report.stopped = true;
                break;
            }

            self.ledger.ensure(&module.id, &module.destination);
            let found = match self
                .monitor
                .check_module(&self.session, &module, &self.ledger)
                .await
            {
                Ok(found) => found,
                Err(e) => {
                    log::error!("Skipping module {} ({}): {}", module.id, module.name, e);
                    report.modules_failed += 1;
                    continue;
                }
            };
            report.modules_checked += 1;

            for descriptor in &found {
                if stop.is_stopped() {
                    report.stopped = true;
                    break;
                }
                let outcome = self
                    .dispatcher
                    .deliver(&self.session, &module.destination, descriptor)
                    .await;
                report.count(outcome);
                if outcome.is_terminal() {
                    self.ledger
                        .record(&module.id, &module.destination, &descriptor.source_url);
                }
                tokio::time::sleep(send_delay).await;
            }

            self.flush().await;
            if report.stopped {
                break;
            }
            tokio::time::sleep(module_delay).await;
        }

        self.flush().await;
        if let Err(e) = self.session.save_cookies().await {
            log::warn!("Could not persist session cookies: {}", e);
        }

        report.finished_at = Local::now();
        log::info!("Check cycle finished: {}", report);
        Ok(report)
    }

    /// Persist pending ledger changes. Failures are logged and retried on
    /// the next flush.
    pub async fn flush(&mut self) {
        if !self.ledger.is_dirty() {
            return;
        }
        if let Err(e) = self.ledger.save(&self.storage).await {
            log::error!("Failed to persist delivery ledger: {}", e);
        }
    }

    /// Pick up registry and ledger changes written by other processes.
    async fn reload(&mut self) {
        self.registry.refresh(&self.storage).await;
        self.ledger.refresh(&self.storage).await;
    }

    /// Make sure the session is usable, logging in if needed.
    async fn authenticate(&self) -> Result<()> {
        match self
            .session
            .fetch_authenticated(&self.config.portal.base_url)
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if e.is_auth() => Err(e),
            Err(e) => Err(AppError::auth(format!("portal unreachable: {e}"))),
        }
    }

    async fn notify_admin(&self, text: &str) {
        let Some(admin) = self.config.telegram.admin_chat else {
            log::debug!("No admin chat configured; failure notice not sent");
            return;
        };
        if let Err(e) = self.dispatcher.notify(&admin, text).await {
            log::error!("Error sending failure notification: {}", e);
        }
    }
}
