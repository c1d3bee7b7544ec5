// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subsystem health tracking.
//!
//! Each key is written by exactly one supervisor; readers take a
//! snapshot. The aggregate rule: every singleton subsystem must be
//! healthy, and at least one office worker must be healthy.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;

/// Liveness of a single subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Health {
    Healthy,
    Unhealthy,
}

impl Health {
    pub fn is_healthy(self) -> bool {
        self == Health::Healthy
    }
}

/// Point-in-time copy of the health map, shaped for the health endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthSnapshot {
    pub webserver: Health,
    pub job_queue: Health,
    pub browser: Health,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pandoc: Option<Health>,
    /// Keyed by worker port.
    pub unoservers: BTreeMap<String, Health>,
}

impl HealthSnapshot {
    /// All singleton subsystems healthy AND at least one office worker
    /// healthy.
    pub fn aggregate(&self) -> Health {
        let singletons = self.webserver.is_healthy()
            && self.job_queue.is_healthy()
            && self.browser.is_healthy()
            && self.pandoc.map_or(true, Health::is_healthy);
        let any_office = self.unoservers.values().any(|h| h.is_healthy());
        if singletons && any_office {
            Health::Healthy
        } else {
            Health::Unhealthy
        }
    }
}

/// Shared health map. Cheap to clone; supervisors hold one each.
#[derive(Clone)]
pub struct HealthBoard {
    inner: Arc<RwLock<HealthSnapshot>>,
}

impl HealthBoard {
    /// Every subsystem starts unhealthy until its supervisor reports in.
    pub fn new(markup_configured: bool, office_ports: &[u16]) -> Self {
        let unoservers = office_ports
            .iter()
            .map(|port| (port.to_string(), Health::Unhealthy))
            .collect();
        Self {
            inner: Arc::new(RwLock::new(HealthSnapshot {
                webserver: Health::Unhealthy,
                job_queue: Health::Unhealthy,
                browser: Health::Unhealthy,
                pandoc: markup_configured.then_some(Health::Unhealthy),
                unoservers,
            })),
        }
    }

    pub fn set_webserver(&self, health: Health) {
        self.inner.write().webserver = health;
    }

    pub fn set_job_queue(&self, health: Health) {
        self.inner.write().job_queue = health;
    }

    pub fn set_browser(&self, health: Health) {
        self.inner.write().browser = health;
    }

    /// No-op when markup conversion is not configured.
    pub fn set_pandoc(&self, health: Health) {
        let mut state = self.inner.write();
        if state.pandoc.is_some() {
            state.pandoc = Some(health);
        }
    }

    pub fn set_office_worker(&self, port: u16, health: Health) {
        self.inner
            .write()
            .unoservers
            .insert(port.to_string(), health);
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        self.inner.read().clone()
    }
}

#[cfg(test)]
#[path = "health_tests.rs"]
mod tests;
