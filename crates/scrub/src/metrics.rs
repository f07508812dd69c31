use crate::stream::LeaveReason;
use chainauth_core::{Error, Result};
use prometheus::{IntCounter, IntCounterVec, Opts, Registry};

#[derive(Clone)]
pub struct ScrubMetrics {
    scrubs: IntCounterVec,
    entitlement_loss: IntCounterVec,
    boots: IntCounter,
}

fn metrics_error(e: prometheus::Error) -> Error {
    Error::metrics(e.to_string())
}

impl ScrubMetrics {
    pub fn new(registry: &Registry) -> Result<Self> {
        let scrubs = IntCounterVec::new(
            Opts::new("chainauth_scrub_total", "Stream scrubs by outcome"),
            &["result"],
        )
        .map_err(metrics_error)?;
        let entitlement_loss = IntCounterVec::new(
            Opts::new(
                "chainauth_scrub_entitlement_loss_total",
                "Members found without entitlement during scrubs",
            ),
            &["reason"],
        )
        .map_err(metrics_error)?;
        let boots = IntCounter::new(
            "chainauth_scrub_boots_total",
            "Members removed from streams by scrubs",
        )
        .map_err(metrics_error)?;

        registry
            .register(Box::new(scrubs.clone()))
            .map_err(metrics_error)?;
        registry
            .register(Box::new(entitlement_loss.clone()))
            .map_err(metrics_error)?;
        registry
            .register(Box::new(boots.clone()))
            .map_err(metrics_error)?;

        Ok(Self {
            scrubs,
            entitlement_loss,
            boots,
        })
    }

    pub(crate) fn scrub_finished(&self, result: &str) {
        self.scrubs.with_label_values(&[result]).inc();
    }

    pub(crate) fn entitlement_lost(&self, reason: LeaveReason) {
        self.entitlement_loss
            .with_label_values(&[reason.as_str()])
            .inc();
    }

    pub(crate) fn booted(&self) {
        self.boots.inc();
    }

    /// Scrubs that ended with `result` (`completed` or `failed`)
    pub fn scrubs(&self, result: &str) -> u64 {
        self.scrubs.with_label_values(&[result]).get()
    }

    pub fn entitlement_losses(&self, reason: LeaveReason) -> u64 {
        self.entitlement_loss
            .with_label_values(&[reason.as_str()])
            .get()
    }

    pub fn boots(&self) -> u64 {
        self.boots.get()
    }
}
