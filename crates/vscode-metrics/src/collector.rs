use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, PoisonError},
};

use prometheus::{
    GaugeVec, IntCounterVec, IntGaugeVec, Opts, Registry,
    core::{Collector, Desc},
    proto::MetricFamily,
};
use snafu::{ResultExt as _, Snafu};

use crate::workload::{ManagedWorkload, WorkloadLister};

pub const RUNNING_VSCODES: &str = "vscode_running";
pub const VSCODE_CREATION: &str = "vscode_create_total";
pub const VSCODE_FAILED_CREATION: &str = "vscode_create_failed_total";
pub const VSCODE_CULLING_COUNT: &str = "vscode_culling_total";
pub const VSCODE_CULLING_TIMESTAMP: &str = "last_vscode_culling_timestamp_seconds";

const NAMESPACE_LABEL: &str = "namespace";
const NAME_LABEL: &str = "name";

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to create metric {name:?}"))]
    CreateMetric {
        source: prometheus::Error,
        name: &'static str,
    },

    #[snafu(display("failed to register vscode metrics collector"))]
    RegisterCollector { source: prometheus::Error },
}

/// Metrics about the Vscode workloads managed by the controller.
///
/// The running gauge is recomputed from the [`WorkloadLister`] on every scrape. The counters
/// are only ever incremented by controller code through the `record_*` functions and are
/// read, but never recomputed, by a scrape.
///
/// The struct is cheap to clone. All clones share the same underlying metrics, which makes it
/// possible to hand one clone to the [`Registry`] and keep others around in the controller.
#[derive(Clone)]
pub struct VscodeMetrics {
    lister: Arc<dyn WorkloadLister>,

    running_vscodes: IntGaugeVec,
    creation: IntCounterVec,
    failed_creation: IntCounterVec,
    culling_count: IntCounterVec,
    culling_timestamp: GaugeVec,

    /// Running gauge values as written by the last successful scrape, keyed by namespace.
    /// The lock is held for a whole scrape, listing included, so scrapes never interleave.
    exported_running: Arc<Mutex<BTreeMap<String, i64>>>,
}

impl VscodeMetrics {
    pub fn new(lister: Arc<dyn WorkloadLister>) -> Result<Self, Error> {
        let running_vscodes = IntGaugeVec::new(
            Opts::new(RUNNING_VSCODES, "Current running vscodes in the cluster"),
            &[NAMESPACE_LABEL],
        )
        .context(CreateMetricSnafu {
            name: RUNNING_VSCODES,
        })?;

        let creation = IntCounterVec::new(
            Opts::new(VSCODE_CREATION, "Total times of creating vscodes"),
            &[NAMESPACE_LABEL],
        )
        .context(CreateMetricSnafu {
            name: VSCODE_CREATION,
        })?;

        let failed_creation = IntCounterVec::new(
            Opts::new(
                VSCODE_FAILED_CREATION,
                "Total failure times of creating vscodes",
            ),
            &[NAMESPACE_LABEL],
        )
        .context(CreateMetricSnafu {
            name: VSCODE_FAILED_CREATION,
        })?;

        let culling_count = IntCounterVec::new(
            Opts::new(VSCODE_CULLING_COUNT, "Total times of culling vscodes"),
            &[NAMESPACE_LABEL, NAME_LABEL],
        )
        .context(CreateMetricSnafu {
            name: VSCODE_CULLING_COUNT,
        })?;

        let culling_timestamp = GaugeVec::new(
            Opts::new(
                VSCODE_CULLING_TIMESTAMP,
                "Timestamp of the last vscode culling in seconds",
            ),
            &[NAMESPACE_LABEL, NAME_LABEL],
        )
        .context(CreateMetricSnafu {
            name: VSCODE_CULLING_TIMESTAMP,
        })?;

        Ok(Self {
            lister,
            running_vscodes,
            creation,
            failed_creation,
            culling_count,
            culling_timestamp,
            exported_running: Arc::default(),
        })
    }

    /// Registers the collector with `registry`. This must only be done once per registry.
    pub fn register(&self, registry: &Registry) -> Result<(), Error> {
        registry
            .register(Box::new(self.clone()))
            .context(RegisterCollectorSnafu)
    }

    /// Records an attempt to create the workload of a Vscode in `namespace`.
    pub fn record_creation(&self, namespace: &str) {
        self.creation.with_label_values(&[namespace]).inc();
    }

    /// Records a failed attempt to create the workload of a Vscode in `namespace`.
    pub fn record_failed_creation(&self, namespace: &str) {
        self.failed_creation.with_label_values(&[namespace]).inc();
    }

    /// Records that the Vscode `name` in `namespace` was culled because it was idle.
    pub fn record_culling(&self, namespace: &str, name: &str) {
        self.culling_count
            .with_label_values(&[namespace, name])
            .inc();
        self.culling_timestamp
            .with_label_values(&[namespace, name])
            .set(jiff::Timestamp::now().as_second() as f64);
    }

    /// Recomputes the running gauge from the current set of workloads.
    ///
    /// If listing fails, the gauge keeps the values of the last successful scrape. A namespace
    /// without running instances is set to zero by the first scrape that misses it and its
    /// label set is removed by the next one, so deleted namespaces do not linger.
    fn scrape(&self) {
        let mut exported_running = self
            .exported_running
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let workloads = match self.lister.list_workloads() {
            Ok(workloads) => workloads,
            Err(error) => {
                tracing::warn!(
                    error = &error as &dyn std::error::Error,
                    "failed to list workloads, keeping previous running vscode values"
                );
                return;
            }
        };

        let running = count_running(&workloads);

        exported_running.retain(|namespace, count| {
            if running.contains_key(namespace) {
                return true;
            }

            if *count == 0 {
                if let Err(error) = self
                    .running_vscodes
                    .remove_label_values(&[namespace.as_str()])
                {
                    tracing::debug!(
                        error = &error as &dyn std::error::Error,
                        namespace = namespace.as_str(),
                        "running vscode gauge was already removed"
                    );
                }
                return false;
            }

            self.running_vscodes
                .with_label_values(&[namespace.as_str()])
                .set(0);
            *count = 0;
            true
        });

        for (namespace, count) in &running {
            self.running_vscodes
                .with_label_values(&[namespace.as_str()])
                .set(*count);
        }

        tracing::debug!(
            namespaces = running.len(),
            workloads = workloads.len(),
            "scraped running vscodes"
        );

        exported_running.extend(running);
    }
}

impl Collector for VscodeMetrics {
    fn desc(&self) -> Vec<&Desc> {
        let mut descs = self.running_vscodes.desc();
        descs.extend(self.creation.desc());
        descs.extend(self.failed_creation.desc());
        descs.extend(self.culling_count.desc());
        descs.extend(self.culling_timestamp.desc());
        descs
    }

    fn collect(&self) -> Vec<MetricFamily> {
        self.scrape();

        let mut families = self.running_vscodes.collect();
        families.extend(self.creation.collect());
        families.extend(self.failed_creation.collect());
        families.extend(self.culling_count.collect());
        families.extend(self.culling_timestamp.collect());
        families
    }
}

/// Counts the managed workloads per namespace.
fn count_running(workloads: &[ManagedWorkload]) -> BTreeMap<String, i64> {
    workloads
        .iter()
        .filter(|workload| workload.is_managed())
        .fold(BTreeMap::new(), |mut running, workload| {
            *running.entry(workload.namespace.clone()).or_default() += 1;
            running
        })
}
