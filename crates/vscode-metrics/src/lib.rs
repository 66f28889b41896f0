//! Prometheus metrics for the Vscode controller.
//!
//! [`VscodeMetrics`] is a pull-based [`Collector`][prometheus::core::Collector]. On every
//! scrape it lists the StatefulSets created by the controller through a [`WorkloadLister`]
//! and republishes the number of running Vscode instances per namespace. Next to this gauge
//! it carries counters which are incremented by the controller as it creates and culls
//! Vscode instances.
//!
//! The collector is registered explicitly with a [`Registry`][prometheus::Registry]:
//!
//! ```no_run
//! # async fn run(client: kube::Client) -> Result<(), vscode_metrics::Error> {
//! use std::sync::Arc;
//!
//! use prometheus::Registry;
//! use vscode_metrics::{StatefulSetCache, VscodeMetrics};
//!
//! let (cache, cache_driver) = StatefulSetCache::new(client);
//! tokio::spawn(cache_driver);
//!
//! let registry = Registry::new();
//! let metrics = VscodeMetrics::new(Arc::new(cache))?;
//! metrics.register(&registry)?;
//!
//! metrics.record_creation("kubeflow-user");
//! # Ok(())
//! # }
//! ```
mod collector;
mod workload;

pub use collector::*;
pub use workload::*;
