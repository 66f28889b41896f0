//! Access to the workloads (StatefulSets) created by the controller.

use std::{
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use futures::StreamExt as _;
use k8s_openapi::api::apps::v1::StatefulSet;
use kube::{
    Api, Client, ResourceExt as _,
    runtime::{WatchStreamExt as _, reflector, reflector::Store, watcher},
};
use snafu::Snafu;

/// The pod template label linking a StatefulSet back to the Vscode it was created for.
pub const VSCODE_NAME_LABEL: &str = "vscode-name";

#[derive(Debug, Snafu)]
pub enum ListWorkloadsError {
    #[snafu(display("the StatefulSet cache has not completed its initial sync yet"))]
    NotSynced,
}

/// A child workload created by the controller for a single Vscode.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ManagedWorkload {
    pub namespace: String,
    pub name: String,

    /// Value of the [`VSCODE_NAME_LABEL`] pod template label, if present.
    pub owner: Option<String>,
}

impl ManagedWorkload {
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        owner: Option<impl Into<String>>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            owner: owner.map(Into::into),
        }
    }

    /// Returns whether this workload is a live Vscode instance, which is the case when the
    /// owner label matches the workload name. Unrelated StatefulSets in the same namespace
    /// never carry a matching label.
    pub fn is_managed(&self) -> bool {
        self.owner.as_deref() == Some(self.name.as_str())
    }
}

impl From<&StatefulSet> for ManagedWorkload {
    fn from(stateful_set: &StatefulSet) -> Self {
        let owner = stateful_set
            .spec
            .as_ref()
            .and_then(|spec| spec.template.metadata.as_ref())
            .and_then(|metadata| metadata.labels.as_ref())
            .and_then(|labels| labels.get(VSCODE_NAME_LABEL))
            .cloned();

        Self {
            namespace: stateful_set.namespace().unwrap_or_default(),
            name: stateful_set.name_any(),
            owner,
        }
    }
}

/// Read access to the current set of workloads in the cluster.
///
/// Implementations are called on every metrics scrape and must not block for long.
pub trait WorkloadLister: Send + Sync {
    fn list_workloads(&self) -> Result<Vec<ManagedWorkload>, ListWorkloadsError>;
}

/// A cluster-wide, watch-backed cache of StatefulSets.
#[derive(Clone)]
pub struct StatefulSetCache {
    store: Store<StatefulSet>,
    synced: Arc<AtomicBool>,
}

impl StatefulSetCache {
    /// Creates the cache and returns the future driving the underlying watch.
    ///
    /// The cache is empty and reports [`ListWorkloadsError::NotSynced`] until the
    /// returned future has been polled through the initial listing. The caller is
    /// responsible for spawning it.
    pub fn new(client: Client) -> (Self, impl Future<Output = ()> + Send + 'static) {
        let api: Api<StatefulSet> = Api::all(client);
        let (store, writer) = reflector::store();
        let synced = Arc::new(AtomicBool::new(false));

        let reflector = watcher(api, watcher::Config::default())
            .default_backoff()
            .reflect(writer)
            .for_each(|event| {
                if let Err(error) = event {
                    tracing::warn!(
                        error = &error as &dyn std::error::Error,
                        "failed to watch StatefulSets"
                    );
                }

                futures::future::ready(())
            });

        let readiness = {
            let store = store.clone();
            let synced = synced.clone();

            async move {
                if store.wait_until_ready().await.is_ok() {
                    synced.store(true, Ordering::Release);
                    tracing::info!("StatefulSet cache completed initial sync");
                }
            }
        };

        let driver = async move {
            futures::join!(reflector, readiness);
        };

        (Self { store, synced }, driver)
    }
}

impl WorkloadLister for StatefulSetCache {
    fn list_workloads(&self) -> Result<Vec<ManagedWorkload>, ListWorkloadsError> {
        if !self.synced.load(Ordering::Acquire) {
            return NotSyncedSnafu.fail();
        }

        Ok(self
            .store
            .state()
            .iter()
            .map(|stateful_set| ManagedWorkload::from(stateful_set.as_ref()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use k8s_openapi::{
        api::{apps::v1::StatefulSetSpec, core::v1::PodTemplateSpec},
        apimachinery::pkg::apis::meta::v1::ObjectMeta,
    };
    use rstest::rstest;

    use super::*;

    fn stateful_set(namespace: &str, name: &str, label: Option<&str>) -> StatefulSet {
        let labels = label.map(|label| {
            BTreeMap::from([(VSCODE_NAME_LABEL.to_owned(), label.to_owned())])
        });

        StatefulSet {
            metadata: ObjectMeta {
                name: Some(name.to_owned()),
                namespace: Some(namespace.to_owned()),
                ..ObjectMeta::default()
            },
            spec: Some(StatefulSetSpec {
                template: PodTemplateSpec {
                    metadata: Some(ObjectMeta {
                        labels,
                        ..ObjectMeta::default()
                    }),
                    spec: None,
                },
                ..StatefulSetSpec::default()
            }),
            status: None,
        }
    }

    #[rstest]
    #[case::matching_label(Some("foo"), true)]
    #[case::mismatching_label(Some("bar"), false)]
    #[case::missing_label(None, false)]
    fn workload_from_stateful_set(#[case] label: Option<&str>, #[case] managed: bool) {
        let workload = ManagedWorkload::from(&stateful_set("kubeflow-user", "foo", label));

        assert_eq!(workload.namespace, "kubeflow-user");
        assert_eq!(workload.name, "foo");
        assert_eq!(workload.owner.as_deref(), label);
        assert_eq!(workload.is_managed(), managed);
    }

    #[test]
    fn workload_without_spec_is_not_managed() {
        let mut stateful_set = stateful_set("kubeflow-user", "foo", Some("foo"));
        stateful_set.spec = None;

        let workload = ManagedWorkload::from(&stateful_set);
        assert_eq!(workload.owner, None);
        assert!(!workload.is_managed());
    }

    #[test]
    fn label_on_stateful_set_itself_is_ignored() {
        let mut stateful_set = stateful_set("kubeflow-user", "foo", None);
        stateful_set.metadata.labels = Some(BTreeMap::from([(
            VSCODE_NAME_LABEL.to_owned(),
            "foo".to_owned(),
        )]));

        assert!(!ManagedWorkload::from(&stateful_set).is_managed());
    }

    #[test]
    fn cache_lists_only_after_sync() {
        let (store, mut writer) = reflector::store();
        let cache = StatefulSetCache {
            store,
            synced: Arc::new(AtomicBool::new(false)),
        };

        assert!(matches!(
            cache.list_workloads(),
            Err(ListWorkloadsError::NotSynced)
        ));

        writer.apply_watcher_event(&watcher::Event::Apply(stateful_set(
            "kubeflow-user",
            "foo",
            Some("foo"),
        )));
        cache.synced.store(true, Ordering::Release);

        let workloads = cache.list_workloads().expect("a synced cache must list");
        assert_eq!(workloads, vec![ManagedWorkload::new(
            "kubeflow-user",
            "foo",
            Some("foo")
        )]);
    }
}
