use snafu::{Snafu, ensure};

use crate::{Vscode, VscodeVersion, v1, v1beta1};

/// Errors which can be encountered when converting into or from a version
/// handle.
#[derive(Debug, PartialEq, Eq, Snafu)]
pub enum ConvertError {
    #[snafu(display("expected a {expected} object, but got a {found} object"))]
    UnexpectedVersion {
        expected: VscodeVersion,
        found: VscodeVersion,
    },
}

// Both versions currently share the same shape, every field is moved as is.
macro_rules! impl_hub_conversion {
    ($from:ident => $to:ident) => {
        impl From<$from::Vscode> for $to::Vscode {
            fn from(vscode: $from::Vscode) -> Self {
                Self {
                    metadata: vscode.metadata,
                    spec: vscode.spec.into(),
                    status: vscode.status.map(Into::into),
                }
            }
        }

        impl From<&$from::Vscode> for $to::Vscode {
            fn from(vscode: &$from::Vscode) -> Self {
                vscode.clone().into()
            }
        }

        impl From<$from::VscodeSpec> for $to::VscodeSpec {
            fn from(spec: $from::VscodeSpec) -> Self {
                Self {
                    template: $to::VscodeTemplateSpec {
                        spec: spec.template.spec,
                    },
                }
            }
        }

        impl From<$from::VscodeStatus> for $to::VscodeStatus {
            fn from(status: $from::VscodeStatus) -> Self {
                Self {
                    conditions: status.conditions.into_iter().map(Into::into).collect(),
                    ready_replicas: status.ready_replicas,
                    container_state: status.container_state,
                }
            }
        }

        impl From<$from::VscodeCondition> for $to::VscodeCondition {
            fn from(condition: $from::VscodeCondition) -> Self {
                Self {
                    type_: condition.type_,
                    last_probe_time: condition.last_probe_time,
                    reason: condition.reason,
                    message: condition.message,
                }
            }
        }
    };
}

impl_hub_conversion!(v1 => v1beta1);
impl_hub_conversion!(v1beta1 => v1);

/// Converts a served `v1` object up into the hub version without consuming it.
pub fn convert_up(vscode: &v1::Vscode) -> v1beta1::Vscode {
    vscode.into()
}

/// Converts a hub object down into the served `v1` version without consuming it.
pub fn convert_down(vscode: &v1beta1::Vscode) -> v1::Vscode {
    vscode.into()
}

impl v1::Vscode {
    /// Converts `self` into the hub version and writes the result into `dst`.
    ///
    /// `dst` must hold a hub object. Any other version is rejected before
    /// `dst` is touched.
    pub fn convert_to(&self, dst: &mut Vscode) -> Result<(), ConvertError> {
        match dst {
            Vscode::V1Beta1(hub) => {
                *hub = convert_up(self);
                Ok(())
            }
            other => UnexpectedVersionSnafu {
                expected: VscodeVersion::HUB,
                found: other.version(),
            }
            .fail(),
        }
    }

    /// Replaces `self` with the conversion of the hub object held by `src`.
    ///
    /// `src` must hold a hub object, otherwise `self` is left untouched.
    pub fn convert_from(&mut self, src: &Vscode) -> Result<(), ConvertError> {
        let found = src.version();
        ensure!(
            found == VscodeVersion::HUB,
            UnexpectedVersionSnafu {
                expected: VscodeVersion::HUB,
                found,
            }
        );

        if let Vscode::V1Beta1(hub) = src {
            *self = convert_down(hub);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use k8s_openapi::{
        api::core::v1::{
            Container, ContainerState, ContainerStateRunning, ContainerStateWaiting, PodSpec,
        },
        apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time},
    };
    use rstest::{fixture, rstest};

    use super::*;

    fn probe_time(input: &str) -> Time {
        serde_json::from_value(serde_json::Value::String(input.to_owned()))
            .expect("the probe time must be a valid RFC 3339 timestamp")
    }

    fn condition(type_: &str, probed_at: &str, reason: Option<&str>) -> v1::VscodeCondition {
        v1::VscodeCondition {
            type_: type_.to_owned(),
            last_probe_time: Some(probe_time(probed_at)),
            reason: reason.map(ToOwned::to_owned),
            message: reason.map(|reason| format!("container is {reason}")),
        }
    }

    #[fixture]
    fn vscode() -> v1::Vscode {
        v1::Vscode {
            metadata: ObjectMeta {
                name: Some("my-vscode".to_owned()),
                namespace: Some("kubeflow-user".to_owned()),
                ..ObjectMeta::default()
            },
            spec: v1::VscodeSpec {
                template: v1::VscodeTemplateSpec {
                    spec: PodSpec {
                        containers: vec![Container {
                            name: "my-vscode".to_owned(),
                            image: Some("codercom/code-server:4.23.1".to_owned()),
                            ..Container::default()
                        }],
                        service_account_name: Some("default-editor".to_owned()),
                        ..PodSpec::default()
                    },
                },
            },
            status: Some(v1::VscodeStatus {
                // Type values are intentionally not unique
                conditions: vec![
                    condition("Waiting", "2024-03-01T10:00:00Z", Some("ContainerCreating")),
                    condition("Running", "2024-03-01T10:00:30Z", None),
                    condition("Waiting", "2024-03-01T11:15:00Z", Some("CrashLoopBackOff")),
                ],
                ready_replicas: 1,
                container_state: ContainerState {
                    running: Some(ContainerStateRunning {
                        started_at: Some(probe_time("2024-03-01T10:00:30Z")),
                    }),
                    ..ContainerState::default()
                },
            }),
        }
    }

    #[rstest]
    fn round_trip_is_lossless(vscode: v1::Vscode) {
        let hub = convert_up(&vscode);
        let round_tripped = convert_down(&hub);

        assert_eq!(round_tripped, vscode);
    }

    #[rstest]
    fn convert_up_copies_all_fields(vscode: v1::Vscode) {
        let hub = convert_up(&vscode);

        let status = vscode.status.as_ref().expect("fixture has a status");
        let hub_status = hub.status.as_ref().expect("status must be carried over");

        assert_eq!(hub.metadata, vscode.metadata);
        assert_eq!(hub.spec.template.spec, vscode.spec.template.spec);
        assert_eq!(hub_status.ready_replicas, status.ready_replicas);
        assert_eq!(hub_status.container_state, status.container_state);
        assert_eq!(hub_status.conditions.len(), status.conditions.len());

        for (converted, original) in hub_status.conditions.iter().zip(&status.conditions) {
            assert_eq!(converted.type_, original.type_);
            assert_eq!(converted.last_probe_time, original.last_probe_time);
            assert_eq!(converted.reason, original.reason);
            assert_eq!(converted.message, original.message);
        }
    }

    #[rstest]
    fn condition_order_is_preserved(vscode: v1::Vscode) {
        let hub = convert_up(&vscode);

        let reasons: Vec<_> = hub
            .status
            .expect("status must be carried over")
            .conditions
            .into_iter()
            .map(|condition| condition.reason)
            .collect();

        assert_eq!(reasons, vec![
            Some("ContainerCreating".to_owned()),
            None,
            Some("CrashLoopBackOff".to_owned()),
        ]);
    }

    #[rstest]
    fn empty_conditions_stay_empty(mut vscode: v1::Vscode) {
        if let Some(status) = vscode.status.as_mut() {
            status.conditions.clear();
        }

        let hub = convert_up(&vscode);
        let hub_status = hub.status.as_ref().expect("status must be carried over");
        assert!(hub_status.conditions.is_empty());

        let serialized = serde_json::to_value(&hub).expect("hub object must serialize");
        assert_eq!(serialized["status"]["conditions"], serde_json::json!([]));

        assert_eq!(convert_down(&hub), vscode);
    }

    #[rstest]
    fn missing_status_stays_missing(mut vscode: v1::Vscode) {
        vscode.status = None;

        let hub = convert_up(&vscode);
        assert!(hub.status.is_none());
        assert_eq!(convert_down(&hub), vscode);
    }

    #[rstest]
    fn convert_to_writes_hub_handle(vscode: v1::Vscode) {
        let mut dst = Vscode::V1Beta1(v1beta1::Vscode::default());

        vscode
            .convert_to(&mut dst)
            .expect("hub handle must be accepted");

        assert_eq!(dst, Vscode::V1Beta1(convert_up(&vscode)));
    }

    #[rstest]
    fn convert_to_rejects_non_hub_handle(vscode: v1::Vscode) {
        let untouched = v1::Vscode::new("untouched", v1::VscodeSpec::default());
        let mut dst = Vscode::V1(untouched.clone());

        let error = vscode
            .convert_to(&mut dst)
            .expect_err("v1 handle must be rejected");

        assert_eq!(error, ConvertError::UnexpectedVersion {
            expected: VscodeVersion::V1Beta1,
            found: VscodeVersion::V1,
        });
        assert_eq!(dst, Vscode::V1(untouched));
    }

    #[rstest]
    fn convert_from_reads_hub_handle(vscode: v1::Vscode) {
        let src = Vscode::V1Beta1(convert_up(&vscode));
        let mut dst = v1::Vscode::default();

        dst.convert_from(&src).expect("hub handle must be accepted");

        assert_eq!(dst, vscode);
    }

    #[rstest]
    fn convert_from_rejects_non_hub_handle(vscode: v1::Vscode) {
        let src = Vscode::V1(v1::Vscode::default());
        let mut dst = vscode.clone();

        let error = dst
            .convert_from(&src)
            .expect_err("v1 handle must be rejected");

        assert!(matches!(error, ConvertError::UnexpectedVersion {
            found: VscodeVersion::V1,
            ..
        }));
        assert_eq!(dst, vscode);
    }

    #[test]
    fn waiting_container_state_is_carried_down() {
        let hub = v1beta1::Vscode {
            status: Some(v1beta1::VscodeStatus {
                container_state: ContainerState {
                    waiting: Some(ContainerStateWaiting {
                        reason: Some("ImagePullBackOff".to_owned()),
                        message: None,
                    }),
                    ..ContainerState::default()
                },
                ..v1beta1::VscodeStatus::default()
            }),
            ..v1beta1::Vscode::default()
        };

        let served = convert_down(&hub);
        let waiting = served
            .status
            .and_then(|status| status.container_state.waiting)
            .expect("waiting state must be carried over");

        assert_eq!(waiting.reason.as_deref(), Some("ImagePullBackOff"));
    }
}
