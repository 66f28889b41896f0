//! The `Vscode` custom resource in all served versions.
//!
//! Two versions are served: [`v1`] and [`v1beta1`]. The latter is the hub
//! (storage) version, and conversions only ever happen along the edges between
//! a version and the hub. Adding a version therefore only requires one pair of
//! conversions instead of one pair per existing version.
//!
//! ```
//! use vscode_crd::{v1, v1beta1};
//!
//! let served = v1::Vscode::new("my-vscode", v1::VscodeSpec::default());
//! let stored: v1beta1::Vscode = served.clone().into();
//! let served_again: v1::Vscode = stored.into();
//!
//! assert_eq!(served, served_again);
//! ```
//!
//! The conversion webhook dispatches [`ConversionReview`]s to
//! [`Vscode::try_convert`].
//!
//! [`ConversionReview`]: kube::core::conversion::ConversionReview
use std::fmt::Display;

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::{CustomResourceExt as _, core::crd::MergeError};
use snafu::Snafu;

mod conversion;
mod review;
pub mod v1;
pub mod v1beta1;

pub use conversion::*;
pub use review::*;

/// The API group of the [`Vscode`] resource.
pub const GROUP: &str = "kubeflow.org";

/// The kind of the [`Vscode`] resource.
pub const KIND: &str = "Vscode";

/// The name of the CustomResourceDefinition, which is also used to build the
/// conversion webhook route.
pub const CRD_NAME: &str = "vscodes.kubeflow.org";

#[derive(Debug, PartialEq, Eq, Snafu)]
#[snafu(display("unknown API version {api_version:?}"))]
pub struct UnknownApiVersionError {
    pub api_version: String,
}

/// A [`Vscode`] object in one of the served versions.
#[derive(Clone, Debug, PartialEq)]
pub enum Vscode {
    V1(v1::Vscode),
    V1Beta1(v1beta1::Vscode),
}

impl Vscode {
    /// Generates a merged CRD containing all versions and marking `stored_apiversion` as stored.
    pub fn merged_crd(
        stored_apiversion: VscodeVersion,
    ) -> Result<CustomResourceDefinition, MergeError> {
        kube::core::crd::merge_crds(Self::crds(), stored_apiversion.as_str())
    }

    /// Returns the CRD of every served version, oldest first.
    pub fn crds() -> Vec<CustomResourceDefinition> {
        vec![v1beta1::Vscode::crd(), v1::Vscode::crd()]
    }

    /// Returns the version this object is currently represented in.
    pub fn version(&self) -> VscodeVersion {
        match self {
            Self::V1(_) => VscodeVersion::V1,
            Self::V1Beta1(_) => VscodeVersion::V1Beta1,
        }
    }

    /// Converts this object into the hub version.
    pub fn into_hub(self) -> v1beta1::Vscode {
        match self {
            Self::V1(vscode) => vscode.into(),
            Self::V1Beta1(vscode) => vscode,
        }
    }

    /// Converts this object into `desired_version`, going through the hub
    /// version if required.
    pub fn into_version(self, desired_version: VscodeVersion) -> Self {
        match desired_version {
            VscodeVersion::V1Beta1 => Self::V1Beta1(self.into_hub()),
            VscodeVersion::V1 => match self {
                Self::V1(vscode) => Self::V1(vscode),
                Self::V1Beta1(vscode) => Self::V1(vscode.into()),
            },
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VscodeVersion {
    V1,
    V1Beta1,
}

impl VscodeVersion {
    /// The storage version of the [`Vscode`] resource.
    pub const HUB: Self = Self::V1Beta1;

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::V1 => "v1",
            Self::V1Beta1 => "v1beta1",
        }
    }

    /// Returns the fully qualified API version, e.g. `kubeflow.org/v1`.
    pub fn api_version(&self) -> String {
        format!("{GROUP}/{version}", version = self.as_str())
    }

    /// Parses a fully qualified API version (`kubeflow.org/v1`) or a bare
    /// version (`v1`).
    pub fn from_api_version(api_version: &str) -> Result<Self, UnknownApiVersionError> {
        let version = api_version
            .strip_prefix(GROUP)
            .and_then(|version| version.strip_prefix('/'))
            .unwrap_or(api_version);

        match version {
            "v1" => Ok(Self::V1),
            "v1beta1" => Ok(Self::V1Beta1),
            _ => UnknownApiVersionSnafu { api_version }.fail(),
        }
    }
}

impl Display for VscodeVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
