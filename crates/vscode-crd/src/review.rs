use std::error::Error as _;

use kube::{
    core::{
        conversion::{ConversionRequest, ConversionResponse, ConversionReview},
        response::{Status, StatusSummary},
    },
};
use serde_json::Value;
use snafu::{ResultExt as _, Snafu, ensure};
use tracing::instrument;

use crate::{KIND, UnknownApiVersionError, Vscode, VscodeVersion};

/// Errors which can be encountered when reading an object sent for conversion.
#[derive(Debug, Snafu)]
pub enum ParseObjectError {
    #[snafu(display("the field {field:?} is not present"))]
    FieldNotPresent { field: String },

    #[snafu(display("the field {field:?} is not a string"))]
    FieldNotStr { field: String },

    #[snafu(display("encountered unexpected object kind {kind:?}, expected {expected:?}"))]
    UnexpectedKind { kind: String, expected: String },

    #[snafu(display("failed to parse object API version"))]
    ParseApiVersion { source: UnknownApiVersionError },

    #[snafu(display("failed to deserialize object from JSON"))]
    Deserialize { source: serde_json::Error },
}

/// Errors which can be encountered when converting the objects of a
/// [`ConversionReview`].
#[derive(Debug, Snafu)]
pub enum ConvertObjectError {
    #[snafu(display("failed to parse object"))]
    Parse { source: ParseObjectError },

    #[snafu(display("failed to serialize object into JSON"))]
    Serialize { source: serde_json::Error },

    #[snafu(display("failed to parse desired API version"))]
    ParseDesiredApiVersion { source: UnknownApiVersionError },
}

impl ConvertObjectError {
    /// Joins the error and its sources using colons.
    pub fn join_errors(&self) -> String {
        let mut message = self.to_string();
        let mut source = self.source();

        while let Some(error) = source {
            message.push_str(": ");
            message.push_str(&error.to_string());
            source = error.source();
        }

        message
    }

    /// Returns the HTTP status code handed back to the API server.
    pub fn http_status_code(&self) -> u16 {
        match self {
            Self::Parse { .. } | Self::ParseDesiredApiVersion { .. } => 400,
            Self::Serialize { .. } => 500,
        }
    }
}

impl Vscode {
    /// Tries to convert a list of objects of kind [`Vscode`] to the desired API version
    /// specified in the [`ConversionReview`].
    ///
    /// The returned [`ConversionReview`] either indicates a success or a failure, which
    /// is handed back to the Kubernetes API server.
    #[instrument(
        skip_all,
        fields(
            k8s.crd.conversion.kind = review.types.kind,
            k8s.crd.conversion.api_version = review.types.api_version,
        )
    )]
    pub fn try_convert(review: ConversionReview) -> ConversionReview {
        // First, turn the review into a conversion request
        let request = match ConversionRequest::from_review(review) {
            Ok(request) => request,
            Err(err) => {
                tracing::warn!(
                    error = &err as &dyn std::error::Error,
                    "received invalid conversion review"
                );

                return ConversionResponse::invalid(Status {
                    status: Some(StatusSummary::Failure),
                    message: err.to_string(),
                    reason: err.to_string(),
                    details: None,
                    metadata: None,
                    code: 400,
                })
                .into_review();
            }
        };

        // Convert all objects into the desired version
        let response = match Self::convert_objects(request.objects, &request.desired_api_version) {
            Ok(converted_objects) => {
                tracing::debug!(
                    k8s.crd.conversion.converted_object_count = converted_objects.len(),
                    k8s.crd.kind = KIND,
                    "successfully converted objects"
                );

                // The response is constructed by hand, because ConversionResponse::for_request
                // would require the request, whose objects have already been moved.
                ConversionResponse {
                    result: Status::success(),
                    types: request.types,
                    uid: request.uid,
                    converted_objects,
                }
            }
            Err(err) => {
                let code = err.http_status_code();
                let message = err.join_errors();

                tracing::warn!(
                    k8s.crd.kind = KIND,
                    code,
                    error = message.as_str(),
                    "failed to convert objects"
                );

                ConversionResponse {
                    result: Status {
                        status: Some(StatusSummary::Failure),
                        message: message.clone(),
                        reason: message,
                        details: None,
                        metadata: None,
                        code,
                    },
                    types: request.types,
                    uid: request.uid,
                    converted_objects: vec![],
                }
            }
        };

        response.into_review()
    }

    #[instrument(skip_all, err)]
    fn convert_objects(
        objects: Vec<Value>,
        desired_api_version: &str,
    ) -> Result<Vec<Value>, ConvertObjectError> {
        let desired_version = VscodeVersion::from_api_version(desired_api_version)
            .context(ParseDesiredApiVersionSnafu)?;

        let mut converted_objects = Vec::with_capacity(objects.len());

        for object in objects {
            let current_object = Self::from_json_value(object.clone()).context(ParseSnafu)?;
            let current_version = current_object.version();

            // The API server should never send objects which are already in the desired
            // version, but if it does, they are passed through untouched.
            if current_version == desired_version {
                converted_objects.push(object);
                continue;
            }

            let desired_object = current_object
                .into_version(desired_version)
                .into_json_value()
                .context(SerializeSnafu)?;

            tracing::trace!(
                k8s.crd.conversion.api_version = current_version.as_str(),
                k8s.crd.conversion.desired_api_version = desired_version.as_str(),
                k8s.crd.kind = KIND,
                "successfully converted object"
            );

            converted_objects.push(desired_object);
        }

        Ok(converted_objects)
    }

    fn from_json_value(value: Value) -> Result<Self, ParseObjectError> {
        let kind = str_field(&value, "kind")?;
        ensure!(kind == KIND, UnexpectedKindSnafu {
            kind,
            expected: KIND
        });

        let api_version = str_field(&value, "apiVersion")?;
        let version = VscodeVersion::from_api_version(api_version).context(ParseApiVersionSnafu)?;

        let object = match version {
            VscodeVersion::V1 => Self::V1(serde_json::from_value(value).context(DeserializeSnafu)?),
            VscodeVersion::V1Beta1 => {
                Self::V1Beta1(serde_json::from_value(value).context(DeserializeSnafu)?)
            }
        };

        Ok(object)
    }

    fn into_json_value(self) -> Result<Value, serde_json::Error> {
        match self {
            Self::V1(vscode) => serde_json::to_value(vscode),
            Self::V1Beta1(vscode) => serde_json::to_value(vscode),
        }
    }
}

fn str_field<'a>(value: &'a Value, field: &str) -> Result<&'a str, ParseObjectError> {
    value
        .get(field)
        .ok_or_else(|| ParseObjectError::FieldNotPresent {
            field: field.to_owned(),
        })?
        .as_str()
        .ok_or_else(|| ParseObjectError::FieldNotStr {
            field: field.to_owned(),
        })
}
