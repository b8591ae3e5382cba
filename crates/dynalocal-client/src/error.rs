//! ---
//! dl_section: "02-database-client"
//! dl_subsection: "module"
//! dl_type: "source"
//! dl_scope: "code"
//! dl_description: "Error taxonomy for DynamoDB client calls."
//! dl_version: "v0.1.0"
//! dl_owner: "tbd"
//! ---
use aws_sdk_dynamodb::config::http::HttpResponse;
use aws_sdk_dynamodb::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use thiserror::Error;

/// Errors returned by [`crate::DynamoClient`] operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The configured endpoint could not be turned into a request URL.
    #[error("invalid endpoint {endpoint}: {reason}")]
    InvalidEndpoint {
        /// Endpoint as configured.
        endpoint: String,
        /// Why it was rejected.
        reason: String,
    },
    /// A table definition could not be expressed as a `CreateTable` request.
    #[error("invalid definition for table `{table}`: {reason}")]
    InvalidDefinition {
        /// Table being defined.
        table: String,
        /// Offending parameter and why.
        reason: String,
    },
    /// The request never produced an HTTP response (refused, reset, timed out).
    #[error("transport failure during {operation}: {reason}")]
    Transport {
        /// DynamoDB operation being invoked.
        operation: &'static str,
        /// Dispatch or timeout failure reported by the SDK.
        reason: String,
    },
    /// The emulator answered with an error document.
    #[error("{operation} rejected with {code} (HTTP {status}): {message}")]
    Service {
        /// DynamoDB operation being invoked.
        operation: &'static str,
        /// HTTP status code.
        status: u16,
        /// Short error code, e.g. `ResourceInUseException`.
        code: String,
        /// Human readable message supplied by the emulator.
        message: String,
    },
    /// A response arrived but could not be decoded, or the request could not be built.
    #[error("unable to complete {operation}: {reason}")]
    Decode {
        /// DynamoDB operation being invoked.
        operation: &'static str,
        /// Decoder error description.
        reason: String,
    },
}

impl ClientError {
    /// Classify an SDK failure. Dispatch failures and timeouts mean nothing
    /// usable answered; everything else came back from a live listener.
    pub(crate) fn from_sdk<E>(operation: &'static str, err: SdkError<E, HttpResponse>) -> Self
    where
        E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    {
        match &err {
            SdkError::DispatchFailure(_) | SdkError::TimeoutError(_) => ClientError::Transport {
                operation,
                reason: DisplayErrorContext(&err).to_string(),
            },
            SdkError::ServiceError(context) => {
                let service = context.err();
                ClientError::Service {
                    operation,
                    status: context.raw().status().as_u16(),
                    code: service.code().unwrap_or("Unknown").to_owned(),
                    message: service.message().unwrap_or_default().to_owned(),
                }
            }
            _ => ClientError::Decode {
                operation,
                reason: DisplayErrorContext(&err).to_string(),
            },
        }
    }

    /// True when the failure means nothing usable is listening at the endpoint.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, ClientError::Transport { .. })
    }

    /// Short service error code, if the emulator returned one.
    pub fn code(&self) -> Option<&str> {
        match self {
            ClientError::Service { code, .. } => Some(code),
            _ => None,
        }
    }
}
