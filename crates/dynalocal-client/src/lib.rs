//! ---
//! dl_section: "02-database-client"
//! dl_subsection: "module"
//! dl_type: "source"
//! dl_scope: "code"
//! dl_description: "DynamoDB client used to reconcile and provision tables."
//! dl_version: "v0.1.0"
//! dl_owner: "tbd"
//! ---
//! Wraps `aws-sdk-dynamodb` with settings tailored to a local emulator.
//!
//! Only the three table operations needed to prepare a test environment are
//! exposed, behind the [`TableClient`] trait so callers can substitute fakes.
#![warn(missing_docs)]

mod client;
mod definition;
mod error;

pub use aws_sdk_dynamodb::config::Credentials;
pub use client::{
    ClientSettings, DynamoClient, TableClient, DEFAULT_REGION, FAKE_ACCESS_KEY_ID,
    FAKE_SECRET_ACCESS_KEY,
};
pub use error::ClientError;
