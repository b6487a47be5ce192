//! Physical coordinates of an object on a storage provider.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

/// Kind of storage provider behind a configured provider name.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, sqlx::Type)]
pub enum ProviderType {
    #[serde(rename = "AWS_S3")]
    #[sqlx(rename = "AWS_S3")]
    AwsS3,
    #[serde(rename = "CF_R2")]
    #[sqlx(rename = "CF_R2")]
    CfR2,
    #[serde(rename = "GCP_GCS")]
    #[sqlx(rename = "GCP_GCS")]
    GcpGcs,
    /// Local directory tree, sharded like the on-disk layout of a single node.
    #[serde(rename = "LOCAL_FS")]
    #[sqlx(rename = "LOCAL_FS")]
    LocalFs,
    /// Process-local map. Used for development and tests.
    #[serde(rename = "MEMORY")]
    #[sqlx(rename = "MEMORY")]
    Memory,
}

impl ProviderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderType::AwsS3 => "AWS_S3",
            ProviderType::CfR2 => "CF_R2",
            ProviderType::GcpGcs => "GCP_GCS",
            ProviderType::LocalFs => "LOCAL_FS",
            ProviderType::Memory => "MEMORY",
        }
    }
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the bytes of an object physically live.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug, PartialEq, Eq)]
pub struct ObjectLocation {
    pub provider_type: ProviderType,

    /// Region of the provider (e.g. "us-east-1"). Empty when not applicable.
    pub provider_region: String,

    /// Bucket on the provider side.
    pub provider_bucket: String,

    /// Key inside `provider_bucket`, see [`LogicalAddress::physical_key`].
    ///
    /// [`LogicalAddress::physical_key`]: super::address::LogicalAddress::physical_key
    pub physical_key: String,
}

impl fmt::Display for ObjectLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}://{}/{}",
            self.provider_type, self.provider_bucket, self.physical_key
        )
    }
}
