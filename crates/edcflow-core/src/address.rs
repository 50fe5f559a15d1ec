//! Data addresses: where a connector fetches data from or deposits it to.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Object-storage type understood by the connector's S3 extension.
pub const DEFAULT_OBJECT_STORE_TYPE: &str = "IonosS3";

/// A tagged description of a data source or sink.
///
/// Immutable once sent: the connector keeps its own copy embedded in the
/// asset (source) or transfer request (destination).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DataAddress {
    /// Plain HTTP endpoint.
    HttpData {
        #[serde(default)]
        name: String,
        base_url: String,
        #[serde(default = "default_proxy_path")]
        proxy_path: bool,
    },

    /// Placeholder for consumer pull; credentials are injected by the connector.
    HttpProxy,

    /// Object-storage bucket.
    ObjectStorage {
        #[serde(default = "default_store_type")]
        store_type: String,
        /// Storage endpoint host.
        storage: String,
        bucket_name: String,
        location: ObjectLocation,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        key_name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        container: Option<String>,
    },
}

/// Position of the data inside a bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectLocation {
    /// Existing blob or folder, used for sources.
    Blob(String),
    /// Target path, used for destinations.
    Path(String),
}

fn default_proxy_path() -> bool {
    true
}

fn default_store_type() -> String {
    DEFAULT_OBJECT_STORE_TYPE.to_string()
}

impl DataAddress {
    /// HTTP source with proxying enabled.
    pub fn http(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        DataAddress::HttpData {
            name: name.into(),
            base_url: base_url.into(),
            proxy_path: true,
        }
    }

    /// Object-storage source reading `blob_name` from `bucket_name`.
    pub fn object_source(
        storage: impl Into<String>,
        bucket_name: impl Into<String>,
        blob_name: impl Into<String>,
    ) -> Self {
        DataAddress::ObjectStorage {
            store_type: default_store_type(),
            storage: storage.into(),
            bucket_name: bucket_name.into(),
            location: ObjectLocation::Blob(blob_name.into()),
            key_name: None,
            name: None,
            container: None,
        }
    }

    /// Object-storage destination writing below `path` in `bucket_name`.
    pub fn object_destination(
        storage: impl Into<String>,
        bucket_name: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        DataAddress::ObjectStorage {
            store_type: default_store_type(),
            storage: storage.into(),
            bucket_name: bucket_name.into(),
            location: ObjectLocation::Path(path.into()),
            key_name: None,
            name: None,
            container: None,
        }
    }

    /// The connector-side type name.
    pub fn type_name(&self) -> &str {
        match self {
            DataAddress::HttpData { .. } => "HttpData",
            DataAddress::HttpProxy => "HttpProxy",
            DataAddress::ObjectStorage { store_type, .. } => store_type,
        }
    }

    /// Transfers into this address leave a scoped credential behind that
    /// must be released with a deprovision call.
    pub fn requires_deprovision(&self) -> bool {
        matches!(self, DataAddress::ObjectStorage { .. })
    }

    /// Unprefixed wire properties.
    pub fn properties(&self) -> Map<String, Value> {
        let mut props = Map::new();
        props.insert("type".into(), Value::from(self.type_name()));

        match self {
            DataAddress::HttpData {
                name,
                base_url,
                proxy_path,
            } => {
                props.insert("name".into(), Value::from(name.as_str()));
                props.insert("baseUrl".into(), Value::from(base_url.as_str()));
                props.insert("proxyPath".into(), Value::from(proxy_path.to_string()));
            }
            DataAddress::HttpProxy => {}
            DataAddress::ObjectStorage {
                storage,
                bucket_name,
                location,
                key_name,
                name,
                container,
                ..
            } => {
                props.insert("storage".into(), Value::from(storage.as_str()));
                props.insert("bucketName".into(), Value::from(bucket_name.as_str()));
                match location {
                    ObjectLocation::Blob(blob) => {
                        props.insert("blobName".into(), Value::from(blob.as_str()))
                    }
                    ObjectLocation::Path(path) => {
                        props.insert("path".into(), Value::from(path.as_str()))
                    }
                };
                let optional = [("keyName", key_name), ("name", name), ("container", container)];
                for (key, value) in optional {
                    if let Some(value) = value {
                        props.insert(key.into(), Value::from(value.as_str()));
                    }
                }
            }
        }

        props
    }

    /// Wire properties with every key qualified by `prefix`.
    pub fn prefixed_properties(&self, prefix: &str) -> Map<String, Value> {
        self.properties()
            .into_iter()
            .map(|(key, value)| (format!("{prefix}{key}"), value))
            .collect()
    }
}
