//! OCI image metadata types and well-known media types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::digest::Digest;

// Well-known media types.
pub const MEDIA_TYPE_DOCKER_MANIFEST: &str = "application/vnd.docker.distribution.manifest.v2+json";
pub const MEDIA_TYPE_DOCKER_MANIFEST_LIST: &str =
    "application/vnd.docker.distribution.manifest.list.v2+json";
pub const MEDIA_TYPE_OCI_MANIFEST: &str = "application/vnd.oci.image.manifest.v1+json";
pub const MEDIA_TYPE_DOCKER_CONFIG: &str = "application/vnd.docker.container.image.v1+json";
pub const MEDIA_TYPE_OCI_CONFIG: &str = "application/vnd.oci.image.config.v1+json";
pub const MEDIA_TYPE_LAYER_GZIP: &str = "application/vnd.docker.image.rootfs.diff.tar.gzip";
pub const MEDIA_TYPE_LAYER_FOREIGN_GZIP: &str =
    "application/vnd.docker.image.rootfs.foreign.diff.tar.gzip";

/// Version written to the `oci-layout` marker file.
pub const IMAGE_LAYOUT_VERSION: &str = "1.0.0";

/// Annotation marking a layout whose top layer was added in place.
pub const ANNOTATION_LAYER_ADDED: &str = "hydrator.layerAdded";

/// Whether a media type names an image manifest.
#[must_use]
pub fn is_manifest_media_type(media_type: &str) -> bool {
    media_type == MEDIA_TYPE_DOCKER_MANIFEST || media_type == MEDIA_TYPE_OCI_MANIFEST
}

/// Whether a media type names an image config.
#[must_use]
pub fn is_config_media_type(media_type: &str) -> bool {
    media_type == MEDIA_TYPE_DOCKER_CONFIG || media_type == MEDIA_TYPE_OCI_CONFIG
}

/// Whether a media type names a recognized layer blob.
#[must_use]
pub fn is_layer_media_type(media_type: &str) -> bool {
    media_type == MEDIA_TYPE_LAYER_GZIP || media_type == MEDIA_TYPE_LAYER_FOREIGN_GZIP
}

/// Whether a media type names a foreign layer, served from outside the
/// registry.
#[must_use]
pub fn is_foreign_layer_media_type(media_type: &str) -> bool {
    media_type == MEDIA_TYPE_LAYER_FOREIGN_GZIP
}

/// Content descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    /// Media type of the referenced content.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub media_type: String,
    /// Content digest.
    pub digest: Digest,
    /// Content size in bytes.
    #[serde(default)]
    pub size: i64,
    /// Source URLs for content served from outside the registry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urls: Option<Vec<String>>,
    /// Platform the referenced manifest targets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<Platform>,
    /// Arbitrary annotations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<BTreeMap<String, String>>,
}

impl Descriptor {
    /// Creates a descriptor with no URLs, platform, or annotations.
    #[must_use]
    pub fn new(media_type: impl Into<String>, digest: Digest, size: i64) -> Self {
        Self {
            media_type: media_type.into(),
            digest,
            size,
            urls: None,
            platform: None,
            annotations: None,
        }
    }
}

/// Platform a manifest targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Platform {
    /// CPU architecture.
    pub architecture: String,
    /// Operating system.
    pub os: String,
}

impl Platform {
    /// The only platform this tool handles.
    #[must_use]
    pub fn windows_amd64() -> Self {
        Self {
            architecture: "amd64".to_string(),
            os: "windows".to_string(),
        }
    }
}

/// Image manifest, as fetched from registries and stored in the layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// Schema version (always 2 on write).
    #[serde(default)]
    pub schema_version: u32,
    /// Image config descriptor.
    pub config: Descriptor,
    /// Layer descriptors, ordered base to top.
    #[serde(default)]
    pub layers: Vec<Descriptor>,
    /// Manifest annotations; key-sorted and omitted when empty.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

/// Image index: the layout holds exactly one manifest entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Index {
    /// Schema version (always 2 on write).
    #[serde(default)]
    pub schema_version: u32,
    /// Manifest descriptors.
    #[serde(default)]
    pub manifests: Vec<Descriptor>,
}

/// Image configuration. Only the fields this tool validates or regenerates
/// are modeled; anything else in a remote config is ignored on read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageConfig {
    /// CPU architecture.
    pub architecture: String,
    /// Operating system.
    pub os: String,
    /// Root filesystem description.
    pub rootfs: RootFs,
}

impl ImageConfig {
    /// The minimal windows/amd64 config written into the layout.
    #[must_use]
    pub fn minimal(diff_ids: Vec<Digest>) -> Self {
        Self {
            architecture: "amd64".to_string(),
            os: "windows".to_string(),
            rootfs: RootFs {
                fs_type: "layers".to_string(),
                diff_ids,
            },
        }
    }
}

/// Root filesystem specification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RootFs {
    /// Type (must be "layers").
    #[serde(rename = "type")]
    pub fs_type: String,
    /// Digests of the uncompressed layer tars, base to top.
    #[serde(default)]
    pub diff_ids: Vec<Digest>,
}

/// Contents of the `oci-layout` marker file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OciLayout {
    /// Layout format version.
    #[serde(rename = "imageLayoutVersion")]
    pub image_layout_version: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_type_predicates() {
        assert!(is_manifest_media_type(MEDIA_TYPE_DOCKER_MANIFEST));
        assert!(is_manifest_media_type(MEDIA_TYPE_OCI_MANIFEST));
        assert!(!is_manifest_media_type("not-a-manifest"));

        assert!(is_config_media_type(MEDIA_TYPE_DOCKER_CONFIG));
        assert!(is_config_media_type(MEDIA_TYPE_OCI_CONFIG));
        assert!(!is_config_media_type(MEDIA_TYPE_DOCKER_MANIFEST));

        assert!(is_layer_media_type(MEDIA_TYPE_LAYER_GZIP));
        assert!(is_layer_media_type(MEDIA_TYPE_LAYER_FOREIGN_GZIP));
        assert!(!is_layer_media_type("not-a-tar.gz"));

        assert!(is_foreign_layer_media_type(MEDIA_TYPE_LAYER_FOREIGN_GZIP));
        assert!(!is_foreign_layer_media_type(MEDIA_TYPE_LAYER_GZIP));
    }

    #[test]
    fn test_manifest_serialization_omits_empty_annotations() {
        let manifest = Manifest {
            schema_version: 2,
            config: Descriptor::new(MEDIA_TYPE_OCI_CONFIG, Digest::sha256("aa"), 2),
            layers: vec![],
            annotations: BTreeMap::new(),
        };
        let json = serde_json::to_string(&manifest).unwrap();
        assert!(!json.contains("annotations"));
        assert!(json.starts_with("{\"schemaVersion\":2,"));
    }

    #[test]
    fn test_descriptor_serialization_skips_absent_fields() {
        let descriptor = Descriptor::new(MEDIA_TYPE_LAYER_GZIP, Digest::sha256("bb"), 7);
        let json = serde_json::to_string(&descriptor).unwrap();
        assert!(!json.contains("urls"));
        assert!(!json.contains("platform"));
        assert!(!json.contains("annotations"));
    }

    #[test]
    fn test_manifest_parses_registry_response_with_extra_fields() {
        let body = r#"{
            "schemaVersion": 2,
            "mediaType": "application/vnd.docker.distribution.manifest.v2+json",
            "config": {
                "mediaType": "application/vnd.docker.container.image.v1+json",
                "digest": "sha256:aabb",
                "size": 100
            },
            "layers": [{
                "mediaType": "application/vnd.docker.image.rootfs.foreign.diff.tar.gzip",
                "digest": "sha256:ccdd",
                "size": 200,
                "urls": ["https://example.com/layer"]
            }]
        }"#;
        let manifest: Manifest = serde_json::from_str(body).unwrap();
        assert_eq!(manifest.layers.len(), 1);
        assert_eq!(
            manifest.layers[0].urls.as_deref().unwrap(),
            ["https://example.com/layer"]
        );
    }

    #[test]
    fn test_minimal_config_shape() {
        let config = ImageConfig::minimal(vec![Digest::sha256("aa"), Digest::sha256("bb")]);
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(
            json,
            "{\"architecture\":\"amd64\",\"os\":\"windows\",\
             \"rootfs\":{\"type\":\"layers\",\"diff_ids\":[\"sha256:aa\",\"sha256:bb\"]}}"
        );
    }
}
