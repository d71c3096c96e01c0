//! On-disk path derivation (§3.8, §4.1).
//!
//! `derive_paths` is total and purely textual: it never appends an extra
//! `models/` segment on top of the caller-supplied root (§9, historical bug).

use depot_values::{Identifier, ModelType};
use std::path::{Path, PathBuf};

/// Directory and metadata-file path for one artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub dir: PathBuf,
    pub metadata_path: PathBuf,
}

/// `{models}/{type-dash-case}/{publisher}/{modelName}/`
pub fn derive_paths(models_root: &Path, model_type: ModelType, id: &Identifier) -> ArtifactPaths {
    let dir = models_root
        .join(model_type.dir_segment())
        .join(&id.publisher)
        .join(&id.model_name);
    let metadata_path = dir.join(format!("{}.json", id.artifact_name));
    ArtifactPaths { dir, metadata_path }
}

/// `{models}/.downloads/{urlencoded-modelId}.download`
pub fn download_state_path(models_root: &Path, model_id: &str) -> PathBuf {
    models_root
        .join(".downloads")
        .join(format!("{}.download", percent_encode(model_id)))
}

/// Minimal percent-encoding sufficient for model identifiers (they contain
/// only `:`, `/`, alphanumerics, `-`, `_`, `.`). Avoids pulling in a full
/// URL-encoding crate for this single, narrow use.
fn percent_encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char);
            }
            _ => out.push_str(&format!("%{:02X}", b)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use self::depot_layout_test_support::*;

    #[test]
    fn never_appends_extra_models_segment() {
        let root = Path::new("/data/depot-models");
        let id = sample_identifier();
        let paths = derive_paths(root, ModelType::TextGeneration, &id);
        assert!(paths.dir.starts_with(root));
        assert_eq!(
            paths.dir,
            root.join("text-generation").join("acme").join("widget")
        );
        assert!(!paths.dir.to_string_lossy().contains("models/models"));
    }

    #[test]
    fn metadata_path_is_artifact_name_dot_json() {
        let root = Path::new("/data/depot-models");
        let id = sample_identifier();
        let paths = derive_paths(root, ModelType::TextGeneration, &id);
        assert_eq!(paths.metadata_path.file_name().unwrap(), "q4.json");
    }

    #[test]
    fn download_state_path_percent_encodes_colons_and_slashes() {
        let root = Path::new("/data/depot-models");
        let path = download_state_path(root, "hf:acme/widget/q4");
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("hf%3Aacme%2Fwidget%2Fq4"));
        assert!(name.ends_with(".download"));
    }

    mod depot_layout_test_support {
        use depot_values::{Identifier, Registry};

        pub fn sample_identifier() -> Identifier {
            Identifier {
                registry: Registry::Hf,
                publisher: "acme".to_string(),
                model_name: "widget".to_string(),
                artifact_name: "q4".to_string(),
            }
        }
    }
}
