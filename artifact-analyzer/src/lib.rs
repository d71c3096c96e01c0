//! Groups hub files into logical artifacts, merging sharded weight files (§4.2).

use depot_values::Artifact;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// One file entry as reported by the hub (path relative to the repo root, size in bytes).
#[derive(Debug, Clone)]
pub struct FileEntry {
    pub path: String,
    pub size: i64,
}

const RECOGNIZED_EXTENSIONS: &[&str] = &[
    "bin",
    "safetensors",
    "gguf",
    "pt",
    "pth",
    "ckpt",
    "model",
];

fn shard_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?P<base>.+?)-(?P<num>\d{5})-of-(?P<total>\d{5})\.(?P<ext>[^.]+)$").unwrap()
    })
}

fn size_category_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(\d+(?:\.\d+)?)b(?:[-_.]|$)").unwrap())
}

fn quant_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(q\d(?:_[a-z0-9]+)*|i?q\d_[a-z0-9]+|fp16|fp32|int4|int8)").unwrap())
}

fn recognized_extension(path: &str) -> Option<&str> {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    let ext = file_name.rsplit_once('.').map(|(_, ext)| ext)?;
    RECOGNIZED_EXTENSIONS
        .iter()
        .copied()
        .find(|candidate| candidate.eq_ignore_ascii_case(ext))
}

fn parse_quantization(name: &str) -> Option<String> {
    quant_regex()
        .captures(name)
        .map(|c| c.get(1).unwrap().as_str().to_string())
}

fn parse_size_category(name: &str) -> Option<String> {
    size_category_regex()
        .captures(name)
        .map(|c| format!("{}b", c.get(1).unwrap().as_str()))
}

/// Group a flat file listing into logical artifacts.
///
/// Unmatched-extension files (e.g. `config.json`) are excluded entirely, not
/// emitted as singleton artifacts. Sharded groups with a gap in their index
/// sequence are still returned — the Downloader rejects them before transfer
/// (§4.2 edge case).
pub fn analyze(files: &[FileEntry]) -> Vec<Artifact> {
    #[derive(Default)]
    struct ShardGroup {
        ext: String,
        shards: Vec<(u32, String, i64)>,
    }

    let mut shard_groups: BTreeMap<(String, String), ShardGroup> = BTreeMap::new();
    let mut singletons: Vec<Artifact> = Vec::new();

    for entry in files {
        let file_name = entry.path.rsplit('/').next().unwrap_or(&entry.path);
        if recognized_extension(&entry.path).is_none() {
            continue;
        }

        if let Some(caps) = shard_regex().captures(file_name) {
            let base = caps["base"].to_string();
            let ext = caps["ext"].to_string();
            let num: u32 = caps["num"].parse().unwrap_or(0);
            let group = shard_groups
                .entry((base.clone(), ext.clone()))
                .or_insert_with(|| ShardGroup { ext: ext.clone(), shards: Vec::new() });
            group.shards.push((num, entry.path.clone(), entry.size));
        } else {
            let ext = recognized_extension(&entry.path).unwrap().to_lowercase();
            let name = strip_known_extension(file_name);
            singletons.push(Artifact {
                name: name.clone(),
                format: ext,
                files: vec![entry.path.clone()],
                total_size: entry.size,
                quantization: parse_quantization(&name),
                size_category: parse_size_category(&name),
            });
        }
    }

    let mut artifacts: Vec<Artifact> = singletons;

    for ((base, _ext), mut group) in shard_groups {
        group.shards.sort_by_key(|(num, _, _)| *num);
        let total_size = group.shards.iter().map(|(_, _, size)| size).sum();
        let files = group.shards.into_iter().map(|(_, path, _)| path).collect();
        artifacts.push(Artifact {
            name: base.clone(),
            format: group.ext,
            files,
            total_size,
            quantization: parse_quantization(&base),
            size_category: parse_size_category(&base),
        });
    }

    artifacts.sort_by(|a, b| a.name.cmp(&b.name));
    artifacts
}

fn strip_known_extension(file_name: &str) -> String {
    file_name
        .rsplit_once('.')
        .map(|(base, _)| base.to_string())
        .unwrap_or_else(|| file_name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(path: &str, size: i64) -> FileEntry {
        FileEntry { path: path.to_string(), size }
    }

    #[test]
    fn groups_shards_in_numeric_order_and_sums_size() {
        let files = vec![
            entry("m-00002-of-00003.gguf", 200),
            entry("m-00001-of-00003.gguf", 100),
            entry("m-00003-of-00003.gguf", 300),
            entry("config.json", 10),
        ];
        let artifacts = analyze(&files);
        assert_eq!(artifacts.len(), 1);
        let a = &artifacts[0];
        assert_eq!(a.name, "m");
        assert_eq!(a.format, "gguf");
        assert_eq!(a.total_size, 600);
        assert_eq!(
            a.files,
            vec![
                "m-00001-of-00003.gguf".to_string(),
                "m-00002-of-00003.gguf".to_string(),
                "m-00003-of-00003.gguf".to_string(),
            ]
        );
    }

    #[test]
    fn unmatched_files_become_singletons() {
        let files = vec![entry("model.safetensors", 42), entry("README.md", 1)];
        let artifacts = analyze(&files);
        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].name, "model");
        assert_eq!(artifacts[0].format, "safetensors");
    }

    #[test]
    fn missing_shard_index_still_yields_an_artifact_with_a_gap() {
        let files = vec![
            entry("m-00001-of-00003.gguf", 100),
            entry("m-00003-of-00003.gguf", 300),
        ];
        let artifacts = analyze(&files);
        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].files.len(), 2);
        assert_eq!(artifacts[0].total_size, 400);
    }

    #[test]
    fn results_are_sorted_by_artifact_name() {
        let files = vec![
            entry("zeta.gguf", 1),
            entry("alpha.gguf", 1),
            entry("mid.gguf", 1),
        ];
        let artifacts = analyze(&files);
        let names: Vec<_> = artifacts.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn parses_quantization_and_size_category() {
        let files = vec![entry("llama-2-7b-Q4_K_M.gguf", 1)];
        let artifacts = analyze(&files);
        assert_eq!(artifacts[0].quantization.as_deref(), Some("Q4_K_M"));
        assert_eq!(artifacts[0].size_category.as_deref(), Some("7b"));
    }
}
