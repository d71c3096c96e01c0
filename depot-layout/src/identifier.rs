//! Parsing and formatting of model identifiers (§3.1, §4.1).
//!
//! Accepts both the canonical form `{registry}:{publisher}/{modelName}/{artifactName}`
//! and the legacy tri-segment form `provider/modelName:fileName`.

use depot_values::{DepotError, Identifier, Registry};

const WEIGHT_SUFFIXES: &[&str] = &[".gguf", ".ggml", ".bin"];

/// Strip a single trailing weight-file extension, idempotently: `.gguf.gguf` loses
/// only the outer suffix, never both (§9 double-extension bug, §8 property 1).
pub fn remove_weight_extension(name: &str) -> String {
    for suffix in WEIGHT_SUFFIXES {
        if let Some(stripped) = name.strip_suffix(suffix) {
            return stripped.to_string();
        }
    }
    name.to_string()
}

/// Append `.gguf` unless the name already carries a recognized weight extension.
/// Calling this twice in a row is a no-op the second time (§9).
pub fn ensure_gguf_extension(name: &str) -> String {
    if WEIGHT_SUFFIXES.iter().any(|s| name.ends_with(s)) {
        name.to_string()
    } else {
        format!("{name}.gguf")
    }
}

/// Parse a canonical or legacy identifier string.
pub fn parse(s: &str) -> Result<Identifier, DepotError> {
    let colon_idx = s.find(':');
    let slash_idx = s.find('/');

    let is_canonical = match (colon_idx, slash_idx) {
        (Some(c), Some(sl)) => c < sl,
        (Some(_), None) => true,
        (None, _) => false,
    };

    if is_canonical {
        parse_canonical(s)
    } else {
        parse_legacy(s)
    }
}

fn parse_canonical(s: &str) -> Result<Identifier, DepotError> {
    let (registry_str, rest) = s
        .split_once(':')
        .ok_or_else(|| DepotError::InvalidIdentifier(s.to_string()))?;

    let registry: Registry = registry_str
        .parse()
        .map_err(|_| DepotError::InvalidIdentifier(format!("unknown registry '{registry_str}'")))?;

    let parts: Vec<&str> = rest.split('/').collect();
    if parts.len() != 3 || parts.iter().any(|p| p.is_empty()) {
        return Err(DepotError::InvalidIdentifier(s.to_string()));
    }

    Ok(Identifier {
        registry,
        publisher: parts[0].to_string(),
        model_name: parts[1].to_string(),
        artifact_name: remove_weight_extension(parts[2]),
    })
}

fn parse_legacy(s: &str) -> Result<Identifier, DepotError> {
    // provider/modelName:fileName
    let (repo, file_name) = s
        .rsplit_once(':')
        .ok_or_else(|| DepotError::InvalidIdentifier(s.to_string()))?;

    let (publisher, model_name) = repo
        .split_once('/')
        .ok_or_else(|| DepotError::InvalidIdentifier(s.to_string()))?;

    if publisher.is_empty() || model_name.is_empty() || file_name.is_empty() {
        return Err(DepotError::InvalidIdentifier(s.to_string()));
    }

    Ok(Identifier {
        registry: Registry::Hf,
        publisher: publisher.to_string(),
        model_name: model_name.to_string(),
        artifact_name: remove_weight_extension(file_name),
    })
}

/// Format back to the canonical form. `format(parse(id)) == id` for any canonical `id`.
pub fn format(id: &Identifier) -> String {
    id.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use depot_values::Registry;

    #[test]
    fn round_trips_canonical_form() {
        let ids = [
            "hf:meta-llama/Llama-3-8B/Q4_K_M",
            "local:acme/widget/default",
        ];
        for id in ids {
            let parsed = parse(id).unwrap();
            assert_eq!(format(&parsed), id);
        }
    }

    #[test]
    fn parses_legacy_tri_segment_form() {
        let parsed = parse("TheBloke/Llama-2-7B-GGUF:llama-2-7b.Q4_K_M.gguf").unwrap();
        assert_eq!(parsed.registry, Registry::Hf);
        assert_eq!(parsed.publisher, "TheBloke");
        assert_eq!(parsed.model_name, "Llama-2-7B-GGUF");
        assert_eq!(parsed.artifact_name, "llama-2-7b.Q4_K_M");
    }

    #[test]
    fn strips_single_trailing_gguf_not_double() {
        assert_eq!(remove_weight_extension("model.gguf"), "model");
        assert_eq!(remove_weight_extension("model.gguf.gguf"), "model.gguf");
        assert_eq!(remove_weight_extension("model"), "model");
    }

    #[test]
    fn ensure_and_remove_are_idempotent() {
        let once = ensure_gguf_extension("model");
        let twice = ensure_gguf_extension(&once);
        assert_eq!(once, twice);
        assert_eq!(once, "model.gguf");

        let stripped_once = remove_weight_extension("model.gguf");
        let stripped_twice = remove_weight_extension(&stripped_once);
        assert_eq!(stripped_once, stripped_twice);
    }

    #[test]
    fn rejects_malformed_identifiers() {
        assert!(parse("not-an-identifier").is_err());
        assert!(parse("hf:only-one-segment").is_err());
        assert!(parse("hf:a//c").is_err());
    }
}
