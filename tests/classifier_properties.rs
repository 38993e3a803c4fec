//! Property tests for filename classification, routing and cache keys

use bigdaddyg_bridge::backends::{PRIMARY_MODEL_PREFIX, Provider};
use bigdaddyg_bridge::cache::cache_key;
use bigdaddyg_bridge::catalog::{
    BLOB_NAME_PREFIX, MODEL_EXTENSIONS, discover_candidate_paths, extract_model_name,
    is_model_file,
};
use bigdaddyg_bridge::router::ChatRequest;
use proptest::prelude::*;

proptest! {
    #[test]
    fn known_extension_is_always_a_model(
        stem in "[A-Za-z0-9_-]{1,24}",
        ext_idx in 0..MODEL_EXTENSIONS.len(),
        upper in any::<bool>(),
    ) {
        let ext = MODEL_EXTENSIONS[ext_idx];
        let ext = if upper { ext.to_uppercase() } else { ext.to_string() };
        let filename = format!("{}.{}", stem, ext);
        prop_assert!(is_model_file(&filename));
    }

    #[test]
    fn blob_names_are_deterministic(hash in "[0-9a-f]{16,64}", prefix in "[a-z/]{0,8}") {
        let filename = format!("{}sha256-{}", prefix, hash);
        let first = extract_model_name(&filename);
        let second = extract_model_name(&filename);

        prop_assert_eq!(&first, &second);
        prop_assert!(first.starts_with(BLOB_NAME_PREFIX));
        prop_assert_eq!(first.len(), BLOB_NAME_PREFIX.len() + 16);
        prop_assert!(is_model_file(&filename));
    }

    #[test]
    fn extracted_name_is_never_empty(stem in "[A-Za-z0-9][A-Za-z0-9._-]{0,30}") {
        let name = extract_model_name(&format!("{}.gguf", stem));
        prop_assert!(!name.is_empty());
    }

    #[test]
    fn prefix_routes_to_primary_in_any_case(suffix in "[A-Za-z0-9:._-]{0,20}", mask in any::<u16>()) {
        let prefix: String = PRIMARY_MODEL_PREFIX
            .chars()
            .enumerate()
            .map(|(i, c)| if mask & (1 << i) != 0 { c.to_ascii_uppercase() } else { c })
            .collect();
        let model = format!("{}{}", prefix, suffix);
        prop_assert_eq!(Provider::for_model(&model), Provider::Orchestra);
    }

    #[test]
    fn other_names_route_to_secondary(model in "[ac-z0-9][a-z0-9:._-]{0,20}") {
        prop_assert_eq!(Provider::for_model(&model), Provider::Ollama);
    }

    #[test]
    fn cache_key_ignores_request_id(message in ".{1,64}", id in "[a-z0-9-]{1,36}") {
        let base = ChatRequest::new(message.clone()).with_model("llama3");
        let mut tagged = base.clone();
        tagged.request_id = Some(id);

        let key = cache_key(&base, "llama3");
        prop_assert_eq!(&key, &cache_key(&tagged, "llama3"));
        prop_assert_eq!(key.len(), 64);
        prop_assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn candidate_discovery_only_returns_existing_paths(
        names in proptest::collection::vec("[a-z]{1,8}", 0..6),
    ) {
        let dir = tempfile::tempdir().expect("tempdir");
        let existing = dir.path().join("present");
        std::fs::create_dir(&existing).expect("mkdir");

        let mut candidates: Vec<_> = names.iter().map(|n| dir.path().join("missing").join(n)).collect();
        candidates.push(existing.clone());

        let found = discover_candidate_paths(&candidates);
        prop_assert!(found.iter().all(|p| p.exists()));
        prop_assert!(found.contains(&existing));
    }
}
