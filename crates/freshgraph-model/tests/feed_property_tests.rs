use freshgraph_model::{parse_advisory_id, FeedBuild};
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        failure_persistence: None,
        ..ProptestConfig::default()
    })]

    #[test]
    fn advisory_id_accepts_every_rendered_integer(id in any::<i64>(), pad in 0usize..3) {
        let padding = " ".repeat(pad);
        let key = format!("{padding}{id}{padding}");
        prop_assert_eq!(parse_advisory_id(&key), Some(id));
    }

    #[test]
    fn advisory_id_rejects_keys_with_letters(prefix in "[0-9]{0,4}", letter in "[A-Za-z:]", suffix in "[0-9]{0,4}") {
        let key = format!("{prefix}{letter}{suffix}");
        prop_assert_eq!(parse_advisory_id(&key), None);
    }

    #[test]
    fn task_id_is_present_only_for_positive_ids(id in any::<i64>()) {
        let build: FeedBuild = serde_json::from_value(serde_json::json!({ "build_id": id })).unwrap();
        prop_assert_eq!(build.task_id().is_some(), id > 0);
    }
}
