use std::collections::{BTreeMap, BTreeSet};

use mcp_hub::domain::{
    reconcile::{Choice, apply_choices, reconcile},
    tool::Tool,
};
use proptest::prelude::*;

/// Tool lists with unique names drawn from a small alphabet so that the two
/// sides overlap often.
fn tool_list(tag: &'static str) -> impl Strategy<Value = Vec<Tool>> {
    prop::collection::btree_set("[a-f]{1,2}", 0..8).prop_map(move |names| {
        names
            .into_iter()
            .map(|name| Tool::new(name, tag))
            .collect()
    })
}

proptest! {
    #[test]
    fn merged_list_has_one_tool_per_name(
        existing in tool_list("old"),
        discovered in tool_list("new"),
        picks in prop::collection::vec(any::<bool>(), 8),
    ) {
        let mut result = reconcile(&existing, &discovered);
        let conflict_names: Vec<String> =
            result.conflicts.iter().map(|c| c.name().to_string()).collect();
        let mut expected_choice = BTreeMap::new();
        for (name, pick) in conflict_names.iter().zip(picks.iter().cycle()) {
            let choice = if *pick { Choice::Discovered } else { Choice::Existing };
            result.set_choice(name, choice).unwrap();
            expected_choice.insert(name.clone(), choice);
        }

        let merged = apply_choices(&existing, &result);

        let all: BTreeSet<&str> = existing
            .iter()
            .chain(discovered.iter())
            .map(|t| t.name.as_str())
            .collect();
        let merged_names: Vec<&str> = merged.iter().map(|t| t.name.as_str()).collect();
        let unique: BTreeSet<&str> = merged_names.iter().copied().collect();
        prop_assert_eq!(merged_names.len(), unique.len());
        prop_assert_eq!(unique, all);

        for tool in &merged {
            let in_existing = existing.iter().any(|t| t.name == tool.name);
            let expected = match expected_choice.get(&tool.name) {
                Some(Choice::Discovered) => "new",
                Some(Choice::Existing) => "old",
                None if in_existing => "old",
                None => "new",
            };
            prop_assert_eq!(tool.description.as_str(), expected);
        }
    }

    #[test]
    fn partition_is_complete_and_ordered(
        existing in tool_list("old"),
        discovered in tool_list("new"),
    ) {
        let result = reconcile(&existing, &discovered);
        prop_assert_eq!(result.new_tools.len() + result.conflicts.len(), discovered.len());
        prop_assert!(result.choices().values().all(|c| *c == Choice::Existing));

        let mut rebuilt = result
            .conflicts
            .iter()
            .map(|c| c.discovered.clone())
            .chain(result.new_tools.iter().cloned())
            .collect::<Vec<_>>();
        rebuilt.sort_by(|a, b| a.name.cmp(&b.name));
        prop_assert_eq!(rebuilt, discovered.clone());

        let merged = apply_choices(&existing, &result);
        prop_assert_eq!(&merged[..existing.len()], existing.as_slice());
    }
}
