use proptest::prelude::*;
use std::collections::HashSet;
use stepflow_model::{collect_uuids, count_steps, extract_nested_steps, Step};
use stepflow_store::{DocumentStore, IntegrationStore, StoreConfig};
use stepflow_test_utils::{arb_document, arb_step};

#[derive(Debug, Clone)]
enum Mutation {
    Append(Step),
    Prepend(usize, Step),
    Insert(usize, Step),
    Replace(Option<usize>, Step),
    Delete(usize),
    Clear,
    Undo,
    Redo,
}

fn arb_mutation() -> impl Strategy<Value = Mutation> {
    prop_oneof![
        arb_step().prop_map(Mutation::Append),
        (any::<usize>(), arb_step()).prop_map(|(i, s)| Mutation::Prepend(i, s)),
        (any::<usize>(), arb_step()).prop_map(|(i, s)| Mutation::Insert(i, s)),
        (proptest::option::of(any::<usize>()), arb_step()).prop_map(|(i, s)| Mutation::Replace(i, s)),
        any::<usize>().prop_map(Mutation::Delete),
        Just(Mutation::Clear),
        Just(Mutation::Undo),
        Just(Mutation::Redo),
    ]
}

fn apply(store: &DocumentStore, mutation: Mutation) {
    let len = store.steps().len();
    let result = match mutation {
        Mutation::Append(step) => store.append_step(step),
        Mutation::Prepend(i, step) => store.prepend_step(i % (len + 1), step),
        Mutation::Insert(i, step) => store.insert_step(step, i % (len + 1)),
        Mutation::Replace(Some(i), step) if len > 0 => store.replace_step(step, Some(i % len)),
        Mutation::Replace(_, step) => store.replace_step(step, None),
        Mutation::Delete(i) if len > 0 => store.delete_step(i % len),
        Mutation::Delete(_) | Mutation::Clear => store.delete_steps(),
        Mutation::Undo => {
            store.undo();
            Ok(())
        }
        Mutation::Redo => {
            store.redo();
            Ok(())
        }
    };
    result.unwrap();
}

proptest! {
    #[test]
    fn prop_uuids_unique_after_every_mutation(
        mutations in proptest::collection::vec(arb_mutation(), 1..20)
    ) {
        let store = DocumentStore::new();
        for mutation in mutations {
            apply(&store, mutation);
            let uuids = collect_uuids(&store.steps());
            let unique: HashSet<_> = uuids.iter().collect();
            prop_assert_eq!(unique.len(), uuids.len());
        }
    }

    #[test]
    fn prop_nested_index_matches_document(
        mutations in proptest::collection::vec(arb_mutation(), 1..20)
    ) {
        let store = DocumentStore::new();
        for mutation in mutations {
            apply(&store, mutation);
            let doc = store.integration();
            let nested = store.nested_steps();
            prop_assert_eq!(&*nested, &extract_nested_steps(&doc.steps));
            prop_assert_eq!(nested.len(), count_steps(&doc.steps) - doc.steps.len());
        }
    }

    #[test]
    fn prop_update_integration_keeps_shapes(doc in arb_document()) {
        let store = DocumentStore::with_config(StoreConfig::default());
        store.update_integration(doc.clone()).unwrap();
        prop_assert_eq!(store.integration().step_shapes(), doc.step_shapes());
    }
}
