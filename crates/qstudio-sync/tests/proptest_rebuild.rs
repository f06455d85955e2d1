//! Property tests for the reconciler.

use proptest::prelude::*;
use qstudio_graph::Template;
use qstudio_sync::{Prelude, rebuild};

const DOC: &str = "\
## STEP 1 : Map
###[Problem]
n = 4
#### INPUT PYTHON
edges = [(0, 1)]
#### END INPUT PYTHON

## STEP 3 : Execute
###[Sampler]
job = sampler.run([qc])
";

/// Code lines that never look like markers.
fn code() -> impl Strategy<Value = String> {
    prop::collection::vec("[a-z_][a-z0-9_ =+()]{0,24}", 0..4)
        .prop_map(|lines| lines.into_iter().map(|l| l + "\n").collect())
}

proptest! {
    #[test]
    fn rebuild_preserves_untouched_sections(primary in code(), input in code()) {
        let inst = Template::from_source("p", DOC).instantiate().unwrap();
        let mut graph = inst.graph;
        let problem = inst.bindings[0].node_id.clone();
        graph.set_primary_fragment(&problem, Some(primary.clone())).unwrap();
        graph.set_raw_input_fragment(&problem, Some(input)).unwrap();

        let once = rebuild(DOC, &graph, &inst.bindings, Some(&Prelude::LocalSimulator));
        let twice = rebuild(DOC, &graph, &inst.bindings, Some(&Prelude::LocalSimulator));
        prop_assert_eq!(&once, &twice);

        let tail = &DOC[DOC.find("## STEP 3").unwrap()..];
        prop_assert!(once.text.ends_with(tail));
        prop_assert_eq!(once.text.matches("## STEP 0").count(), 1);
    }
}
