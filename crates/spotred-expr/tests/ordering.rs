use proptest::prelude::*;
use spotred_expr::{Expression, ExpressionRegistry, Node, Operation};

fn expression(name: String, refs: &[String]) -> Expression {
    let tree = refs
        .iter()
        .map(|r| Node::reference(r.clone()))
        .fold(Node::number(1.0), |acc, node| Node::op(Operation::Add, vec![acc, node]));
    Expression::per_spot(name, tree)
}

fn dag() -> impl Strategy<Value = (Vec<Vec<bool>>, Vec<usize>)> {
    (2usize..12).prop_flat_map(|n| {
        (
            prop::collection::vec(prop::collection::vec(any::<bool>(), n), n),
            Just((0..n).collect::<Vec<_>>()).prop_shuffle(),
        )
    })
}

proptest! {
    #[test]
    fn dependencies_always_precede_dependents((edges, insertion) in dag()) {
        let n = insertion.len();
        let name = |i: usize| format!("e{i}");
        let refs_of = |i: usize| -> Vec<String> {
            (0..i).filter(|&j| edges[i][j]).map(name).collect()
        };
        let mut registry = ExpressionRegistry::new();
        for &i in &insertion {
            registry.insert(expression(name(i), &refs_of(i))).unwrap();
        }
        let order = registry.resolve_order().unwrap();
        prop_assert_eq!(order.len(), n);
        for i in 0..n {
            let own = order.position(&name(i)).unwrap();
            for dep in refs_of(i) {
                prop_assert!(order.position(&dep).unwrap() < own);
            }
        }
        let again = registry.resolve_order().unwrap();
        prop_assert_eq!(order, again);
    }

    #[test]
    fn closing_a_back_edge_is_rejected((edges, insertion) in dag()) {
        let n = insertion.len();
        let name = |i: usize| format!("e{i}");
        let mut registry = ExpressionRegistry::new();
        for &i in &insertion {
            let mut refs: Vec<String> = (0..i).filter(|&j| edges[i][j]).map(name).collect();
            if i + 1 < n {
                refs.push(name(i + 1));
            } else {
                refs.push(name(0));
            }
            registry.insert(expression(name(i), &refs)).unwrap();
        }
        let err = registry.resolve_order().unwrap_err();
        prop_assert!(err.is_fatal());
        prop_assert_eq!(err.info().code.as_str(), "expression-cycle");
    }
}
