//! Dependency resolver: root selection, reachable closure, emission order.
//!
//! The order is a topological order over the dependency edges (every type
//! appears after everything it depends on). Ties between unordered types
//! break by first-seen position in the merged namespace, so repeated runs
//! on identical input emit byte-identical output.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};

use crate::error::{Error, Result};
use crate::graph::{TypeDescriptor, TypeGraph};

/// Validate explicit roots, or choose the implicit one.
///
/// With no explicit roots, the namespace must declare exactly one struct;
/// that struct becomes the root. Duplicated explicit roots collapse to
/// their first occurrence.
pub fn choose_roots(graph: &TypeGraph, explicit: &[String]) -> Result<Vec<String>> {
    if explicit.is_empty() {
        let structs: Vec<&String> = graph
            .types
            .iter()
            .filter(|(_, d)| matches!(d, TypeDescriptor::Struct { .. }))
            .map(|(name, _)| name)
            .collect();
        return match structs.as_slice() {
            [only] => Ok(vec![(*only).clone()]),
            _ => Err(Error::RootUnspecified {
                count: structs.len(),
            }),
        };
    }

    let mut roots = Vec::new();
    for name in explicit {
        if roots.contains(name) {
            continue;
        }
        match graph.get(name) {
            Some(TypeDescriptor::Struct { .. }) => roots.push(name.clone()),
            Some(TypeDescriptor::Enum { .. }) => {
                return Err(Error::RootNotFound {
                    name: name.clone(),
                    reason: "is an enum, not a struct".to_string(),
                });
            }
            None => {
                return Err(Error::RootNotFound {
                    name: name.clone(),
                    reason: "is not declared in the inputs".to_string(),
                });
            }
        }
    }
    Ok(roots)
}

/// Compute the deterministic emission order for the closure of `roots`.
pub fn emission_order(graph: &TypeGraph, roots: &[String]) -> Result<Vec<String>> {
    let reachable = reachable_closure(graph, roots);

    // Kahn's algorithm. A type becomes ready once all its dependencies are
    // emitted; among ready types the lowest namespace index goes first.
    let mut pending: HashMap<&str, usize> = HashMap::new();
    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
    for name in &reachable {
        let deps = graph.dependencies_of(name);
        pending.insert(name, deps.len());
        for dep in deps {
            dependents.entry(dep).or_default().push(name);
        }
    }

    let mut ready: BinaryHeap<Reverse<usize>> = graph
        .types
        .keys()
        .enumerate()
        .filter(|(_, name)| pending.get(name.as_str()) == Some(&0))
        .map(|(index, _)| Reverse(index))
        .collect();

    let mut order = Vec::with_capacity(reachable.len());
    while let Some(Reverse(index)) = ready.pop() {
        let (name, _) = graph.types.get_index(index).unwrap();
        order.push(name.clone());
        for dependent in dependents.get(name.as_str()).into_iter().flatten() {
            let remaining = pending.get_mut(dependent).unwrap();
            *remaining -= 1;
            if *remaining == 0 {
                ready.push(Reverse(graph.index_of(dependent).unwrap()));
            }
        }
    }

    if order.len() < reachable.len() {
        let stuck: Vec<&str> = reachable
            .iter()
            .map(String::as_str)
            .filter(|n| pending[n] > 0)
            .collect();
        return Err(Error::DependencyCycle {
            path: find_cycle(graph, &stuck),
        });
    }
    Ok(order)
}

/// Breadth-first closure from the roots, following dependency edges.
fn reachable_closure(graph: &TypeGraph, roots: &[String]) -> Vec<String> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut closure = Vec::new();
    let mut queue: VecDeque<&str> = roots.iter().map(String::as_str).collect();
    while let Some(name) = queue.pop_front() {
        if !seen.insert(name) {
            continue;
        }
        closure.push(name.to_string());
        for dep in graph.dependencies_of(name) {
            queue.push_back(dep);
        }
    }
    closure
}

/// Walk the leftover nodes until one is revisited, and return the full
/// cycle path `A -> ... -> A`.
fn find_cycle(graph: &TypeGraph, stuck: &[&str]) -> Vec<String> {
    let stuck_set: HashSet<&str> = stuck.iter().copied().collect();
    let start = stuck[0];
    let mut path: Vec<&str> = vec![start];
    let mut on_path: HashSet<&str> = HashSet::from([start]);
    let mut current = start;
    loop {
        let next = graph
            .dependencies_of(current)
            .into_iter()
            .find(|d| stuck_set.contains(d))
            .unwrap_or(start);
        if on_path.contains(next) {
            let entry = path.iter().position(|n| *n == next).unwrap();
            let mut cycle: Vec<String> = path[entry..].iter().map(|s| s.to_string()).collect();
            cycle.push(next.to_string());
            return cycle;
        }
        path.push(next);
        on_path.insert(next);
        current = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GenerateConfig;
    use crate::graph::build_graph;
    use crate::loader::load_documents;

    fn graph_from(doc: &str) -> TypeGraph {
        let ns = load_documents(
            &[("test.json".to_string(), doc.as_bytes().to_vec())],
            &GenerateConfig::default(),
        )
        .unwrap();
        build_graph(&ns).unwrap()
    }

    const SCENARIO: &str = r#"{"types": {
        "Point": {"kind": "struct", "size": 8, "fields": [
            {"name": "x", "type": "float", "offset": 0},
            {"name": "y", "type": "float", "offset": 4}
        ]},
        "Size": {"kind": "struct", "size": 16, "fields": [
            {"name": "width", "type": "double", "offset": 0},
            {"name": "height", "type": "double", "offset": 8}
        ]},
        "Color": {"kind": "enum", "underlying": "int", "values": [
            {"name": "COLOR_RED", "value": 0},
            {"name": "COLOR_GREEN", "value": 1},
            {"name": "COLOR_BLUE", "value": 2}
        ]},
        "myTestStruct": {"kind": "struct", "size": 48, "fields": [
            {"name": "center", "type": "Point", "offset": 0},
            {"name": "bounding", "type": "Size", "offset": 8},
            {"name": "color", "type": "Color", "offset": 24},
            {"name": "values", "type": "float[5]", "offset": 28}
        ]}
    }}"#;

    #[test]
    fn dependencies_precede_dependents() {
        let graph = graph_from(SCENARIO);
        let roots = vec!["myTestStruct".to_string()];
        let order = emission_order(&graph, &roots).unwrap();
        assert_eq!(order, ["Point", "Size", "Color", "myTestStruct"]);
    }

    #[test]
    fn closure_excludes_unreachable_types() {
        let doc = r#"{"types": {
            "Inner": {"kind": "struct", "fields": [
                {"name": "v", "type": "int", "offset": 0}
            ]},
            "Stray": {"kind": "struct", "fields": [
                {"name": "v", "type": "int", "offset": 0}
            ]},
            "Outer": {"kind": "struct", "fields": [
                {"name": "inner", "type": "Inner", "offset": 0}
            ]}
        }}"#;
        let graph = graph_from(doc);
        let order = emission_order(&graph, &["Outer".to_string()]).unwrap();
        assert_eq!(order, ["Inner", "Outer"]);
    }

    #[test]
    fn multiple_roots_union_their_closures() {
        let graph = graph_from(SCENARIO);
        let roots = choose_roots(
            &graph,
            &[
                "Point".to_string(),
                "Size".to_string(),
                "Point".to_string(),
            ],
        )
        .unwrap();
        assert_eq!(roots, ["Point", "Size"]);
        let order = emission_order(&graph, &roots).unwrap();
        assert_eq!(order, ["Point", "Size"]);
    }

    #[test]
    fn implicit_root_requires_a_single_struct() {
        let single = graph_from(
            r#"{"types": {"Only": {"kind": "struct", "fields": [
                {"name": "v", "type": "int", "offset": 0}
            ]}}}"#,
        );
        assert_eq!(choose_roots(&single, &[]).unwrap(), ["Only"]);

        let several = graph_from(SCENARIO);
        let err = choose_roots(&several, &[]).unwrap_err();
        assert!(matches!(err, Error::RootUnspecified { count: 3 }), "{err}");
    }

    #[test]
    fn unknown_root_fails_before_traversal() {
        let graph = graph_from(SCENARIO);
        let err = choose_roots(&graph, &["Nope".to_string()]).unwrap_err();
        match err {
            Error::RootNotFound { name, .. } => assert_eq!(name, "Nope"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn enum_root_is_rejected() {
        let graph = graph_from(SCENARIO);
        let err = choose_roots(&graph, &["Color".to_string()]).unwrap_err();
        assert!(matches!(err, Error::RootNotFound { .. }), "{err}");
    }

    #[test]
    fn self_cycle_is_named() {
        let graph = graph_from(
            r#"{"types": {"A": {"kind": "struct", "fields": [
                {"name": "again", "type": "A", "offset": 0}
            ]}}}"#,
        );
        let err = emission_order(&graph, &["A".to_string()]).unwrap_err();
        match err {
            Error::DependencyCycle { path } => assert_eq!(path, ["A", "A"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn mutual_cycle_names_the_full_path() {
        let graph = graph_from(
            r#"{"types": {
                "A": {"kind": "struct", "fields": [
                    {"name": "b", "type": "B", "offset": 0}
                ]},
                "B": {"kind": "struct", "fields": [
                    {"name": "a", "type": "A", "offset": 0}
                ]}
            }}"#,
        );
        let err = emission_order(&graph, &["A".to_string()]).unwrap_err();
        match err {
            Error::DependencyCycle { path } => {
                assert_eq!(path.len(), 3);
                assert_eq!(path.first(), path.last());
                assert!(path.contains(&"A".to_string()) && path.contains(&"B".to_string()));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn sibling_order_follows_declaration_order() {
        // Leaves with no mutual constraint keep namespace order even when
        // referenced in the opposite order.
        let doc = r#"{"types": {
            "First": {"kind": "struct", "fields": [
                {"name": "v", "type": "int", "offset": 0}
            ]},
            "Second": {"kind": "struct", "fields": [
                {"name": "v", "type": "int", "offset": 0}
            ]},
            "Top": {"kind": "struct", "fields": [
                {"name": "s", "type": "Second", "offset": 0},
                {"name": "f", "type": "First", "offset": 4}
            ]}
        }}"#;
        let graph = graph_from(doc);
        let order = emission_order(&graph, &["Top".to_string()]).unwrap();
        assert_eq!(order, ["First", "Second", "Top"]);
    }
}
