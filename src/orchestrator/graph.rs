//! Pre-flight dependency graph check.

use std::collections::{BTreeMap, VecDeque};

use crate::config::Definition;
use crate::error::{KumiageError, Result};

/// Validates the dependency graph and returns the services in launch order.
///
/// A dependency must be declared in `definition` unless `is_external` says it
/// is already satisfied outside of it. External dependencies are not part of
/// the graph. Cycles are rejected with the services that could not be
/// ordered.
pub fn launch_order<F>(definition: &Definition, is_external: F) -> Result<Vec<String>>
where
    F: Fn(&str) -> bool,
{
    let mut in_degree: BTreeMap<&str, usize> = BTreeMap::new();
    let mut dependents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();

    for (name, spec) in &definition.services {
        in_degree.entry(name.as_str()).or_insert(0);

        for dep in &spec.depends_on {
            if !definition.services.contains_key(dep) {
                if is_external(dep) {
                    continue;
                }
                return Err(KumiageError::UnknownDependency {
                    service: name.clone(),
                    dependency: dep.clone(),
                });
            }
            *in_degree.entry(name.as_str()).or_insert(0) += 1;
            dependents.entry(dep.as_str()).or_default().push(name.as_str());
        }
    }

    // Kahn's algorithm
    let mut queue: VecDeque<&str> = in_degree
        .iter()
        .filter(|(_, &degree)| degree == 0)
        .map(|(name, _)| *name)
        .collect();
    let mut order = Vec::with_capacity(in_degree.len());

    while let Some(name) = queue.pop_front() {
        order.push(name.to_string());
        for dependent in dependents.get(name).into_iter().flatten() {
            if let Some(degree) = in_degree.get_mut(dependent) {
                *degree -= 1;
                if *degree == 0 {
                    queue.push_back(*dependent);
                }
            }
        }
    }

    if order.len() != in_degree.len() {
        let services = in_degree
            .into_iter()
            .filter(|(_, degree)| *degree > 0)
            .map(|(name, _)| name.to_string())
            .collect();
        return Err(KumiageError::DependencyCycle { services });
    }

    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServiceSpec;

    fn definition(edges: &[(&str, &[&str])]) -> Definition {
        let mut definition = Definition::default();
        for (name, deps) in edges {
            definition.services.insert(
                name.to_string(),
                ServiceSpec {
                    image: Some("busybox".to_string()),
                    depends_on: deps.iter().map(|d| d.to_string()).collect(),
                    ..Default::default()
                },
            );
        }
        definition
    }

    #[test]
    fn test_dependencies_come_first() {
        let def = definition(&[("web", &["api"]), ("api", &["db", "cache"]), ("db", &[]), ("cache", &[])]);
        let order = launch_order(&def, |_| false).unwrap();

        let pos = |n: &str| order.iter().position(|s| s == n).unwrap();
        assert_eq!(order.len(), 4);
        assert!(pos("db") < pos("api"));
        assert!(pos("cache") < pos("api"));
        assert!(pos("api") < pos("web"));
    }

    #[test]
    fn test_cycle_detected() {
        let def = definition(&[("a", &["b"]), ("b", &["c"]), ("c", &["a"]), ("d", &[])]);
        match launch_order(&def, |_| false) {
            Err(KumiageError::DependencyCycle { services }) => {
                assert_eq!(services, vec!["a", "b", "c"]);
            }
            other => panic!("expected cycle, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_dependency() {
        let def = definition(&[("web", &["db"])]);
        assert!(matches!(
            launch_order(&def, |_| false),
            Err(KumiageError::UnknownDependency { .. })
        ));
    }

    #[test]
    fn test_external_dependency_allowed() {
        let def = definition(&[("web", &["db"])]);
        let order = launch_order(&def, |name| name == "db").unwrap();
        assert_eq!(order, vec!["web"]);
    }
}
