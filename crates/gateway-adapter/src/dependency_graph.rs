use std::collections::{HashMap, HashSet};

/// Adapter-declared dependency graph used by hot-reload to notify
/// reverse-dependents, and checked for cycles at registration.
#[derive(Debug, Default, Clone)]
pub struct DependencyGraph {
    edges: HashMap<String, Vec<String>>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("registering '{0}' would introduce a dependency cycle through {1:?}")]
pub struct CycleError(pub String, pub Vec<String>);

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attempts to add `name -> dependencies`, rejecting the change if it
    /// would introduce a cycle. On success the edge is recorded.
    pub fn try_add(&mut self, name: &str, dependencies: &[String]) -> Result<(), CycleError> {
        let mut candidate = self.edges.clone();
        candidate.insert(name.to_string(), dependencies.to_vec());

        if let Some(cycle) = find_cycle(&candidate, name) {
            return Err(CycleError(name.to_string(), cycle));
        }

        self.edges = candidate;
        Ok(())
    }

    pub fn remove(&mut self, name: &str) {
        self.edges.remove(name);
    }

    /// Names of adapters that declare a dependency on `name` (used to notify
    /// reverse-dependents after a reload).
    pub fn reverse_dependents(&self, name: &str) -> Vec<String> {
        self.edges
            .iter()
            .filter(|(_, deps)| deps.iter().any(|d| d == name))
            .map(|(adapter, _)| adapter.clone())
            .collect()
    }
}

fn find_cycle(edges: &HashMap<String, Vec<String>>, start: &str) -> Option<Vec<String>> {
    let mut visiting = HashSet::new();
    let mut path = Vec::new();
    fn visit(
        node: &str,
        edges: &HashMap<String, Vec<String>>,
        visiting: &mut HashSet<String>,
        path: &mut Vec<String>,
    ) -> Option<Vec<String>> {
        if path.contains(&node.to_string()) {
            let mut cycle = path.clone();
            cycle.push(node.to_string());
            return Some(cycle);
        }
        if !visiting.insert(node.to_string()) {
            return None;
        }
        path.push(node.to_string());
        if let Some(deps) = edges.get(node) {
            for dep in deps {
                if let Some(cycle) = visit(dep, edges, visiting, path) {
                    return Some(cycle);
                }
            }
        }
        path.pop();
        None
    }
    visit(start, edges, &mut visiting, &mut path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_acyclic_dependency() {
        let mut graph = DependencyGraph::new();
        graph.try_add("weather", &[]).unwrap();
        graph.try_add("dashboard", &["weather".to_string()]).unwrap();
    }

    #[test]
    fn rejects_self_dependency() {
        let mut graph = DependencyGraph::new();
        let err = graph.try_add("weather", &["weather".to_string()]).unwrap_err();
        assert_eq!(err.0, "weather");
    }

    #[test]
    fn rejects_introduced_cycle() {
        let mut graph = DependencyGraph::new();
        graph.try_add("a", &["b".to_string()]).unwrap();
        let err = graph.try_add("b", &["a".to_string()]).unwrap_err();
        assert_eq!(err.0, "b");
    }

    #[test]
    fn reverse_dependents_lists_dependents_of_a_name() {
        let mut graph = DependencyGraph::new();
        graph.try_add("weather", &[]).unwrap();
        graph.try_add("dashboard", &["weather".to_string()]).unwrap();
        assert_eq!(graph.reverse_dependents("weather"), vec!["dashboard".to_string()]);
    }
}
