//! Dependency resolution.
//!
//! Bounded topological sort over the loaded plugins. Ties are broken by load
//! order, so a plugin never enables before one loaded ahead of it unless a
//! dependency forces it to.

use std::collections::{HashMap, HashSet};

use super::types::{REASON_CIRCULAR, REASON_UNRESOLVED};

/// Outcome of a resolution pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Ids whose dependencies all resolved, dependencies first.
    pub order: Vec<String>,
    /// Ids that can never be enabled, with the reason.
    pub unresolved: Vec<(String, &'static str)>,
}

/// Order `plugins` (id, dependency ids) so every plugin follows its
/// dependencies.
///
/// Each pass admits every plugin whose dependencies are already admitted; a
/// pass that admits nothing ends the sort. Leftovers that sit on a
/// dependency cycle are reported as circular, the rest as unresolved.
pub fn resolve(plugins: &[(String, Vec<String>)]) -> Resolution {
    let mut resolved: HashSet<&str> = HashSet::new();
    let mut order = Vec::with_capacity(plugins.len());
    let mut pending: Vec<&(String, Vec<String>)> = plugins.iter().collect();

    loop {
        let mut progressed = false;
        let mut still_pending = Vec::with_capacity(pending.len());

        for entry in pending {
            let (id, deps) = entry;
            if deps.iter().all(|d| resolved.contains(d.as_str())) {
                resolved.insert(id.as_str());
                order.push(id.clone());
                progressed = true;
            } else {
                still_pending.push(entry);
            }
        }

        pending = still_pending;
        if pending.is_empty() || !progressed {
            break;
        }
    }

    let leftover: HashMap<&str, &[String]> =
        pending.iter().map(|(id, deps)| (id.as_str(), deps.as_slice())).collect();

    let unresolved = pending
        .iter()
        .map(|(id, _)| {
            let reason =
                if on_cycle(id, &leftover) { REASON_CIRCULAR } else { REASON_UNRESOLVED };
            (id.clone(), reason)
        })
        .collect();

    Resolution { order, unresolved }
}

/// Whether `start` can reach itself through `graph`.
fn on_cycle(start: &str, graph: &HashMap<&str, &[String]>) -> bool {
    let mut stack: Vec<&str> = vec![start];
    let mut seen: HashSet<&str> = HashSet::new();

    while let Some(node) = stack.pop() {
        let Some(deps) = graph.get(node) else {
            continue;
        };
        for dep in deps.iter() {
            if dep == start {
                return true;
            }
            if seen.insert(dep.as_str()) {
                stack.push(dep.as_str());
            }
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(id: &str, deps: &[&str]) -> (String, Vec<String>) {
        (id.to_string(), deps.iter().map(ToString::to_string).collect())
    }

    fn reasons(resolution: &Resolution) -> HashMap<&str, &str> {
        resolution.unresolved.iter().map(|(id, r)| (id.as_str(), *r)).collect()
    }

    #[test]
    fn test_dependencies_first() {
        let resolution = resolve(&[p("a.two", &["a.one"]), p("a.one", &[])]);
        assert_eq!(resolution.order, vec!["a.one", "a.two"]);
        assert!(resolution.unresolved.is_empty());
    }

    #[test]
    fn test_load_order_preserved() {
        let resolution = resolve(&[p("c", &[]), p("a", &[]), p("b", &["c"])]);
        assert_eq!(resolution.order, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_missing_dependency() {
        let resolution = resolve(&[p("a.three", &["a.missing"]), p("a.four", &["a.three"])]);
        assert!(resolution.order.is_empty());

        let reasons = reasons(&resolution);
        assert_eq!(reasons["a.three"], REASON_UNRESOLVED);
        assert_eq!(reasons["a.four"], REASON_UNRESOLVED);
    }

    #[test]
    fn test_cycle_detected() {
        let resolution = resolve(&[
            p("x", &["y"]),
            p("y", &["x"]),
            p("z", &["x"]),
            p("self", &["self"]),
            p("ok", &[]),
        ]);
        assert_eq!(resolution.order, vec!["ok"]);

        let reasons = reasons(&resolution);
        assert_eq!(reasons["x"], REASON_CIRCULAR);
        assert_eq!(reasons["y"], REASON_CIRCULAR);
        assert_eq!(reasons["self"], REASON_CIRCULAR);
        assert_eq!(reasons["z"], REASON_UNRESOLVED);
    }

    #[test]
    fn test_empty() {
        assert_eq!(resolve(&[]), Resolution::default());
    }
}
