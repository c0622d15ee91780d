use super::OnboardError;
use models::{Layer, ModelSpec};
use std::collections::{BTreeMap, BTreeSet};

/// The compiled model graph: nodes are generated models, edges are
/// reference relations. Dependencies naming no node (landed tables) are
/// external inputs, not edges.
pub struct ModelGraph {
    models: Vec<ModelSpec>,
    by_name: BTreeMap<String, usize>,
    /// Downstream adjacency: `children[i]` are nodes reading node `i`.
    children: Vec<Vec<usize>>,
    parents: Vec<Vec<usize>>,
}

impl ModelGraph {
    /// Compile a model set, failing on reference cycles.
    pub fn compile(models: Vec<ModelSpec>) -> Result<Self, OnboardError> {
        let by_name: BTreeMap<String, usize> = models
            .iter()
            .enumerate()
            .map(|(index, model)| (model.name.clone(), index))
            .collect();

        let mut children = vec![Vec::new(); models.len()];
        let mut parents = vec![Vec::new(); models.len()];
        for (index, model) in models.iter().enumerate() {
            for dep in &model.depends_on {
                match by_name.get(dep) {
                    Some(&parent) => {
                        children[parent].push(index);
                        parents[index].push(parent);
                    }
                    None => {
                        tracing::trace!(model = %model.name, dep = %dep, "external input");
                    }
                }
            }
        }

        let graph = Self {
            models,
            by_name,
            children,
            parents,
        };
        graph.check_acyclic()?;
        Ok(graph)
    }

    fn check_acyclic(&self) -> Result<(), OnboardError> {
        let mut indegree: Vec<usize> = self.parents.iter().map(Vec::len).collect();
        let mut ready: BTreeSet<usize> = indegree
            .iter()
            .enumerate()
            .filter(|(_, &d)| d == 0)
            .map(|(i, _)| i)
            .collect();

        let mut seen = 0;
        while let Some(&next) = ready.iter().next() {
            ready.remove(&next);
            seen += 1;
            for &child in &self.children[next] {
                indegree[child] -= 1;
                if indegree[child] == 0 {
                    ready.insert(child);
                }
            }
        }

        if seen == self.models.len() {
            return Ok(());
        }
        let nodes = indegree
            .iter()
            .enumerate()
            .filter(|(_, &d)| d > 0)
            .map(|(i, _)| self.models[i].name.clone())
            .collect();
        Err(OnboardError::Cycle { nodes })
    }

    pub fn models(&self) -> &[ModelSpec] {
        &self.models
    }

    pub fn model(&self, index: usize) -> &ModelSpec {
        &self.models[index]
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    pub fn children(&self, index: usize) -> &[usize] {
        &self.children[index]
    }

    pub fn parents(&self, index: usize) -> &[usize] {
        &self.parents[index]
    }

    /// Node indices of the reporting subtree: intermediates and marts,
    /// which pass B fully rebuilds.
    pub fn reporting_subtree(&self) -> BTreeSet<usize> {
        self.models
            .iter()
            .enumerate()
            .filter(|(_, model)| {
                matches!(model.layer, Layer::Intermediate | Layer::Mart)
            })
            .map(|(index, _)| index)
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use models::Materialization;

    fn model(name: &str, layer: Layer, deps: &[&str]) -> ModelSpec {
        ModelSpec {
            node_id: format!("model.acme.{name}"),
            name: name.to_string(),
            layer,
            materialization: Materialization::View,
            statements: vec![format!("SELECT '{name}'")],
            depends_on: deps.iter().map(|d| d.to_string()).collect(),
            post_hook: None,
            tags: Vec::new(),
        }
    }

    #[test]
    fn compiles_layered_graphs() {
        let graph = ModelGraph::compile(vec![
            model("src_a", Layer::Source, &["acme__landed"]),
            model("stg_a", Layer::Staging, &["src_a"]),
            model("sink", Layer::MasterSink, &[]),
            model("int_a", Layer::Intermediate, &["sink"]),
            model("fct_a", Layer::Mart, &["int_a"]),
        ])
        .unwrap();

        assert_eq!(graph.len(), 5);
        // The landed table is an external input, not an edge.
        assert!(graph.parents(graph.index_of("src_a").unwrap()).is_empty());
        assert_eq!(
            graph.reporting_subtree(),
            [
                graph.index_of("int_a").unwrap(),
                graph.index_of("fct_a").unwrap()
            ]
            .into_iter()
            .collect()
        );
    }

    #[test]
    fn rejects_cycles() {
        let result = ModelGraph::compile(vec![
            model("a", Layer::Mart, &["b"]),
            model("b", Layer::Mart, &["a"]),
        ]);
        match result {
            Err(OnboardError::Cycle { nodes }) => {
                assert_eq!(nodes, vec!["a", "b"]);
            }
            other => panic!("expected Cycle, got {:?}", other.map(|g| g.len())),
        }
    }
}
