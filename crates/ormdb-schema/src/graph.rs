//! Entity dependency graph and delete ordering.
//!
//! One vertex per entity, one edge from each referencing entity to the entity
//! it references. For an entity with both cascading and non-cascading
//! references, every cascade target also gets an edge to every non-cascade
//! target, since deleting the cascade target removes rows that still point at
//! the non-cascade target.
//!
//! Strongly connected components are numbered so that referencing entities
//! come before the entities they reference; deleting in increasing order never
//! removes a row that a surviving row still points to. Components of more than
//! one entity are genuine reference cycles.

use tracing::debug;

use crate::model::{EntityId, EntityModel};

#[derive(Debug, Clone)]
struct Vertex {
    entity: EntityId,
    edges: Vec<usize>,
}

/// Arena-backed reference graph over entities.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    vertices: Vec<Vertex>,
}

/// Result of analyzing a dependency graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyOrder {
    /// Components in delete order; each lists its entities by id.
    pub components: Vec<Vec<EntityId>>,
}

impl DependencyOrder {
    /// Component index of every entity, indexed by entity id.
    pub fn index_of(&self, entity: EntityId) -> Option<usize> {
        self.components.iter().position(|c| c.contains(&entity))
    }

    /// Components with more than one entity.
    pub fn cycles(&self) -> impl Iterator<Item = &[EntityId]> {
        self.components
            .iter()
            .filter(|c| c.len() > 1)
            .map(Vec::as_slice)
    }
}

impl DependencyGraph {
    /// Build the graph for a model, including cascade-correction edges.
    pub fn from_model(model: &EntityModel) -> Self {
        let mut graph = DependencyGraph {
            vertices: model
                .entities()
                .iter()
                .map(|e| Vertex {
                    entity: e.id,
                    edges: Vec::new(),
                })
                .collect(),
        };

        for entity in model.entities() {
            let mut cascade = Vec::new();
            let mut plain = Vec::new();
            for member in model.entity_members(entity.id) {
                let Some(reference) = member.reference.filter(|_| member.is_reference()) else {
                    continue;
                };
                graph.add_edge(entity.id.0, reference.target.0);
                let set = if reference.cascade_delete {
                    &mut cascade
                } else {
                    &mut plain
                };
                if !set.contains(&reference.target.0) {
                    set.push(reference.target.0);
                }
            }

            for c in &cascade {
                for p in &plain {
                    graph.add_edge(*c, *p);
                }
            }
        }
        graph
    }

    /// Add an edge. Self-loops and duplicates are ignored.
    pub fn add_edge(&mut self, from: usize, to: usize) {
        if from == to {
            return;
        }
        let edges = &mut self.vertices[from].edges;
        if !edges.contains(&to) {
            edges.push(to);
        }
    }

    /// Number of vertices.
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    /// Check if the graph has no vertices.
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Entities an entity's vertex points to.
    pub fn successors(&self, entity: EntityId) -> impl Iterator<Item = EntityId> + '_ {
        self.vertices[entity.0]
            .edges
            .iter()
            .map(|v| self.vertices[*v].entity)
    }

    /// Strongly connected components in delete order.
    ///
    /// Iterative Tarjan. Tarjan emits a component only after everything it
    /// reaches, so emission order is reversed.
    pub fn components(&self) -> DependencyOrder {
        let n = self.vertices.len();
        let mut next_index = 0;
        let mut index: Vec<Option<usize>> = vec![None; n];
        let mut lowlink = vec![0usize; n];
        let mut on_stack = vec![false; n];
        let mut stack: Vec<usize> = Vec::new();
        let mut emitted: Vec<Vec<EntityId>> = Vec::new();

        for root in 0..n {
            if index[root].is_some() {
                continue;
            }

            let mut calls: Vec<(usize, usize)> = vec![(root, 0)];
            index[root] = Some(next_index);
            lowlink[root] = next_index;
            next_index += 1;
            stack.push(root);
            on_stack[root] = true;

            while let Some(&(v, edge)) = calls.last() {
                if let Some(&w) = self.vertices[v].edges.get(edge) {
                    if let Some(top) = calls.last_mut() {
                        top.1 += 1;
                    }
                    match index[w] {
                        None => {
                            index[w] = Some(next_index);
                            lowlink[w] = next_index;
                            next_index += 1;
                            stack.push(w);
                            on_stack[w] = true;
                            calls.push((w, 0));
                        }
                        Some(wi) if on_stack[w] => lowlink[v] = lowlink[v].min(wi),
                        Some(_) => {}
                    }
                    continue;
                }

                calls.pop();
                if let Some(&(parent, _)) = calls.last() {
                    lowlink[parent] = lowlink[parent].min(lowlink[v]);
                }
                if Some(lowlink[v]) == index[v] {
                    let mut component = Vec::new();
                    while let Some(w) = stack.pop() {
                        on_stack[w] = false;
                        component.push(self.vertices[w].entity);
                        if w == v {
                            break;
                        }
                    }
                    component.sort();
                    emitted.push(component);
                }
            }
        }

        emitted.reverse();
        DependencyOrder { components: emitted }
    }
}

/// Compute delete order and cycle flags, writing them onto the model's entities.
pub fn analyze(model: &mut EntityModel) -> DependencyOrder {
    let order = DependencyGraph::from_model(model).components();
    for (i, component) in order.components.iter().enumerate() {
        let non_trivial = component.len() > 1;
        for entity in component {
            let info = model.entity_mut(*entity);
            info.delete_order = i;
            info.flags.non_trivial_group = non_trivial;
        }
    }
    debug!(
        components = order.components.len(),
        cycles = order.cycles().count(),
        "Dependency order computed"
    );
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompilerConfig;
    use crate::diagnostics::Diagnostics;
    use crate::model::{EntityDecl, MemberDecl, ModelDecl};
    use ormdb_types::ScalarType;

    fn keyed(name: &str) -> EntityDecl {
        EntityDecl::new(name).with_member(MemberDecl::column("Id", ScalarType::Int32).primary_key())
    }

    fn build(decl: &ModelDecl) -> EntityModel {
        let mut diags = Diagnostics::new();
        let model = EntityModel::build(decl, &CompilerConfig::default(), &mut diags);
        assert!(!diags.has_errors(), "{diags}");
        model
    }

    fn order_of(model: &EntityModel, name: &str) -> usize {
        model.entity(model.find_entity(name).unwrap()).delete_order
    }

    #[test]
    fn test_cascade_correction_orders_link_table() {
        let decl = ModelDecl::new("library")
            .with_entity(keyed("Author"))
            .with_entity(keyed("Book"))
            .with_entity(
                keyed("BookAuthor")
                    .with_member(MemberDecl::reference("Book", "Book").cascade_delete())
                    .with_member(MemberDecl::reference("Author", "Author")),
            );
        let mut model = build(&decl);
        let graph = DependencyGraph::from_model(&model);

        let book = model.find_entity("Book").unwrap();
        let author = model.find_entity("Author").unwrap();
        assert_eq!(graph.successors(book).collect::<Vec<_>>(), vec![author]);

        analyze(&mut model);
        assert_eq!(order_of(&model, "BookAuthor"), 0);
        assert_eq!(order_of(&model, "Book"), 1);
        assert_eq!(order_of(&model, "Author"), 2);
        assert!(model.entities().iter().all(|e| !e.flags.non_trivial_group));
    }

    #[test]
    fn test_children_before_parents() {
        let decl = ModelDecl::new("shop")
            .with_entity(keyed("LineItem").with_member(MemberDecl::reference("Order", "Order")))
            .with_entity(keyed("Order").with_member(MemberDecl::reference("Customer", "Customer")))
            .with_entity(keyed("Customer"));
        let mut model = build(&decl);
        analyze(&mut model);

        assert!(order_of(&model, "LineItem") < order_of(&model, "Order"));
        assert!(order_of(&model, "Order") < order_of(&model, "Customer"));

        let names: Vec<&str> = model
            .delete_order()
            .into_iter()
            .map(|id| model.entity(id).name.as_str())
            .collect();
        assert_eq!(names, vec!["LineItem", "Order", "Customer"]);
    }

    #[test]
    fn test_mutual_references_form_group() {
        let decl = ModelDecl::new("m")
            .with_entity(keyed("Department").with_member(MemberDecl::reference("Head", "Employee").nullable()))
            .with_entity(keyed("Employee").with_member(MemberDecl::reference("Department", "Department")))
            .with_entity(keyed("Badge").with_member(MemberDecl::reference("Owner", "Employee")));
        let mut model = build(&decl);
        let order = analyze(&mut model);

        assert_eq!(order.components.len(), 2);
        assert_eq!(order.cycles().count(), 1);
        assert_eq!(order_of(&model, "Badge"), 0);
        assert_eq!(order_of(&model, "Department"), order_of(&model, "Employee"));

        let dept = model.find_entity("Department").unwrap();
        assert!(model.entity(dept).flags.non_trivial_group);
        let badge = model.find_entity("Badge").unwrap();
        assert!(!model.entity(badge).flags.non_trivial_group);
    }

    #[test]
    fn test_self_reference_is_trivial() {
        let decl = ModelDecl::new("m")
            .with_entity(keyed("Employee").with_member(MemberDecl::reference("Manager", "Employee").nullable()));
        let mut model = build(&decl);
        let order = analyze(&mut model);

        assert_eq!(order.components.len(), 1);
        assert_eq!(order.cycles().count(), 0);
    }

    #[test]
    fn test_deterministic() {
        let decl = ModelDecl::new("m")
            .with_entity(keyed("A").with_member(MemberDecl::reference("B", "B")))
            .with_entity(keyed("B").with_member(MemberDecl::reference("C", "C")))
            .with_entity(keyed("C").with_member(MemberDecl::reference("A", "A").nullable()))
            .with_entity(keyed("D").with_member(MemberDecl::reference("A", "A")));

        let first = DependencyGraph::from_model(&build(&decl)).components();
        let second = DependencyGraph::from_model(&build(&decl)).components();
        assert_eq!(first, second);
        assert_eq!(first.components[0], vec![EntityId(3)]);
        assert_eq!(first.index_of(EntityId(1)), Some(1));
    }

    #[test]
    fn test_long_chain_does_not_recurse() {
        let mut decl = ModelDecl::new("chain").with_entity(keyed("E0"));
        for i in 1..2000 {
            decl = decl.with_entity(
                keyed(&format!("E{i}")).with_member(MemberDecl::reference("Prev", format!("E{}", i - 1))),
            );
        }
        let mut model = build(&decl);
        analyze(&mut model);

        assert_eq!(order_of(&model, "E1999"), 0);
        assert_eq!(order_of(&model, "E0"), 1999);
    }
}
