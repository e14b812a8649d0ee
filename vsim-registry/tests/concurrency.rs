//! Concurrent clients sharing one registry

use std::any::Any;
use std::sync::Arc;
use vsim_registry::{
    CollectingListener, Context, ManagedObject, Registry, RegistryEvent, RegistryListener,
};
use vsim_types::{ChangeOp, DataObject, Fault, ObjectRef, PropertyChange, Result, Value};

#[derive(Clone, Default)]
struct Node {
    hits: i64,
    parent: Option<ObjectRef>,
    children: Vec<ObjectRef>,
}

impl ManagedObject for Node {
    fn kind(&self) -> &'static str {
        "Node"
    }

    fn view(&self) -> DataObject {
        DataObject::new("Node")
            .with("hits", self.hits)
            .with_opt("parent", self.parent.clone().map(Value::Ref))
            .with("childEntity", Value::refs(self.children.clone()))
    }

    fn apply_change(&mut self, change: &PropertyChange) -> Result<()> {
        let val = change.val.as_ref();
        match (change.name.as_str(), change.op) {
            ("hits", ChangeOp::Assign) => {
                self.hits = val.and_then(Value::as_i64).unwrap_or_default();
            }
            ("parent", ChangeOp::Assign) => {
                self.parent = val.and_then(Value::as_ref).cloned();
            }
            ("childEntity", ChangeOp::Add) => {
                self.children.extend(val.map(Value::references).unwrap_or_default());
            }
            ("childEntity", ChangeOp::Remove) => {
                let gone = val.map(Value::references).unwrap_or_default();
                self.children.retain(|c| !gone.contains(c));
            }
            _ => return Err(Fault::invalid_property(change.name.clone())),
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_read_modify_write_is_serialized_by_object_lock() {
    let registry = Arc::new(Registry::new());
    let node = registry.put(Node::default());

    let mut workers = Vec::new();
    for _ in 0..8 {
        let registry = registry.clone();
        let node = node.clone();
        workers.push(tokio::task::spawn_blocking(move || {
            let ctx = Context::new();
            for _ in 0..50 {
                registry
                    .with_lock(&ctx, &node, |guard| {
                        let hits = guard.read_as(|n: &Node| n.hits).unwrap_or_default();
                        registry.update(guard, vec![PropertyChange::assign("hits", hits + 1)])
                    })
                    .unwrap()
                    .unwrap();
            }
        }));
    }
    for worker in workers {
        worker.await.unwrap();
    }

    let hits = registry.get(&node).unwrap().read_as(|n: &Node| n.hits);
    assert_eq!(hits, Some(400));
}

#[test]
fn test_put_entity_links_parent_and_child() {
    let registry = Registry::new();
    let ctx = Context::new();
    let parent = registry.put(Node::default());

    let child = registry.put_entity(&ctx, &parent, Node::default()).unwrap();

    let parent_view = registry.get(&parent).unwrap().view();
    assert_eq!(
        parent_view.get("childEntity").map(Value::references),
        Some(vec![child.clone()])
    );
    let child_view = registry.get(&child).unwrap().view();
    assert_eq!(child_view.get("parent"), Some(&Value::Ref(parent.clone())));

    registry.remove_entity(&ctx, &child).unwrap();
    assert!(registry.get(&child).is_none());
    let parent_view = registry.get(&parent).unwrap().view();
    assert_eq!(
        parent_view.get("childEntity").map(Value::references),
        Some(Vec::new())
    );
}

#[test]
fn test_put_entity_requires_parent() {
    let registry = Registry::new();
    let missing = ObjectRef::new("Node", "node-404");
    let err = registry
        .put_entity(&Context::new(), &missing, Node::default())
        .unwrap_err();
    assert_eq!(err, Fault::ManagedObjectNotFound { obj: missing });
    assert!(registry.is_empty());
}

#[test]
fn test_references_are_never_reused() {
    let registry = Registry::new();
    let first = registry.put(Node::default());
    registry.remove(&first);
    let second = registry.put(Node::default());
    assert_ne!(first, second);
}

#[test]
fn test_fixed_reference_is_not_overwritten_by_allocation() {
    let registry = Registry::new();
    let listener = Arc::new(CollectingListener::new());
    registry.add_handler(listener.clone());

    let fixed = registry
        .put_with_ref(
            ObjectRef::new("Node", "node-1"),
            Node {
                hits: 42,
                ..Node::default()
            },
        )
        .unwrap();
    let allocated = registry.put(Node::default());

    assert_ne!(allocated, fixed);
    assert_eq!(registry.len(), 2);
    let view = registry.get(&fixed).unwrap().view();
    assert_eq!(view.get("hits"), Some(&Value::Long(42)));

    let puts: Vec<ObjectRef> = listener
        .take()
        .into_iter()
        .map(|event| event.obj().clone())
        .collect();
    assert_eq!(puts, vec![fixed, allocated]);
}

#[test]
fn test_rejected_batch_is_neither_applied_nor_dispatched() {
    let registry = Registry::new();
    let node = registry.put(Node::default());
    let listener = Arc::new(CollectingListener::new());
    registry.add_handler(listener.clone());

    let err = registry
        .atomic_update(
            &Context::new(),
            &node,
            vec![
                PropertyChange::assign("hits", 5),
                PropertyChange::assign("bogus", 1),
            ],
        )
        .unwrap_err();
    assert!(matches!(err, Fault::InvalidProperty { .. }));

    let view = registry.get(&node).unwrap().view();
    assert_eq!(view.get("hits").and_then(Value::as_i64), Some(0));
    assert!(listener.is_empty());

    registry
        .atomic_update(&Context::new(), &node, vec![PropertyChange::assign("hits", 5)])
        .unwrap();
    let view = registry.get(&node).unwrap().view();
    assert_eq!(view.get("hits").and_then(Value::as_i64), Some(5));
    assert!(matches!(
        listener.take().as_slice(),
        [RegistryEvent::Update { .. }]
    ));
}

/// Removes `target` as soon as any other object is registered
struct RemoveOnPut {
    registry: Arc<Registry>,
    target: ObjectRef,
}

impl RegistryListener for RemoveOnPut {
    fn put_object(&self, obj: &ObjectRef) {
        if obj != &self.target {
            self.registry.remove(&self.target);
        }
    }
}

#[test]
fn test_put_entity_unregisters_child_when_parent_vanishes() {
    let registry = Arc::new(Registry::new());
    let parent = registry.put(Node::default());
    registry.add_handler(Arc::new(RemoveOnPut {
        registry: registry.clone(),
        target: parent.clone(),
    }));

    let err = registry
        .put_entity(&Context::new(), &parent, Node::default())
        .unwrap_err();
    assert_eq!(err, Fault::ManagedObjectNotFound { obj: parent });
    assert!(registry.is_empty());
    assert!(registry.references("Node").is_empty());
}
