//! Change subscriptions through filters and wait_for_updates_ex

use std::sync::Arc;
use std::time::Duration;
use vsim_collector::{
    CollectorConfig, ObjectSpec, PropertyCollector, PropertyFilterSpec, PropertySpec,
    SelectionSpec, TraversalSpec, UpdateKind, UpdateSet, WaitOptions, INITIAL_VERSION,
};
use vsim_inventory::{power_on_vm, Model, ModelConfig, VirtualMachine};
use vsim_registry::{Context, Registry};
use vsim_tasks::{TaskConfig, TaskManager};
use vsim_types::{ChangeOp, Fault, ObjectRef, PropertyChange, Value};

struct Fixture {
    registry: Arc<Registry>,
    pc: PropertyCollector,
    model: Model,
}

fn setup(folders: usize, vms_per_folder: usize) -> Fixture {
    let registry = Arc::new(Registry::new());
    let model = Model::build(
        &registry,
        &ModelConfig {
            folders,
            vms_per_folder,
            powered_on: false,
        },
    )
    .unwrap();
    let pc = PropertyCollector::new(registry.clone(), CollectorConfig::default());
    Fixture {
        registry,
        pc,
        model,
    }
}

fn vms_under(root: &ObjectRef, paths: &[&str]) -> PropertyFilterSpec {
    let folders = TraversalSpec::new("folderTraversal", "Folder", "childEntity")
        .select(SelectionSpec::named("folderTraversal"));
    let mut prop = PropertySpec::new("VirtualMachine");
    for path in paths {
        prop = prop.path(*path);
    }
    PropertyFilterSpec::new()
        .prop(prop)
        .object(ObjectSpec::new(root.clone()).skip(true).select(folders))
}

fn watch(obj: &ObjectRef, kind: &str, paths: &[&str]) -> PropertyFilterSpec {
    let mut prop = PropertySpec::new(kind);
    for path in paths {
        prop = prop.path(*path);
    }
    PropertyFilterSpec::new()
        .prop(prop)
        .object(ObjectSpec::new(obj.clone()))
}

fn set_power(registry: &Registry, vm: &ObjectRef, state: &str) {
    registry
        .atomic_update(
            &Context::new(),
            vm,
            vec![PropertyChange::assign("runtime.powerState", state)],
        )
        .unwrap();
}

async fn initial(pc: &PropertyCollector) -> UpdateSet {
    pc.wait_for_updates_ex("", WaitOptions::default())
        .await
        .unwrap()
        .unwrap()
}

async fn poll(pc: &PropertyCollector) -> Option<UpdateSet> {
    pc.wait_for_updates_ex(INITIAL_VERSION, WaitOptions::single_pass())
        .await
        .unwrap()
}

fn kinds(set: &UpdateSet) -> Vec<(UpdateKind, String)> {
    set.updates()
        .map(|u| (u.kind, u.obj.value.clone()))
        .collect()
}

#[tokio::test]
async fn test_initial_sync_then_quiet() {
    let fx = setup(2, 2);
    let filter = fx
        .pc
        .create_filter(vms_under(&fx.model.root, &["name", "runtime.powerState"]), false)
        .unwrap();

    let set = initial(&fx.pc).await;
    assert_eq!(set.version, INITIAL_VERSION);
    assert!(!set.truncated);

    let updates = &set.for_filter(&filter).unwrap().object_set;
    assert_eq!(updates.len(), 4);
    assert!(updates.iter().all(|u| u.kind == UpdateKind::Enter));
    assert_eq!(
        updates[0].change("name").and_then(|c| c.val.clone()),
        Some(Value::from("DC0_F0_VM0"))
    );
    assert_eq!(
        updates[0].change("runtime.powerState").map(|c| c.op),
        Some(ChangeOp::Assign)
    );

    assert!(poll(&fx.pc).await.is_none());
}

#[tokio::test]
async fn test_one_modify_per_mutation() {
    let fx = setup(1, 2);
    fx.pc
        .create_filter(vms_under(&fx.model.root, &["name", "runtime.powerState"]), false)
        .unwrap();
    initial(&fx.pc).await;

    let vm = &fx.model.vms[1];
    set_power(&fx.registry, vm, "poweredOn");

    let set = poll(&fx.pc).await.unwrap();
    assert_eq!(set.version, INITIAL_VERSION);
    assert_eq!(kinds(&set), vec![(UpdateKind::Modify, vm.value.clone())]);

    let update = set.updates().next().unwrap();
    assert_eq!(
        update.change_set,
        vec![PropertyChange::assign("runtime.powerState", "poweredOn")]
    );

    // Delivered once, never again
    assert!(poll(&fx.pc).await.is_none());
}

#[tokio::test]
async fn test_unrequested_changes_are_not_reported() {
    let fx = setup(1, 1);
    fx.pc
        .create_filter(vms_under(&fx.model.root, &["name"]), false)
        .unwrap();
    initial(&fx.pc).await;

    set_power(&fx.registry, &fx.model.vms[0], "poweredOn");
    assert!(poll(&fx.pc).await.is_none());
}

#[tokio::test]
async fn test_parent_and_child_paths() {
    let fx = setup(1, 1);
    let vm = &fx.model.vms[0];
    fx.pc
        .create_filter(watch(vm, "VirtualMachine", &["runtime", "config.name"]), false)
        .unwrap();
    initial(&fx.pc).await;

    // A nested change is reported as its requested parent, whole
    set_power(&fx.registry, vm, "poweredOn");
    let set = poll(&fx.pc).await.unwrap();
    let update = set.updates().next().unwrap();
    assert_eq!(update.change_set.len(), 1);
    let runtime = update.change("runtime").and_then(|c| c.val.as_ref()).unwrap();
    assert_eq!(
        runtime.as_object().and_then(|r| r.get("powerState")),
        Some(&Value::from("poweredOn"))
    );

    // Nothing under `config.name` changed
    fx.registry
        .atomic_update(
            &Context::new(),
            vm,
            vec![PropertyChange::assign("config.hardware.numCPU", 4)],
        )
        .unwrap();
    assert!(poll(&fx.pc).await.is_none());
}

#[tokio::test]
async fn test_keyed_item_paths() {
    let fx = setup(1, 1);
    let vm = &fx.model.vms[0];
    fx.pc
        .create_filter(
            watch(vm, "VirtualMachine", &["config.hardware.device[3000].label"]),
            false,
        )
        .unwrap();
    let set = initial(&fx.pc).await;
    // The device does not exist yet, so the Enter carries nothing for it
    assert!(set.updates().next().unwrap().change_set.is_empty());

    let cdrom = vsim_types::DataObject::new("VirtualDevice")
        .with("key", 3000)
        .with("label", "CD/DVD drive 1");
    fx.registry
        .atomic_update(
            &Context::new(),
            vm,
            vec![PropertyChange::add("config.hardware.device", cdrom)],
        )
        .unwrap();

    let set = poll(&fx.pc).await.unwrap();
    let update = set.updates().next().unwrap();
    assert_eq!(
        update.change_set,
        vec![PropertyChange::assign(
            "config.hardware.device[3000].label",
            "CD/DVD drive 1"
        )]
    );
}

#[tokio::test]
async fn test_empty_child_list_then_new_child() {
    let fx = setup(1, 0);
    let folder = &fx.model.folders[0];
    let filter = fx
        .pc
        .create_filter(watch(folder, "Folder", &["childEntity"]), false)
        .unwrap();

    let set = initial(&fx.pc).await;
    let enter = &set.for_filter(&filter).unwrap().object_set[0];
    assert_eq!(enter.kind, UpdateKind::Enter);
    assert_eq!(
        enter.change("childEntity").and_then(|c| c.val.clone()),
        Some(Value::refs(Vec::new()))
    );

    let vm = fx
        .registry
        .put_entity(&Context::new(), folder, VirtualMachine::new("B"))
        .unwrap();

    let set = poll(&fx.pc).await.unwrap();
    assert_eq!(kinds(&set), vec![(UpdateKind::Modify, folder.value.clone())]);
    assert_eq!(
        set.updates().next().unwrap().change_set,
        vec![PropertyChange::assign("childEntity", Value::refs(vec![vm]))]
    );
}

#[tokio::test]
async fn test_enter_and_leave_through_traversal() {
    let fx = setup(1, 1);
    fx.pc
        .create_filter(vms_under(&fx.model.root, &["name"]), false)
        .unwrap();
    initial(&fx.pc).await;

    let ctx = Context::new();
    let folder = &fx.model.folders[0];
    let added = fx
        .registry
        .put_entity(&ctx, folder, VirtualMachine::new("late"))
        .unwrap();
    // Changed in the same batch as its creation: only the Enter is seen
    fx.registry
        .atomic_update(&ctx, &added, vec![PropertyChange::assign("name", "later")])
        .unwrap();

    let set = poll(&fx.pc).await.unwrap();
    assert_eq!(kinds(&set), vec![(UpdateKind::Enter, added.value.clone())]);
    let enter = set.updates().next().unwrap();
    assert_eq!(enter.change("name").and_then(|c| c.val.clone()), Some(Value::from("later")));

    fx.registry.remove_entity(&ctx, &fx.model.vms[0]).unwrap();
    let set = poll(&fx.pc).await.unwrap();
    assert_eq!(kinds(&set), vec![(UpdateKind::Leave, fx.model.vms[0].value.clone())]);
    assert!(set.updates().next().unwrap().change_set.is_empty());
}

#[tokio::test]
async fn test_removal_of_watched_root() {
    let fx = setup(1, 1);
    let vm = fx.model.vms[0].clone();
    fx.pc
        .create_filter(watch(&vm, "VirtualMachine", &["name"]), false)
        .unwrap();
    initial(&fx.pc).await;

    fx.registry.remove_entity(&Context::new(), &vm).unwrap();
    let set = poll(&fx.pc).await.unwrap();
    assert_eq!(kinds(&set), vec![(UpdateKind::Leave, vm.value.clone())]);
    assert!(poll(&fx.pc).await.is_none());
}

#[tokio::test]
async fn test_truncation_across_filters() {
    let fx = setup(1, 3);
    let vms = &fx.model.vms;
    let first = fx
        .pc
        .create_filter(watch(&vms[0], "VirtualMachine", &["runtime.powerState"]), false)
        .unwrap();
    let second = fx
        .pc
        .create_filter(
            PropertyFilterSpec::new()
                .prop(PropertySpec::new("VirtualMachine").path("runtime.powerState"))
                .object(ObjectSpec::new(vms[1].clone()))
                .object(ObjectSpec::new(vms[2].clone())),
            false,
        )
        .unwrap();
    initial(&fx.pc).await;

    for vm in vms {
        set_power(&fx.registry, vm, "poweredOn");
    }

    let options = WaitOptions::single_pass().max_object_updates(1);
    let head = fx
        .pc
        .wait_for_updates_ex(INITIAL_VERSION, options)
        .await
        .unwrap()
        .unwrap();
    assert!(head.truncated);
    assert_eq!(head.object_count(), 1);
    assert!(head.for_filter(&first).is_some());

    // The remainder comes back before anything new is computed
    let rest = fx
        .pc
        .wait_for_updates_ex(INITIAL_VERSION, WaitOptions::single_pass())
        .await
        .unwrap()
        .unwrap();
    assert!(!rest.truncated);
    assert_eq!(rest.version, head.version);
    assert_eq!(rest.object_count(), 2);
    assert_eq!(rest.for_filter(&second).unwrap().object_set.len(), 2);

    assert!(poll(&fx.pc).await.is_none());
}

#[tokio::test]
async fn test_initial_sync_is_truncated_too() {
    let fx = setup(2, 2);
    fx.pc
        .create_filter(vms_under(&fx.model.root, &["name"]), false)
        .unwrap();

    let head = fx
        .pc
        .wait_for_updates_ex("", WaitOptions::default().max_object_updates(3))
        .await
        .unwrap()
        .unwrap();
    assert!(head.truncated);
    assert_eq!(head.object_count(), 3);

    let rest = poll(&fx.pc).await.unwrap();
    assert_eq!(rest.object_count(), 1);
    assert!(rest.updates().all(|u| u.kind == UpdateKind::Enter));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_blocking_wait_wakes_on_change() {
    let fx = setup(1, 1);
    fx.pc
        .create_filter(vms_under(&fx.model.root, &["runtime.powerState"]), false)
        .unwrap();
    initial(&fx.pc).await;

    let pc = fx.pc.clone();
    let waiter = tokio::spawn(async move { pc.wait_for_updates(INITIAL_VERSION).await });

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(!waiter.is_finished());
    set_power(&fx.registry, &fx.model.vms[0], "poweredOn");

    let set = waiter.await.unwrap().unwrap().unwrap();
    assert_eq!(set.object_count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cancel_wait() {
    let fx = setup(1, 1);
    fx.pc
        .create_filter(vms_under(&fx.model.root, &["name"]), false)
        .unwrap();
    initial(&fx.pc).await;

    let pc = fx.pc.clone();
    let waiter = tokio::spawn(async move {
        pc.wait_for_updates_ex(INITIAL_VERSION, WaitOptions::default())
            .await
    });

    tokio::time::sleep(Duration::from_millis(60)).await;
    fx.pc.cancel_wait_for_updates();

    let outcome = tokio::time::timeout(Duration::from_secs(5), waiter)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(outcome, Err(Fault::RequestCanceled));
}

#[tokio::test]
async fn test_wait_deadline() {
    let fx = setup(1, 1);
    fx.pc
        .create_filter(vms_under(&fx.model.root, &["name"]), false)
        .unwrap();
    initial(&fx.pc).await;

    let outcome = fx
        .pc
        .wait_for_updates_ex(INITIAL_VERSION, WaitOptions::default().max_wait_seconds(1))
        .await;
    assert_eq!(outcome, Err(Fault::DeadlineExceeded));
}

#[tokio::test]
async fn test_filter_created_after_sync_enters_on_next_wait() {
    let fx = setup(1, 2);
    fx.pc
        .create_filter(watch(&fx.model.vms[0], "VirtualMachine", &["name"]), false)
        .unwrap();
    initial(&fx.pc).await;

    let late = fx
        .pc
        .create_filter(watch(&fx.model.vms[1], "VirtualMachine", &["name"]), true)
        .unwrap();
    let set = poll(&fx.pc).await.unwrap();
    assert_eq!(
        set.for_filter(&late).unwrap().object_set[0].kind,
        UpdateKind::Enter
    );

    let filters = fx.pc.filters();
    assert_eq!(filters.len(), 2);
    assert!(filters.iter().any(|f| f.reference == late && f.partial_updates));
}

#[tokio::test]
async fn test_destroy_filter() {
    let fx = setup(1, 1);
    let filter = fx
        .pc
        .create_filter(vms_under(&fx.model.root, &["runtime.powerState"]), false)
        .unwrap();
    initial(&fx.pc).await;

    fx.pc.destroy_filter(&filter).unwrap();
    assert!(matches!(
        fx.pc.destroy_filter(&filter),
        Err(Fault::NotFound { .. })
    ));

    set_power(&fx.registry, &fx.model.vms[0], "poweredOn");
    assert!(poll(&fx.pc).await.is_none());
}

#[tokio::test]
async fn test_create_filter_rejects_bad_specs() {
    let fx = setup(1, 1);
    let gone = ObjectRef::new("VirtualMachine", "vm-404");

    assert_eq!(
        fx.pc.create_filter(watch(&gone, "VirtualMachine", &["name"]), false),
        Err(Fault::ManagedObjectNotFound { obj: gone })
    );

    let undefined = PropertyFilterSpec::new()
        .prop(PropertySpec::new("Folder").path("name"))
        .object(ObjectSpec::new(fx.model.root.clone()).select(SelectionSpec::named("nope")));
    assert!(matches!(
        fx.pc.create_filter(undefined, false),
        Err(Fault::InvalidArgument { .. })
    ));
    assert!(fx.pc.filters().is_empty());
}

#[tokio::test]
async fn test_collectors_are_independent() {
    let fx = setup(1, 1);
    let other = fx.pc.create_property_collector();
    assert_ne!(other.reference(), fx.pc.reference());

    fx.pc
        .create_filter(vms_under(&fx.model.root, &["runtime.powerState"]), false)
        .unwrap();
    initial(&fx.pc).await;
    let set = initial(&other).await;
    assert!(set.is_empty());

    // Only the collector with a filter listens for changes
    let handlers = fx.registry.handler_count();
    assert_eq!(handlers, 1);
    other.destroy_property_collector();
    assert_eq!(fx.registry.handler_count(), handlers);
    fx.pc.destroy_property_collector();
    assert_eq!(fx.registry.handler_count(), 0);
}

#[tokio::test]
async fn test_last_filter_gone_stops_listening() {
    let fx = setup(1, 2);
    let first = fx
        .pc
        .create_filter(watch(&fx.model.vms[0], "VirtualMachine", &["name"]), false)
        .unwrap();
    let second = fx
        .pc
        .create_filter(watch(&fx.model.vms[1], "VirtualMachine", &["name"]), false)
        .unwrap();
    assert_eq!(fx.registry.handler_count(), 0);
    initial(&fx.pc).await;
    assert_eq!(fx.registry.handler_count(), 1);

    fx.pc.destroy_filter(&first).unwrap();
    assert_eq!(fx.registry.handler_count(), 1);
    fx.pc.destroy_filter(&second).unwrap();
    assert_eq!(fx.registry.handler_count(), 0);

    // Changes made while nobody listens are not replayed to a new filter
    set_power(&fx.registry, &fx.model.vms[0], "poweredOn");
    fx.pc
        .create_filter(watch(&fx.model.vms[0], "VirtualMachine", &["runtime.powerState"]), false)
        .unwrap();
    let set = poll(&fx.pc).await.unwrap();
    let updates: Vec<_> = set.updates().collect();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].kind, UpdateKind::Enter);
    assert_eq!(fx.registry.handler_count(), 1);
    assert!(poll(&fx.pc).await.is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_task_driven_change_is_delivered() {
    let fx = setup(1, 1);
    let vm = &fx.model.vms[0];
    fx.pc
        .create_filter(watch(vm, "VirtualMachine", &["runtime.powerState"]), false)
        .unwrap();
    initial(&fx.pc).await;

    let manager = TaskManager::new(fx.registry.clone(), TaskConfig::default());
    power_on_vm(&manager, vm)
        .run(&Context::new())
        .wait()
        .await
        .unwrap();

    let set = poll(&fx.pc).await.unwrap();
    assert_eq!(
        set.updates().next().unwrap().change_set,
        vec![PropertyChange::assign("runtime.powerState", "poweredOn")]
    );
}
