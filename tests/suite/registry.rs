//! Registration rules enforced at attach time.

use toggle_engine::RegistryError;

use crate::common::{FlakyStore, RecordingHost, engine, name, names, switch};

#[tokio::test]
async fn duplicate_name_is_rejected_at_attach() {
    let store = FlakyStore::new();
    let host = RecordingHost::new();
    let engine = engine(&store);

    engine.attach(switch("A"), host.clone()).await.unwrap();
    let err = engine
        .attach(switch("A").with_depends_on(names(&["B"])), host.clone())
        .await
        .unwrap_err();

    assert_eq!(err, RegistryError::Duplicate(name("A")));
    assert_eq!(engine.registry().len(), 1);
    assert!(engine.registry().get("A").unwrap().depends_on.is_empty());
}

#[tokio::test]
async fn self_dependency_is_rejected_at_attach() {
    let store = FlakyStore::new();
    let host = RecordingHost::new();
    let engine = engine(&store);

    let err = engine
        .attach(switch("A").with_depends_on(names(&["A"])), host.clone())
        .await
        .unwrap_err();
    assert_eq!(
        err,
        RegistryError::SelfDependency {
            name: name("A"),
            list: "depends_on"
        }
    );
    assert!(engine.registry().is_empty());
    assert!(engine.switch("A").is_none());
}

#[tokio::test]
async fn dependents_are_listed_in_registration_order() {
    let store = FlakyStore::new();
    let host = RecordingHost::new();
    let engine = engine(&store);
    for config in [
        switch("A"),
        switch("C").with_depends_on(names(&["A"])),
        switch("B").with_depends_on(names(&["A"])),
        switch("D").with_depends_off(names(&["A"])),
    ] {
        engine.attach(config, host.clone()).await.unwrap();
    }

    let on: Vec<_> = engine
        .registry()
        .dependents_on("A")
        .into_iter()
        .map(|c| c.name)
        .collect();
    assert_eq!(on, names(&["C", "B"]));
    let off: Vec<_> = engine
        .registry()
        .dependents_off("A")
        .into_iter()
        .map(|c| c.name)
        .collect();
    assert_eq!(off, names(&["D"]));

    let listed: Vec<_> = engine.switches().iter().map(|s| s.name().clone()).collect();
    assert_eq!(listed, names(&["A", "C", "B", "D"]));
}
