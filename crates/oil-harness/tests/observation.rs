#![forbid(unsafe_code)]

//! Start, stop, root scoping and the host-driven loop.

use oil_core::{ApplicationConfig, ReconcilerState};
use oil_dom::element;
use oil_harness::{CONTROLLER, Event, Harness, TARGET, scripted};

#[test]
fn stop_delivers_queued_records_first() {
    let mut h = Harness::new();
    h.register_recorder("example", &[]);
    let el = h.mount(&element("div").attr(CONTROLLER, "example"));
    assert!(h.log.is_empty());

    assert!(h.stop());
    assert!(h.is_connected(el, "example"));
    assert_eq!(h.app.state(), ReconcilerState::Stopped);

    // Unobserved from here on.
    h.detach(el);
    assert_eq!(h.flush(), 0);
    assert!(h.is_connected(el, "example"));
    assert!(!h.stop());
}

#[test]
fn restart_catches_up_with_unobserved_edits() {
    let mut h = Harness::new();
    h.register_recorder("example", &["item"]);
    let kept = h.mount(
        &element("div")
            .attr(CONTROLLER, "example")
            .child(element("p").attr(TARGET, "example.item")),
    );
    let dropped = h.mount(&element("div").attr(CONTROLLER, "example"));
    h.settle();
    h.stop();

    let item = h.child(kept, 0);
    h.detach(item);
    h.detach(dropped);
    let added = h.mount(&element("div").attr(CONTROLLER, "example"));
    h.log.clear();

    h.start().unwrap();
    h.settle();

    assert!(h.is_connected(kept, "example"));
    assert!(h.targets(kept, "example", "item").is_empty());
    assert!(!h.is_connected(dropped, "example"));
    assert!(h.is_connected(added, "example"));
    assert_eq!(
        h.log.lifecycle(),
        vec![
            Event::target_disconnected("example", "item", item),
            Event::disconnected("example", dropped),
            Event::connected("example", added),
        ]
    );
}

#[test]
fn only_the_configured_root_is_observed() {
    let mut h = Harness::stopped(ApplicationConfig::default());
    let inside = h.mount(&element("main"));
    let outside = h.mount(&element("aside"));
    h.app
        .configure(ApplicationConfig::default().with_root(inside))
        .unwrap();
    h.register_recorder("example", &[]);
    h.start().unwrap();
    assert_eq!(h.app.root(), Some(inside));

    let a = h.doc.build(&element("div").attr(CONTROLLER, "example"));
    let b = h.doc.build(&element("div").attr(CONTROLLER, "example"));
    h.append(inside, a);
    h.append(outside, b);
    h.settle();
    assert!(h.is_connected(a, "example"));
    assert!(!h.is_connected(b, "example"));

    // Moving out of the root disconnects; moving in connects.
    h.append(outside, a);
    h.append(inside, b);
    h.settle();
    assert!(!h.is_connected(a, "example"));
    assert!(h.is_connected(b, "example"));
}

#[test]
fn callback_mutations_become_later_batches() {
    let mut h = Harness::new();
    let log = h.log.clone();
    h.register(scripted("list", &["item"], &log, |cx| {
        let list = cx.element();
        if cx.document().element_children(list).next().is_some() {
            return Ok(());
        }
        let doc = cx.document_mut();
        let item = doc.create_element("li");
        doc.set_attribute(item, TARGET, "list.item")?;
        doc.append_child(list, item)?;
        Ok(())
    }))
    .unwrap();

    let ul = h.mount(&element("ul").attr(CONTROLLER, "list"));
    h.settle();

    let items = h.targets(ul, "list", "item");
    assert_eq!(items.len(), 1);
    assert_eq!(
        h.log.lifecycle(),
        vec![
            Event::connected("list", ul),
            Event::target_connected("list", "item", items[0]),
        ]
    );
}

#[test]
fn batch_limit_leaves_records_queued() {
    let mut h = Harness::with_config(ApplicationConfig::default().with_max_batches_per_flush(1));
    let log = h.log.clone();
    h.register(scripted("grow", &[], &log, |cx| {
        let el = cx.element();
        let doc = cx.document_mut();
        let child = doc.create_element("div");
        doc.append_child(el, child)?;
        Ok(())
    }))
    .unwrap();

    h.mount(&element("div").attr(CONTROLLER, "grow"));
    assert_eq!(h.flush(), 1);
    // The callback's own insertion is still waiting.
    assert!(h.app.has_pending_work(&h.doc));
    assert_eq!(h.flush(), 1);
    assert_eq!(h.flush(), 0);
}

#[test]
fn stop_past_the_batch_limit_still_applies_queued_edits() {
    let mut h = Harness::with_config(ApplicationConfig::default().with_max_batches_per_flush(1));
    h.register_recorder("example", &[]);
    let victim = h.mount(&element("div").attr(CONTROLLER, "example"));
    h.settle();

    let log = h.log.clone();
    h.register(scripted("edit", &[], &log, move |cx| {
        let el = cx.element();
        let doc = cx.document_mut();
        doc.remove_attribute(victim, CONTROLLER)?;
        let child = doc.create_element("div");
        doc.set_attribute(child, CONTROLLER, "example")?;
        doc.append_child(el, child)?;
        Ok(())
    }))
    .unwrap();
    let editor = h.mount(&element("div").attr(CONTROLLER, "edit"));

    // One batch connects `edit`; its edits are left queued by the limit.
    assert!(h.stop());
    let child = h.child(editor, 0);
    assert!(h.is_connected(editor, "edit"));
    assert!(!h.is_connected(victim, "example"));
    assert!(h.is_connected(child, "example"));
}

#[test]
fn deferred_discovery_is_cancelled_by_disconnect() {
    let mut h = Harness::new();
    h.register_recorder("list", &["item"]);
    let ul = h.mount(
        &element("ul")
            .attr(CONTROLLER, "list")
            .child(element("li").attr(TARGET, "list.item")),
    );
    h.flush();
    h.detach(ul);
    h.flush();

    assert_eq!(h.turn(), 0);
    assert_eq!(h.log.count(|e| matches!(e, Event::TargetConnected { .. })), 0);
}

#[test]
fn configuration_from_toml() {
    let config = ApplicationConfig::from_toml_str(
        r#"
        controller-attribute = "data-ctrl"
        target-attribute = "data-tgt"
        round-trip = "fire"
        "#,
    )
    .unwrap();
    let mut h = Harness::with_config(config);
    h.register_recorder("list", &["item"]);
    let ul = h.mount(
        &element("ul")
            .attr("data-ctrl", "list")
            .child(element("li").attr("data-tgt", "list.item")),
    );
    h.settle();
    assert_eq!(h.targets(ul, "list", "item").len(), 1);
}
