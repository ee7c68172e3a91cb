#![forbid(unsafe_code)]

//! Controller attribute edits: diffing, idempotence and round trips.

use oil_core::{ApplicationConfig, RoundTripPolicy};
use oil_dom::element;
use oil_harness::{CONTROLLER, Event, Harness, TARGET};

fn harness_abc(config: ApplicationConfig) -> Harness {
    let mut h = Harness::with_config(config);
    for name in ["a", "b", "c"] {
        h.register_recorder(name, &[]);
    }
    h
}

#[test]
fn swapping_names_applies_only_the_delta() {
    let mut h = harness_abc(ApplicationConfig::default());
    let el = h.mount(&element("div").attr(CONTROLLER, "a b"));
    h.settle();
    h.log.clear();

    h.set(el, CONTROLLER, "b c");
    h.settle();

    assert_eq!(
        h.log.lifecycle(),
        vec![Event::disconnected("a", el), Event::connected("c", el)]
    );
    assert!(!h.is_connected(el, "a"));
    assert!(h.is_connected(el, "b"));
    assert!(h.is_connected(el, "c"));
}

#[test]
fn setting_the_same_value_twice_is_idempotent() {
    let mut h = harness_abc(ApplicationConfig::default());
    let el = h.mount(&element("div").attr(CONTROLLER, "a"));
    h.settle();
    let before = h.log.len();

    h.set(el, CONTROLLER, "a");
    h.settle();
    h.set(el, CONTROLLER, "a");
    h.set(el, CONTROLLER, "  a  ");
    h.settle();

    assert_eq!(h.log.len(), before);
}

#[test]
fn emptying_the_attribute_leaves_descendants_alone() {
    let mut h = harness_abc(ApplicationConfig::default());
    let outer = h.mount(
        &element("div")
            .attr(CONTROLLER, "a")
            .child(element("div").attr(CONTROLLER, "a")),
    );
    let inner = h.child(outer, 0);
    h.settle();
    h.log.clear();

    h.set(outer, CONTROLLER, "");
    h.settle();

    assert_eq!(h.log.lifecycle(), vec![Event::disconnected("a", outer)]);
    assert!(h.is_connected(inner, "a"));
}

#[test]
fn readding_a_name_reuses_the_instance() {
    let mut h = harness_abc(ApplicationConfig::default());
    let el = h.mount(&element("div").attr(CONTROLLER, "a"));
    h.settle();

    h.unset(el, CONTROLLER);
    h.settle();
    h.set(el, CONTROLLER, "a");
    h.settle();

    assert_eq!(h.log.constructs("a"), 1);
    assert_eq!(h.log.initializes("a"), 1);
    assert_eq!(h.log.connects("a"), 2);
    assert_eq!(h.log.disconnects("a"), 1);
}

#[test]
fn unknown_names_are_skipped_until_registered() {
    let mut h = Harness::new();
    h.register_recorder("a", &[]);
    let el = h.mount(&element("div").attr(CONTROLLER, "a later"));
    h.settle();
    assert!(h.is_connected(el, "a"));
    assert!(h.app.instance(el, "later").is_none());

    h.register_recorder("later", &[]);
    assert!(h.is_connected(el, "later"));
}

#[test]
fn round_trip_is_suppressed_by_default() {
    let mut h = harness_abc(ApplicationConfig::default());
    let el = h.mount(&element("div").attr(CONTROLLER, "a"));
    h.settle();
    h.log.clear();

    // a -> b -> a, delivered as one batch.
    h.set(el, CONTROLLER, "b");
    h.set(el, CONTROLLER, "a");
    h.settle();

    assert!(h.log.is_empty(), "{}", h.log.to_json());
    assert!(h.is_connected(el, "a"));
    assert!(h.app.instance(el, "b").is_none());
}

#[test]
fn round_trip_fires_when_configured() {
    let mut h = harness_abc(ApplicationConfig::default().with_round_trip(RoundTripPolicy::Fire));
    let el = h.mount(&element("div").attr(CONTROLLER, "a"));
    h.settle();
    h.log.clear();

    h.set(el, CONTROLLER, "b");
    h.set(el, CONTROLLER, "a");
    h.settle();

    assert_eq!(
        h.log.lifecycle(),
        vec![
            Event::disconnected("a", el),
            Event::connected("b", el),
            Event::disconnected("b", el),
            Event::connected("a", el),
        ]
    );
    assert!(h.is_connected(el, "a"));
    assert!(!h.is_connected(el, "b"));
}

#[test]
fn target_round_trip_follows_the_policy() {
    for (policy, expected) in [(RoundTripPolicy::Suppress, 0), (RoundTripPolicy::Fire, 2)] {
        let mut h = Harness::with_config(ApplicationConfig::default().with_round_trip(policy));
        h.register_recorder("list", &["item"]);
        let ul = h.mount(
            &element("ul")
                .attr(CONTROLLER, "list")
                .child(element("li").attr(TARGET, "list.item")),
        );
        let li = h.child(ul, 0);
        h.settle();
        h.log.clear();

        h.unset(li, TARGET);
        h.set(li, TARGET, "list.item");
        h.settle();

        assert_eq!(h.log.len(), expected, "{policy:?}: {}", h.log.to_json());
        assert_eq!(h.targets(ul, "list", "item"), vec![li]);
    }
}

#[test]
fn custom_attribute_names() {
    let config = ApplicationConfig::default()
        .with_controller_attribute("data-ctrl")
        .with_target_attribute("data-tgt");
    let mut h = Harness::with_config(config);
    h.register_recorder("list", &["item"]);
    let ul = h.mount(
        &element("ul")
            .attr("data-ctrl", "list")
            .child(element("li").attr("data-tgt", "list.item"))
            .child(element("li").attr(TARGET, "list.item")),
    );
    let ignored = h.mount(&element("ul").attr(CONTROLLER, "list"));
    h.settle();

    assert_eq!(h.targets(ul, "list", "item"), vec![h.child(ul, 0)]);
    assert!(!h.is_connected(ignored, "list"));
}

#[test]
fn edits_made_while_detached_apply_on_reattach() {
    let mut h = harness_abc(ApplicationConfig::default());
    let el = h.mount(&element("div").attr(CONTROLLER, "a b"));
    h.settle();
    h.log.clear();

    // Detach, edit and reattach within one batch.
    let root = h.root();
    h.detach(el);
    h.set(el, CONTROLLER, "b c");
    h.append(root, el);
    h.settle();

    assert_eq!(
        h.log.lifecycle(),
        vec![Event::disconnected("a", el), Event::connected("c", el)]
    );
    assert!(!h.is_connected(el, "a"));
    assert!(h.is_connected(el, "b"));
    assert!(h.is_connected(el, "c"));
}
