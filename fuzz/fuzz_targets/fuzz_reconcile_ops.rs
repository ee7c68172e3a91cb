#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use oil_core::codec::declares_controller;
use oil_core::config::{DEFAULT_CONTROLLER_ATTRIBUTE, DEFAULT_TARGET_ATTRIBUTE};
use oil_core::{
    Application, ApplicationConfig, Controller, ControllerDefinition, RoundTripPolicy,
};
use oil_dom::{Document, NodeId};

const NAMES: [&str; 3] = ["a", "b", "c"];
const MAX_NODES: usize = 32;

struct Noop;

impl Controller for Noop {}

#[derive(Debug, Arbitrary)]
enum Op {
    Create,
    Append { parent: u8, child: u8 },
    Remove { node: u8 },
    SetControllers { node: u8, mask: u8 },
    SetTargets { node: u8, mask: u8 },
    ClearControllers { node: u8 },
    Flush,
    Turn,
    Settle,
}

#[derive(Debug, Arbitrary)]
struct Input {
    fire: bool,
    ops: Vec<Op>,
}

fn pick(nodes: &[NodeId], index: u8) -> NodeId {
    nodes[usize::from(index) % nodes.len()]
}

fn tokens(mask: u8, suffix: &str) -> String {
    NAMES
        .iter()
        .enumerate()
        .filter(|(i, _)| mask & (1 << i) != 0)
        .map(|(_, name)| format!("{name}{suffix}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fuzz_target!(|input: Input| {
    let policy = if input.fire {
        RoundTripPolicy::Fire
    } else {
        RoundTripPolicy::Suppress
    };
    let mut doc = Document::new();
    let Ok(mut app) = Application::launch(ApplicationConfig::default().with_round_trip(policy), &mut doc)
    else {
        return;
    };
    for name in NAMES {
        let definition = ControllerDefinition::new(name, || Noop).with_targets(["item"]);
        if app.register(&mut doc, definition).is_err() {
            return;
        }
    }

    let mut nodes = vec![doc.document_element()];
    for op in input.ops {
        match op {
            Op::Create if nodes.len() < MAX_NODES => nodes.push(doc.create_element("div")),
            Op::Create => {}
            Op::Append { parent, child } => {
                let _ = doc.append_child(pick(&nodes, parent), pick(&nodes, child));
            }
            Op::Remove { node } => {
                let _ = doc.remove(pick(&nodes, node));
            }
            Op::SetControllers { node, mask } => {
                let _ = doc.set_attribute(pick(&nodes, node), DEFAULT_CONTROLLER_ATTRIBUTE, tokens(mask, ""));
            }
            Op::SetTargets { node, mask } => {
                let _ = doc.set_attribute(pick(&nodes, node), DEFAULT_TARGET_ATTRIBUTE, tokens(mask, ".item"));
            }
            Op::ClearControllers { node } => {
                let _ = doc.remove_attribute(pick(&nodes, node), DEFAULT_CONTROLLER_ATTRIBUTE);
            }
            Op::Flush => {
                app.process_pending(&mut doc);
            }
            Op::Turn => {
                app.run_deferred(&mut doc);
            }
            Op::Settle => {
                app.settle(&mut doc);
            }
        }
    }

    app.settle(&mut doc);
    assert!(!app.has_pending_work(&doc));
    for &node in &nodes {
        let live = doc.attribute(node, DEFAULT_CONTROLLER_ATTRIBUTE).unwrap_or_default();
        for name in NAMES {
            let expected = doc.is_connected(node) && declares_controller(live, name);
            assert_eq!(app.controller(node, name).is_some(), expected);
        }
    }
});
