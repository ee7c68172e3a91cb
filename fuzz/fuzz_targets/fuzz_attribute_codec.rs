#![no_main]

use libfuzzer_sys::fuzz_target;
use oil_core::codec::{
    controllers_from_attribute, declares_controller, declares_target, target_pairs,
    targets_from_attribute,
};

fuzz_target!(|value: &str| {
    let names = controllers_from_attribute(value);
    for (i, name) in names.iter().enumerate() {
        assert!(!name.is_empty());
        assert!(!name.contains(char::is_whitespace));
        assert!(declares_controller(value, name));
        assert!(!names[..i].contains(name));
    }

    let tokens = targets_from_attribute(value);
    let pairs = target_pairs(value);
    for (controller, target) in &pairs {
        assert!(!target.is_empty());
        assert!(declares_target(value, controller, target));
    }
    assert!(pairs.len() <= tokens.len());
});
