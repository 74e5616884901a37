//! Testable properties (SPEC_FULL.md §8, points 1-9): black-box checks driven entirely through
//! [`netcmp::prelude::Engine`], mirroring how the teacher's `tests/circuit.rs` exercised its
//! netlist model through its own public API rather than internals.

use netcmp::prelude::*;
use netcmp::property::values_match;

fn resistor_cell(name: &str, net_a: &str, net_b: &str, r: f64) -> CellDefinition {
    CellDefinition::new(name)
        .with_pin("a", Direction::InOut)
        .with_pin("b", Direction::InOut)
        .with_device(DeviceInstanceDef::new(
            "R1",
            DeviceKind::Primitive(PrimitiveClass::Resistor),
            vec![("1", Some(net_a.to_string())), ("2", Some(net_b.to_string()))],
            PropertyRecord::new().with("R", PropertyValue::Double(r)),
        ))
}

fn resistor_dict(slop: f64) -> PropertyDict {
    let mut dict = PropertyDict::new();
    let mut r = PropertyKey::numeric(PropertyType::Double, Slop::Relative(slop));
    r.parallel = MergePolicy::Critical;
    r.series = MergePolicy::Critical;
    dict.insert("R", r);
    dict
}

#[test]
fn reflexivity_compare_c_with_itself_is_perfect() {
    let mut lib = CellLibrary::new();
    lib.insert(1, resistor_cell("top", "A", "B", 1000.0));
    lib.insert(2, resistor_cell("top", "A", "B", 1000.0));
    let mut engine = Engine::new(lib, EngineConfig::default());

    let report = engine.compare("top", 1, "top", 2).unwrap();
    assert_eq!(report.verdict, MatchVerdict::Perfect);
    assert!(report.property_mismatches.is_empty());
}

#[test]
fn symmetry_swapping_argument_order_yields_the_same_verdict() {
    let mut lib = CellLibrary::new();
    lib.insert(1, resistor_cell("a", "A", "B", 1000.0));
    lib.insert(2, resistor_cell("b", "X", "Y", 2000.0));

    let mut forward = Engine::new(lib.clone(), EngineConfig::default());
    let forward_report = forward.compare("a", 1, "b", 2).unwrap();

    let mut backward = Engine::new(lib, EngineConfig::default());
    let backward_report = backward.compare("b", 2, "a", 1).unwrap();

    assert_eq!(forward_report.verdict, backward_report.verdict);
    assert_eq!(forward_report.mismatched_devices.len(), backward_report.mismatched_devices.len());
    assert_eq!(forward_report.mismatched_nets.len(), backward_report.mismatched_nets.len());
}

fn mosfet_cell(name: &str, drain: &str, source: &str) -> CellDefinition {
    CellDefinition::new(name).with_device(DeviceInstanceDef::new(
        "M1",
        DeviceKind::Primitive(PrimitiveClass::Mosfet4),
        vec![
            ("drain", Some(drain.to_string())),
            ("gate", Some("G".to_string())),
            ("source", Some(source.to_string())),
            ("bulk", Some("B".to_string())),
        ],
        PropertyRecord::new(),
    ))
}

#[test]
fn permutation_invariance_default_mos_rule_absorbs_a_drain_source_swap() {
    let mut lib = CellLibrary::new();
    lib.insert(1, mosfet_cell("top", "D", "S"));
    lib.insert(2, mosfet_cell("top", "S", "D"));
    let mut engine = Engine::new(lib, EngineConfig::default());

    let report = engine.compare("top", 1, "top", 2).unwrap();
    assert_eq!(report.verdict, MatchVerdict::Perfect);
}

#[test]
fn rename_invariance_renaming_every_device_and_net_leaves_the_verdict_unchanged() {
    let mut lib = CellLibrary::new();
    lib.insert(1, resistor_cell("top", "A", "B", 1000.0));
    // Circuit 2: same shape, every device and net renamed by an injection (R1 -> Rx, A/B -> N1/N2).
    let renamed = CellDefinition::new("top")
        .with_pin("a", Direction::InOut)
        .with_pin("b", Direction::InOut)
        .with_device(DeviceInstanceDef::new(
            "Rx",
            DeviceKind::Primitive(PrimitiveClass::Resistor),
            vec![("1", Some("N1".to_string())), ("2", Some("N2".to_string()))],
            PropertyRecord::new().with("R", PropertyValue::Double(1000.0)),
        ));
    lib.insert(2, renamed);
    let mut engine = Engine::new(lib, EngineConfig::default());

    let report = engine.compare("top", 1, "top", 2).unwrap();
    assert_eq!(report.verdict, MatchVerdict::Perfect);
    assert_eq!(report.matched_devices.len(), 1);
}

#[test]
fn parallel_merge_correctness_two_resistors_at_r1_m1_equal_one_at_r1_m2() {
    let dict = resistor_dict(0.01);
    let split = CellDefinition {
        name: "split".to_string(),
        pins: vec![],
        globals: Default::default(),
        devices: vec![
            DeviceInstanceDef::new(
                "R1",
                DeviceKind::Primitive(PrimitiveClass::Resistor),
                vec![("1", Some("A".to_string())), ("2", Some("B".to_string()))],
                PropertyRecord::new().with("R", PropertyValue::Double(1.0)),
            ),
            DeviceInstanceDef::new(
                "R2",
                DeviceKind::Primitive(PrimitiveClass::Resistor),
                vec![("1", Some("A".to_string())), ("2", Some("B".to_string()))],
                PropertyRecord::new().with("R", PropertyValue::Double(1.0)),
            ),
        ],
        property_dict: dict.clone(),
        case_insensitive_strings: false,
        permutes: Default::default(),
    };
    let mut combined = CellDefinition::new("combined").with_device(DeviceInstanceDef::new(
        "R1",
        DeviceKind::Primitive(PrimitiveClass::Resistor),
        vec![("1", Some("A".to_string())), ("2", Some("B".to_string()))],
        PropertyRecord::new().with("R", PropertyValue::Double(1.0)).with(KEY_M, PropertyValue::Integer(2)),
    ));
    combined.property_dict = dict;

    let mut lib = CellLibrary::new();
    lib.insert(1, split);
    lib.insert(2, combined);
    let mut engine = Engine::new(lib, EngineConfig::default());

    let report = engine.compare("split", 1, "combined", 2).unwrap();
    assert_eq!(report.verdict, MatchVerdict::Perfect);
}

#[test]
fn series_merge_correctness_two_resistors_at_r1_s1_equal_one_at_r1_s2() {
    let dict = resistor_dict(0.01);
    let chain = CellDefinition {
        name: "chain".to_string(),
        pins: vec![],
        globals: Default::default(),
        devices: vec![
            DeviceInstanceDef::new(
                "R1",
                DeviceKind::Primitive(PrimitiveClass::Resistor),
                vec![("1", Some("A".to_string())), ("2", Some("mid".to_string()))],
                PropertyRecord::new().with("R", PropertyValue::Double(1.0)),
            ),
            DeviceInstanceDef::new(
                "R2",
                DeviceKind::Primitive(PrimitiveClass::Resistor),
                vec![("1", Some("mid".to_string())), ("2", Some("B".to_string()))],
                PropertyRecord::new().with("R", PropertyValue::Double(1.0)),
            ),
        ],
        property_dict: dict.clone(),
        case_insensitive_strings: false,
        permutes: Default::default(),
    };
    let mut combined = CellDefinition::new("combined").with_device(DeviceInstanceDef::new(
        "R1",
        DeviceKind::Primitive(PrimitiveClass::Resistor),
        vec![("1", Some("A".to_string())), ("2", Some("B".to_string()))],
        PropertyRecord::new().with("R", PropertyValue::Double(1.0)).with(KEY_S, PropertyValue::Integer(2)),
    ));
    combined.property_dict = dict;

    let mut lib = CellLibrary::new();
    lib.insert(1, chain);
    lib.insert(2, combined);
    let mut engine = Engine::new(lib, EngineConfig::default());

    let report = engine.compare("chain", 1, "combined", 2).unwrap();
    assert_eq!(report.verdict, MatchVerdict::Perfect);
}

#[test]
fn property_tolerance_within_slop_matches_outside_slop_mismatches() {
    let key = PropertyKey::numeric(PropertyType::Double, Slop::Relative(0.1));
    assert!(values_match(&key, &PropertyValue::Double(100.0), &PropertyValue::Double(105.0)));
    assert!(!values_match(&key, &PropertyValue::Double(100.0), &PropertyValue::Double(150.0)));
}

fn two_identical_instances(name: &str) -> CellDefinition {
    CellDefinition::new(name)
        .with_pin("vout", Direction::Output)
        .with_device(DeviceInstanceDef::new(
            "inv1",
            DeviceKind::Primitive(PrimitiveClass::Resistor),
            vec![("1", Some("vin".to_string())), ("2", Some("vout".to_string()))],
            PropertyRecord::new(),
        ))
        .with_device(DeviceInstanceDef::new(
            "inv2",
            DeviceKind::Primitive(PrimitiveClass::Resistor),
            vec![("1", Some("vin".to_string())), ("2", Some("vout".to_string()))],
            PropertyRecord::new(),
        ))
}

#[test]
fn automorphism_detection_two_identical_subcircuits_resolve_without_mismatch() {
    let mut lib = CellLibrary::new();
    lib.insert(1, two_identical_instances("top"));
    lib.insert(2, two_identical_instances("top"));
    let mut engine = Engine::new(lib, EngineConfig::default());

    let report = engine.compare("top", 1, "top", 2).unwrap();
    assert_eq!(report.verdict, MatchVerdict::Perfect);
    assert_eq!(report.matched_devices.len(), 2);
}

#[test]
fn mismatch_detection_names_the_affected_net() {
    let mut lib = CellLibrary::new();
    lib.insert(1, resistor_cell("top", "A", "B", 1000.0));
    // Circuit 2: R1's second pin moved onto A too, shorting the device.
    lib.insert(2, resistor_cell("top", "A", "A", 1000.0));
    let mut engine = Engine::new(lib, EngineConfig::default());

    let report = engine.compare("top", 1, "top", 2).unwrap();
    assert_eq!(report.verdict, MatchVerdict::Mismatch);
    assert!(!report.mismatched_nets.is_empty());
}
