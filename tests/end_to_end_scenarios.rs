//! End-to-end scenarios E1-E6 (SPEC_FULL.md §8), each built from the literal inputs the spec
//! describes and checked against its literal expected outcome.

use netcmp::hierarchy::flatten_instance;
use netcmp::prelude::*;

fn resistor(name: &str, a: &str, b: &str, r: f64) -> DeviceInstanceDef {
    DeviceInstanceDef::new(
        name,
        DeviceKind::Primitive(PrimitiveClass::Resistor),
        vec![("1", Some(a.to_string())), ("2", Some(b.to_string()))],
        PropertyRecord::new().with("R", PropertyValue::Double(r)),
    )
}

fn resistor_dict() -> PropertyDict {
    let mut dict = PropertyDict::new();
    let mut r = PropertyKey::numeric(PropertyType::Double, Slop::Relative(0.01));
    r.parallel = MergePolicy::Critical;
    r.series = MergePolicy::Critical;
    dict.insert("R", r);
    dict
}

/// E1: `R1 between A and B, R=1k` on both sides. Perfect match, no automorphisms, no property
/// mismatches.
#[test]
fn e1_identical_single_resistor_is_a_perfect_match() {
    let cell = || {
        CellDefinition::new("top")
            .with_pin("a", Direction::InOut)
            .with_pin("b", Direction::InOut)
            .with_device(resistor("R1", "A", "B", 1000.0))
    };
    let mut lib = CellLibrary::new();
    lib.insert(1, cell());
    lib.insert(2, cell());
    let mut engine = Engine::new(lib, EngineConfig::default());

    let report = engine.compare("top", 1, "top", 2).unwrap();
    assert_eq!(report.verdict, MatchVerdict::Perfect);
    assert!(report.property_mismatches.is_empty());
}

/// E2: two parallel resistors (`R1 A-B 1k`, `R2 B-A 1k`) vs one combined resistor
/// (`R1 A-B, R=500, M=1`... combined means `R=500, M=2`). After pre-reduction, perfect match.
#[test]
fn e2_two_parallel_resistors_pre_reduce_to_match_one_combined() {
    let dict = resistor_dict();
    let mut split = CellDefinition::new("top")
        .with_pin("a", Direction::InOut)
        .with_pin("b", Direction::InOut)
        .with_device(resistor("R1", "A", "B", 1000.0))
        .with_device(resistor("R2", "B", "A", 1000.0));
    split.property_dict = dict.clone();

    let mut combined = CellDefinition::new("top").with_pin("a", Direction::InOut).with_pin("b", Direction::InOut).with_device(
        DeviceInstanceDef::new(
            "R1",
            DeviceKind::Primitive(PrimitiveClass::Resistor),
            vec![("1", Some("A".to_string())), ("2", Some("B".to_string()))],
            PropertyRecord::new().with("R", PropertyValue::Double(500.0)).with(KEY_M, PropertyValue::Integer(2)),
        ),
    );
    combined.property_dict = dict;

    let mut lib = CellLibrary::new();
    lib.insert(1, split);
    lib.insert(2, combined);
    let mut engine = Engine::new(lib, EngineConfig::default());

    let report = engine.compare("top", 1, "top", 2).unwrap();
    assert_eq!(report.verdict, MatchVerdict::Perfect);
}

fn mosfet(drain: &str, source: &str) -> CellDefinition {
    CellDefinition::new("top").with_device(DeviceInstanceDef::new(
        "M1",
        DeviceKind::Primitive(PrimitiveClass::Mosfet4),
        vec![
            ("gate", Some("G".to_string())),
            ("drain", Some(drain.to_string())),
            ("source", Some(source.to_string())),
            ("bulk", Some("B".to_string())),
        ],
        PropertyRecord::new(),
    ))
}

/// E3: drain/source swapped between circuit 1 and 2. With the default MOS source/drain
/// permutation rule in effect (a mosfet4 device), the swap is absorbed and the circuits match.
/// Without it (a plain device class with no permutation rule), the same swap is a mismatch on the
/// drain/source nets.
#[test]
fn e3_drain_source_swap_matches_with_default_mos_rule_mismatches_without_it() {
    let mut lib = CellLibrary::new();
    lib.insert(1, mosfet("D", "S"));
    lib.insert(2, mosfet("S", "D"));
    let mut engine = Engine::new(lib, EngineConfig::default());
    let report = engine.compare("top", 1, "top", 2).unwrap();
    assert_eq!(report.verdict, MatchVerdict::Perfect);

    let mut lib_no_rule = CellLibrary::new();
    let no_bulk = |drain: &str, source: &str| {
        CellDefinition::new("top").with_device(DeviceInstanceDef::new(
            "M1",
            DeviceKind::Primitive(PrimitiveClass::Other("fixed_pinout".to_string())),
            vec![("gate", Some("G".to_string())), ("drain", Some(drain.to_string())), ("source", Some(source.to_string()))],
            PropertyRecord::new(),
        ))
    };
    lib_no_rule.insert(1, no_bulk("D", "S"));
    lib_no_rule.insert(2, no_bulk("S", "D"));
    let mut engine2 = Engine::new(lib_no_rule, EngineConfig::default());
    let report2 = engine2.compare("top", 1, "top", 2).unwrap();
    assert_eq!(report2.verdict, MatchVerdict::Mismatch);
}

/// E4: `inv1`/`inv2` identical inverters (modeled here as resistors, since the comparator's
/// notion of "inverter" is just a device class) whose outputs share a net, on both sides.
/// Automorphism count 2, resolved by arbitrary breaking, perfect match.
#[test]
fn e4_two_identical_instances_resolve_to_a_perfect_match() {
    let cell = || {
        CellDefinition::new("top")
            .with_pin("vout", Direction::Output)
            .with_device(resistor("inv1", "vin", "vout", 1.0))
            .with_device(resistor("inv2", "vin", "vout", 1.0))
    };
    let mut lib = CellLibrary::new();
    lib.insert(1, cell());
    lib.insert(2, cell());
    let mut engine = Engine::new(lib, EngineConfig::default());

    let report = engine.compare("top", 1, "top", 2).unwrap();
    assert_eq!(report.verdict, MatchVerdict::Perfect);
    assert_eq!(report.matched_devices.len(), 2);
}

/// E5: two RC ladders, circuit 1 has an extra shunt cap on an internal node. Mismatch; the
/// reporter names the internal net with differing fanout (one circuit's cap pin connected, the
/// other's not).
#[test]
fn e5_extra_shunt_cap_is_reported_as_a_mismatched_net() {
    let mut dict = PropertyDict::new();
    dict.insert("R", PropertyKey::numeric(PropertyType::Double, Slop::Relative(0.01)));
    dict.insert("C", PropertyKey::numeric(PropertyType::Double, Slop::Relative(0.01)));

    let mut with_shunt = CellDefinition::new("ladder")
        .with_pin("in", Direction::Input)
        .with_pin("out", Direction::Output)
        .with_device(resistor("R1", "in", "mid", 1000.0))
        .with_device(resistor("R2", "mid", "out", 1000.0))
        .with_device(DeviceInstanceDef::new(
            "C1",
            DeviceKind::Primitive(PrimitiveClass::Capacitor),
            vec![("1", Some("mid".to_string())), ("2", Some("gnd".to_string()))],
            PropertyRecord::new().with("C", PropertyValue::Double(1e-12)),
        ))
        .with_global("gnd");
    with_shunt.property_dict = dict.clone();

    let mut without_shunt = CellDefinition::new("ladder")
        .with_pin("in", Direction::Input)
        .with_pin("out", Direction::Output)
        .with_device(resistor("R1", "in", "mid", 1000.0))
        .with_device(resistor("R2", "mid", "out", 1000.0));
    without_shunt.property_dict = dict;

    let mut lib = CellLibrary::new();
    lib.insert(1, with_shunt);
    lib.insert(2, without_shunt);
    let mut engine = Engine::new(lib, EngineConfig::default());

    let report = engine.compare("ladder", 1, "ladder", 2).unwrap();
    assert_eq!(report.verdict, MatchVerdict::Mismatch);
    assert!(!report.mismatched_nets.is_empty());
    let mid_group = report
        .mismatched_nets
        .iter()
        .find(|g| g.members.iter().any(|m| m.name == "mid"))
        .expect("the internal net 'mid' is named in a mismatched group");
    let fanouts: Vec<usize> = mid_group.members.iter().map(|m| m.fanout.iter().map(|(_, n)| *n).sum()).collect();
    assert!(fanouts.iter().any(|&f| f == 3)); // circuit 1: R1, R2, C1 all connected
    assert!(fanouts.iter().any(|&f| f == 2)); // circuit 2: only R1, R2
}

fn sub(name: &str) -> CellDefinition {
    CellDefinition::new(name)
        .with_pin("a", Direction::InOut)
        .with_pin("b", Direction::InOut)
        .with_device(resistor("R1", "a", "b", 1000.0))
}

fn top_with_two_subs(sub_name: &str) -> CellDefinition {
    CellDefinition::new("top")
        .with_device(DeviceInstanceDef::new(
            "x1",
            DeviceKind::Subcircuit(sub_name.to_string()),
            vec![("a", Some("n1".to_string())), ("b", Some("n2".to_string()))],
            PropertyRecord::new(),
        ))
        .with_device(DeviceInstanceDef::new(
            "x2",
            DeviceKind::Subcircuit(sub_name.to_string()),
            vec![("a", Some("n2".to_string())), ("b", Some("n3".to_string()))],
            PropertyRecord::new(),
        ))
}

/// E6: hierarchical compare. `top{sub_a x2}` vs `top{sub_b x2}` with `sub_a`/`sub_b` equated.
/// The compare queue is `[sub_a<->sub_b, top<->top]`; the subcell pair and, once its instances are
/// flattened into both tops with the matched subcell body, the top-level pair both report a
/// perfect match.
#[test]
fn e6_hierarchical_compare_queue_matches_subcells_then_top() {
    let mut lib = CellLibrary::new();
    lib.insert(1, top_with_two_subs("sub_a"));
    lib.insert(1, sub("sub_a"));
    lib.insert(2, top_with_two_subs("sub_b"));
    lib.insert(2, sub("sub_b"));

    let mut driver = HierarchyDriver::new();
    driver.equate_classes("sub_a", 1, "sub_b", 2);
    let queue = driver.create_compare_queue(&lib, "top", 1, "top", 2).expect("both tops resolve");
    assert_eq!(queue.len(), 2);
    assert_eq!(queue[0], ComparePair { class1: "sub_a".into(), file1: 1, class2: "sub_b".into(), file2: 2 });
    assert_eq!(queue[1], ComparePair { class1: "top".into(), file1: 1, class2: "top".into(), file2: 2 });

    let mut sub_engine = Engine::new(lib.clone(), EngineConfig::default());
    let sub_report = sub_engine.compare(&queue[0].class1, queue[0].file1, &queue[0].class2, queue[0].file2).unwrap();
    assert_eq!(sub_report.verdict, MatchVerdict::Perfect);

    // Flatten both tops' subcell instances using the matched subcell bodies, then compare the
    // resulting flat netlists directly.
    let sub_a = lib.get("sub_a", 1).unwrap().clone();
    let sub_b = lib.get("sub_b", 2).unwrap().clone();
    let mut top1 = lib.get("top", 1).unwrap().clone();
    let mut top2 = lib.get("top", 2).unwrap().clone();
    assert!(flatten_instance(&mut top1, "x1", &sub_a));
    assert!(flatten_instance(&mut top1, "x2", &sub_a));
    assert!(flatten_instance(&mut top2, "x1", &sub_b));
    assert!(flatten_instance(&mut top2, "x2", &sub_b));

    let mut flat_lib = CellLibrary::new();
    flat_lib.insert(1, top1);
    flat_lib.insert(2, top2);
    let mut top_engine = Engine::new(flat_lib, EngineConfig::default());
    let top_report = top_engine.compare("top", 1, "top", 2).unwrap();
    assert_eq!(top_report.verdict, MatchVerdict::Perfect);
}
