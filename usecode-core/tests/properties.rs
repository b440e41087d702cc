//! Property-style checks over generated listings, plus fatal parser cases

use usecode_core::{
    Error, IntrinsicTable, Operand, Resolution, Resolver, UnresolvedReference, parse,
};

/// Function with `count` forward `jmp` instructions, each skipping one `cmpeq`
fn jump_ladder(count: u16) -> String {
    let mut out = String::from(".funcnumber 0500H\n.argc 0003H\n.localc 0007H\n.code\n");
    let mut address = 0u16;
    for _ in 0..count {
        // jmp over the next cmpeq: rel = 1
        out.push_str(&format!("{:04X}: 06 01 00    jmp {:04X}\n", address, address + 4));
        out.push_str(&format!("{:04X}: 22          cmpeq\n", address + 3));
        address += 4;
    }
    out.push_str(&format!("{:04X}: 25          ret\n", address));
    out
}

#[test]
fn test_declared_header_values_kept() {
    for (argc, localc, externs) in [(0u16, 0u16, 0usize), (1, 0, 2), (5, 12, 3), (0xFF, 0x100, 1)] {
        let mut source = format!(
            ".funcnumber 0001H\n.argc {:04X}H\n.localc {:04X}H\n.externsize {:04X}H\n",
            argc, localc, externs
        );
        for i in 0..externs {
            source.push_str(&format!(".extern {:04X}H\n", 0x0800 + i));
        }
        let result = parse(&source).unwrap();
        let func = result.get(1).unwrap();
        assert_eq!(func.argc, argc);
        assert_eq!(func.localc, localc);
        assert_eq!(func.extern_size, Some(externs as u16));
        assert_eq!(func.externs.len(), externs);
        assert!(func.diagnostics.is_empty());
    }
}

#[test]
fn test_addresses_strictly_increasing() {
    let source = "\
.funcnumber 0001H
.argc 0000H
.localc 0000H
.code
0000: 22 cmpeq
0004: 22 cmpeq
0002: 22 cmpeq
0004: 22 cmpeq
0009: 25 ret
";
    let result = parse(source).unwrap();
    let func = result.get(1).unwrap();
    let addresses: Vec<u16> = func.instructions.iter().map(|i| i.address).collect();
    assert_eq!(addresses, vec![0x0000, 0x0004, 0x0009]);
    assert_eq!(func.diagnostics.len(), 2);
}

#[test]
fn test_every_jump_lands_on_its_instruction() {
    let mut result = parse(&jump_ladder(200)).unwrap();
    let func = result.get_mut(0x0500).unwrap();
    let report = Resolver::new(IntrinsicTable::builtin()).resolve(func);
    assert!(report.unresolved.is_empty());

    for inst in func.instructions.iter().filter(|i| i.mnemonic == "jmp") {
        let Operand::CodeAddress(target) = inst.operands[0] else {
            panic!("jmp without code address at {:04X}", inst.address);
        };
        assert_eq!(target, inst.address + 4);
        match inst.resolutions.as_slice() {
            [Resolution::Jump { target: t, index }] => {
                assert_eq!(*t, target);
                assert_eq!(func.instructions[*index].address, target);
            }
            other => panic!("unexpected resolutions {:?}", other),
        }
    }
}

#[test]
fn test_missing_jump_target_is_unresolved() {
    // 0x0002 falls inside the jmp instruction itself
    let source = ".funcnumber 0001H\n.argc 0000H\n.localc 0000H\n.code\n0000: 06 FF FF jmp 0002\n";
    let mut result = parse(source).unwrap();
    let func = result.get_mut(1).unwrap();
    let report = Resolver::new(IntrinsicTable::builtin()).resolve(func);
    assert_eq!(report.unresolved, vec![(0, UnresolvedReference::JumpTarget(0x0002))]);
    assert_eq!(
        func.instructions[0].resolutions,
        vec![Resolution::Unresolved(UnresolvedReference::JumpTarget(0x0002))]
    );
}

#[test]
fn test_fatal_structure_errors() {
    let cases = [
        (".data\nL0000: db 00\n", 1),
        (".funcnumber 0001H\n.argc 0000H\n.localc 0000H\n.section 0000H\n", 4),
        (".funcnumber 0001H\n.argc zzzz\n", 2),
        ("\n\n.funcnumber\n", 3),
    ];
    for (source, expected_line) in cases {
        match parse(source) {
            Err(Error::MalformedInput { line, .. }) => assert_eq!(line, expected_line, "{}", source),
            other => panic!("expected malformed input for {:?}, got {:?}", source, other),
        }
    }
}

#[test]
fn test_missing_localc_reported_at_funcnumber() {
    let source = "; header\n.funcnumber 0002H\n.argc 0000H\n.code\n0000: 25 ret\n";
    match parse(source) {
        Err(Error::MalformedInput { line, expected, .. }) => {
            assert_eq!(line, 2);
            assert!(expected.contains(".localc"));
        }
        other => panic!("unexpected {:?}", other),
    }
}
