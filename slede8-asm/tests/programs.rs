use proptest::prelude::*;
use slede8::{Fault, Program, State, disassemble, word::Instruction};
use slede8_asm::{assemble, assemble_line, compile};

#[test]
fn disassembly_reassembles() {
    for w in 0..=u16::MAX {
        let text = disassemble(w);
        let bytes = assemble_line(&text)
            .unwrap_or_else(|e| panic!("{w:#06x} `{text}`: {e}"));
        let [lo, hi] = bytes[..] else {
            panic!("{w:#06x} `{text}` produced {bytes:?}");
        };
        let back = u16::from_le_bytes([lo, hi]);
        match Instruction::decode(w) {
            Instruction::Unsupported(..) => assert_eq!(back, w, "{text}"),
            i => assert_eq!(Instruction::decode(back), i, "{text}"),
        }
        assert_eq!(disassemble(back), text);
    }
}

const ECHO: &str = "
    ; echo bytes until a newline
    SETT r10, 0x0a
løkke:
    LES r5
    LIK r5, r10
    BHOPP ferdig
    SKRIV r5
    HOPP løkke
ferdig:
    STOPP
";

#[test]
fn echo() {
    let bin = compile(ECHO).unwrap();
    let prog = Program::new(&bin, b"hei\nmer", 0).unwrap();
    let mut vm = prog.boot();
    vm.run().unwrap();
    assert_eq!(vm.state(), State::Stopped);
    assert_eq!(vm.output(), b"hei");
    assert_eq!(vm.input_remaining(), b"mer");

    // Without a newline, the program runs out of input
    let prog = Program::new(&bin, b"hei", 0).unwrap();
    let mut vm = prog.boot();
    assert_eq!(vm.run(), Err(Fault::NoMoreInput));
    assert_eq!(vm.output(), b"hei");
}

#[test]
fn subroutine_with_data() {
    let src = r#"
        HOPP start
    tekst:
        .DATA "Hallo", 0
    start:
        FINN tekst
        SETT r2, 1
        SETT r3, 0
    neste:
        TUR skriv_tegn
        BHOPP slutt
        PLUSS r0, r2
        HOPP neste
    slutt:
        STOPP

    skriv_tegn:
        LAST r4
        LIK r4, r3
        BHOPP tilbake
        SKRIV r4
    tilbake:
        RETUR
    "#;
    let code = assemble(src).unwrap();
    let mut vm = Program::from_image(&code, &[], 1000).unwrap().boot();
    vm.run().unwrap();
    assert_eq!(vm.output(), b"Hallo");
    assert!(vm.stack().is_empty());
}

#[test]
fn runaway_loop() {
    let code = assemble("evig:\n    HOPP evig").unwrap();
    let mut vm = Program::from_image(&code, &[], 50_000).unwrap().boot();
    assert_eq!(
        vm.run(),
        Err(Fault::CycleLimitExceeded { limit: 50_000 })
    );
    assert_eq!(vm.cycles(), 50_000);
}

/// A source line in a generated program
#[derive(Clone, Debug)]
enum Item {
    Label,
    Jump(usize),
    Plain(&'static str),
    Data(Vec<u8>),
}

fn item() -> impl Strategy<Value = Item> {
    prop_oneof![
        Just(Item::Label),
        (0usize..8).prop_map(Item::Jump),
        prop::sample::select(vec![
            "NOPE",
            "SETT r1, 'x'",
            "PLUSS r1, r2",
            "LIK r3, r4",
            "FINN 0x123",
            "LES r0",
            "VSYNK",
            "; just a comment",
            "",
        ])
        .prop_map(Item::Plain),
        prop::collection::vec(any::<u8>(), 1..8).prop_map(Item::Data),
    ]
}

proptest! {
    #[test]
    fn labels_resolve_to_offsets(
        items in prop::collection::vec(item(), 0..64)
    ) {
        let label_count = items
            .iter()
            .filter(|i| matches!(i, Item::Label))
            .count();
        let mut src = String::new();
        let mut offsets = vec![];
        let mut jumps = vec![];
        let mut len = 0;
        for i in &items {
            match i {
                Item::Label => {
                    src += &format!("l{}:\n", offsets.len());
                    offsets.push(len);
                }
                Item::Jump(n) if label_count > 0 => {
                    src += &format!("HOPP l{}\n", n % label_count);
                    jumps.push((len, n % label_count));
                    len += 2;
                }
                Item::Jump(..) => (),
                Item::Plain(s) => {
                    src.push_str(s);
                    src.push('\n');
                    len += assemble_line(s).unwrap().len();
                }
                Item::Data(d) => {
                    let bytes: Vec<String> =
                        d.iter().map(|b| format!("{b:#04x}")).collect();
                    src += &format!(".DATA {}\n", bytes.join(", "));
                    len += d.len();
                }
            }
        }

        let out = assemble(&src).unwrap();
        prop_assert_eq!(out.len(), len);
        for (at, label) in jumps {
            let word = u16::from_le_bytes([out[at], out[at + 1]]);
            prop_assert_eq!(
                Instruction::decode(word),
                Instruction::Jump { addr: offsets[label] as u16 }
            );
        }
    }
}
