use proptest::prelude::*;
use slede8::{
    Fault, MEM_SIZE, Program, State, disassemble,
    word::{Fields, Instruction, class},
};

/// Steps a VM until it leaves the running state or `n` steps have passed
fn drive(prog: &Program, n: usize) -> slede8::Slede8 {
    let mut vm = prog.boot();
    for _ in 0..n {
        if vm.step().is_err() || vm.state() != State::Running {
            break;
        }
    }
    vm
}

proptest! {
    #[test]
    fn identical_engines_agree(
        code in proptest::collection::vec(any::<u8>(), 0..=MEM_SIZE),
        input in proptest::collection::vec(any::<u8>(), 0..32),
        steps in 0usize..2000,
    ) {
        let prog = Program::from_image(&code, &input, 0).unwrap();
        let a = drive(&prog, steps);
        let b = drive(&prog, steps);
        prop_assert_eq!(a.regs(), b.regs());
        prop_assert_eq!(a.ram(), b.ram());
        prop_assert_eq!(a.pc(), b.pc());
        prop_assert_eq!(a.flag(), b.flag());
        prop_assert_eq!(a.stack(), b.stack());
        prop_assert_eq!(a.output(), b.output());
        prop_assert_eq!(a.input_remaining(), b.input_remaining());
        prop_assert_eq!(a.cycles(), b.cycles());
        prop_assert_eq!(a.state(), b.state());
        prop_assert_eq!(a.fault(), b.fault());
    }

    #[test]
    fn cycle_limit_is_exact(limit in 1u64..5000) {
        let jump = Instruction::Jump { addr: 0 }.encode().to_le_bytes();
        let prog = Program::from_image(&jump, &[], limit).unwrap();
        let mut vm = prog.boot();
        prop_assert_eq!(vm.run(), Err(Fault::CycleLimitExceeded { limit }));
        prop_assert_eq!(vm.cycles(), limit);
    }

    #[test]
    fn pc_stays_in_memory(
        code in proptest::collection::vec(any::<u8>(), 0..=MEM_SIZE),
        steps in 0usize..500,
    ) {
        let prog = Program::from_image(&code, &[0; 16], 0).unwrap();
        let mut vm = prog.boot();
        for _ in 0..steps {
            let _ = vm.step();
            prop_assert!(usize::from(vm.pc()) < MEM_SIZE);
        }
    }
}

#[test]
fn disassembly_is_total() {
    for w in 0..=u16::MAX {
        let text = disassemble(w);
        let f = Fields::decode(w);
        if matches!(Instruction::decode(w), Instruction::Unsupported(..)) {
            assert!(text.starts_with(".DATA"), "{w:#06x}: {text}");
        } else {
            assert!(!text.starts_with(".DATA"), "{w:#06x}: {text}");
        }
        if f.class > class::NOP {
            assert!(text.contains("unsupported instruction class"), "{text}");
        }
    }
}

#[test]
fn header_then_boot() {
    let bin = slede8::with_header(&[0xb1, 0x01, 0xf1, 0xff]);
    let mut vm = Program::new(&bin, &[], 0).unwrap().boot();
    vm.run().unwrap();
    assert_eq!(vm.reg(11), 1);
    assert_eq!(vm.reg(15), 0xff);
    assert_eq!(vm.pc(), 4);
    assert_eq!(vm.state(), State::Stopped);
    assert_eq!(vm.cycles(), 2);
}
