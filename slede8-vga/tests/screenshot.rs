use image::{Rgba, RgbaImage};
use slede8::{EmptyDevice, Program, State};
use slede8_vga::{HEIGHT, Screen, WIDTH};

/// Draws a red diagonal, then presents it
const DIAGONAL: &str = "
    SETT r2, 4      ; red
    SETT r3, 1
    SETT r0, 0
    SETT r4, 0
løkke:
    SETT r1, r0
    VLAGR r2
    PLUSS r0, r3
    ULIK r0, r4
    BHOPP løkke
    VSYNK
    STOPP
";

#[test]
fn diagonal() {
    let code = slede8_asm::assemble(DIAGONAL).unwrap();
    let prog = Program::from_image(&code, &[], 10_000).unwrap();
    let mut vm = prog.boot_with(EmptyDevice, Screen::new());
    vm.run().unwrap();
    assert_eq!(vm.state(), State::Stopped);

    let screen = vm.framebuffer_mut();
    assert_eq!(screen.frames(), 1);
    assert_eq!(screen.pixel(17, 17), 4);
    assert_eq!(screen.pixel(17, 18), 0);

    let img = RgbaImage::from_raw(
        WIDTH as u32,
        HEIGHT as u32,
        screen.frame().to_vec(),
    )
    .expect("frame has the wrong size");
    for i in 0..WIDTH as u32 {
        assert_eq!(*img.get_pixel(i, i), Rgba([0xaa, 0, 0, 0xff]));
    }
    assert_eq!(*img.get_pixel(1, 0), Rgba([0, 0, 0, 0xff]));
}

#[test]
fn restart_clears_screen() {
    let code = slede8_asm::assemble("SETT r2, 1\nVLAGR r2\nVSYNK").unwrap();
    let prog = Program::from_image(&code, &[], 0).unwrap();
    let mut vm = prog.boot_with(EmptyDevice, Screen::new());
    vm.run().unwrap();
    assert_eq!(vm.framebuffer().pixel(0, 0), 1);

    let vm = vm.restart();
    assert_eq!(vm.framebuffer().pixel(0, 0), 0);
    assert_eq!(vm.framebuffer().frames(), 0);
}
