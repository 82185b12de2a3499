//! Flash programming algorithm against the emulated flash

use spinor_core::algo::{AlgoConfig, FlashAlgorithm};
use spinor_core::spi::opcodes;
use spinor_core::Error;
use spinor_dummy::{DummyConfig, DummyFlash};

const BASE: u32 = 0x9000_0000;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn algo(dummy: &mut DummyFlash) -> FlashAlgorithm<&mut DummyFlash> {
    init_logger();
    FlashAlgorithm::init(dummy, AlgoConfig::default()).unwrap()
}

#[test]
fn program_and_verify_in_window() {
    let mut dummy = DummyFlash::new_default();
    let data: Vec<u8> = (0..=255).collect();
    {
        let mut algo = algo(&mut dummy);
        algo.erase_sector(BASE + 0x1000).unwrap();
        algo.program_page(BASE + 0x1000, &data).unwrap();
        assert_eq!(algo.verify(BASE + 0x1000, &data).unwrap(), BASE + 0x1100);
    }
    assert_eq!(&dummy.data()[0x1000..0x1100], &data[..]);
    assert_eq!(dummy.programs(), vec![(0x1000, 256)]);
}

#[test]
fn verify_returns_first_mismatch_address() {
    let mut dummy = DummyFlash::new_default();
    let mut algo = algo(&mut dummy);
    algo.program_page(BASE + 0x200, &[1, 2, 3, 4]).unwrap();
    assert_eq!(algo.verify(BASE + 0x200, &[1, 2, 9, 4]).unwrap(), BASE + 0x202);
    // Unwritten flash reads as erased
    assert_eq!(algo.verify(BASE + 0x300, &[0xFF; 64]).unwrap(), BASE + 0x340);
}

#[test]
fn verify_is_one_frame() {
    let mut dummy = DummyFlash::new_default();
    algo(&mut dummy).verify(BASE, &[0xFF; 1000]).unwrap();

    let reads: Vec<_> = dummy
        .frames()
        .iter()
        .filter(|f| f.opcode() == Some(opcodes::READ))
        .collect();
    assert_eq!(reads.len(), 1);
    assert_eq!(reads[0].read_len, 1000);
}

#[test]
fn blank_check_after_erase() {
    let mut dummy = DummyFlash::with_data(DummyConfig::default(), &[0u8; 0x2000]);
    let mut algo = algo(&mut dummy);
    assert!(!algo.blank_check(BASE + 0x1000, 0x1000).unwrap());

    algo.erase_sector(BASE + 0x1000).unwrap();
    assert!(algo.blank_check(BASE + 0x1000, 0x1000).unwrap());
    // The neighbouring sector keeps its data
    assert!(!algo.blank_check(BASE + 0x0FFF, 2).unwrap());
}

#[test]
fn program_page_rejects_crossing_buffer() {
    let mut dummy = DummyFlash::new_default();
    let mut algo = algo(&mut dummy);
    assert_eq!(
        algo.program_page(BASE + 0x1F0, &[0u8; 32]),
        Err(Error::PageBoundary)
    );
    let programs = algo.uninit().programs();
    assert!(programs.is_empty());
}

#[test]
fn program_range_splits_pages() {
    let mut dummy = DummyFlash::new_default();
    let data = vec![0xA5u8; 600];
    algo(&mut dummy).program_range(BASE + 0x80, &data).unwrap();
    assert_eq!(
        dummy.programs(),
        vec![(0x80, 128), (0x100, 256), (0x200, 216)]
    );
}

#[test]
fn operations_wait_for_idle_first() {
    let mut dummy = DummyFlash::new_default();
    // A previous operation is still running
    dummy.force_busy(3);
    algo(&mut dummy).erase_sector(BASE + 0x5000).unwrap();

    let opcodes_seen: Vec<u8> = dummy.frames().iter().filter_map(|f| f.opcode()).collect();
    assert_eq!(
        opcodes_seen,
        vec![
            opcodes::RDSR,
            opcodes::RDSR,
            opcodes::RDSR,
            opcodes::RDSR,
            opcodes::WREN,
            opcodes::SE_20,
            opcodes::RDSR,
        ]
    );
}

#[test]
fn erase_chip() {
    let mut dummy = DummyFlash::with_data(DummyConfig::default(), &[0u8; 0x1000]);
    algo(&mut dummy).erase_chip().unwrap();
    assert!(dummy.data()[..0x1000].iter().all(|&b| b == 0xFF));
    assert_eq!(dummy.count(opcodes::CE_C7), 1);
}

#[test]
fn stuck_device_times_out() {
    let mut dummy = DummyFlash::new_default();
    dummy.set_stuck_busy(true);
    dummy.force_busy(0);
    let config = AlgoConfig {
        erase_timeout_ms: 10,
        ..Default::default()
    };
    let mut algo = FlashAlgorithm::init(&mut dummy, config).unwrap();
    assert_eq!(algo.erase_sector(BASE), Err(Error::DeviceTimeout));
}

#[test]
fn init_rejects_invalid_description() {
    init_logger();
    let config = AlgoConfig {
        sector_size: 3000,
        ..Default::default()
    };
    let result = FlashAlgorithm::init(DummyFlash::new_default(), config);
    assert!(matches!(result, Err(Error::InvalidGeometry)));
}
