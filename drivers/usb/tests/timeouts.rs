use pretty_assertions::assert_eq;

use xhci_hcd::xhci::registers::usbsts;
use xhci_hcd::xhci::{ControllerGate, PowerState, WatchdogState};

mod util;
use util::{controller, NUM_SLOTS};

fn all_slots(frame: u32) -> Vec<(u8, u32)> {
    (1..=NUM_SLOTS).map(|slot| (slot, frame)).collect()
}

#[test]
fn dead_register_space_sweeps_everything_and_disarms() {
    let mut controller = controller();
    controller.arm_watchdog(true);
    controller.platform_mut().connected.extend(1..=NUM_SLOTS);
    controller.mark_register_space_invalid();

    controller.check_for_timeouts();

    assert_eq!(controller.platform().timeout_checks, all_slots(0));
    assert_eq!(
        controller.watchdog(),
        Some(&WatchdogState {
            active: false,
            has_timer: true,
        })
    );
    assert_eq!(controller.platform().watchdog_cancels, 1);
    assert!(controller.platform().register_reads.is_empty());
}

#[test]
fn dead_register_space_without_watchdog_state() {
    let mut controller = controller();
    controller.mark_register_space_invalid();

    controller.check_for_timeouts();

    assert_eq!(controller.platform().timeout_checks, all_slots(0));
    assert_eq!(controller.watchdog(), None);
    assert_eq!(controller.platform().watchdog_cancels, 0);
}

#[test]
fn all_ones_read_switches_to_degraded_sweep() {
    let mut controller = controller();
    controller.arm_watchdog(false);
    controller.platform_mut().mfindex = u32::MAX;

    controller.check_for_timeouts();

    assert!(controller.is_register_space_invalid());
    assert_eq!(controller.platform().timeout_checks, all_slots(0));
    assert_eq!(controller.watchdog().map(|w| w.active), Some(false));
    assert_eq!(controller.platform().watchdog_cancels, 0);
}

#[test]
fn disconnected_slots_then_full_sweep() {
    let mut controller = controller();
    controller.platform_mut().connected.extend([1, 3]);
    controller.platform_mut().mfindex = 0x100;

    controller.check_for_timeouts();

    let mut expected = vec![(2, 0x20), (4, 0x20)];
    expected.extend(all_slots(0x20));
    assert_eq!(controller.platform().timeout_checks, expected);
}

#[test]
fn host_system_error_is_latched_once() {
    let mut controller = controller();
    controller.platform_mut().usbsts = usbsts::HSE;
    controller.platform_mut().mfindex = 0x8;

    controller.check_for_timeouts();
    assert!(controller.hse_detected());
    controller.check_for_timeouts();
    assert!(controller.hse_detected());

    // HSE never stops the sweep.
    assert_eq!(controller.platform().timeout_checks.len(), 2 * NUM_SLOTS as usize * 2);
}

#[test]
fn low_power_transition_stops_after_first_pass() {
    for target in [PowerState::Off, PowerState::Sleep, PowerState::LowPower] {
        let mut controller = controller();
        controller.platform_mut().mfindex = 0x100;
        controller.begin_power_change(target);

        controller.check_for_timeouts();

        assert_eq!(controller.platform().timeout_checks, all_slots(0x20));
        assert_eq!(controller.platform().register_reads.len(), 2);
    }
}

#[test]
fn power_up_transition_does_not_stop_sweep() {
    let mut controller = controller();
    controller.platform_mut().connected.extend(1..=NUM_SLOTS);
    controller.platform_mut().mfindex = 0x100;
    controller.begin_power_change(PowerState::On);

    controller.check_for_timeouts();
    assert_eq!(controller.platform().timeout_checks, all_slots(0x20));

    controller.end_power_change();
    controller.begin_power_change(PowerState::Sleep);
    controller.end_power_change();
    controller.check_for_timeouts();
    assert_eq!(controller.platform().timeout_checks.len(), 2 * NUM_SLOTS as usize);
}

#[test]
fn stopped_microframe_counter_stops_sweep() {
    let mut controller = controller();
    controller.platform_mut().mfindex = 0x4000;

    controller.check_for_timeouts();

    assert_eq!(controller.platform().timeout_checks, all_slots(0));
}

#[test]
fn register_space_lost_mid_tick_stops_sweep() {
    let mut controller = controller();
    controller
        .platform_mut()
        .mfindex_script
        .extend([0x100, u32::MAX]);

    controller.check_for_timeouts();

    assert!(controller.is_register_space_invalid());
    assert_eq!(controller.platform().timeout_checks, all_slots(0x20));
}

#[test]
fn frame_number_includes_wrap_count() {
    let mut controller = controller();
    controller.platform_mut().mfindex = 0x3fff;
    assert_eq!(controller.frame_number32(), 0x7ff);

    controller.handle_mfindex_wrap();
    controller.handle_mfindex_wrap();
    controller.platform_mut().mfindex = 0x10;
    assert_eq!(controller.frame_number32(), (2 << 11) | 2);
}

#[test]
fn watchdog_tick_enters_through_gate() {
    let gate = ControllerGate::new(controller());
    gate.with(|controller| controller.platform_mut().mfindex = 0x100);

    let other = gate.clone();
    other.watchdog_tick();

    let controller = gate.lock();
    assert_eq!(controller.platform().timeout_checks.len(), 2 * NUM_SLOTS as usize);
}
