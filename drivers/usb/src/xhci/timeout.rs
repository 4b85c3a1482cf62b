/// Watchdog sweep over device slots

use super::controller::{PowerState, XhciController, XhciPlatform};
use super::registers::{usbsts, XhciRegister, MFINDEX_MASK};

impl<P: XhciPlatform> XhciController<P> {
    /// One watchdog tick.
    ///
    /// Slots whose port no longer reports them connected are swept first;
    /// once the controller is known to be running every slot is swept again so
    /// that stalled rings on live ports are caught too. With the register
    /// space gone every slot is swept one last time and the watchdog disarms.
    pub fn check_for_timeouts(&mut self) {
        let frame_number = self.frame_number32();
        let status = self.read32_reg(XhciRegister::UsbSts);
        let num_slots = self.config().num_slots;

        if self.is_register_space_invalid() {
            for slot_id in 1..=num_slots {
                self.platform_mut().check_slot_for_timeouts(slot_id, frame_number);
            }
            let cancel_timer = match self.watchdog.as_mut() {
                Some(watchdog) => {
                    log::warn!("xHCI register space invalid, disarming watchdog");
                    watchdog.active = false;
                    watchdog.has_timer
                }
                None => false,
            };
            if cancel_timer {
                self.platform_mut().cancel_watchdog();
            }
            return;
        }

        if status & usbsts::HSE != 0 && !self.hse_detected {
            log::error!("host system error, USBSTS {:#010x}", status);
            self.hse_detected = true;
        }

        for slot_id in 1..=num_slots {
            if !self.platform_mut().is_still_connected_and_enabled(slot_id) {
                self.platform_mut().check_slot_for_timeouts(slot_id, frame_number);
            }
        }

        if self
            .power_state_changing_to
            .is_some_and(|target| target <= PowerState::LowPower)
        {
            return;
        }

        let mfindex = self.read32_reg(XhciRegister::MfIndex);
        if self.is_register_space_invalid() || mfindex & MFINDEX_MASK == 0 {
            return;
        }

        for slot_id in 1..=num_slots {
            self.platform_mut().check_slot_for_timeouts(slot_id, frame_number);
        }
    }
}
