//! Command bytes written to the vendor command characteristic (`1F1F`).

/// Read settings when sent alone; write settings when followed by
/// [`SETTINGS_LENGTH`] and ten packed bytes.
pub const SETTINGS: u8 = 0x55;

/// Length marker following [`SETTINGS`] in a write.
pub const SETTINGS_LENGTH: u8 = 0x0A;

/// Restore factory settings.
pub const RESET_SETTINGS: u8 = 0x56;

/// Set the device clock.
/// Format: `[SET_CLOCK, t0, t1, t2, t3]` with the epoch seconds little-endian.
pub const SET_CLOCK: u8 = 0x23;

/// Build the set-clock command for `epoch_seconds`.
pub fn set_clock(epoch_seconds: u32) -> [u8; 5] {
    let t = epoch_seconds.to_le_bytes();
    [SET_CLOCK, t[0], t[1], t[2], t[3]]
}
