//! RF transmit power codes.
//!
//! The firmware stores TX power as a raw register code. Only the 52 codes
//! listed in [`RfTxPower::TABLE`] have a documented dBm value; everything else
//! is preserved as-is and reports 0.0 dBm.

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// RF transmit power register code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(transparent))]
pub struct RfTxPower(u8);

impl RfTxPower {
    /// Code/dBm pairs in firmware enumeration order.
    ///
    /// The order matters: [`RfTxPower::nearest`] keeps the first entry on ties.
    pub const TABLE: [(u8, f32); 52] = [
        (191, 3.01),
        (189, 2.81),
        (187, 2.61),
        (185, 2.39),
        (182, 1.99),
        (180, 1.73),
        (178, 1.45),
        (176, 1.17),
        (174, 0.90),
        (172, 0.58),
        (169, 0.04),
        (168, -0.14),
        (164, -0.97),
        (162, -1.42),
        (160, -1.89),
        (158, -2.48),
        (156, -3.03),
        (154, -3.61),
        (152, -4.26),
        (150, -5.03),
        (148, -5.81),
        (146, -6.67),
        (144, -7.65),
        (142, -8.65),
        (140, -9.89),
        (138, -11.4),
        (136, -13.29),
        (134, -15.88),
        (132, -19.27),
        (130, -25.18),
        (255, -30.0),
        (128, -50.0),
        (63, 10.46),
        (61, 10.29),
        (58, 10.01),
        (56, 9.81),
        (53, 9.48),
        (51, 9.24),
        (49, 8.97),
        (47, 8.73),
        (45, 8.44),
        (43, 8.13),
        (41, 7.79),
        (39, 7.41),
        (37, 7.02),
        (35, 6.60),
        (33, 6.14),
        (31, 5.65),
        (29, 5.13),
        (27, 4.57),
        (25, 3.94),
        (23, 3.23),
    ];

    /// Strongest documented setting (+10.46 dBm).
    pub const MAX: Self = Self(63);
    /// Firmware default (0.04 dBm).
    pub const DEFAULT: Self = Self(169);
    /// Weakest documented setting (-50 dBm).
    pub const MIN: Self = Self(128);

    /// Wrap a raw register code.
    #[must_use]
    pub const fn from_code(code: u8) -> Self {
        Self(code)
    }

    /// The raw register code.
    #[must_use]
    pub const fn code(self) -> u8 {
        self.0
    }

    /// Whether this code appears in [`RfTxPower::TABLE`].
    #[must_use]
    pub fn is_known(self) -> bool {
        Self::TABLE.iter().any(|(code, _)| *code == self.0)
    }

    /// Output power in dBm, or 0.0 for codes missing from the table.
    ///
    /// # Examples
    ///
    /// ```
    /// use mithermo_types::RfTxPower;
    ///
    /// assert_eq!(RfTxPower::from_code(191).dbm(), 3.01);
    /// assert_eq!(RfTxPower::from_code(0).dbm(), 0.0);
    /// ```
    #[must_use]
    pub fn dbm(self) -> f32 {
        Self::TABLE
            .iter()
            .find(|(code, _)| *code == self.0)
            .map(|(_, dbm)| *dbm)
            .unwrap_or(0.0)
    }

    /// Snap a dBm value to the closest tabulated code.
    ///
    /// Uses a strict `<` comparison while walking the table, so on a tie the
    /// entry listed first wins. NaN input yields the first table entry.
    ///
    /// # Examples
    ///
    /// ```
    /// use mithermo_types::RfTxPower;
    ///
    /// assert_eq!(RfTxPower::nearest(3.0).code(), 191);
    /// assert_eq!(RfTxPower::nearest(-100.0), RfTxPower::MIN);
    /// ```
    #[must_use]
    pub fn nearest(dbm: f32) -> Self {
        let mut best = Self::TABLE[0].0;
        let mut min_diff = f32::MAX;
        for (code, value) in Self::TABLE {
            let diff = (dbm - value).abs();
            if diff < min_diff {
                min_diff = diff;
                best = code;
            }
        }
        Self(best)
    }
}

impl Default for RfTxPower {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl From<u8> for RfTxPower {
    fn from(code: u8) -> Self {
        Self(code)
    }
}

impl From<RfTxPower> for u8 {
    fn from(power: RfTxPower) -> Self {
        power.0
    }
}

impl fmt::Display for RfTxPower {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_known() {
            write!(f, "{:.2} dBm", self.dbm())
        } else {
            write!(f, "unknown (0x{:02X})", self.0)
        }
    }
}
