//! # Engine Configuration
//!
//! Store-level rates applied by the settlement engine. Supplied by the
//! hosting application (config file, environment); the defaults match the
//! store's standing policy.

use kiosk_core::{RateBps, DEFAULT_PATRONAGE_RATE_BPS, DEFAULT_VAT_RATE_BPS};

/// Configuration for the settlement core.
#[derive(Debug, Clone, Copy)]
pub struct KioskConfig {
    /// VAT rate applied to every line (prices are VAT-inclusive).
    pub vat_rate: RateBps,

    /// Patronage rate used when the member carries no member-type rate,
    /// and snapshotted onto every transaction.
    pub default_patronage_rate: RateBps,
}

impl Default for KioskConfig {
    fn default() -> Self {
        KioskConfig {
            vat_rate: RateBps::from_bps(DEFAULT_VAT_RATE_BPS),
            default_patronage_rate: RateBps::from_bps(DEFAULT_PATRONAGE_RATE_BPS),
        }
    }
}

impl KioskConfig {
    /// Sets the VAT rate.
    pub fn vat_rate(mut self, rate: RateBps) -> Self {
        self.vat_rate = rate;
        self
    }

    /// Sets the default patronage rate.
    pub fn default_patronage_rate(mut self, rate: RateBps) -> Self {
        self.default_patronage_rate = rate;
        self
    }
}
