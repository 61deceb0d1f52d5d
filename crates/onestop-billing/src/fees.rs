//! Per-module fee schedule, in sen.

use onestop_types::InvoiceKind;
use std::collections::HashMap;

const DEFAULT_PROCESSING_SEN: i64 = 15_000;
const DEFAULT_PERMIT_SEN: i64 = 250_000;

/// Fee amounts per module, with platform-wide defaults.
///
/// Modules without an explicit entry fall back to the default for the
/// invoice kind.
#[derive(Clone, Debug)]
pub struct FeeSchedule {
    default_processing_sen: i64,
    default_permit_sen: i64,
    processing_sen: HashMap<String, i64>,
    permit_sen: HashMap<String, i64>,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            default_processing_sen: DEFAULT_PROCESSING_SEN,
            default_permit_sen: DEFAULT_PERMIT_SEN,
            processing_sen: HashMap::new(),
            permit_sen: HashMap::new(),
        }
    }
}

impl FeeSchedule {
    pub fn with_default_processing_sen(mut self, amount_sen: i64) -> Self {
        self.default_processing_sen = amount_sen;
        self
    }

    pub fn with_default_permit_sen(mut self, amount_sen: i64) -> Self {
        self.default_permit_sen = amount_sen;
        self
    }

    pub fn with_processing_fee(mut self, module: impl Into<String>, amount_sen: i64) -> Self {
        self.processing_sen.insert(module.into(), amount_sen);
        self
    }

    pub fn with_permit_fee(mut self, module: impl Into<String>, amount_sen: i64) -> Self {
        self.permit_sen.insert(module.into(), amount_sen);
        self
    }

    /// The amount one invoice kind charges for a module.
    pub fn amount_for(&self, module: &str, kind: InvoiceKind) -> i64 {
        match kind {
            InvoiceKind::ProcessingFee => self
                .processing_sen
                .get(module)
                .copied()
                .unwrap_or(self.default_processing_sen),
            InvoiceKind::PermitFee => self
                .permit_sen
                .get(module)
                .copied()
                .unwrap_or(self.default_permit_sen),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_apply_to_unknown_modules() {
        let fees = FeeSchedule::default();
        assert_eq!(
            fees.amount_for("myskb", InvoiceKind::ProcessingFee),
            DEFAULT_PROCESSING_SEN
        );
        assert_eq!(
            fees.amount_for("roro", InvoiceKind::PermitFee),
            DEFAULT_PERMIT_SEN
        );
    }

    #[test]
    fn test_module_overrides_win() {
        let fees = FeeSchedule::default()
            .with_processing_fee("myskb", 20_000)
            .with_permit_fee("myskb", 300_000);
        assert_eq!(fees.amount_for("myskb", InvoiceKind::ProcessingFee), 20_000);
        assert_eq!(fees.amount_for("myskb", InvoiceKind::PermitFee), 300_000);
        assert_eq!(
            fees.amount_for("roro", InvoiceKind::ProcessingFee),
            DEFAULT_PROCESSING_SEN
        );
    }
}
