//! One-time passcode verification for registration.

use taja_haat_core::PhoneNumber;

/// Checks the code a user typed to confirm phone ownership.
pub trait OtpVerifier: Send + Sync {
    fn verify(&self, phone: &PhoneNumber, code: &str) -> bool;
}

/// Demo verifier: every phone gets the same fixed code.
#[derive(Debug, Clone, Copy, Default)]
pub struct DemoOtp;

impl DemoOtp {
    /// The only code [`DemoOtp`] accepts.
    pub const CODE: &'static str = "123456";
}

impl OtpVerifier for DemoOtp {
    fn verify(&self, _phone: &PhoneNumber, code: &str) -> bool {
        code.trim() == Self::CODE
    }
}
