//! Activation code generation.

use bizreg_core::ActivationCode;
use rand::Rng;

/// A uniformly random six-digit code.
pub fn generate_code() -> ActivationCode {
    let span = ActivationCode::MAX - ActivationCode::MIN + 1;
    ActivationCode::from_offset(rand::thread_rng().gen_range(0..span))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_have_six_digits() {
        for _ in 0..1000 {
            let code = generate_code().get();
            assert!((100_000..=999_999).contains(&code));
        }
    }
}
