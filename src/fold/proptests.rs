use proptest::prelude::*;

use super::*;
use crate::config::FoldScheme;
use crate::history::HistoryRegister;
use crate::jit::FoldProgram;

fn any_spec() -> impl Strategy<Value = FoldSpec> {
    (1usize..64).prop_flat_map(|bits| {
        ((bits + 1)..128usize).prop_map(move |len| FoldSpec::new(bits, len, 0))
    })
}

proptest! {
  #[test]
  fn folded_value_fits_chunk(spec in any_spec(), ghr in any::<u128>()) {
    prop_assert!(fold_current(&spec, ghr) <= spec.chunk_mask());
    prop_assert!(fold_legacy(&spec, ghr) <= spec.chunk_mask());
  }

  #[test]
  fn current_matches_register_fold(spec in any_spec(), ghr in any::<u128>()) {
    let reg = HistoryRegister::from_u128(spec.history_len(), ghr);
    let len = spec.history_len();
    prop_assert_eq!(fold_current(&spec, ghr), reg.fold(0..=len - 1, spec.chunk_width()));
  }

  #[test]
  fn current_matches_slice_formula(spec in any_spec(), ghr in any::<u128>()) {
    let bits = spec.chunk_width();
    let mut expected = 0u64;
    for i in 0..spec.times() {
      expected ^= ((ghr >> (i * bits)) as u64) & spec.chunk_mask();
    }
    if spec.remainder() != 0 {
      expected ^= ((ghr >> (spec.times() * bits)) as u64) & low_mask(spec.remainder());
    }
    prop_assert_eq!(fold_current(&spec, ghr), expected);
  }

  #[test]
  fn program_matches_interpreter(spec in any_spec(), ghr in any::<u128>()) {
    let program = FoldProgram::lower(&spec);
    let interp = InterpretedFold::new(spec, FoldScheme::Current);
    prop_assert_eq!(program.fold(ghr), interp.fold(ghr));
  }

  #[test]
  fn legacy_matches_current_below_32_bits(spec in any_spec(), ghr in any::<u128>()) {
    prop_assume!(spec.chunk_width() < 32);
    prop_assert_eq!(fold_legacy(&spec, ghr), fold_current(&spec, ghr));
  }
}

#[cfg(target_arch = "x86_64")]
proptest! {
  #[test]
  fn generated_matches_interpreter(spec in any_spec(), ghr in any::<u128>()) {
    let code = crate::jit::generate(&spec).unwrap();
    let f = code.find(&spec).unwrap();
    prop_assert_eq!(f.fold(ghr), fold_current(&spec, ghr));
  }
}
