use folded_ghist::*;
use itertools::*;
use std::env;
use std::hint::black_box;
use std::time::{ Duration, Instant };
use tracing_subscriber::EnvFilter;

/// Index and tag folds for a TAGE-like predictor with 4096-entry tables.
fn build_specs() -> Vec<FoldSpec> {
    let hist_lengths = [15, 27, 44, 76, 127];
    let mut specs = Vec::new();
    for (bank, len) in hist_lengths.iter().enumerate() {
        specs.push(FoldSpec::new(12, *len, bank * 3));
        specs.push(FoldSpec::new(8, *len, bank * 3 + 1));
        specs.push(FoldSpec::new(7, *len, bank * 3 + 2));
    }
    specs
}

fn time_folds<F: FoldAlgorithm>(folds: &[F], ghrs: &[u128]) -> (Duration, u64) {
    let start = Instant::now();
    let mut sum = 0u64;
    for ghr in ghrs {
        for f in folds {
            sum = sum.wrapping_add(f.fold(black_box(*ghr)));
        }
    }
    (start.elapsed(), sum)
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = env::args().collect();
    let dump = args.iter().any(|a| a == "--dump");
    let iters = args.iter().skip(1).find_map(|a| a.parse::<usize>().ok())
        .unwrap_or(1_000_000);

    let specs = build_specs();
    let folder = Folder::new(FoldConfig::default());
    println!("[*] Fold configuration:");
    println!("      {} table folds", specs.len());
    for (len, group) in &specs.iter().group_by(|s| s.history_len()) {
        let widths = group.map(|s| s.chunk_width().to_string()).join(", ");
        println!("        {:3} bits of history -> {} bits", len, widths);
    }

    if dump {
        for spec in specs.iter() {
            println!("{}", jit::FoldProgram::lower(spec));
        }
    }

    // Randomize the state of global history
    let mut ghr = HistoryRegister::new(MAX_HISTORY_BITS);
    let mut ghrs = Vec::with_capacity(iters);
    for _ in 0..iters {
        ghr.push(Outcome::from(rand::random::<bool>()));
        ghrs.push(ghr.as_u128());
    }

    let interpreted: Vec<InterpretedFold> = specs.iter()
        .map(|s| folder.interpreted(*s))
        .collect();
    let (t_interp, sum_interp) = time_folds(&interpreted, &ghrs);
    println!("[*] Interpreted: {:?} ({:.2} ns/fold)", t_interp,
        t_interp.as_nanos() as f64 / (iters * specs.len()) as f64);

    #[cfg(target_arch = "x86_64")]
    {
        let code = match folder.compile(&specs) {
            Ok(Some(code)) => code,
            Ok(None) => {
                println!("[!] Code generation disabled");
                return;
            },
            Err(e) => {
                println!("[!] Code generation failed: {}", e);
                return;
            },
        };
        println!("[*] Generated {} functions in {} bytes",
            code.entries().len(), code.code_len());

        let native: Vec<GeneratedFold> = code.functions().collect();
        let (t_native, sum_native) = time_folds(&native, &ghrs);
        println!("[*] Generated: {:?} ({:.2} ns/fold)", t_native,
            t_native.as_nanos() as f64 / (iters * specs.len()) as f64);

        let mut mismatches = 0;
        for (f, i) in native.iter().zip(interpreted.iter()) {
            for ghr in ghrs.iter().take(4096) {
                if f.fold(*ghr) != i.fold(*ghr) {
                    mismatches += 1;
                }
            }
        }
        println!("[*] Checksums: interpreted={:016x} generated={:016x}",
            sum_interp, sum_native);
        println!("[*] Mismatches: {}", mismatches);
    }
    #[cfg(not(target_arch = "x86_64"))]
    {
        println!("[!] Native folds are not supported on this target");
        println!("[*] Checksum: {:016x}", sum_interp);
    }
}
