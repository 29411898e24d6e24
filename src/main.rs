//! Command-line demonstration of the chain relaxation.
//!
//! Relaxes a chain between the two main minima of the Müller-Brown surface
//! and prints the bead positions and energies of the resulting path.
//!
//! # Usage
//!
//! ```bash
//! # Default 11-bead chain
//! stringopt
//!
//! # Custom bead count
//! stringopt 25
//! ```
//!
//! Logging verbosity follows `RUST_LOG` (e.g. `RUST_LOG=debug`).

use nalgebra::DVector;
use std::env;
use std::process;
use stringopt::{relax, Chain, MuellerBrown, OptConfig, PotentialSurface};
use stringopt::constraint::TangentOrthogonality;

fn main() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .target(env_logger::Target::Stdout)
        .format_timestamp_millis()
        .init();

    let args: Vec<String> = env::args().collect();
    let n_beads: usize = match args.get(1).map(|a| a.parse()) {
        None => 11,
        Some(Ok(n)) if n >= 3 => n,
        Some(_) => {
            eprintln!("usage: {} [n_beads >= 3]", args[0]);
            process::exit(1);
        }
    };

    let config = OptConfig {
        max_iter: 200,
        ..OptConfig::default()
    };
    let chain = match Chain::linear(
        MuellerBrown::minimum_a(),
        MuellerBrown::minimum_b(),
        n_beads,
    ) {
        Ok(chain) => chain,
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    };

    println!(
        "Relaxing a {n_beads}-bead chain on the Mueller-Brown surface \
         (max {} iterations)",
        config.max_iter
    );

    let constraint = TangentOrthogonality::new(config.tangent);
    let result = match relax(&MuellerBrown, chain, &config, Some(&constraint), None) {
        Ok(result) => result,
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    };

    if result.converged {
        println!("Converged after {} iterations", result.iterations);
    } else {
        println!(
            "Not converged after {} iterations (max|g_ortho| = {:.3e})",
            result.iterations, result.ortho_norm
        );
    }

    println!("\n{:>4}  {:>12}  {:>12}  {:>14}", "bead", "x", "y", "energy");
    let mut barrier = f64::NEG_INFINITY;
    for (i, bead) in result.chain.positions().iter().enumerate() {
        let energy = energy_at(bead);
        barrier = barrier.max(energy);
        println!("{i:>4}  {:>12.6}  {:>12.6}  {:>14.6}", bead[0], bead[1], energy);
    }

    let e_start = energy_at(result.chain.first());
    println!("\nHighest bead lies {:.6} above the first endpoint", barrier - e_start);
}

fn energy_at(position: &DVector<f64>) -> f64 {
    match MuellerBrown.evaluate(position) {
        Ok(eval) => eval.energy,
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}
