mod experiments;

use std::io;
use std::path::{Path, PathBuf};

use tracing_subscriber::EnvFilter;

use dynafield::rig::{hue_angle_pairs, Rig, RigConfig};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() >= 2 && (args[1] == "--help" || args[1] == "-h" || args[1] == "help") {
        print_help();
        return;
    }
    if args.len() >= 2 && args[1] == "degenerate" {
        run_experiment(experiments::degeneration::run, args.get(2));
        return;
    }
    if args.len() >= 2 && args[1] == "relearn" {
        run_experiment(experiments::relearning::run, args.get(2));
        return;
    }

    if args.len() >= 2 && args[1] != "demo" {
        eprintln!("Unknown command: {}", args[1]);
        print_help();
        std::process::exit(2);
    }

    run_demo();
}

fn print_help() {
    println!("dynafield (coupled neural field simulation)");
    println!("usage:");
    println!("  cargo run");
    println!("  cargo run -- demo");
    println!("  cargo run -- degenerate [params.json]");
    println!("  cargo run -- relearn [params.json]");
    println!("  cargo run -- --help");
}

fn run_experiment(run: fn(Option<&Path>) -> io::Result<()>, params: Option<&String>) {
    let path = params.map(PathBuf::from);
    if let Err(e) = run(path.as_deref()) {
        eprintln!("experiment failed: {e}");
        std::process::exit(1);
    }
}

fn run_demo() {
    // Minimal demo:
    // - two coupled fields, trained on the seven hue/angle associations
    // - each hue is presented, then removed
    // - the output field holds a self-sustained peak, so the decoded angle
    //   survives stimulus removal

    let mut rig = Rig::new(RigConfig::default().with_seed(1));
    let pairs = hue_angle_pairs();
    rig.train_associations(&pairs, 100, 100);

    let ring = rig.output_field().ring();
    println!(
        "{:>6}  {:>8}  {:>8}  {:>13}",
        "hue", "expected", "decoded", "after_removal"
    );
    for &(hue, angle) in &pairs {
        let (_, decoded) = rig.probe(hue, 100);
        rig.settle(100);
        let sustained = rig.output_centroid();
        let expected = ring.coord_of(angle as usize);
        println!("{hue:6.1}  {expected:8.2}  {decoded:8.2}  {sustained:13.2}");
    }
}
