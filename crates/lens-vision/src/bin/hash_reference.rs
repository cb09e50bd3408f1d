//! CLI helper to fingerprint reference captures for a layout profile.
//! Usage: cargo run --features cli --bin hash_reference -- <image.png> [more.png ...]

use lens_vision::phash;

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <image.png> [more.png ...]", args[0]);
        std::process::exit(1);
    }

    for path in &args[1..] {
        let img = image::open(path)
            .unwrap_or_else(|e| panic!("Failed to open {}: {}", path, e))
            .to_rgba8();
        let hash = phash::average_hash_rgba(&img);
        println!("{}: {}", path, hash);
    }
}
