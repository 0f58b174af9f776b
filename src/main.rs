fn main() {
    if let Err(e) = sqlstep::run(std::env::args().nth(1)) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
