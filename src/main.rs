fn main() {
    if let Err(err) = msf_bridge::cli::main() {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}
