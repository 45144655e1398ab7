#![forbid(unsafe_code)]

fn main() {
    if let Err(error) = kmspane::run_from_env() {
        eprintln!("kmspane: {error}");
        std::process::exit(error.exit_code());
    }
}
