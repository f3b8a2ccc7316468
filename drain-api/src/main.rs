fn main() {
    if let Err(err) = vampire_drain_api::app::run() {
        eprintln!("api startup failed: {err}");
        std::process::exit(1);
    }
}
