fn main() {
    if let Err(e) = cuerig_lib::run() {
        tracing::error!("Cuerig exited with error: {:#}", e);
        std::process::exit(1);
    }
}
