fn main() {
    if let Err(err) = partmerge::run() {
        log::debug!("{:?}", err);
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }
}
