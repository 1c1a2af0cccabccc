fn main() {
    if let Err(err) = mapping_rs_editor::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
