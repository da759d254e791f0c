fn main() {
    if let Err(err) = widget_filters::run() {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}
