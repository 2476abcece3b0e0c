fn main() {
    if let Err(error) = loot_monitor_lib::run() {
        eprintln!("{error}");
        std::process::exit(1);
    }
}
