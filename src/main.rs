fn main() {
    if let Err(e) = darshan_lib::run() {
        eprintln!("darshan: {:#}", e);
        std::process::exit(1);
    }
}
