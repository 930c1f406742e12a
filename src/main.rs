/// Entry point for pm2-monitor
/// Everything lives in the library crate; this only reports fatal errors
fn main() {
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Application panic: {:?}", panic_info);
        std::process::exit(1);
    }));

    if let Err(e) = pm2_monitor_lib::run() {
        eprintln!("Error: {e:?}");
        std::process::exit(1);
    }
}
