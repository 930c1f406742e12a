/// Build script
/// Runs at compile time before the library is built
/// - Injects app metadata from the Cargo manifest into Rust code
/// - Derives a filesystem-safe app id used for the preferences directory

fn main() {
    println!("cargo:rerun-if-changed=Cargo.toml");

    let name = std::env::var("CARGO_PKG_NAME").unwrap_or_else(|_| "pm2-monitor".to_string());
    let version = std::env::var("CARGO_PKG_VERSION").unwrap_or_else(|_| "0.1.0".to_string());

    // Normalize name for file system use (lowercase, alphanumeric + hyphens only)
    let app_id = name
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '-')
        .collect::<String>();

    // Inject into Rust code via environment variables (accessible with env!() macro)
    println!("cargo:rustc-env=APP_NAME={}", display_name(&name));
    println!("cargo:rustc-env=APP_VERSION={}", version);
    println!("cargo:rustc-env=APP_ID={}", app_id);
}

// "pm2-monitor" -> "PM2 Monitor"
fn display_name(name: &str) -> String {
    name.split('-')
        .filter(|part| !part.is_empty())
        .map(|part| {
            if part.chars().any(|c| c.is_ascii_digit()) {
                part.to_uppercase()
            } else {
                let mut chars = part.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                    None => String::new(),
                }
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
