use std::{env, fs};
use std::path::PathBuf;

fn out_dir() -> String {
    env::var("OUT_DIR").expect("No OUT_DIR env var")
}

fn build_info_plist() {
    let version = env::var("CARGO_PKG_VERSION").expect("No CARGO_PKG_VERSION env var");
    let out_path: PathBuf = [out_dir().as_str(), "Info.plist"].iter().collect();

    let plist = format!(r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
    <key>CFBundleName</key>
    <string>ESP32 Relay Control</string>
    <key>CFBundleIdentifier</key>
    <string>io.esp32-relay.relay-control</string>
    <key>CFBundleShortVersionString</key>
    <string>{version}</string>
    <key>CFBundleVersion</key>
    <string>{version}</string>
    <key>NSBluetoothAlwaysUsageDescription</key>
    <string>Bluetooth is used to find and control your ESP32 relay board.</string>
</dict>
</plist>
"#);

    fs::write(&out_path, plist).expect("Failed to write Info.plist");
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    build_info_plist();
}
