// Bakes the Wi-Fi credentials and broker settings into the firmware.
//
// Values come from the environment, then from a `.env` file next to this
// script, then fall back to the classroom defaults.

const SETTINGS: &[(&str, &str)] = &[
    ("WIFI_SSID", "NUKIOT"),
    ("WIFI_PASS", "iot12345"),
    ("MQTT_HOST", "broker.emqx.io"),
    ("MQTT_PORT", "1883"),
    ("MQTT_USER", ""),
    ("MQTT_PASS", ""),
];

fn main() {
    println!("cargo:rerun-if-changed=.env");
    let _ = dotenvy::dotenv();

    for (key, default) in SETTINGS {
        println!("cargo:rerun-if-env-changed={key}");
        let value = std::env::var(key).unwrap_or_else(|_| (*default).to_string());
        println!("cargo:rustc-env={key}={value}");
    }

    println!("cargo:rustc-link-arg=-Tlinkall.x");
}
