fn main() {
    // Only the firmware build needs the ESP-IDF environment; host test
    // builds skip it entirely.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
