pub fn superchat_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
