/// Install a console logger, filtered by `RUST_LOG` and `info` otherwise.
/// Calling it twice is harmless.
pub fn init() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}
