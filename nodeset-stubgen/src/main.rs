use std::path::Path;

use nodeset_stubgen::{console_logging, run_stubgen, StubGenConfig, StubGenError};

fn main() -> Result<(), StubGenError> {
    console_logging::init();
    run_cli()
}

fn run_cli() -> Result<(), StubGenError> {
    let args: Vec<String> = std::env::args().collect();

    if args.len() != 2 {
        println!(
            r#"Usage:
nodeset-stubgen [config].yml
"#
        );
        return Ok(());
    }

    let config_path = Path::new(&args[1]);
    let root_path = match config_path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let config = StubGenConfig::from_file(config_path)?;
    let out_dir = run_stubgen(&config, root_path)?;
    println!("{}", out_dir.display());

    Ok(())
}
