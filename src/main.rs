use minish::{Interpreter, ShellConfig};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

fn main() -> anyhow::Result<()> {
    let config = ShellConfig::from_env();

    // Diagnostics go to stderr so they never mix with command output.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::new(&config.log_filter))
        .init();

    Interpreter::default().repl(&config)?;
    Ok(())
}
