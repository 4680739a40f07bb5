use owo_colors::OwoColorize;
use std::sync::OnceLock;
use supports_color::Stream;
#[cfg(feature = "cli")]
use tracing_subscriber::EnvFilter;

static ANSI_ENABLED: OnceLock<bool> = OnceLock::new();

/// Installs the stderr subscriber; the category tags work without it.
#[cfg(feature = "cli")]
pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    let ansi = detect_ansi();
    let _ = ANSI_ENABLED.set(ansi);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(ansi)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .try_init()
        .map_err(|err| std::io::Error::other(err.to_string()))?;
    Ok(())
}

pub fn category_jit() -> String {
    if ansi_enabled() {
        format!("{}", "JIT".bright_green().bold())
    } else {
        "JIT".to_string()
    }
}

pub fn category_fallback() -> String {
    if ansi_enabled() {
        format!("{}", "FALLBACK".bright_yellow().bold())
    } else {
        "FALLBACK".to_string()
    }
}

fn ansi_enabled() -> bool {
    *ANSI_ENABLED.get_or_init(detect_ansi)
}

fn detect_ansi() -> bool {
    supports_color::on(Stream::Stderr).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_keep_their_label() {
        assert!(category_jit().contains("JIT"));
        assert!(category_fallback().contains("FALLBACK"));
    }
}
