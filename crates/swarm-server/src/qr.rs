//! Terminal QR codes for the admin and portal URLs.

use tracing::warn;

/// Render `data` as a QR code of Unicode half-blocks (two modules per character
/// row) with a one-module quiet zone.
pub fn render(data: &str) -> Option<String> {
    let code = match qrcode::QrCode::new(data.as_bytes()) {
        Ok(code) => code,
        Err(e) => {
            warn!(error = %e, "failed to render QR code");
            return None;
        }
    };
    let quiet = 1i32;
    let width = code.width() as i32;
    let dark: Vec<bool> = code
        .into_colors()
        .into_iter()
        .map(|c| c == qrcode::Color::Dark)
        .collect();
    let at = |x: i32, y: i32| -> bool {
        if x < 0 || y < 0 || x >= width || y >= width {
            false
        } else {
            dark[(y * width + x) as usize]
        }
    };

    let mut out = String::new();
    let mut y = -quiet;
    while y < width + quiet {
        for x in -quiet..width + quiet {
            out.push(match (at(x, y), at(x, y + 1)) {
                (true, true) => '█',
                (true, false) => '▀',
                (false, true) => '▄',
                (false, false) => ' ',
            });
        }
        out.push('\n');
        y += 2;
    }
    Some(out)
}

/// Print `url` and its QR code to stderr.
pub fn print(label: &str, url: &str) {
    eprintln!();
    eprintln!("   \x1b[1m{label}\x1b[0m {url}");
    if let Some(code) = render(url) {
        eprintln!();
        for line in code.lines() {
            eprintln!("   {line}");
        }
    }
    eprintln!();
}
