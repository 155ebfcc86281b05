//! Pairing QR codes rendered for a terminal.

use beacon_core::error::BeaconError;
use qrcode::{Color, EcLevel, QrCode};

/// Render `payload` with Unicode half blocks, two module rows per line,
/// inside a one-module light border.
pub fn render_terminal(payload: &str) -> Result<String, BeaconError> {
    let payload = payload.trim();
    if payload.is_empty() {
        return Err(BeaconError::Channel("QR payload is empty".into()));
    }
    let code = QrCode::with_error_correction_level(payload.as_bytes(), EcLevel::L)
        .map_err(|e| BeaconError::Channel(format!("QR generation failed: {e}")))?;

    let width = code.width();
    let colors = code.into_colors();
    let dark = |row: usize, col: usize| -> bool {
        // Coordinates include the border, so shift back by one.
        if row == 0 || col == 0 || row > width || col > width {
            return false;
        }
        colors[(row - 1) * width + (col - 1)] == Color::Dark
    };

    let framed = width + 2;
    let mut out = String::with_capacity(framed * (framed / 2 + 1) * 3);
    for row in (0..framed).step_by(2) {
        for col in 0..framed {
            out.push(match (dark(row, col), dark(row + 1, col)) {
                (true, true) => '█',
                (true, false) => '▀',
                (false, true) => '▄',
                (false, false) => ' ',
            });
        }
        out.push('\n');
    }
    Ok(out)
}
