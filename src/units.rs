//! Length conversions between OOXML units and editor pixels (96 px per inch).

pub const TWIPS_PER_INCH: f64 = 1440.0;
pub const EMU_PER_INCH: f64 = 914_400.0;
pub const PIXELS_PER_INCH: f64 = 96.0;
pub const POINTS_PER_INCH: f64 = 72.0;

/// Rounds half up, the rounding OOXML integer lengths are written with.
pub fn round_half_up(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

pub fn twips_to_pixels(twips: f64) -> f64 {
    round3(twips / TWIPS_PER_INCH * PIXELS_PER_INCH)
}

pub fn pixels_to_twips(pixels: f64) -> i64 {
    round_half_up(pixels / PIXELS_PER_INCH * TWIPS_PER_INCH)
}

pub fn emu_to_pixels(emu: f64) -> f64 {
    round3(emu / EMU_PER_INCH * PIXELS_PER_INCH)
}

pub fn pixels_to_emu(pixels: f64) -> i64 {
    round_half_up(pixels / PIXELS_PER_INCH * EMU_PER_INCH)
}

pub fn points_to_pixels(points: f64) -> f64 {
    round3(points * PIXELS_PER_INCH / POINTS_PER_INCH)
}

pub fn pixels_to_points(pixels: f64) -> f64 {
    round3(pixels * POINTS_PER_INCH / PIXELS_PER_INCH)
}

/// `w:sz` is in half-points.
pub fn half_points_to_points(half_points: f64) -> f64 {
    half_points / 2.0
}

pub fn points_to_half_points(points: f64) -> i64 {
    round_half_up(points * 2.0)
}

/// Parses a style-sheet length like `"11pt"`, `"14.5px"` or a bare number (points).
pub fn parse_points(value: &str) -> Option<f64> {
    let v = value.trim();
    if let Some(px) = v.strip_suffix("px") {
        return px.trim().parse::<f64>().ok().map(pixels_to_points);
    }
    let num = v.strip_suffix("pt").unwrap_or(v).trim();
    num.parse::<f64>().ok().filter(|n| n.is_finite())
}

pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        let s = format!("{value:.3}");
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

/// Wrap polygon as imported: the closing point (equal to the first) is dropped.
pub fn open_polygon(points: &[[f64; 2]]) -> Vec<[f64; 2]> {
    let mut out = points.to_vec();
    if out.len() > 1 && out.first() == out.last() {
        out.pop();
    }
    out
}

/// Wrap polygon as exported: the first point is re-appended when it is not already last.
pub fn close_polygon(points: &[[f64; 2]]) -> Vec<[f64; 2]> {
    let mut out = points.to_vec();
    if let (Some(first), Some(last)) = (out.first().copied(), out.last().copied()) {
        if out.len() > 1 && first != last {
            out.push(first);
        }
    }
    out
}
