//! # Plot Rendering
//!
//! Rasterizes the three visualizations into 1200×600 RGB images and stores them as PNG.
//! Plots are drawn directly into an `image::RgbImage`: a white canvas, a framed plot
//! area with a light grid, and the data on top. The spectrogram also gets a colour bar
//! on the right, labelled in dB. Text uses the 8×8 bitmap glyphs from `font8x8`, so no
//! system fonts are needed. Every plot has a title, axis labels and one tick label per
//! grid line:
//!
//! | Kind        | x axis                | y axis                       |
//! |-------------|-----------------------|------------------------------|
//! | waveform    | 0..duration seconds   | ±peak amplitude              |
//! | spectrogram | 0..duration seconds   | 0..Nyquist Hz, dB as colour  |
//! | spectrum    | 0..10000 Hz (fixed)   | 0..max magnitude             |

use crate::audio::effects::peak;
use crate::audio::spectral::{Spectrogram, Spectrum, STFT_HOP};
use crate::audio::waveform::{partial_path, Waveform};
use crate::error::{AudioError, AudioResult};
use font8x8::{UnicodeFonts, BASIC_FONTS};
use image::{ImageFormat, Rgb, RgbImage};
use std::fs;
use std::path::Path;

pub const IMAGE_WIDTH: u32 = 1200;
pub const IMAGE_HEIGHT: u32 = 600;

/// Upper edge of the spectrum plot regardless of the signal's Nyquist frequency
pub const SPECTRUM_MAX_HZ: f64 = 10_000.0;

const MARGIN_LEFT: u32 = 80;
const MARGIN_RIGHT: u32 = 30;
const MARGIN_TOP: u32 = 40;
const MARGIN_BOTTOM: u32 = 50;
const COLORBAR_WIDTH: u32 = 24;
const COLORBAR_GAP: u32 = 20;
/// Room right of the colour bar for its dB labels
const COLORBAR_LABEL_WIDTH: u32 = 64;
const COLORBAR_TICKS: u32 = 4;
const GRID_DIVISIONS: u32 = 10;

/// Glyph cell edge in pixels at scale 1
const GLYPH_SIZE: u32 = 8;
const TITLE_SCALE: u32 = 2;
/// Gap between a tick label and the frame
const TICK_GAP: u32 = 6;

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const AXIS: Rgb<u8> = Rgb([0, 0, 0]);
const GRID: Rgb<u8> = Rgb([214, 214, 214]);
const TRACE: Rgb<u8> = Rgb([31, 119, 180]);

/// Colour map anchors, dark (low dB) to bright (peak)
const COLOR_STOPS: [(f64, [u8; 3]); 5] = [
    (0.0, [0, 0, 4]),
    (0.25, [81, 18, 124]),
    (0.5, [183, 55, 121]),
    (0.75, [252, 137, 97]),
    (1.0, [252, 253, 191]),
];

/// Pixel rectangle of the plot area (right/bottom exclusive).
#[derive(Debug, Clone, Copy)]
struct PlotArea {
    left: u32,
    top: u32,
    right: u32,
    bottom: u32,
}

impl PlotArea {
    fn width(&self) -> u32 {
        self.right - self.left
    }

    fn height(&self) -> u32 {
        self.bottom - self.top
    }

    /// Map a value in `[min, max]` to a row, `max` at the top.
    fn row_for(&self, value: f64, min: f64, max: f64) -> u32 {
        let span = (max - min).max(f64::EPSILON);
        let fraction = ((value - min) / span).clamp(0.0, 1.0);
        let offset = ((1.0 - fraction) * (self.height() - 1) as f64).round() as u32;
        self.top + offset
    }
}

struct Canvas {
    image: RgbImage,
    plot: PlotArea,
}

impl Canvas {
    fn new(with_colorbar: bool) -> Self {
        let reserved = if with_colorbar {
            COLORBAR_GAP + COLORBAR_WIDTH + COLORBAR_LABEL_WIDTH
        } else {
            0
        };
        Self {
            image: RgbImage::from_pixel(IMAGE_WIDTH, IMAGE_HEIGHT, BACKGROUND),
            plot: PlotArea {
                left: MARGIN_LEFT,
                top: MARGIN_TOP,
                right: IMAGE_WIDTH - MARGIN_RIGHT - reserved,
                bottom: IMAGE_HEIGHT - MARGIN_BOTTOM,
            },
        }
    }

    fn vertical_span(&mut self, x: u32, y_a: u32, y_b: u32, color: Rgb<u8>) {
        for y in y_a.min(y_b)..=y_a.max(y_b) {
            self.image.put_pixel(x, y, color);
        }
    }

    fn horizontal_span(&mut self, y: u32, x_a: u32, x_b: u32, color: Rgb<u8>) {
        for x in x_a.min(x_b)..=x_a.max(x_b) {
            self.image.put_pixel(x, y, color);
        }
    }

    fn draw_grid(&mut self) {
        let plot = self.plot;
        for i in 1..GRID_DIVISIONS {
            let x = plot.left + plot.width() * i / GRID_DIVISIONS;
            let y = plot.top + plot.height() * i / GRID_DIVISIONS;
            self.vertical_span(x, plot.top, plot.bottom - 1, GRID);
            self.horizontal_span(y, plot.left, plot.right - 1, GRID);
        }
    }

    fn draw_frame(&mut self) {
        let plot = self.plot;
        self.vertical_span(plot.left - 1, plot.top - 1, plot.bottom, AXIS);
        self.vertical_span(plot.right, plot.top - 1, plot.bottom, AXIS);
        self.horizontal_span(plot.top - 1, plot.left - 1, plot.right, AXIS);
        self.horizontal_span(plot.bottom, plot.left - 1, plot.right, AXIS);
    }

    /// Connect one row per plot column into a continuous trace.
    fn draw_trace(&mut self, rows: &[(u32, u32)]) {
        let left = self.plot.left;
        let mut previous: Option<(u32, u32)> = None;
        for (column, &(low, high)) in rows.iter().enumerate() {
            let x = left + column as u32;
            let (mut top, mut bottom) = (low.min(high), low.max(high));
            if let Some((prev_top, prev_bottom)) = previous {
                // Bridge the gap to the previous column
                top = top.min(prev_bottom);
                bottom = bottom.max(prev_top);
            }
            self.vertical_span(x, top, bottom, TRACE);
            previous = Some((low.min(high), low.max(high)));
        }
    }

    fn put_checked(&mut self, x: u32, y: u32, color: Rgb<u8>) {
        if x < self.image.width() && y < self.image.height() {
            self.image.put_pixel(x, y, color);
        }
    }

    /// Draw `text` left to right with its top-left corner at `(x, y)`.
    fn draw_text(&mut self, x: u32, y: u32, text: &str, scale: u32) {
        for (index, ch) in text.chars().enumerate() {
            let origin = x + index as u32 * GLYPH_SIZE * scale;
            let Some(glyph) = glyph_for(ch) else { continue };
            for (row, &bits) in glyph.iter().enumerate() {
                for col in 0..GLYPH_SIZE {
                    if bits & (1u8 << col) == 0 {
                        continue;
                    }
                    for dy in 0..scale {
                        for dx in 0..scale {
                            let px = origin + col * scale + dx;
                            let py = y + row as u32 * scale + dy;
                            self.put_checked(px, py, AXIS);
                        }
                    }
                }
            }
        }
    }

    /// Draw `text` rotated a quarter turn counter-clockwise, reading bottom to top.
    /// `(x, bottom)` is the bottom-left corner of the rotated run.
    fn draw_text_vertical(&mut self, x: u32, bottom: u32, text: &str) {
        for (index, ch) in text.chars().enumerate() {
            let Some(glyph) = glyph_for(ch) else { continue };
            let base = index as u32 * GLYPH_SIZE;
            for (row, &bits) in glyph.iter().enumerate() {
                for col in 0..GLYPH_SIZE {
                    if bits & (1u8 << col) != 0 {
                        if let Some(py) = bottom.checked_sub(base + col) {
                            self.put_checked(x + row as u32, py, AXIS);
                        }
                    }
                }
            }
        }
    }

    fn draw_text_centered(&mut self, center_x: u32, y: u32, text: &str, scale: u32) {
        let x = center_x.saturating_sub(text_width(text, scale) / 2);
        self.draw_text(x, y, text, scale);
    }

    /// Title above the plot, axis labels, and a tick label at every grid line.
    fn draw_labels(&mut self, title: &str, x_axis: Axis<'_>, y_axis: Axis<'_>) {
        let plot = self.plot;
        let title_y = (MARGIN_TOP - GLYPH_SIZE * TITLE_SCALE) / 2;
        self.draw_text_centered(plot.left + plot.width() / 2, title_y, title, TITLE_SCALE);

        let x_ticks = tick_labels(x_axis.min, x_axis.max, GRID_DIVISIONS);
        for (i, label) in x_ticks.iter().enumerate() {
            let x = plot.left + (plot.width() - 1) * i as u32 / GRID_DIVISIONS;
            self.draw_text_centered(x, plot.bottom + TICK_GAP, label, 1);
        }
        let label_y = plot.bottom + TICK_GAP + GLYPH_SIZE + TICK_GAP * 2;
        self.draw_text_centered(plot.left + plot.width() / 2, label_y, x_axis.label, 1);

        let y_ticks = tick_labels(y_axis.min, y_axis.max, GRID_DIVISIONS);
        for (i, label) in y_ticks.iter().enumerate() {
            let y = plot.bottom - 1 - (plot.height() - 1) * i as u32 / GRID_DIVISIONS;
            let x = (plot.left - TICK_GAP).saturating_sub(text_width(label, 1));
            self.draw_text(x, y.saturating_sub(GLYPH_SIZE / 2), label, 1);
        }
        let bottom = plot.top + plot.height() / 2 + text_width(y_axis.label, 1) / 2;
        self.draw_text_vertical(TICK_GAP, bottom, y_axis.label);
    }

    fn draw_colorbar(&mut self, min_db: f64, max_db: f64) {
        let x0 = self.plot.right + COLORBAR_GAP;
        let height = self.plot.height();
        for y in self.plot.top..self.plot.bottom {
            let level = 1.0 - (y - self.plot.top) as f64 / (height - 1).max(1) as f64;
            let color = colormap(level);
            self.horizontal_span(y, x0, x0 + COLORBAR_WIDTH - 1, color);
        }
        let (top, bottom) = (self.plot.top, self.plot.bottom);
        self.vertical_span(x0 - 1, top - 1, bottom, AXIS);
        self.vertical_span(x0 + COLORBAR_WIDTH, top - 1, bottom, AXIS);
        self.horizontal_span(top - 1, x0 - 1, x0 + COLORBAR_WIDTH, AXIS);
        self.horizontal_span(bottom, x0 - 1, x0 + COLORBAR_WIDTH, AXIS);

        let label_x = x0 + COLORBAR_WIDTH + TICK_GAP;
        for (i, label) in colorbar_labels(min_db, max_db).iter().enumerate() {
            let y = bottom - 1 - (self.plot.height() - 1) * i as u32 / COLORBAR_TICKS;
            self.draw_text(label_x, y.saturating_sub(GLYPH_SIZE / 2), label, 1);
        }
    }
}

/// Range and caption of one plot axis.
#[derive(Debug, Clone, Copy)]
struct Axis<'a> {
    min: f64,
    max: f64,
    label: &'a str,
}

fn glyph_for(ch: char) -> Option<[u8; 8]> {
    BASIC_FONTS.get(ch).or_else(|| BASIC_FONTS.get('?'))
}

fn text_width(text: &str, scale: u32) -> u32 {
    text.chars().count() as u32 * GLYPH_SIZE * scale
}

/// Labels for `divisions + 1` evenly spaced ticks from `min` to `max`.
///
/// Decimals follow the tick step; magnitudes of 1e5 and up switch to exponent form.
fn tick_labels(min: f64, max: f64, divisions: u32) -> Vec<String> {
    let step = (max - min) / divisions as f64;
    let decimals = if step > 0.0 && step.is_finite() {
        (-step.log10()).ceil().clamp(0.0, 4.0) as usize
    } else {
        0
    };
    (0..=divisions)
        .map(|i| {
            let mut value = min + step * i as f64;
            if value.abs() < step.abs() * 1e-6 {
                value = 0.0;
            }
            if value.abs() >= 1e5 {
                format!("{:.1e}", value)
            } else {
                format!("{:.*}", decimals, value)
            }
        })
        .collect()
}

/// dB labels for the colour bar, bottom (`min_db`) to top (`max_db`).
fn colorbar_labels(min_db: f64, max_db: f64) -> Vec<String> {
    (0..=COLORBAR_TICKS)
        .map(|i| {
            let value = min_db + (max_db - min_db) * i as f64 / COLORBAR_TICKS as f64;
            // Adding zero folds -0 into +0
            format!("{:+.0} dB", value.round() + 0.0)
        })
        .collect()
}

/// Amplitude over time, one min/max span per pixel column.
pub fn render_waveform(waveform: &Waveform) -> RgbImage {
    let mut canvas = Canvas::new(false);
    canvas.draw_grid();

    let samples = waveform.samples();
    let limit = peak(samples).max(1e-9) * 1.05;
    canvas.draw_labels(
        "Waveform",
        Axis { min: 0.0, max: waveform.duration_seconds(), label: "Time (s)" },
        Axis { min: -limit, max: limit, label: "Amplitude" },
    );

    if !samples.is_empty() {
        let plot = canvas.plot;
        let columns = plot.width() as usize;

        let rows: Vec<(u32, u32)> = (0..columns)
            .map(|column| {
                let start = column * samples.len() / columns;
                let end = ((column + 1) * samples.len() / columns).max(start + 1);
                let window = &samples[start.min(samples.len() - 1)..end.min(samples.len())];
                let (low, high) = window
                    .iter()
                    .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &s| (lo.min(s), hi.max(s)));
                (
                    plot.row_for(low, -limit, limit),
                    plot.row_for(high, -limit, limit),
                )
            })
            .collect();
        canvas.draw_trace(&rows);
    }

    canvas.draw_frame();
    canvas.image
}

/// Time on x, linear frequency on y, dB mapped through the colour map.
pub fn render_spectrogram(spectrogram: &Spectrogram) -> RgbImage {
    let mut canvas = Canvas::new(true);
    let plot = canvas.plot;

    let frames = &spectrogram.frames;
    let bins = spectrogram.bin_count();
    let (min_db, max_db) = frames
        .iter()
        .flatten()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let span = if max_db > min_db { max_db - min_db } else { 1.0 };

    if !frames.is_empty() {
        for column in 0..plot.width() {
            let frame = &frames[(column as usize * frames.len() / plot.width() as usize).min(frames.len() - 1)];
            for row in 0..plot.height() {
                let from_bottom = plot.height() - 1 - row;
                let bin = (from_bottom as usize * bins / plot.height() as usize).min(bins - 1);
                let level = (frame[bin] - min_db) / span;
                canvas
                    .image
                    .put_pixel(plot.left + column, plot.top + row, colormap(level));
            }
        }
    }

    let rate = spectrogram.sample_rate.max(1) as f64;
    canvas.draw_labels(
        "Spectrogram",
        Axis { min: 0.0, max: (frames.len() * STFT_HOP) as f64 / rate, label: "Time (s)" },
        Axis { min: 0.0, max: rate / 2.0, label: "Frequency (Hz)" },
    );
    canvas.draw_frame();
    if frames.is_empty() {
        canvas.draw_colorbar(0.0, 0.0);
    } else {
        canvas.draw_colorbar(min_db, max_db);
    }
    canvas.image
}

/// Magnitude over frequency, x axis fixed to `0..SPECTRUM_MAX_HZ`.
pub fn render_spectrum(spectrum: &Spectrum) -> RgbImage {
    let mut canvas = Canvas::new(false);
    canvas.draw_grid();

    let plot = canvas.plot;
    let visible: Vec<(f64, f64)> = spectrum
        .frequencies
        .iter()
        .zip(&spectrum.magnitudes)
        .filter(|(f, _)| **f <= SPECTRUM_MAX_HZ)
        .map(|(f, m)| (*f, *m))
        .collect();

    let max_magnitude = visible.iter().fold(0.0f64, |acc, (_, m)| acc.max(*m)).max(1e-12) * 1.05;
    canvas.draw_labels(
        "Frequency Spectrum",
        Axis { min: 0.0, max: SPECTRUM_MAX_HZ, label: "Frequency (Hz)" },
        Axis { min: 0.0, max: max_magnitude, label: "Magnitude" },
    );

    if !visible.is_empty() {
        let columns = plot.width() as usize;
        let hz_per_column = SPECTRUM_MAX_HZ / columns as f64;

        let mut cursor = 0;
        let mut rows = Vec::with_capacity(columns);
        for column in 0..columns {
            let column_end = (column + 1) as f64 * hz_per_column;
            // Strongest bin inside the column, else the last bin before it
            let mut strongest: Option<f64> = None;
            while cursor < visible.len() && visible[cursor].0 < column_end {
                strongest = Some(strongest.map_or(visible[cursor].1, |s| s.max(visible[cursor].1)));
                cursor += 1;
            }
            let magnitude = match strongest {
                Some(m) => m,
                None if cursor >= visible.len() => break,
                None => visible[cursor.saturating_sub(1)].1,
            };
            let row = plot.row_for(magnitude, 0.0, max_magnitude);
            rows.push((row, row));
        }
        canvas.draw_trace(&rows);
    }

    canvas.draw_frame();
    canvas.image
}

/// Interpolate the colour map at `level` in [0, 1].
fn colormap(level: f64) -> Rgb<u8> {
    let level = if level.is_finite() { level.clamp(0.0, 1.0) } else { 0.0 };
    for pair in COLOR_STOPS.windows(2) {
        let (t0, c0) = pair[0];
        let (t1, c1) = pair[1];
        if level <= t1 {
            let f = (level - t0) / (t1 - t0);
            let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * f).round() as u8;
            return Rgb([mix(c0[0], c1[0]), mix(c0[1], c1[1]), mix(c0[2], c1[2])]);
        }
    }
    Rgb(COLOR_STOPS[COLOR_STOPS.len() - 1].1)
}

/// Encode as PNG next to `path` and rename into place.
pub fn save_png(image: &RgbImage, path: &Path) -> AudioResult<()> {
    let partial = partial_path(path);
    if let Err(e) = image.save_with_format(&partial, ImageFormat::Png) {
        let _ = fs::remove_file(&partial);
        return Err(AudioError::from(e));
    }
    if let Err(e) = fs::rename(&partial, path) {
        let _ = fs::remove_file(&partial);
        return Err(e.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;
    use tempfile::TempDir;

    fn tone() -> Waveform {
        let samples = (0..22050)
            .map(|i| 0.8 * (2.0 * PI * 440.0 * i as f64 / 22050.0).sin())
            .collect();
        Waveform::new(samples, 22050)
    }

    fn trace_pixels(image: &RgbImage) -> usize {
        image.pixels().filter(|p| **p == TRACE).count()
    }

    #[test]
    fn test_waveform_plot() {
        let image = render_waveform(&tone());
        assert_eq!(image.dimensions(), (IMAGE_WIDTH, IMAGE_HEIGHT));
        assert!(trace_pixels(&image) > 1000);
        assert_eq!(*image.get_pixel(0, 0), BACKGROUND);
    }

    #[test]
    fn test_empty_waveform_plot_has_frame_only() {
        let image = render_waveform(&Waveform::new(Vec::new(), 22050));
        assert_eq!(trace_pixels(&image), 0);
        assert_eq!(*image.get_pixel(MARGIN_LEFT - 1, MARGIN_TOP + 10), AXIS);
    }

    #[test]
    fn test_spectrum_plot_peak_position() {
        let image = render_spectrum(&Spectrum::compute(&tone()));
        let canvas = Canvas::new(false);
        let plot = canvas.plot;

        // The 440 Hz peak reaches near the top of the plot at x ≈ 440/10000 of the width
        let column = plot.left + (440.0 / SPECTRUM_MAX_HZ * plot.width() as f64) as u32;
        let near_top = (column.saturating_sub(2)..=column + 2)
            .any(|x| (plot.top..plot.top + 40).any(|y| *image.get_pixel(x, y) == TRACE));
        assert!(near_top);
    }

    #[test]
    fn test_spectrogram_plot_has_colorbar() {
        let image = render_spectrogram(&Spectrogram::compute(&tone()));
        let plot = Canvas::new(true).plot;
        let bar_x = plot.right + COLORBAR_GAP + COLORBAR_WIDTH / 2;
        assert_eq!(*image.get_pixel(bar_x, plot.top), colormap(1.0));
        assert_eq!(*image.get_pixel(bar_x, plot.bottom - 1), colormap(0.0));
    }

    #[test]
    fn test_colormap_endpoints() {
        assert_eq!(colormap(0.0), Rgb([0, 0, 4]));
        assert_eq!(colormap(1.0), Rgb([252, 253, 191]));
        assert_eq!(colormap(f64::NAN), Rgb([0, 0, 4]));
    }

    fn ink_in(image: &RgbImage, xs: std::ops::Range<u32>, ys: std::ops::Range<u32>) -> usize {
        xs.flat_map(|x| ys.clone().map(move |y| (x, y)))
            .filter(|&(x, y)| *image.get_pixel(x, y) == AXIS)
            .count()
    }

    #[test]
    fn test_text_matches_font_glyph() {
        let mut canvas = Canvas::new(false);
        canvas.draw_text(4, 4, "A", 1);
        let glyph = BASIC_FONTS.get('A').unwrap();
        for (row, &bits) in glyph.iter().enumerate() {
            for col in 0..GLYPH_SIZE {
                let expected = if bits & (1u8 << col) != 0 { AXIS } else { BACKGROUND };
                assert_eq!(*canvas.image.get_pixel(4 + col, 4 + row as u32), expected);
            }
        }
    }

    #[test]
    fn test_tick_labels() {
        let hz = tick_labels(0.0, SPECTRUM_MAX_HZ, GRID_DIVISIONS);
        assert_eq!(hz.len(), 11);
        assert_eq!(hz[0], "0");
        assert_eq!(hz[3], "3000");
        assert_eq!(hz[10], "10000");

        let amplitude = tick_labels(-0.84, 0.84, GRID_DIVISIONS);
        assert_eq!(amplitude[0], "-0.8");
        assert_eq!(amplitude[5], "0.0");
        assert_eq!(amplitude[10], "0.8");

        assert_eq!(tick_labels(0.0, 500_000.0, GRID_DIVISIONS)[10], "5.0e5");
        assert!(tick_labels(0.0, 0.0, GRID_DIVISIONS).iter().all(|l| l == "0"));
    }

    #[test]
    fn test_colorbar_labels() {
        assert_eq!(
            colorbar_labels(-80.0, 0.0),
            vec!["-80 dB", "-60 dB", "-40 dB", "-20 dB", "+0 dB"]
        );
    }

    #[test]
    fn test_plots_have_text() {
        let image = render_waveform(&tone());
        let plot = Canvas::new(false).plot;

        // Tick labels below the x axis and left of the y axis
        let below = plot.bottom + TICK_GAP..plot.bottom + TICK_GAP + GLYPH_SIZE;
        assert!(ink_in(&image, plot.left..plot.right, below) > 100);
        let left = GLYPH_SIZE + TICK_GAP..plot.left - TICK_GAP;
        assert!(ink_in(&image, left, plot.top..plot.bottom) > 100);
        // Title and rotated y axis label
        assert!(ink_in(&image, plot.left..plot.right, 0..MARGIN_TOP - 1) > 50);
        assert!(ink_in(&image, TICK_GAP..TICK_GAP + GLYPH_SIZE, plot.top..plot.bottom) > 30);

        let image = render_spectrogram(&Spectrogram::compute(&tone()));
        let plot = Canvas::new(true).plot;
        let labels_x = plot.right + COLORBAR_GAP + COLORBAR_WIDTH + TICK_GAP;
        assert!(ink_in(&image, labels_x..IMAGE_WIDTH, plot.top..plot.bottom) > 100);
    }

    #[test]
    fn test_save_png_removes_partial_on_failure() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("plot.png");
        // A non-empty directory in the way makes the final rename fail
        fs::create_dir(&path).unwrap();
        fs::write(path.join("keep"), b"x").unwrap();

        assert!(save_png(&render_waveform(&tone()), &path).is_err());
        assert!(!partial_path(&path).exists());
        assert!(path.join("keep").exists());
    }

    #[test]
    fn test_save_png_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("plot.png");
        save_png(&render_waveform(&tone()), &path).unwrap();

        assert!(!partial_path(&path).exists());
        let decoded = image::open(&path).unwrap();
        assert_eq!(decoded.width(), IMAGE_WIDTH);
        assert_eq!(decoded.height(), IMAGE_HEIGHT);
    }
}
