//! Template matching by normalized cross-correlation.
//!
//! Scores follow the `TM_CCOEFF_NORMED` definition over the R, G and B
//! channels: each channel of the needle and of the haystack window is
//! mean-centred, products are summed across all three channels, and the
//! sum is divided by the product of the centred norms. Scores lie in
//! `[-1, 1]`; a window or needle with zero variance scores 0.
//!
//! Window sums come from integer integral images, so flat regions score
//! exactly 0 instead of amplifying rounding noise. The cross term
//! `sum(window * needle)` is an integer dot product for small needles. For
//! larger ones it is read from a frequency-domain correlation of the whole
//! screen and rounded back to the exact integer, which keeps a full-HD
//! search fast enough to poll.
//!
//! Every top-left position scoring at least `min_confidence` is reported,
//! row-major, with no suppression of overlapping matches.

use std::path::Path;
use std::sync::Arc;

use image::RgbaImage;
use rayon::prelude::*;
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use serde::{Deserialize, Serialize};

use crate::{ToolkitError, ToolkitResult};

/// Default threshold for template searches.
pub const DEFAULT_CONFIDENCE: f32 = 0.8;

/// Needles up to this many pixels are correlated directly.
const DIRECT_MAX_NEEDLE_PIXELS: usize = 64;

/// One template occurrence, in the coordinates of the searched image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub confidence: f32,
}

impl Match {
    /// Centroid `(x + width/2, y + height/2)`.
    pub fn center(&self) -> (u32, u32) {
        (self.x + self.width / 2, self.y + self.height / 2)
    }

    /// Shift by an origin, e.g. from capture-region to screen coordinates.
    pub fn offset(self, dx: u32, dy: u32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            ..self
        }
    }
}

/// Load a template image from disk.
pub fn load_template(path: &Path) -> ToolkitResult<RgbaImage> {
    match image::open(path) {
        Ok(img) => Ok(img.to_rgba8()),
        Err(image::ImageError::IoError(e)) if e.kind() == std::io::ErrorKind::NotFound => Err(
            ToolkitError::NotFound(format!("template image not found: {}", path.display())),
        ),
        Err(e) => Err(e.into()),
    }
}

/// Find every position where `needle` matches `haystack` with a score of
/// at least `min_confidence`. A needle larger than the haystack (or empty)
/// yields no matches.
pub fn locate(needle: &RgbaImage, haystack: &RgbaImage, min_confidence: f32) -> Vec<Match> {
    let (nw, nh) = needle.dimensions();
    let (hw, hh) = haystack.dimensions();
    if nw == 0 || nh == 0 || nw > hw || nh > hh {
        return Vec::new();
    }

    let template = Template::new(needle);
    if template.centred_norm == 0 {
        // Flat needle: every window scores 0.
        return if min_confidence <= 0.0 {
            all_positions(nw, nh, hw, hh, 0.0)
        } else {
            Vec::new()
        };
    }

    let scene = Scene::new(haystack);
    let spectral = (template.width * template.height > DIRECT_MAX_NEEDLE_PIXELS)
        .then(|| CrossTable::new(&template, &scene));
    let rows: Vec<Vec<Match>> = (0..=hh - nh)
        .into_par_iter()
        .map(|y| {
            (0..=hw - nw)
                .filter_map(|x| {
                    let (xu, yu) = (x as usize, y as usize);
                    let cross = match &spectral {
                        Some(table) => table.at(xu, yu),
                        None => direct_cross(&template, &scene, xu, yu),
                    };
                    let score = score_at(&template, &scene, xu, yu, cross);
                    (score >= min_confidence).then_some(Match {
                        x,
                        y,
                        width: nw,
                        height: nh,
                        confidence: score,
                    })
                })
                .collect()
        })
        .collect();

    rows.into_iter().flatten().collect()
}

fn all_positions(nw: u32, nh: u32, hw: u32, hh: u32, confidence: f32) -> Vec<Match> {
    (0..=hh - nh)
        .flat_map(|y| {
            (0..=hw - nw).map(move |x| Match {
                x,
                y,
                width: nw,
                height: nh,
                confidence,
            })
        })
        .collect()
}

/// Split RGBA pixels into three row-major channel planes.
fn planes(img: &RgbaImage) -> [Vec<u8>; 3] {
    let len = (img.width() * img.height()) as usize;
    let mut out = [
        Vec::with_capacity(len),
        Vec::with_capacity(len),
        Vec::with_capacity(len),
    ];
    for px in img.pixels() {
        for (c, plane) in out.iter_mut().enumerate() {
            plane.push(px.0[c]);
        }
    }
    out
}

struct Template {
    width: usize,
    height: usize,
    planes: [Vec<u8>; 3],
    /// Per-channel sum of values.
    sums: [u64; 3],
    /// n * sum of squared centred values, summed over channels.
    centred_norm: i128,
}

impl Template {
    fn new(img: &RgbaImage) -> Self {
        let planes = planes(img);
        let n = i128::from(img.width()) * i128::from(img.height());
        let mut sums = [0u64; 3];
        let mut centred_norm = 0i128;
        for (c, plane) in planes.iter().enumerate() {
            let s: u64 = plane.iter().map(|&v| u64::from(v)).sum();
            let q: u64 = plane.iter().map(|&v| u64::from(v) * u64::from(v)).sum();
            sums[c] = s;
            centred_norm += n * i128::from(q) - i128::from(s) * i128::from(s);
        }
        Self {
            width: img.width() as usize,
            height: img.height() as usize,
            planes,
            sums,
            centred_norm,
        }
    }
}

struct Scene {
    width: usize,
    height: usize,
    planes: [Vec<u8>; 3],
    integrals: [Integral; 3],
}

impl Scene {
    fn new(img: &RgbaImage) -> Self {
        let (w, h) = (img.width() as usize, img.height() as usize);
        let planes = planes(img);
        let integrals = [
            Integral::new(&planes[0], w, h),
            Integral::new(&planes[1], w, h),
            Integral::new(&planes[2], w, h),
        ];
        Self {
            width: w,
            height: h,
            planes,
            integrals,
        }
    }
}

/// Summed-area tables of values and squared values, `(w+1) x (h+1)`.
struct Integral {
    stride: usize,
    sum: Vec<u64>,
    sq: Vec<u64>,
}

impl Integral {
    fn new(plane: &[u8], w: usize, h: usize) -> Self {
        let stride = w + 1;
        let mut sum = vec![0u64; stride * (h + 1)];
        let mut sq = vec![0u64; stride * (h + 1)];
        for y in 0..h {
            let mut row_sum = 0u64;
            let mut row_sq = 0u64;
            for x in 0..w {
                let v = u64::from(plane[y * w + x]);
                row_sum += v;
                row_sq += v * v;
                let idx = (y + 1) * stride + x + 1;
                sum[idx] = sum[idx - stride] + row_sum;
                sq[idx] = sq[idx - stride] + row_sq;
            }
        }
        Self { stride, sum, sq }
    }

    /// `(sum, sum of squares)` over the window at `(x, y)` of size `w`x`h`.
    fn window(&self, x: usize, y: usize, w: usize, h: usize) -> (u64, u64) {
        let a = y * self.stride + x;
        let b = a + w;
        let c = (y + h) * self.stride + x;
        let d = c + w;
        let s = self.sum[d] + self.sum[a] - self.sum[b] - self.sum[c];
        let q = self.sq[d] + self.sq[a] - self.sq[b] - self.sq[c];
        (s, q)
    }
}

/// `sum(window * needle)` at one position, summed over channels.
fn direct_cross(t: &Template, scene: &Scene, x: usize, y: usize) -> u64 {
    let mut cross = 0u64;
    for (plane, needle) in scene.planes.iter().zip(&t.planes) {
        for row in 0..t.height {
            let start = (y + row) * scene.width + x;
            let hay_row = &plane[start..start + t.width];
            let needle_row = &needle[row * t.width..(row + 1) * t.width];
            cross += hay_row
                .iter()
                .zip(needle_row)
                .map(|(&a, &b)| u64::from(a) * u64::from(b))
                .sum::<u64>();
        }
    }
    cross
}

fn score_at(t: &Template, scene: &Scene, x: usize, y: usize, cross: u64) -> f32 {
    let n = (t.width * t.height) as i128;

    let mut numerator = n * i128::from(cross);
    let mut window_norm = 0i128;
    for c in 0..3 {
        let (s, q) = scene.integrals[c].window(x, y, t.width, t.height);
        window_norm += n * i128::from(q) - i128::from(s) * i128::from(s);
        numerator -= i128::from(s) * i128::from(t.sums[c]);
    }

    if window_norm <= 0 {
        return 0.0;
    }
    let denom = (window_norm as f64).sqrt() * (t.centred_norm as f64).sqrt();
    ((numerator as f64) / denom).clamp(-1.0, 1.0) as f32
}

/// Channel-summed cross terms for every top-left position.
///
/// Computed as a circular correlation the size of the scene: the
/// spectra of each scene plane and zero-padded needle plane are
/// multiplied (scene times conjugate needle), summed over channels and
/// transformed back once. Valid positions never wrap around the edge,
/// so the circular result equals the linear one there.
struct CrossTable {
    width: usize,
    values: Vec<f64>,
}

impl CrossTable {
    fn new(t: &Template, scene: &Scene) -> Self {
        let (w, h) = (scene.width, scene.height);
        let mut planner = FftPlanner::<f64>::new();
        let forward = Fft2d {
            rows: planner.plan_fft_forward(w),
            cols: planner.plan_fft_forward(h),
            width: w,
            height: h,
        };
        let inverse = Fft2d {
            rows: planner.plan_fft_inverse(w),
            cols: planner.plan_fft_inverse(h),
            width: w,
            height: h,
        };

        let mut acc = vec![Complex::new(0.0, 0.0); w * h];
        for c in 0..3 {
            let hay = forward.forward(spread(&scene.planes[c], w, w, h));
            let needle = forward.forward(spread(&t.planes[c], t.width, w, h));
            acc.par_iter_mut()
                .zip(hay.par_iter().zip(needle.par_iter()))
                .for_each(|(a, (hv, nv))| *a += *hv * nv.conj());
        }

        let scale = (w * h) as f64;
        let values = inverse
            .backward(acc)
            .into_par_iter()
            .map(|v| v.re / scale)
            .collect();
        Self { width: w, values }
    }

    /// The exact integer cross term at `(x, y)`.
    fn at(&self, x: usize, y: usize) -> u64 {
        self.values[y * self.width + x].round().max(0.0) as u64
    }
}

/// Copy a `plane_width`-wide plane into the top-left of a zeroed `w`x`h`
/// complex buffer.
fn spread(plane: &[u8], plane_width: usize, w: usize, h: usize) -> Vec<Complex<f64>> {
    let mut out = vec![Complex::new(0.0, 0.0); w * h];
    for (row, src) in plane.chunks(plane_width).enumerate() {
        for (dst, &v) in out[row * w..row * w + plane_width].iter_mut().zip(src) {
            dst.re = f64::from(v);
        }
    }
    out
}

/// Separable 2-D transform: rows, then columns on the transposed buffer.
struct Fft2d {
    rows: Arc<dyn Fft<f64>>,
    cols: Arc<dyn Fft<f64>>,
    width: usize,
    height: usize,
}

impl Fft2d {
    /// Row-major input, column-major spectrum.
    fn forward(&self, mut buf: Vec<Complex<f64>>) -> Vec<Complex<f64>> {
        run_lines(self.rows.as_ref(), &mut buf, self.width);
        let mut spectrum = transpose(&buf, self.width, self.height);
        run_lines(self.cols.as_ref(), &mut spectrum, self.height);
        spectrum
    }

    /// Column-major spectrum in, row-major output (unnormalized).
    fn backward(&self, mut spectrum: Vec<Complex<f64>>) -> Vec<Complex<f64>> {
        run_lines(self.cols.as_ref(), &mut spectrum, self.height);
        let mut buf = transpose(&spectrum, self.height, self.width);
        run_lines(self.rows.as_ref(), &mut buf, self.width);
        buf
    }
}

fn run_lines(fft: &dyn Fft<f64>, buf: &mut [Complex<f64>], len: usize) {
    let scratch_len = fft.get_inplace_scratch_len();
    buf.par_chunks_mut(len).for_each_init(
        || vec![Complex::new(0.0, 0.0); scratch_len],
        |scratch, line| fft.process_with_scratch(line, scratch),
    );
}

/// `h` rows of `w` in, `w` rows of `h` out.
fn transpose(buf: &[Complex<f64>], w: usize, h: usize) -> Vec<Complex<f64>> {
    let mut out = vec![Complex::new(0.0, 0.0); w * h];
    out.par_chunks_mut(h).enumerate().for_each(|(x, column)| {
        for (y, v) in column.iter_mut().enumerate() {
            *v = buf[y * w + x];
        }
    });
    out
}
