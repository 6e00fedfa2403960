//! Five-point face alignment.
//!
//! Fits a similarity transform (scale, rotation, translation) from detected
//! landmarks onto the canonical ArcFace template and warps the colour frame
//! into a 112x112 crop.

use image::{Rgb, RgbImage};

/// Canonical landmark positions inside a 112x112 ArcFace crop.
const TEMPLATE_112: [(f32, f32); 5] = [
    (38.2946, 51.6963), // left eye
    (73.5318, 51.5014), // right eye
    (56.0252, 71.7366), // nose
    (41.5493, 92.3655), // left mouth
    (70.7299, 92.2041), // right mouth
];

pub const ALIGNED_SIZE: u32 = 112;

/// 2x3 similarity matrix `[a, -b, tx, b, a, ty]`.
type Similarity = [f32; 6];

/// Least-squares similarity transform mapping `src` points onto `dst` points.
///
/// Each correspondence contributes two rows to the normal equations of
/// `[a, b, tx, ty]`:
/// ```text
/// sx*a - sy*b + tx = dx
/// sy*a + sx*b + ty = dy
/// ```
fn fit_similarity(src: &[(f32, f32); 5], dst: &[(f32, f32); 5]) -> Similarity {
    let mut normal = [[0.0f32; 4]; 4];
    let mut rhs = [0.0f32; 4];

    for (&(sx, sy), &(dx, dy)) in src.iter().zip(dst.iter()) {
        let rows = [([sx, -sy, 1.0, 0.0], dx), ([sy, sx, 0.0, 1.0], dy)];
        for (row, target) in rows {
            for j in 0..4 {
                for k in 0..4 {
                    normal[j][k] += row[j] * row[k];
                }
                rhs[j] += row[j] * target;
            }
        }
    }

    let [a, b, tx, ty] = solve4(normal, rhs);
    [a, -b, tx, b, a, ty]
}

/// Gaussian elimination with partial pivoting on a 4x4 system.
///
/// A singular system yields the unit-scale transform with no translation.
#[allow(clippy::needless_range_loop)]
fn solve4(mut m: [[f32; 4]; 4], mut v: [f32; 4]) -> [f32; 4] {
    for col in 0..4 {
        let pivot_row = (col..4)
            .max_by(|&i, &j| {
                m[i][col]
                    .abs()
                    .partial_cmp(&m[j][col].abs())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .unwrap_or(col);
        m.swap(col, pivot_row);
        v.swap(col, pivot_row);

        let pivot = m[col][col];
        if pivot.abs() < 1e-12 {
            return [1.0, 0.0, 0.0, 0.0];
        }

        for row in (col + 1)..4 {
            let factor = m[row][col] / pivot;
            for k in col..4 {
                m[row][k] -= factor * m[col][k];
            }
            v[row] -= factor * v[col];
        }
    }

    let mut x = [0.0f32; 4];
    for i in (0..4).rev() {
        let tail: f32 = ((i + 1)..4).map(|j| m[i][j] * x[j]).sum();
        x[i] = (v[i] - tail) / m[i][i];
    }
    x
}

/// Warp `frame` through the inverse of `matrix` into an `out_size` square crop.
///
/// Bilinear sampling per channel; samples outside the frame are black.
fn warp_similarity(frame: &RgbImage, matrix: &Similarity, out_size: u32) -> RgbImage {
    let (a, tx) = (matrix[0], matrix[2]);
    let (b, ty) = (matrix[3], matrix[5]);

    let det = a * a + b * b;
    if det.abs() < 1e-12 {
        return RgbImage::new(out_size, out_size);
    }
    let ia = a / det;
    let ib = b / det;

    let (w, h) = (frame.width() as i64, frame.height() as i64);
    let sample = |x: i64, y: i64, c: usize| -> f32 {
        if x >= 0 && x < w && y >= 0 && y < h {
            frame.get_pixel(x as u32, y as u32)[c] as f32
        } else {
            0.0
        }
    };

    RgbImage::from_fn(out_size, out_size, |ox, oy| {
        let dx = ox as f32 - tx;
        let dy = oy as f32 - ty;
        let sx = ia * dx + ib * dy;
        let sy = -ib * dx + ia * dy;

        let x0 = sx.floor() as i64;
        let y0 = sy.floor() as i64;
        let fx = sx - x0 as f32;
        let fy = sy - y0 as f32;

        let mut px = [0u8; 3];
        for (c, out) in px.iter_mut().enumerate() {
            let val = sample(x0, y0, c) * (1.0 - fx) * (1.0 - fy)
                + sample(x0 + 1, y0, c) * fx * (1.0 - fy)
                + sample(x0, y0 + 1, c) * (1.0 - fx) * fy
                + sample(x0 + 1, y0 + 1, c) * fx * fy;
            *out = val.round().clamp(0.0, 255.0) as u8;
        }
        Rgb(px)
    })
}

/// Align a detected face to the canonical 112x112 ArcFace crop.
pub fn align_face(frame: &RgbImage, landmarks: &[(f32, f32); 5]) -> RgbImage {
    let matrix = fit_similarity(landmarks, &TEMPLATE_112);
    warp_similarity(frame, &matrix, ALIGNED_SIZE)
}
