use ndarray::Array2;

/// Rotate an image counter-clockwise by `degrees` about its centre,
/// sampling with bilinear interpolation and zero padding outside.
pub fn rotate_bilinear(img: &Array2<f32>, degrees: f32) -> Array2<f32> {
    let (nr, nc) = img.dim();
    let theta = degrees.to_radians();
    let (sin_t, cos_t) = theta.sin_cos();

    let cr = (nr as f32 - 1.0) * 0.5;
    let cc = (nc as f32 - 1.0) * 0.5;

    Array2::from_shape_fn((nr, nc), |(r, c)| {
        let dr = r as f32 - cr;
        let dc = c as f32 - cc;

        // inverse mapping: rotate the target coordinate backwards
        let sr = cr + cos_t * dr + sin_t * dc;
        let sc = cc - sin_t * dr + cos_t * dc;

        sample_bilinear(img, sr, sc)
    })
}

/// Bilinear read at a fractional position; zero outside the image.
pub fn sample_bilinear(img: &Array2<f32>, r: f32, c: f32) -> f32 {
    let (nr, nc) = img.dim();

    if r < -1.0 || c < -1.0 || r > nr as f32 || c > nc as f32 {
        return 0.0;
    }

    let r0 = r.floor();
    let c0 = c.floor();
    let wr = r - r0;
    let wc = c - c0;

    let at = |i: f32, j: f32| -> f32 {
        if i < 0.0 || j < 0.0 {
            return 0.0;
        }
        let (i, j) = (i as usize, j as usize);
        if i >= nr || j >= nc {
            0.0
        } else {
            img[[i, j]]
        }
    };

    at(r0, c0) * (1.0 - wr) * (1.0 - wc)
        + at(r0, c0 + 1.0) * (1.0 - wr) * wc
        + at(r0 + 1.0, c0) * wr * (1.0 - wc)
        + at(r0 + 1.0, c0 + 1.0) * wr * wc
}

/// Normalized Gaussian kernel with radius `ceil(3 sigma)`
pub fn gaussian_kernel_1d(sigma: f32) -> Vec<f32> {
    let sigma = sigma.max(1e-3);
    let radius = (3.0 * sigma).ceil().max(1.0) as i64;

    let mut kernel: Vec<f32> = (-radius..=radius)
        .map(|k| (-0.5 * (k as f32 / sigma).powi(2)).exp())
        .collect();

    let tot: f32 = kernel.iter().sum();
    kernel.iter_mut().for_each(|w| *w /= tot);
    kernel
}

/// Separable Gaussian blur with edge clamping
pub fn gaussian_blur(img: &Array2<f32>, sigma: f32) -> Array2<f32> {
    let kernel = gaussian_kernel_1d(sigma);
    let radius = (kernel.len() / 2) as i64;
    let (nr, nc) = img.dim();

    let clamp = |x: i64, n: usize| -> usize { x.clamp(0, n as i64 - 1) as usize };

    // rows
    let mut tmp = Array2::<f32>::zeros((nr, nc));
    for r in 0..nr {
        for c in 0..nc {
            let mut acc = 0.0;
            for (k, w) in kernel.iter().enumerate() {
                let cc = clamp(c as i64 + k as i64 - radius, nc);
                acc += w * img[[r, cc]];
            }
            tmp[[r, c]] = acc;
        }
    }

    // columns
    let mut out = Array2::<f32>::zeros((nr, nc));
    for r in 0..nr {
        for c in 0..nc {
            let mut acc = 0.0;
            for (k, w) in kernel.iter().enumerate() {
                let rr = clamp(r as i64 + k as i64 - radius, nr);
                acc += w * tmp[[rr, c]];
            }
            out[[r, c]] = acc;
        }
    }

    out
}
