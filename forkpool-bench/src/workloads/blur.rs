//! Box blur of an in-memory RGB image. Each output pixel is the average of the
//! source pixels within `radius` of it, clipped at the borders.

use crate::data::{Image, Rgb};
use forkpool::{ForkJoin, Rows, Task, ThreadPool};

/// Output rows per leaf.
pub const THRESHOLD: usize = 16;

pub struct BoxBlur<'a> {
    src: &'a Image,
    radius: usize,
}

impl<'a> BoxBlur<'a> {
    pub fn new(src: &'a Image, radius: usize) -> Self {
        Self { src, radius }
    }

    fn pixel(&self, x: usize, y: usize) -> Rgb {
        let src = self.src;
        let xs = x.saturating_sub(self.radius)..(x + self.radius + 1).min(src.width);
        let ys = y.saturating_sub(self.radius)..(y + self.radius + 1).min(src.height);

        let mut sum = [0u32; 3];
        let mut count = 0u32;
        for ny in ys {
            for nx in xs.clone() {
                let p = src.pixel(nx, ny);
                for (s, c) in sum.iter_mut().zip(p) {
                    *s += u32::from(c);
                }
                count += 1;
            }
        }

        // Averages of u8 values fit in a u8.
        sum.map(|s| (s / count) as u8)
    }

    fn fill_row(&self, y: usize, row: &mut [Rgb]) {
        for (x, out) in row.iter_mut().enumerate() {
            *out = self.pixel(x, y);
        }
    }
}

impl<'a> ForkJoin for BoxBlur<'a> {
    type Part = Rows<'a, Rgb>;
    type Output = ();

    fn compute_base(&self, mut rows: Rows<'a, Rgb>) -> anyhow::Result<()> {
        for (y, row) in rows.rows_mut() {
            self.fill_row(y, row);
        }
        Ok(())
    }

    fn combine(&self, _: (), _: ()) -> anyhow::Result<()> {
        Ok(())
    }
}

pub fn blur_sequential(src: &Image, radius: usize) -> Image {
    let job = BoxBlur::new(src, radius);
    let mut dest = Image::blank(src.width, src.height);
    if src.width > 0 {
        for (y, row) in dest.pixels.chunks_exact_mut(src.width).enumerate() {
            job.fill_row(y, row);
        }
    }
    dest
}

pub fn blur_parallel(pool: &ThreadPool, src: &Image, radius: usize) -> forkpool::Result<Image> {
    let job = BoxBlur::new(src, radius);
    let mut dest = Image::blank(src.width, src.height);
    if src.width > 0 {
        pool.submit(Task::new(
            &job,
            Rows::new(&mut dest.pixels, src.width),
            THRESHOLD,
        ))?;
    }
    Ok(dest)
}
