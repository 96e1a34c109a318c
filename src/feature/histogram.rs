use super::{FeatureTransform, FeatureVector};
use crate::segment::{Pixel, Segment};

/// 主色通道直方图
///
/// 统计片段所有帧中红、绿、蓝分别占主导的像素数量，并归一化为三维分布。
/// 半透明像素（alpha < 128）被忽略，因此查询图片可以用透明区域来表达“任意内容”。
#[derive(Debug, Clone, Copy, Default)]
pub struct DominantChannelHistogram;

impl DominantChannelHistogram {
    pub const NAME: &'static str = "DominantChannelHistogram";
    pub const DIMENSION: usize = 3;
    /// 归一化直方图之间的距离尺度
    pub const MAX_DISTANCE: f32 = 1.;

    /// 像素所属的直方图分桶，无主色通道时返回 None
    fn bin(pixel: &Pixel) -> Option<usize> {
        if !pixel.is_visible() {
            return None;
        }
        let Pixel { r, g, b, .. } = *pixel;
        if r == g && g == b {
            return None;
        }
        // 只有严格大于另外两个通道时才计数，最大值并列的像素不属于任何分桶
        let max = r.max(g).max(b);
        if r == max && g < max && b < max {
            Some(0)
        } else if g == max && r < max && b < max {
            Some(1)
        } else if b == max && r < max && g < max {
            Some(2)
        } else {
            None
        }
    }

    /// 未归一化的计数
    pub fn counts(segment: &Segment) -> [u64; 3] {
        let mut counts = [0u64; 3];
        for frame in segment.frames() {
            for pixel in frame.pixels() {
                if let Some(bin) = Self::bin(pixel) {
                    counts[bin] += 1;
                }
            }
        }
        counts
    }
}

impl FeatureTransform for DominantChannelHistogram {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn dimension(&self) -> usize {
        Self::DIMENSION
    }

    fn max_distance(&self) -> f32 {
        Self::MAX_DISTANCE
    }

    fn vector(&self, segment: &Segment) -> FeatureVector {
        let counts = Self::counts(segment);
        let sum: u64 = counts.iter().sum();
        if sum == 0 {
            return FeatureVector::zeros(Self::DIMENSION);
        }
        let sum = sum as f64;
        counts.iter().map(|&c| (c as f64 / sum) as f32).collect::<Vec<_>>().into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::Frame;

    fn single(pixels: &[Pixel]) -> Segment {
        let frames = pixels.iter().map(|p| Frame::new(1, 1, vec![*p]).unwrap()).collect();
        Segment::new("test", frames)
    }

    #[test]
    fn test_empty_segment() {
        let v = DominantChannelHistogram.vector(&Segment::new("empty", vec![]));
        assert_eq!(v.as_slice(), &[0., 0., 0.]);
    }

    #[test]
    fn test_no_qualifying_pixels() {
        let segment = single(&[
            Pixel::new(10, 10, 10, 255),
            Pixel::new(200, 10, 10, 0),
            Pixel::new(200, 200, 10, 255),
        ]);
        let v = DominantChannelHistogram.vector(&segment);
        assert_eq!(v.as_slice(), &[0., 0., 0.]);
        assert!(v.iter().all(|x| !x.is_nan()));
    }

    #[test]
    fn test_two_frames_one_transparent() {
        let segment = single(&[Pixel::new(200, 50, 50, 255), Pixel::new(50, 50, 50, 10)]);
        assert_eq!(DominantChannelHistogram::counts(&segment), [1, 0, 0]);
        assert_eq!(DominantChannelHistogram.vector(&segment).as_slice(), &[1., 0., 0.]);
    }

    #[test]
    fn test_strict_maximum() {
        let cases = [
            (Pixel::new(3, 2, 1, 255), Some(0)),
            (Pixel::new(1, 3, 2, 255), Some(1)),
            (Pixel::new(1, 2, 3, 128), Some(2)),
            (Pixel::new(3, 3, 1, 255), None),
            (Pixel::new(1, 3, 3, 255), None),
            (Pixel::new(3, 1, 3, 255), None),
            (Pixel::new(7, 7, 7, 255), None),
            (Pixel::new(3, 2, 1, 127), None),
        ];
        for (pixel, bin) in cases {
            assert_eq!(DominantChannelHistogram::bin(&pixel), bin, "{:?}", pixel);
        }
    }

    #[test]
    fn test_normalized_sum() {
        let frame = Frame::new(
            2,
            3,
            vec![
                Pixel::new(255, 0, 0, 255),
                Pixel::new(0, 255, 0, 255),
                Pixel::new(0, 0, 255, 255),
                Pixel::new(0, 0, 255, 255),
                Pixel::new(0, 0, 200, 255),
                Pixel::new(1, 0, 0, 255),
            ],
        )
        .unwrap();
        let v = DominantChannelHistogram.vector(&Segment::new("s", vec![frame.clone(), frame]));
        let sum: f32 = v.iter().sum();
        assert!((sum - 1.).abs() < 1e-6);
        assert!((v[0] - 2. / 6.).abs() < 1e-6);
        assert!((v[1] - 1. / 6.).abs() < 1e-6);
        assert!((v[2] - 3. / 6.).abs() < 1e-6);
    }

    #[test]
    fn test_deterministic() {
        let segment = single(&[Pixel::new(9, 200, 4, 255), Pixel::new(200, 9, 4, 255)]);
        let a = DominantChannelHistogram.vector(&segment);
        let b = DominantChannelHistogram.vector(&segment.clone());
        assert_eq!(a, b);
    }
}
