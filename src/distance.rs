use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// 近邻搜索使用的距离函数
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum Distance {
    /// L1 距离
    Manhattan,
    /// L2 距离
    #[default]
    Euclidean,
    /// L∞ 距离
    Chebyshev,
    /// 1 - 余弦相似度
    Cosine,
    /// 卡方距离，适用于直方图
    ChiSquared,
}

impl Distance {
    /// 计算两个等长向量之间的距离
    pub fn eval(&self, a: &[f32], b: &[f32]) -> f64 {
        debug_assert_eq!(a.len(), b.len());
        let pairs = a.iter().zip(b).map(|(&x, &y)| (x as f64, y as f64));
        match self {
            Self::Manhattan => pairs.map(|(x, y)| (x - y).abs()).sum(),
            Self::Euclidean => pairs.map(|(x, y)| (x - y) * (x - y)).sum::<f64>().sqrt(),
            Self::Chebyshev => pairs.map(|(x, y)| (x - y).abs()).fold(0., f64::max),
            Self::Cosine => {
                let (mut dot, mut na, mut nb) = (0., 0., 0.);
                for (x, y) in pairs {
                    dot += x * y;
                    na += x * x;
                    nb += y * y;
                }
                if na == 0. || nb == 0. {
                    // 零向量与任何向量都没有方向上的相似性
                    return if na == nb { 0. } else { 1. };
                }
                1. - dot / (na.sqrt() * nb.sqrt())
            }
            Self::ChiSquared => pairs
                .filter(|(x, y)| x + y != 0.)
                .map(|(x, y)| (x - y) * (x - y) / (x + y))
                .sum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_vectors() {
        let v = [0.2, 0.3, 0.5];
        for d in Distance::value_variants() {
            assert!(d.eval(&v, &v).abs() < 1e-9, "{:?}", d);
        }
    }

    #[test]
    fn test_known_values() {
        let a = [1., 0., 0.];
        let b = [0., 1., 0.];
        assert_eq!(Distance::Manhattan.eval(&a, &b), 2.);
        assert!((Distance::Euclidean.eval(&a, &b) - 2f64.sqrt()).abs() < 1e-9);
        assert_eq!(Distance::Chebyshev.eval(&a, &b), 1.);
        assert!((Distance::Cosine.eval(&a, &b) - 1.).abs() < 1e-9);
        assert_eq!(Distance::ChiSquared.eval(&a, &b), 2.);
    }

    #[test]
    fn test_names_match_cli() {
        // 命令行与 HTTP 接口使用同一套名称
        for d in Distance::value_variants() {
            let name = d.to_possible_value().unwrap().get_name().to_owned();
            assert_eq!(serde_json::to_string(d).unwrap(), format!("\"{name}\""));
            let parsed: Distance = serde_json::from_str(&format!("\"{name}\"")).unwrap();
            assert_eq!(parsed, *d);
        }
        assert_eq!(Distance::from_str("chi-squared", true), Ok(Distance::ChiSquared));
    }

    #[test]
    fn test_zero_vectors() {
        let z = [0., 0., 0.];
        assert_eq!(Distance::Cosine.eval(&z, &z), 0.);
        assert_eq!(Distance::Cosine.eval(&z, &[1., 0., 0.]), 1.);
        assert_eq!(Distance::ChiSquared.eval(&z, &z), 0.);
    }
}
