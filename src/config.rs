use std::convert::Infallible;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::LazyLock;

use clap::{Parser, Subcommand, ValueEnum};
use directories::ProjectDirs;

use crate::cli::*;
use crate::db::entity_name;
use crate::distance::Distance;
use crate::feature::{DominantChannelHistogram, FeatureTransform};
use crate::query::{QueryConfig, RetrieverConfig};
use crate::score::CorrespondenceFunction;

static CONF_DIR: LazyLock<String> = LazyLock::new(|| {
    ProjectDirs::from("", "shotsearch", "shotsearch")
        .map(|dirs| dirs.config_dir().to_string_lossy().into_owned())
        .unwrap_or_else(|| ".shotsearch".to_owned())
});

fn default_config_dir() -> &'static str {
    CONF_DIR.as_str()
}

#[derive(Parser, Debug, Clone)]
pub struct QueryOptions {
    /// 返回的结果数量，默认为每个模块的最大结果数
    #[arg(long, value_name = "COUNT")]
    pub count: Option<usize>,
    /// 每个模块的默认最大结果数
    #[arg(long, value_name = "COUNT", default_value_t = RetrieverConfig::DEFAULT_MAX_RESULTS)]
    pub max_results_per_module: usize,
    /// 距离函数
    #[arg(long, value_enum, default_value_t = Distance::Euclidean)]
    pub distance: Distance,
    /// 对应函数，格式为 linear:<最大距离> 或 hyperbolic:<除数>，默认使用特征对应的线性函数
    #[arg(long, value_name = "FUNCTION")]
    pub correspondence: Option<CorrespondenceFunction>,
}

impl QueryOptions {
    pub fn query_config(&self) -> QueryConfig {
        QueryConfig {
            max_results: self.count,
            correspondence: self.correspondence,
            distance: Some(self.distance),
        }
    }

    pub fn retriever_config(&self) -> RetrieverConfig {
        RetrieverConfig { max_results_per_module: self.max_results_per_module }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(name = "shotsearch", version)]
pub struct Opts {
    #[command(subcommand)]
    pub subcmd: SubCommand,
    /// shotsearch 配置文件目录
    #[arg(short, long, default_value = default_config_dir())]
    pub conf_dir: ConfDir,
    /// 特征实体名，默认为 features_<特征模块名>
    #[arg(short, long, global = true)]
    pub entity: Option<String>,
}

impl Opts {
    /// 当前使用的特征变换
    pub fn transform(&self) -> DominantChannelHistogram {
        DominantChannelHistogram
    }

    /// 当前使用的实体名
    pub fn entity(&self) -> String {
        self.entity.clone().unwrap_or_else(|| entity_name(self.transform().name()))
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum SubCommand {
    /// 在数据库中创建特征实体
    Setup(SetupCommand),
    /// 删除特征实体及其所有数据
    Drop(DropCommand),
    /// 抽取片段特征并写入数据库
    Add(AddCommand),
    /// 按内容搜索相似片段
    Search(SearchCommand),
    /// 搜索与已入库片段相似的片段
    Similar(SimilarCommand),
    /// 显示特征实体信息
    Show(ShowCommand),
    /// 导出所有特征向量
    Export(ExportCommand),
    /// 启动 HTTP 搜索服务
    Server(ServerCommand),
}

#[derive(Debug, Clone)]
pub struct ConfDir {
    path: PathBuf,
}

impl ConfDir {
    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// 返回数据库文件的路径
    pub fn database(&self) -> PathBuf {
        self.path.join("shotsearch.db")
    }

    /// 返回配置目录下的文件路径
    pub fn join(&self, path: impl AsRef<Path>) -> PathBuf {
        self.path.join(path)
    }
}

impl FromStr for ConfDir {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self { path: PathBuf::from(s) })
    }
}

/// 片段 ID 的生成方式
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdSource {
    /// 使用片段路径
    Path,
    /// 使用所有帧文件内容的 BLAKE3 哈希
    Blake3,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Table,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_search() {
        let opts = Opts::parse_from([
            "shotsearch",
            "-c",
            "/tmp/conf",
            "search",
            "a.png",
            "--count",
            "5",
            "--distance",
            "manhattan",
            "--correspondence",
            "hyperbolic:0.5",
        ]);
        assert_eq!(opts.conf_dir.database(), PathBuf::from("/tmp/conf/shotsearch.db"));
        assert_eq!(opts.entity(), "features_DominantChannelHistogram");
        let SubCommand::Search(search) = opts.subcmd else {
            panic!("expected search");
        };
        let config = search.query.query_config();
        assert_eq!(config.max_results, Some(5));
        assert_eq!(config.distance, Some(Distance::Manhattan));
        assert_eq!(config.correspondence, Some(CorrespondenceFunction::hyperbolic(0.5)));
    }

    #[test]
    fn test_global_entity() {
        let opts = Opts::parse_from(["shotsearch", "show", "--entity", "features_custom"]);
        assert_eq!(opts.entity(), "features_custom");
    }

    #[test]
    fn test_invalid_correspondence() {
        let result =
            Opts::try_parse_from(["shotsearch", "similar", "x", "--correspondence", "linear"]);
        assert!(result.is_err());
    }
}
