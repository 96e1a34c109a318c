use std::path::PathBuf;

use anyhow::{Result, anyhow};
use clap::Parser;
use log::debug;
use tokio::task::block_in_place;

use crate::cli::{SubCommandExtend, open_store};
use crate::config::{IdSource, Opts, OutputFormat, QueryOptions};
use crate::retriever::FeatureRetriever;
use crate::utils::{load_segment, print_result, scan_segments, suffix_regex};

#[derive(Parser, Debug, Clone)]
pub struct SearchCommand {
    #[command(flatten)]
    pub query: QueryOptions,
    /// 被搜索的片段，可以是一张图片，也可以是存放所有帧的目录
    pub path: PathBuf,
    /// 扫描的文件后缀名，多个后缀用逗号分隔
    #[arg(short, long, default_value = "jpg,png,webp")]
    pub suffix: String,
    /// 输出格式
    #[arg(long, value_enum, value_name = "FORMAT", default_value_t = OutputFormat::Table)]
    pub output_format: OutputFormat,
}

impl SubCommandExtend for SearchCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let re_suf = suffix_regex(&self.suffix)?;
        let segment = block_in_place(|| {
            let source = scan_segments(&self.path, &re_suf, true)
                .pop()
                .ok_or_else(|| anyhow!("未找到任何帧: {}", self.path.display()))?;
            load_segment(&source, IdSource::Path, None)
        })?;
        debug!("查询片段共 {} 帧", segment.frames().len());

        let store = open_store(opts).await?;
        let mut retriever = FeatureRetriever::new(opts.transform(), self.query.retriever_config())
            .with_entity(opts.entity());
        retriever.init(&store).await?;
        let result = retriever.get_similar(&segment, &self.query.query_config()).await;
        retriever.finish();

        print_result(&result?, self.output_format)
    }
}
